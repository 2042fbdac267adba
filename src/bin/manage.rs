//! Maintenance commands for an askbot database.
//!
//! Usage:
//!   askbot-manage delete-unused-tags
//!   askbot-manage add-missing-subscriptions
//!   askbot-manage create-tags --count 100

use std::str::FromStr;

use anyhow::{Context, Result, bail};
use askbot::services::{tags, users};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Database to operate on.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://askbot.db")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deletes tags that no question uses.
    DeleteUnusedTags,
    /// Gives every user the default email feed settings they are missing.
    AddMissingSubscriptions,
    /// Seeds tag0..tagN, owned by the first administrator unless a user is given.
    CreateTags {
        #[arg(long)]
        count: usize,
        #[arg(long)]
        user_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let options = SqliteConnectOptions::from_str(&args.database_url)
        .with_context(|| format!("invalid database url {}", args.database_url))?
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("failed to open the database")?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    match args.command {
        Command::DeleteUnusedTags => delete_unused_tags(&pool).await,
        Command::AddMissingSubscriptions => add_missing_subscriptions(&pool).await,
        Command::CreateTags { count, user_id } => create_tags(&pool, count, user_id).await,
    }
}

async fn delete_unused_tags(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    let deleted = tags::delete_unused_tags(&mut tx).await?;
    tx.commit().await?;
    println!("{}", tags::deleted_tags_report(&deleted));
    Ok(())
}

/// One transaction per user so a failure only loses that user's rows.
async fn add_missing_subscriptions(pool: &SqlitePool) -> Result<()> {
    let user_ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users ORDER BY id")
        .fetch_all(pool)
        .await?;

    let mut added = 0;
    for (user_id,) in user_ids {
        let mut tx = pool.begin().await?;
        match users::add_missing_subscriptions(&mut tx, user_id).await {
            Ok(n) => {
                tx.commit().await?;
                added += n;
            }
            Err(e) => {
                tracing::error!(user_id, "Failed to add subscriptions: {:?}", e);
                tx.rollback().await?;
            }
        }
    }
    println!("Added {} email feed settings", added);
    Ok(())
}

async fn create_tags(pool: &SqlitePool, count: usize, user_id: Option<i64>) -> Result<()> {
    let owner = match user_id {
        Some(id) => Some((id,)),
        None => sqlx::query_as::<_, (i64,)>(
            "SELECT id FROM users WHERE is_superuser = TRUE OR status = 'd' ORDER BY id LIMIT 1",
        )
        .fetch_optional(pool)
        .await?,
    };
    let Some((owner_id,)) = owner else {
        bail!("no administrator found; pass --user-id");
    };

    let mut tx = pool.begin().await?;
    let created = tags::create_tags(&mut tx, count, owner_id).await?;
    tx.commit().await?;
    println!("Created {} tags", created);
    Ok(())
}
