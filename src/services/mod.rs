//! Forum rules that run against the database: every handler goes through these.

pub mod activity;
pub mod badges;
pub mod groups;
pub mod mail;
pub mod messages;
pub mod notifications;
pub mod permissions;
pub mod posts;
pub mod reputation;
pub mod tags;
pub mod users;
pub mod voting;

#[cfg(test)]
pub(crate) mod fixtures;
