// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod badges;
pub mod docs;
pub mod groups;
pub mod messages;
pub mod posts;
pub mod questions;
pub mod tags;
pub mod users;
