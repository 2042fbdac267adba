// src/models/mod.rs

pub mod activity;
pub mod badge;
pub mod email_feed;
pub mod group;
pub mod message;
pub mod post;
pub mod reply_address;
pub mod repute;
pub mod tag;
pub mod thread;
pub mod user;
pub mod vote;
