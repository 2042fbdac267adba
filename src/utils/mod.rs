// src/utils/mod.rs

pub mod diff;
pub mod hash;
pub mod html;
pub mod jwt;
pub mod pagination;
pub mod slug;
pub mod url;
