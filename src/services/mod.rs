// src/services/mod.rs
pub mod chat_service;
pub mod context;

pub use chat_service::{ChatService, ChatSettings};
