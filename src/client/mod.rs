// src/client/mod.rs
//! Client reconciliation engine: optimistic message views kept in step with
//! the chat server.

pub mod api;
pub mod session;
pub mod state;

pub use api::{ApiError, ChatApi, HttpChatApi};
pub use session::{ChatSession, ClientError};
pub use state::{ClientState, MessageView, SendPhase, TempId, ThreadState, UnseenSend};
