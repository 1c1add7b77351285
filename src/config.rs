// src/config.rs
//! Runtime configuration read from the environment (and `.env` via dotenvy).
//!
//! | Variable                         | Default                            |
//! |----------------------------------|------------------------------------|
//! | `DATABASE_URL`                   | unset, in-memory store             |
//! | `DATABASE_MAX_CONNECTIONS`       | `5`                                |
//! | `COMPLETION_API_KEY`/`GROQ_API_KEY` | unset, completion disabled      |
//! | `COMPLETION_BASE_URL`            | `https://api.groq.com/openai/v1`   |
//! | `COMPLETION_MODEL`               | `llama3-8b-8192`                   |
//! | `COMPLETION_TIMEOUT_SECS`        | `10`                               |
//! | `CONTEXT_WINDOW_SIZE`            | `10`                               |
//! | `SYSTEM_INSTRUCTION`             | `You are a helpful AI assistant.`  |
//! | `SERIALIZE_SENDS`                | `false`                            |
//! | `JWT_SECRET`                     | `default_secret`                   |
//! | `PORT`                           | `5000`                             |

use crate::services::chat_service::{
    ChatSettings, DEFAULT_COMPLETION_TIMEOUT, DEFAULT_CONTEXT_WINDOW, DEFAULT_MODEL,
    DEFAULT_SYSTEM_INSTRUCTION,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_JWT_SECRET: &str = "default_secret";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub completion_api_key: Option<String>,
    pub completion_base_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub chat: ChatSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let context_window: usize = parse_or(&get, "CONTEXT_WINDOW_SIZE", DEFAULT_CONTEXT_WINDOW)?;
        if context_window == 0 {
            return Err(ConfigError::Invalid {
                name: "CONTEXT_WINDOW_SIZE",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let timeout_secs: u64 = parse_or(
            &get,
            "COMPLETION_TIMEOUT_SECS",
            DEFAULT_COMPLETION_TIMEOUT.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "COMPLETION_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let chat = ChatSettings {
            context_window,
            system_instruction: get("SYSTEM_INSTRUCTION")
                .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            model: get("COMPLETION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            completion_timeout: Duration::from_secs(timeout_secs),
            serialize_sends: parse_bool_or(&get, "SERIALIZE_SENDS", false)?,
        };

        Ok(AppConfig {
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            completion_api_key: get("COMPLETION_API_KEY").or_else(|| get("GROQ_API_KEY")),
            completion_base_url: get("COMPLETION_BASE_URL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_BASE_URL.to_string()),
            jwt_secret: jwt_secret_or_default(get("JWT_SECRET")),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            chat,
        })
    }

    pub fn uses_default_jwt_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Signing secret for bearer tokens; blank counts as unset.
pub fn jwt_secret_or_default(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string())
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool_or<G>(get: &G, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                value: v.clone(),
                reason: "expected true or false".to_string(),
            }),
        },
    }
}
