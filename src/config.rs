//! Environment-driven service configuration.
//!
//! Loaded once at startup (after `dotenvy` reads `.env`) and shared read-only
//! through `AppState`.

use std::env;
use std::path::PathBuf;

/// 100 MiB upload cap, validated before any processing.
pub const MAX_FILE_SIZE: usize = 100 * 1024 * 1024;

/// Characters per ingestion chunk.
pub const CHUNK_SIZE: usize = 600;

/// Overlap between consecutive chunks.
pub const CHUNK_OVERLAP: usize = 100;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the OpenAI-compatible model API.
    pub api_base: String,
    pub api_key: String,
    pub chat_model: String,
    pub verification_model: String,
    pub embed_model: String,
    /// SQLite file backing both the checkpoint store and the vector table.
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    /// Hard cap on model/tool cycles per turn.
    pub agent_max_steps: usize,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: env_or("MISTRAL_API_BASE", "https://api.mistral.ai"),
            api_key: env_or("MISTRAL_API_KEY", ""),
            chat_model: env_or("CHAT_MODEL", "mistral-large-latest"),
            verification_model: env_or(
                "VERIFICATION_MODEL",
                "meta-llama/llama-4-scout-17b-16e-instruct",
            ),
            embed_model: env_or("EMBED_MODEL", "mistral-embed"),
            db_path: PathBuf::from(env_or("DB_PATH", "rag_backend.db")),
            log_dir: PathBuf::from(env_or("LOG_DIR", "logs")),
            agent_max_steps: env::var("AGENT_MAX_STEPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(6),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::from_env();
        assert!(config.agent_max_steps >= 1);
        assert_eq!(MAX_FILE_SIZE, 104_857_600);
        assert!(CHUNK_OVERLAP < CHUNK_SIZE);
    }
}
