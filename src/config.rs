use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use crate::errors::AppError;

/// Runtime settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_key: Vec<u8>,
    pub admin_user_ids: HashSet<String>,
    pub upload_dir: PathBuf,
    pub public_upload_path: String,
    pub app_url: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub stripe_currency: String,
}

/// actix cookie keys need at least 64 bytes of material.
const MIN_SESSION_KEY_LEN: usize = 64;

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn required(name: &str) -> Result<String, AppError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{} environment variable not set", name)))
}

pub fn parse_admin_ids(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let session_key = required("SESSION_KEY")?.into_bytes();
        if session_key.len() < MIN_SESSION_KEY_LEN {
            return Err(AppError::Config(format!(
                "SESSION_KEY must be at least {} bytes",
                MIN_SESSION_KEY_LEN
            )));
        }

        let admin_raw = env::var("ADMIN_USER_IDS")
            .or_else(|_| env::var("ADMIN_USER_ID"))
            .unwrap_or_default();
        let admin_user_ids = parse_admin_ids(&admin_raw);
        if admin_user_ids.is_empty() {
            log::warn!("No admin identity configured; admin actions are unreachable");
        }

        Ok(Config {
            database_url: var_or("DATABASE_URL", "sqlite://rentmember.db"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            session_key,
            admin_user_ids,
            upload_dir: PathBuf::from(var_or("UPLOAD_DIR", "uploads")),
            public_upload_path: var_or("PUBLIC_UPLOAD_PATH", "/uploads"),
            app_url: var_or("APP_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_string(),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_api_base: var_or("STRIPE_API_BASE", "https://api.stripe.com"),
            stripe_currency: var_or("STRIPE_CURRENCY", "idr"),
        })
    }
}
