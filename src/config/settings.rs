//! Application settings loading from config.toml and environment variables.
//!
//! The sender identity for outgoing invoice email lives in `config.toml`;
//! secrets (the delivery provider API key) come from the environment, with
//! `.env` loaded via `dotenvy` for local development.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Environment variable holding the email delivery provider API key.
pub const API_KEY_ENV: &str = "RESEND_API_KEY";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Outgoing email configuration
    pub email: EmailSettings,
}

/// Sender identity used for all outgoing invoice email
#[derive(Debug, Deserialize, Clone)]
pub struct EmailSettings {
    /// From address, e.g. `"PDCA Billing <billing@example.org>"`
    pub from: String,
    /// Optional reply-to address
    pub reply_to: Option<String>,
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid,
/// or required fields are missing.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from the default location (./config.toml).
pub fn load_default_settings() -> Result<Settings> {
    load_settings("config.toml")
}

/// Reads the delivery provider API key from the environment.
///
/// Loads `.env` first so local development picks up the key without
/// exporting it; in deployed environments the variable is set directly.
pub fn email_api_key() -> Result<String> {
    dotenvy::dotenv().ok();
    std::env::var(API_KEY_ENV).map_err(|_| Error::Config {
        message: format!("{API_KEY_ENV} is not set"),
    })
}
