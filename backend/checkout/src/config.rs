//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::errors::{AppError, Result};

const MIN_SECRET_LEN: usize = 32;
const MIN_CHECKOUT_TTL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the upstream REST backend serving `/api/*`
    pub backend_url: String,
    /// Path to the SQLite database holding the checkout attempt log
    pub database_url: String,
    /// Port for the storefront API server
    pub api_port: u16,
    /// Public key id handed to the gateway widget
    pub gateway_key_id: String,
    /// HMAC key for identity tokens
    pub session_secret: String,
    /// ISO currency code for every order
    pub currency: String,
    /// Merchant name shown in the gateway widget
    pub merchant_name: String,
    /// Lifetime of an identity token
    pub token_ttl_secs: u64,
    /// How long a session may wait in `awaiting-payment` before it is expired
    pub checkout_ttl_secs: u64,
    /// How often the sweeper looks for abandoned sessions
    pub sweep_interval_secs: u64,
    /// Upstream request timeout
    pub http_timeout_secs: u64,
    /// Attempts for idempotent catalogue reads
    pub read_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let session_secret = env_var("SESSION_SECRET").map_err(|_| {
            AppError::Config("SESSION_SECRET environment variable is required".to_string())
        })?;
        if session_secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Config(format!(
                "SESSION_SECRET must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        let checkout_ttl_secs = parse_or("CHECKOUT_TTL_SECS", 900)?;
        if checkout_ttl_secs < MIN_CHECKOUT_TTL_SECS {
            return Err(AppError::Config(format!(
                "CHECKOUT_TTL_SECS must be at least {MIN_CHECKOUT_TTL_SECS}"
            )));
        }

        Ok(Config {
            backend_url: env_var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./checkout.db".to_string()),
            api_port: parse_or("API_PORT", 3001)?,
            gateway_key_id: env_var("GATEWAY_KEY_ID").map_err(|_| {
                AppError::Config("GATEWAY_KEY_ID environment variable is required".to_string())
            })?,
            session_secret,
            currency: env_var("CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            merchant_name: env_var("MERCHANT_NAME")
                .unwrap_or_else(|_| "NGO Crowdfunding".to_string()),
            token_ttl_secs: parse_or("TOKEN_TTL_SECS", 86_400)?,
            checkout_ttl_secs,
            sweep_interval_secs: parse_or("SWEEP_INTERVAL_SECS", 30)?,
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 30)?,
            read_retries: parse_or("READ_RETRIES", 3)?,
        })
    }

    pub fn checkout_ttl(&self) -> Duration {
        Duration::from_secs(self.checkout_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| AppError::Config(format!("Missing env var: {key}")))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}
