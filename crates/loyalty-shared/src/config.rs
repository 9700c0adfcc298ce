//! Configuration management

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::constants::{
    CANONICAL_UUID_PATTERN, DEFAULT_CAMPAIGN_PACING_MS, DEFAULT_CLAIM_TOKEN_DIGITS,
    DEFAULT_CLAIM_TOKEN_MAX_ATTEMPTS, DEFAULT_IDENTITY_QUERY_PARAM, DEFAULT_SEND_TIMEOUT_MS,
    DEFAULT_STORAGE_TIMEOUT_MS, MAX_CLAIM_TOKEN_DIGITS, MIN_CLAIM_TOKEN_DIGITS,
};
use crate::error::AppError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
    pub loyalty: LoyaltySettings,
    pub campaign: CampaignSettings,
    pub whatsapp: Option<WhatsAppSettings>,
    pub email: Option<EmailSettings>,
    pub qr: QrSettings,
    pub retry: RetrySettings,
    pub api: ApiSettings,
    /// Businesses loaded into the in-memory backend at startup.
    #[serde(default)]
    pub seed_businesses: Vec<SeedBusiness>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub env: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    /// Base URL of the customer-facing scan page, e.g. `https://loyalty.example.com/scan`.
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoyaltySettings {
    pub claim_token_digits: usize,
    pub claim_token_max_attempts: u32,
    pub identity_query_param: String,
    pub identifier_pattern: String,
    pub storage_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CampaignSettings {
    pub pacing_ms: u64,
    pub send_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsAppSettings {
    pub api_url: String,
    pub access_token: String,
    pub phone_number_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QrSettings {
    pub base_url: String,
    pub size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub claim_requests_per_minute: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedBusiness {
    pub key: String,
    pub name: String,
    pub visit_goal: i32,
    pub reward_title: String,
    /// `phone` / `email`; empty means phone then email.
    #[serde(default)]
    pub channel_order: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let config = Self::builder_with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::default().separator("__").try_parsing(true))
            .build()?;
        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn builder_with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("app.env", "development")?
            .set_default("app.host", "127.0.0.1")?
            .set_default("app.port", 8080)?
            .set_default("app.name", "loyalty-server")?
            .set_default("app.public_base_url", "http://127.0.0.1:8080/scan")?
            .set_default("storage.backend", "postgres")?
            .set_default("database.url", "postgres://localhost/loyalty")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_secs", 3)?
            .set_default("loyalty.claim_token_digits", DEFAULT_CLAIM_TOKEN_DIGITS as i64)?
            .set_default("loyalty.claim_token_max_attempts", i64::from(DEFAULT_CLAIM_TOKEN_MAX_ATTEMPTS))?
            .set_default("loyalty.identity_query_param", DEFAULT_IDENTITY_QUERY_PARAM)?
            .set_default("loyalty.identifier_pattern", CANONICAL_UUID_PATTERN)?
            .set_default("loyalty.storage_timeout_ms", DEFAULT_STORAGE_TIMEOUT_MS as i64)?
            .set_default("campaign.pacing_ms", DEFAULT_CAMPAIGN_PACING_MS as i64)?
            .set_default("campaign.send_timeout_ms", DEFAULT_SEND_TIMEOUT_MS as i64)?
            .set_default("qr.base_url", "https://api.qrserver.com/v1/create-qr-code/")?
            .set_default("qr.size", 300)?
            .set_default("retry.max_attempts", 5)?
            .set_default("retry.min_delay_ms", 200)?
            .set_default("retry.max_delay_ms", 5_000)?
            .set_default("api.claim_requests_per_minute", 30)
    }

    /// Rejects settings that would only fail later at request time.
    pub fn validate(&self) -> Result<(), AppError> {
        let digits = self.loyalty.claim_token_digits;
        if !(MIN_CLAIM_TOKEN_DIGITS..=MAX_CLAIM_TOKEN_DIGITS).contains(&digits) {
            return Err(AppError::InvalidConfig(format!(
                "loyalty.claim_token_digits must be between {} and {}, got {}",
                MIN_CLAIM_TOKEN_DIGITS, MAX_CLAIM_TOKEN_DIGITS, digits
            )));
        }
        if self.loyalty.claim_token_max_attempts == 0 {
            return Err(AppError::InvalidConfig("loyalty.claim_token_max_attempts must be at least 1".into()));
        }
        if self.loyalty.identity_query_param.trim().is_empty() {
            return Err(AppError::InvalidConfig("loyalty.identity_query_param must not be empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::InvalidConfig("retry.max_attempts must be at least 1".into()));
        }
        if self.api.claim_requests_per_minute == 0 {
            return Err(AppError::InvalidConfig("api.claim_requests_per_minute must be at least 1".into()));
        }
        Ok(())
    }
}
