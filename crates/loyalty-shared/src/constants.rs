//! Application-wide constants

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Rolling window during which a customer receives at most one campaign
/// message from a given business.
pub const RATE_LIMIT_WINDOW_HOURS: i64 = 24;

pub const DEFAULT_CLAIM_TOKEN_DIGITS: usize = 6;
pub const MIN_CLAIM_TOKEN_DIGITS: usize = 4;
pub const MAX_CLAIM_TOKEN_DIGITS: usize = 18;
pub const DEFAULT_CLAIM_TOKEN_MAX_ATTEMPTS: u32 = 8;

pub const DEFAULT_IDENTITY_QUERY_PARAM: &str = "customer";
pub const CANONICAL_UUID_PATTERN: &str =
    r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";

pub const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CAMPAIGN_PACING_MS: u64 = 500;
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 10_000;

pub const MAX_CAMPAIGN_TITLE_LENGTH: usize = 120;
pub const MAX_CAMPAIGN_BODY_LENGTH: usize = 4_096;
pub const MAX_CAMPAIGN_RECIPIENTS: usize = 5_000;
