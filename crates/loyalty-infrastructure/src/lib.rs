//! # Loyalty Infrastructure
//!
//! Storage adapters (PostgreSQL, in-memory), outbound transports and the QR
//! link builder.

pub mod database;
pub mod transport;

pub use database::{
    create_pool, run_migrations, MemoryStore, PgBusinessRepository, PgCampaignRepository, PgCustomerRepository,
    PgRewardClaimRepository, PgStorageHealth, PgVisitRepository,
};
pub use transport::{DisabledEmailSender, DisabledPhoneMessenger, QrServerRenderer, SmtpEmailSender, WhatsAppMessenger};
