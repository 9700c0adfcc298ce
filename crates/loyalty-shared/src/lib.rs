//! # Loyalty Shared
//! 
//! Shared configuration, telemetry, retry helpers and utilities for the loyalty service.

pub mod constants;
pub mod types;
pub mod utils;
pub mod telemetry;
pub mod config;
pub mod error;
pub mod retry;

pub use types::*;
pub use error::AppError;
