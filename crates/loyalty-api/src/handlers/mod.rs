//! HTTP handlers

pub mod campaigns;
pub mod claims;
pub mod customers;
pub mod health;
pub mod visits;
