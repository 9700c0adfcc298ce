//! Customer domain entity

use chrono::{DateTime, Utc};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::business::Channel;
use super::keys::{BusinessKey, CustomerKey};
use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub key: CustomerKey,
    pub business_key: BusinessKey,
    pub display_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Cumulative, never decremented.
    pub visit_count: i64,

    // Audit fields
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn contact_for(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Phone => self.phone.as_deref(),
            Channel::Email => self.email.as_deref(),
        }
    }

    pub fn first_name(&self) -> &str {
        self.display_name.split_whitespace().next().unwrap_or(&self.display_name)
    }
}

/// Registration payload, validated on construction.
#[derive(Debug, Clone, Validate)]
pub struct NewCustomer {
    pub business_key: BusinessKey,

    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub display_name: String,

    pub phone: Option<String>,
    pub email: Option<String>,
}

impl NewCustomer {
    pub fn new(
        business_key: BusinessKey,
        display_name: &str,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Self, DomainError> {
        let phone = match non_blank(phone) {
            Some(raw) => Some(normalize_phone(raw)?),
            None => None,
        };
        let email = match non_blank(email) {
            Some(raw) => {
                if !EmailAddress::is_valid(raw) {
                    return Err(DomainError::ValidationError(format!("Invalid email address: {}", raw)));
                }
                Some(raw.to_lowercase())
            }
            None => None,
        };
        if phone.is_none() && email.is_none() {
            return Err(DomainError::ValidationError(
                "A phone number or email address is required".to_string(),
            ));
        }

        let customer = Self {
            business_key,
            display_name: display_name.trim().to_string(),
            phone,
            email,
        };
        customer.validate()?;
        Ok(customer)
    }

    pub fn into_customer(self, now: DateTime<Utc>) -> Customer {
        Customer {
            key: CustomerKey::generate(),
            business_key: self.business_key,
            display_name: self.display_name,
            phone: self.phone,
            email: self.email,
            visit_count: 0,
            created_at: now,
            modified_at: None,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Strips separators and keeps an optional leading `+`.
fn normalize_phone(raw: &str) -> Result<String, DomainError> {
    let plus = raw.starts_with('+');
    let mut digits = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            '+' if digits.is_empty() => {}
            _ => return Err(DomainError::ValidationError(format!("Invalid phone number: {}", raw))),
        }
    }
    if !(6..=20).contains(&digits.len()) {
        return Err(DomainError::ValidationError(format!("Invalid phone number: {}", raw)));
    }
    Ok(if plus { format!("+{}", digits) } else { digits })
}
