// ============================================================================
// Loyalty Core - Business (Tenant) Entity
// File: crates/loyalty-core/src/domain/business.rs
// Description: Tenant program settings consumed read-only by the engine
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::keys::BusinessKey;
use super::visit::CycleProgress;
use crate::error::DomainError;

/// Outbound message channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Phone-based messaging (WhatsApp text)
    Phone,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Phone => "phone",
            Channel::Email => "email",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "phone" | "whatsapp" => Some(Channel::Phone),
            "email" => Some(Channel::Email),
            _ => None,
        }
    }

    /// Phone first, email as fallback.
    pub fn default_order() -> Vec<Channel> {
        vec![Channel::Phone, Channel::Email]
    }
}

/// Validated visit goal, always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VisitGoal(u32);

impl VisitGoal {
    pub fn new(goal: i64) -> Result<Self, DomainError> {
        if goal <= 0 {
            return Err(DomainError::ConfigurationError(format!(
                "visit goal must be at least 1, got {}",
                goal
            )));
        }
        u32::try_from(goal)
            .map(VisitGoal)
            .map_err(|_| DomainError::ConfigurationError(format!("visit goal {} is out of range", goal)))
    }

    pub fn get(&self) -> i64 {
        i64::from(self.0)
    }

    /// True iff `count` is an exact positive multiple of the goal.
    pub fn is_cycle_boundary(&self, count: i64) -> bool {
        count > 0 && count % self.get() == 0
    }

    pub fn cycle_number(&self, count: i64) -> i64 {
        count.max(0) / self.get()
    }

    pub fn progress(&self, count: i64) -> CycleProgress {
        let count = count.max(0);
        let in_cycle = count % self.get();
        CycleProgress {
            visit_count: count,
            visit_goal: self.get(),
            visits_in_cycle: in_cycle,
            remaining: self.get() - in_cycle,
            completed_cycles: self.cycle_number(count),
        }
    }
}

/// Business (tenant) program settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub key: BusinessKey,
    pub name: String,
    /// Raw value as stored; use [`Business::goal`] for the validated form.
    pub visit_goal: i32,
    pub reward_title: String,
    pub channel_order: Vec<Channel>,

    // Audit fields
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Business {
    pub fn new(
        key: BusinessKey,
        name: String,
        visit_goal: i32,
        reward_title: String,
        channel_order: Vec<Channel>,
    ) -> Self {
        Self {
            key,
            name: name.trim().to_string(),
            visit_goal,
            reward_title: reward_title.trim().to_string(),
            channel_order,
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    pub fn goal(&self) -> Result<VisitGoal, DomainError> {
        VisitGoal::new(i64::from(self.visit_goal)).map_err(|e| match e {
            DomainError::ConfigurationError(msg) => {
                DomainError::ConfigurationError(format!("business {}: {}", self.key, msg))
            }
            other => other,
        })
    }

    /// Channel preference with duplicates removed; falls back to the default
    /// order when the tenant configured none.
    pub fn channels(&self) -> Vec<Channel> {
        if self.channel_order.is_empty() {
            return Channel::default_order();
        }
        let mut order = Vec::with_capacity(self.channel_order.len());
        for channel in &self.channel_order {
            if !order.contains(channel) {
                order.push(*channel);
            }
        }
        order
    }

    pub fn rename_reward(&mut self, reward_title: String) {
        self.reward_title = reward_title.trim().to_string();
        self.modified_at = Some(Utc::now());
    }
}
