//! Campaign record and per-recipient delivery outcomes

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::business::Channel;
use super::keys::{BusinessKey, CustomerKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    InProgress,
    Sent,
    Partial,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::InProgress => "in_progress",
            CampaignStatus::Sent => "sent",
            CampaignStatus::Partial => "partial",
            CampaignStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(CampaignStatus::InProgress),
            "sent" => Some(CampaignStatus::Sent),
            "partial" => Some(CampaignStatus::Partial),
            "failed" => Some(CampaignStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
    SkippedNoChannel,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Sent => "sent",
            DeliveryOutcome::Failed => "failed",
            DeliveryOutcome::SkippedNoChannel => "skipped_no_channel",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(DeliveryOutcome::Sent),
            "failed" => Some(DeliveryOutcome::Failed),
            "skipped_no_channel" => Some(DeliveryOutcome::SkippedNoChannel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecipient {
    pub customer_key: CustomerKey,
    pub outcome: DeliveryOutcome,
    /// Channel that delivered the message, if any.
    pub channel: Option<Channel>,
    /// Failure reasons, one per attempted channel.
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: Uuid,
    pub business_key: BusinessKey,
    pub title: String,
    pub body: String,
    /// Eligible recipients after rate limiting.
    pub target_keys: Vec<CustomerKey>,
    pub recipients: Vec<CampaignRecipient>,
    pub sent_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CampaignRecord {
    pub fn start(
        id: Uuid,
        business_key: BusinessKey,
        title: String,
        body: String,
        target_keys: Vec<CustomerKey>,
        rate_limited: usize,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            business_key,
            title,
            body,
            target_keys,
            recipients: Vec::new(),
            sent_count: 0,
            failed_count: 0,
            skipped_count: count_i32(rate_limited),
            status: CampaignStatus::InProgress,
            created_at,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// A campaign before its recipients are reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignDraft {
    pub id: Uuid,
    pub business_key: BusinessKey,
    pub title: String,
    pub body: String,
    /// Distinct, in request order.
    pub candidates: Vec<CustomerKey>,
    pub created_at: DateTime<Utc>,
    /// Candidates contacted after this instant are rate limited.
    pub window_start: DateTime<Utc>,
}

impl CampaignDraft {
    /// The `in_progress` record targeting the `reserved` candidates, kept in
    /// request order. Everything else counts as rate limited.
    pub fn into_record(self, reserved: &[CustomerKey]) -> CampaignRecord {
        let reserved: HashSet<&CustomerKey> = reserved.iter().collect();
        let eligible: Vec<CustomerKey> = self.candidates.iter().filter(|c| reserved.contains(c)).cloned().collect();
        let rate_limited = self.candidates.len() - eligible.len();
        CampaignRecord::start(self.id, self.business_key, self.title, self.body, eligible, rate_limited, self.created_at)
    }
}

/// Running counts for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignTally {
    pub eligible: usize,
    pub rate_limited: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped_no_channel: usize,
}

impl CampaignTally {
    pub fn new(eligible: usize, rate_limited: usize) -> Self {
        Self { eligible, rate_limited, ..Self::default() }
    }

    pub fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Sent => self.sent += 1,
            DeliveryOutcome::Failed => self.failed += 1,
            DeliveryOutcome::SkippedNoChannel => self.skipped_no_channel += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.rate_limited + self.skipped_no_channel
    }

    /// `sent` when every eligible recipient got the message, `partial` when
    /// some did, `failed` when none did.
    pub fn status(&self) -> CampaignStatus {
        if self.sent == 0 {
            CampaignStatus::Failed
        } else if self.sent >= self.eligible {
            CampaignStatus::Sent
        } else {
            CampaignStatus::Partial
        }
    }

    pub fn result(&self, campaign_id: Uuid) -> CampaignResult {
        CampaignResult {
            campaign_id,
            sent_count: count_i32(self.sent),
            failed_count: count_i32(self.failed),
            skipped_count: count_i32(self.skipped()),
            status: self.status(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignResult {
    pub campaign_id: Uuid,
    pub sent_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub status: CampaignStatus,
}

fn count_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_derivation() {
        let mut tally = CampaignTally::new(3, 1);
        tally.record(DeliveryOutcome::Sent);
        tally.record(DeliveryOutcome::Sent);
        tally.record(DeliveryOutcome::Sent);
        assert_eq!(tally.status(), CampaignStatus::Sent);

        let mut tally = CampaignTally::new(2, 0);
        tally.record(DeliveryOutcome::Sent);
        tally.record(DeliveryOutcome::Failed);
        assert_eq!(tally.status(), CampaignStatus::Partial);

        let mut tally = CampaignTally::new(2, 0);
        tally.record(DeliveryOutcome::Failed);
        tally.record(DeliveryOutcome::SkippedNoChannel);
        assert_eq!(tally.status(), CampaignStatus::Failed);
    }

    #[test]
    fn test_skipped_counts_rate_limited_and_no_channel() {
        let mut tally = CampaignTally::new(2, 1);
        tally.record(DeliveryOutcome::Sent);
        tally.record(DeliveryOutcome::SkippedNoChannel);

        let result = tally.result(Uuid::new_v4());
        assert_eq!(result.sent_count, 1);
        assert_eq!(result.failed_count, 0);
        assert_eq!(result.skipped_count, 2);
        assert_eq!(result.status, CampaignStatus::Partial);
    }

    #[test]
    fn test_draft_keeps_request_order_of_reserved() {
        let keys = |raw: &[&str]| raw.iter().map(|k| CustomerKey::from(*k)).collect::<Vec<_>>();
        let now = Utc::now();
        let draft = CampaignDraft {
            id: Uuid::new_v4(),
            business_key: BusinessKey::from("b1"),
            title: "Promo".into(),
            body: "Hello".into(),
            candidates: keys(&["c", "a", "b"]),
            created_at: now,
            window_start: now - chrono::Duration::hours(24),
        };

        let record = draft.into_record(&keys(&["b", "c"]));
        assert_eq!(record.target_keys, keys(&["c", "b"]));
        assert_eq!(record.skipped_count, 1);
        assert_eq!(record.status, CampaignStatus::InProgress);
    }
}
