// ============================================================================
// Loyalty Core - Token Issuer & Claim State Machine
// File: crates/loyalty-core/src/services/token_issuer.rs
// Description: Issues numeric claim tokens and enforces single redemption
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};

use loyalty_shared::constants::{
    DEFAULT_CLAIM_TOKEN_DIGITS, DEFAULT_CLAIM_TOKEN_MAX_ATTEMPTS, DEFAULT_STORAGE_TIMEOUT_MS, MAX_CLAIM_TOKEN_DIGITS,
    MIN_CLAIM_TOKEN_DIGITS,
};

use crate::domain::{BusinessKey, ClaimToken, CustomerKey, NewRewardClaim, RewardClaim};
use crate::error::DomainError;
use crate::repositories::{ClaimInsert, ClaimTransition, RewardClaimRepository};
use crate::services::with_storage_timeout;

/// Source of candidate claim tokens.
pub trait ClaimTokenGenerator: Send + Sync {
    fn generate(&self, digits: usize) -> ClaimToken;
}

/// Uniformly random decimal digits from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDigitTokens;

impl ClaimTokenGenerator for RandomDigitTokens {
    fn generate(&self, digits: usize) -> ClaimToken {
        let mut rng = rand::rng();
        let token: String = (0..digits)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        ClaimToken::new(token)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenIssuerSettings {
    pub digits: usize,
    pub max_attempts: u32,
    pub storage_timeout: Duration,
}

impl Default for TokenIssuerSettings {
    fn default() -> Self {
        Self {
            digits: DEFAULT_CLAIM_TOKEN_DIGITS,
            max_attempts: DEFAULT_CLAIM_TOKEN_MAX_ATTEMPTS,
            storage_timeout: Duration::from_millis(DEFAULT_STORAGE_TIMEOUT_MS),
        }
    }
}

pub struct TokenIssuer {
    claims: Arc<dyn RewardClaimRepository>,
    generator: Arc<dyn ClaimTokenGenerator>,
    settings: TokenIssuerSettings,
}

impl TokenIssuer {
    pub fn new(claims: Arc<dyn RewardClaimRepository>, settings: TokenIssuerSettings) -> Self {
        Self::with_generator(claims, Arc::new(RandomDigitTokens), settings)
    }

    pub fn with_generator(
        claims: Arc<dyn RewardClaimRepository>,
        generator: Arc<dyn ClaimTokenGenerator>,
        settings: TokenIssuerSettings,
    ) -> Self {
        Self { claims, generator, settings }
    }

    /// Creates the pending claim for `(business, customer, cycle)`, or returns
    /// the one already issued for that cycle. Token collisions regenerate.
    pub async fn issue(
        &self,
        customer: &CustomerKey,
        business: &BusinessKey,
        cycle_number: i64,
        reward_title: &str,
    ) -> Result<RewardClaim, DomainError> {
        if cycle_number < 1 {
            return Err(DomainError::ValidationError(format!(
                "cycle number must be at least 1, got {}",
                cycle_number
            )));
        }

        let claims = &self.claims;
        let timeout = self.settings.storage_timeout;
        self.with_fresh_tokens(customer, business, move |token| {
            let candidate = NewRewardClaim {
                token,
                customer_key: customer.clone(),
                business_key: business.clone(),
                cycle_number,
                reward_title: reward_title.to_string(),
                created_at: Utc::now(),
            };
            async move {
                match with_storage_timeout(timeout, "insert_claim", claims.insert_pending(&candidate)).await? {
                    ClaimInsert::Inserted(claim) => {
                        info!("Reward claim issued for {} in {} (cycle {})", customer, business, cycle_number);
                        Ok(Some(claim))
                    }
                    ClaimInsert::CycleAlreadyIssued(existing) => {
                        debug!("Cycle {} for {} in {} already issued", cycle_number, customer, business);
                        Ok(Some(existing))
                    }
                    ClaimInsert::TokenTaken => Ok(None),
                }
            }
        })
        .await
    }

    /// Runs `write` with freshly generated tokens until it returns something
    /// other than `Ok(None)` (token already taken), at most `max_attempts`
    /// times.
    pub(crate) async fn with_fresh_tokens<T, F, Fut>(
        &self,
        customer: &CustomerKey,
        business: &BusinessKey,
        mut write: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut(ClaimToken) -> Fut,
        Fut: Future<Output = Result<Option<T>, DomainError>>,
    {
        for attempt in 1..=self.settings.max_attempts {
            if let Some(written) = write(self.generator.generate(self.settings.digits)).await? {
                return Ok(written);
            }
            warn!("Claim token collision on attempt {} for {} in {}", attempt, customer, business);
        }

        warn!(
            "Claim token space exhausted for {} in {} after {} attempts",
            customer, business, self.settings.max_attempts
        );
        Err(DomainError::TokenSpaceExhausted { attempts: self.settings.max_attempts })
    }

    pub async fn lookup(&self, token: &str) -> Result<RewardClaim, DomainError> {
        let token = self.parse(token)?;
        with_storage_timeout(self.settings.storage_timeout, "find_claim", self.claims.find_by_token(&token))
            .await?
            .ok_or(DomainError::ClaimNotFound)
    }

    /// `pending -> claimed`, at most once per token.
    pub async fn claim(&self, token: &str) -> Result<RewardClaim, DomainError> {
        let token = self.parse(token)?;
        let transition = with_storage_timeout(
            self.settings.storage_timeout,
            "mark_claimed",
            self.claims.mark_claimed(&token, Utc::now()),
        )
        .await?;

        match transition {
            ClaimTransition::Claimed(claim) => {
                info!("Reward claimed by {} in {} (cycle {})", claim.customer_key, claim.business_key, claim.cycle_number);
                Ok(claim)
            }
            ClaimTransition::AlreadyClaimed(claim) => {
                warn!("Repeat redemption for claim of {} in {}", claim.customer_key, claim.business_key);
                Err(DomainError::AlreadyClaimed {
                    claimed_at: claim.claimed_at.unwrap_or(claim.created_at),
                })
            }
            ClaimTransition::NotFound => Err(DomainError::ClaimNotFound),
        }
    }

    pub async fn find_for_cycle(
        &self,
        customer: &CustomerKey,
        business: &BusinessKey,
        cycle_number: i64,
    ) -> Result<Option<RewardClaim>, DomainError> {
        with_storage_timeout(
            self.settings.storage_timeout,
            "find_claim_by_cycle",
            self.claims.find_by_cycle(business, customer, cycle_number),
        )
        .await
    }

    pub async fn claims_for_customer(
        &self,
        customer: &CustomerKey,
        business: &BusinessKey,
    ) -> Result<Vec<RewardClaim>, DomainError> {
        with_storage_timeout(
            self.settings.storage_timeout,
            "list_claims",
            self.claims.list_for_customer(business, customer),
        )
        .await
    }

    /// Accepts any width the configuration allows, not only the current one,
    /// so claims issued before a `claim_token_digits` change stay redeemable.
    fn parse(&self, raw: &str) -> Result<ClaimToken, DomainError> {
        let token = ClaimToken::new(raw.trim());
        if (MIN_CLAIM_TOKEN_DIGITS..=MAX_CLAIM_TOKEN_DIGITS).any(|digits| token.is_well_formed(digits)) {
            Ok(token)
        } else {
            Err(DomainError::ClaimNotFound)
        }
    }
}
