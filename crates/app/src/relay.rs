use std::time::Duration;

use axum::http::StatusCode;
use hm_relay_core::{AccessToken, ContactUpsertPayload, CustomerId, CustomerRecord, Platform};
use hm_relay_storage::{TokenStore, TokenStoreError};
use hm_relay_upstream::{EcCubeClient, EcCubeError, MauticClient, MauticError};
use hm_relay_util::FetchSettings;
use metrics::counter;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::problem::ProblemResponse;
use crate::telemetry;

/// Settle delay and retry budget for reading a customer that was just
/// written on the EC-CUBE side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub initial_delay: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl FetchPolicy {
    /// Sleep before retry number `retry` (1 for the pause between the first
    /// and second attempt). Doubles each time, capped at `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl From<&FetchSettings> for FetchPolicy {
    fn from(value: &FetchSettings) -> Self {
        Self {
            initial_delay: value.initial_delay,
            max_attempts: value.max_attempts.max(1),
            base_backoff: value.base_backoff,
            max_backoff: value.max_backoff,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no {0} access token is stored")]
    TokenMissing(Platform),
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
    #[error("customer {0} was not returned by EC-CUBE")]
    CustomerNotFound(CustomerId),
    #[error("failed to fetch customer: {0}")]
    Fetch(#[source] EcCubeError),
}

impl RelayError {
    pub fn to_problem(&self) -> ProblemResponse {
        match self {
            Self::TokenMissing(platform) => ProblemResponse::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "token_unavailable",
                format!("no {platform} access token; complete /auth/{} first", platform.slug()),
            ),
            Self::TokenStore(_) => {
                ProblemResponse::internal("token_store_failed", "failed to read access token")
            }
            Self::CustomerNotFound(id) => ProblemResponse::new(
                StatusCode::NOT_FOUND,
                "customer_not_found",
                format!("customer {id} was not available from EC-CUBE"),
            ),
            Self::Fetch(err) => ProblemResponse::bad_gateway(
                "upstream_fetch_failed",
                format!("EC-CUBE customer fetch failed: {err}"),
            ),
        }
    }
}

/// Failures while upserting a contact. These are logged and counted but
/// never change the webhook's answer, so they have no problem mapping.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no Mautic access token is stored")]
    TokenMissing,
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
    #[error("Mautic contact upsert failed: {0}")]
    Upstream(#[from] MauticError),
}

pub async fn load_token(
    tokens: &dyn TokenStore,
    platform: Platform,
) -> Result<AccessToken, RelayError> {
    tokens
        .get(platform)
        .await?
        .ok_or(RelayError::TokenMissing(platform))
}

/// Waits for the settle delay, then fetches the customer with bounded retries.
///
/// A missing EC-CUBE token fails before the delay. The token is read again
/// before every attempt so a token renewed mid-wait is picked up.
pub async fn fetch_customer_with_retry(
    tokens: &dyn TokenStore,
    client: &EcCubeClient,
    policy: &FetchPolicy,
    customer_id: CustomerId,
) -> Result<CustomerRecord, RelayError> {
    load_token(tokens, Platform::EcCube).await?;
    if !policy.initial_delay.is_zero() {
        tokio::time::sleep(policy.initial_delay).await;
    }

    let mut last_failure = RelayError::CustomerNotFound(customer_id);
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.backoff_for(attempt - 1)).await;
        }

        let token = load_token(tokens, Platform::EcCube).await?;
        match client.fetch_customer(&token, customer_id).await {
            Ok(Some(record)) => {
                counter!(telemetry::RELAY_FETCH_ATTEMPTS_TOTAL, "result" => "ok").increment(1);
                info!(stage = "fetch", customer_id = %customer_id, attempt, "customer fetched");
                return Ok(record);
            }
            Ok(None) => {
                counter!(telemetry::RELAY_FETCH_ATTEMPTS_TOTAL, "result" => "not_found").increment(1);
                warn!(stage = "fetch", customer_id = %customer_id, attempt, "customer not visible yet");
                last_failure = RelayError::CustomerNotFound(customer_id);
            }
            Err(err) if err.is_retryable() => {
                counter!(telemetry::RELAY_FETCH_ATTEMPTS_TOTAL, "result" => "retryable_error").increment(1);
                warn!(stage = "fetch", customer_id = %customer_id, attempt, error = %err, "customer fetch failed");
                last_failure = RelayError::Fetch(err);
            }
            Err(err) => {
                counter!(telemetry::RELAY_FETCH_ATTEMPTS_TOTAL, "result" => "error").increment(1);
                warn!(stage = "fetch", customer_id = %customer_id, attempt, error = %err, "customer fetch rejected");
                return Err(RelayError::Fetch(err));
            }
        }
    }

    Err(last_failure)
}

/// Maps the record onto a Mautic contact and upserts it.
pub async fn forward_contact(
    tokens: &dyn TokenStore,
    client: &MauticClient,
    record: &CustomerRecord,
) -> Result<Value, ForwardError> {
    let token = tokens
        .get(Platform::Mautic)
        .await?
        .ok_or(ForwardError::TokenMissing)?;
    let contact = ContactUpsertPayload::from(record);
    Ok(client.upsert_contact(&token, &contact).await?)
}
