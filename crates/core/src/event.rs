use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::CustomerId;

/// Errors raised while interpreting inbound webhook bodies.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("failed to parse payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload must be a non-empty array")]
    EmptyBatch,
}

/// Customer-update webhook body sent by EC-CUBE.
///
/// The body is an array of entries; only the first entry's `id` drives the
/// relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerUpdateEvent {
    entries: Vec<CustomerUpdateEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomerUpdateEntry {
    pub id: CustomerId,
}

impl CustomerUpdateEvent {
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        let entries: Vec<CustomerUpdateEntry> = serde_json::from_str(raw)?;
        if entries.is_empty() {
            return Err(PayloadError::EmptyBatch);
        }
        Ok(Self { entries })
    }

    /// Customer id of the first entry.
    pub fn customer_id(&self) -> CustomerId {
        self.entries[0].id
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Webhook body delivered by Mautic. Kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct MauticWebhookEvent(Value);

impl MauticWebhookEvent {
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        Ok(Self(serde_json::from_str(raw)?))
    }

    /// Top-level keys, which Mautic uses as event type names
    /// (for example `mautic.lead_post_save_update`).
    pub fn event_types(&self) -> Vec<&str> {
        self.0
            .as_object()
            .map(|object| object.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
