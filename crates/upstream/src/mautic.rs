use hm_relay_core::{AccessToken, ContactUpsertPayload};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Client for the Mautic contact REST endpoint.
#[derive(Clone)]
pub struct MauticClient {
    http: Client,
    endpoint: Url,
}

impl MauticClient {
    pub fn new(endpoint: Url, http: Client) -> Self {
        Self { http, endpoint }
    }

    /// Posts a contact to Mautic, which creates it or updates the contact
    /// matched by its unique identifier fields.
    ///
    /// Returns the response body; non-JSON bodies come back as a JSON string.
    pub async fn upsert_contact(
        &self,
        access_token: &AccessToken,
        contact: &ContactUpsertPayload,
    ) -> Result<Value, MauticError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header("Authorization", format!("Bearer {}", access_token.as_str()))
            .json(contact)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MauticError::Status { status, body });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// Errors produced by the Mautic client.
#[derive(Debug, Error)]
pub enum MauticError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}
