use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
};
use hm_relay_core::{AccessToken, Platform};
use hm_relay_storage::{MemoryTokenStore, TokenStore};
use hm_relay_util::AppConfig;
use httpmock::MockServer;
use reqwest::Client;
use tower::ServiceExt;

use crate::{
    router::{app_router, AppState},
    telemetry,
};

pub const EC_SECRET: &str = "ec-secret";
pub const MT_SECRET: &str = "mt-secret";

/// Router state wired against a local mock server standing in for EC-CUBE,
/// Mautic and both token endpoints.
pub struct TestContext {
    pub server: MockServer,
    pub config: AppConfig,
    pub tokens: Arc<dyn TokenStore>,
    pub state: AppState,
}

impl TestContext {
    /// `APP_ENV=test` with strict signature checks.
    pub async fn new() -> Self {
        Self::with_overrides(&[]).await
    }

    pub async fn development() -> Self {
        Self::with_overrides(&[("APP_ENV", "development")]).await
    }

    pub async fn with_overrides(overrides: &[(&'static str, &str)]) -> Self {
        Self::with_store(overrides, Arc::new(MemoryTokenStore::new())).await
    }

    pub async fn with_store(
        overrides: &[(&'static str, &str)],
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let server = MockServer::start_async().await;
        let mut vars: HashMap<&'static str, String> = [
            ("APP_ENV", "test".to_string()),
            ("HM_HEROKU_APP_URL", "https://relay.example.com".to_string()),
            ("HM_EC_WEBHOOK_SECRET", EC_SECRET.to_string()),
            ("HM_MT_WEBHOOK_SECRET", MT_SECRET.to_string()),
            ("HM_EC_ENDPOINT", server.url("/graphql")),
            ("HM_MT_ENDPOINT", server.url("/api/contacts/new")),
            ("HM_EC_CLIENTID", "ec-client".to_string()),
            ("HM_EC_CLIENTSECRET", "ec-client-secret".to_string()),
            ("HM_EC_TOKEN_URL", server.url("/ec/token")),
            ("HM_EC_AUTH_URL", "https://shop.example.com/authorize".to_string()),
            ("HM_MT_CLIENTID", "mt-client".to_string()),
            ("HM_MT_CLIENTSECRET", "mt-client-secret".to_string()),
            ("HM_MT_TOKEN_URL", server.url("/mt/token")),
            (
                "HM_MT_AUTH_URL",
                "https://mautic.example.com/oauth/v2/authorize".to_string(),
            ),
            ("HM_FETCH_INITIAL_DELAY_MS", "0".to_string()),
            ("HM_FETCH_BACKOFF_MS", "1".to_string()),
            ("HM_FETCH_MAX_BACKOFF_MS", "2".to_string()),
        ]
        .into_iter()
        .collect();
        for (key, value) in overrides {
            vars.insert(*key, value.to_string());
        }

        let config = AppConfig::from_source(|key| vars.get(key).cloned()).expect("test config");
        let metrics = telemetry::init_metrics().expect("metrics init");
        let http = Client::builder().build().expect("client");
        let state = AppState::new(&config, metrics, tokens.clone(), http);

        Self {
            server,
            config,
            tokens,
            state,
        }
    }

    pub async fn seed_tokens(&self) {
        self.tokens
            .set(Platform::EcCube, &AccessToken::new("ec-token"))
            .await
            .expect("seed ec token");
        self.tokens
            .set(Platform::Mautic, &AccessToken::new("mt-token"))
            .await
            .expect("seed mt token");
    }

    pub async fn get(&self, uri: &str) -> Response {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        app_router(self.state.clone())
            .oneshot(request)
            .await
            .expect("response")
    }

    pub async fn post(&self, uri: &str, headers: &[(&str, &str)], body: &str) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("request");
        app_router(self.state.clone())
            .oneshot(request)
            .await
            .expect("response")
    }
}
