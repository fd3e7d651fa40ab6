use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use hm_relay_core::Platform;
use hm_relay_storage::TokenStore;
use hm_relay_upstream::{EcCubeClient, MauticClient, OAuthClient, OAuthClientConfig};
use hm_relay_util::{AppConfig, Environment, OAuthSettings};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::relay::FetchPolicy;
use crate::signature::{SignatureEncoding, SignatureVerifier};
use crate::{oauth, raw_body, telemetry, webhook};

pub const EC_SIGNATURE_HEADER: &str = "x-eccube-signature";
pub const MT_SIGNATURE_HEADER: &str = "webhook-signature";

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    environment: Environment,
    tokens: Arc<dyn TokenStore>,
    ec_oauth: OAuthClient,
    mt_oauth: OAuthClient,
    eccube: EcCubeClient,
    mautic: MauticClient,
    ec_verifier: SignatureVerifier,
    mt_verifier: SignatureVerifier,
    fetch_policy: FetchPolicy,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        metrics: PrometheusHandle,
        tokens: Arc<dyn TokenStore>,
        http: reqwest::Client,
    ) -> Self {
        let verify = !config.environment.is_development();
        Self {
            metrics,
            environment: config.environment,
            tokens,
            ec_oauth: OAuthClient::new(
                oauth_client_config(&config.ec_oauth, &config.oauth_state),
                http.clone(),
            ),
            mt_oauth: OAuthClient::new(
                oauth_client_config(&config.mt_oauth, &config.oauth_state),
                http.clone(),
            ),
            eccube: EcCubeClient::new(config.ec_endpoint.clone(), http.clone()),
            mautic: MauticClient::new(config.mt_endpoint.clone(), http),
            ec_verifier: SignatureVerifier::new(
                &config.ec_webhook_secret,
                EC_SIGNATURE_HEADER,
                SignatureEncoding::Hex,
                config.signature_mode,
                verify,
            ),
            mt_verifier: SignatureVerifier::new(
                &config.mt_webhook_secret,
                MT_SIGNATURE_HEADER,
                SignatureEncoding::Base64,
                config.signature_mode,
                verify,
            ),
            fetch_policy: FetchPolicy::from(&config.fetch),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn tokens(&self) -> &dyn TokenStore {
        self.tokens.as_ref()
    }

    pub fn oauth_client(&self, platform: Platform) -> &OAuthClient {
        match platform {
            Platform::EcCube => &self.ec_oauth,
            Platform::Mautic => &self.mt_oauth,
        }
    }

    pub fn eccube(&self) -> &EcCubeClient {
        &self.eccube
    }

    pub fn mautic(&self) -> &MauticClient {
        &self.mautic
    }

    pub fn verifier(&self, platform: Platform) -> &SignatureVerifier {
        match platform {
            Platform::EcCube => &self.ec_verifier,
            Platform::Mautic => &self.mt_verifier,
        }
    }

    pub fn fetch_policy(&self) -> &FetchPolicy {
        &self.fetch_policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

fn oauth_client_config(settings: &OAuthSettings, state: &str) -> OAuthClientConfig {
    OAuthClientConfig {
        client_id: settings.client_id.clone(),
        client_secret: settings.client_secret.clone(),
        authorization_url: settings.authorization_url.clone(),
        token_url: settings.token_url.clone(),
        redirect_uri: settings.redirect_uri.clone(),
        scopes: settings.scopes.clone(),
        state: state.to_string(),
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/metrics", get(metrics))
        .route("/auth/ec", get(oauth::ec_login))
        .route("/auth/ec/callback", get(oauth::ec_callback))
        .route("/auth/mt", get(oauth::mt_login))
        .route("/auth/mt/callback", get(oauth::mt_callback))
        .route("/webhook/ec", post(webhook::eccube))
        .route("/mt-webhook", post(webhook::mautic))
        .layer(middleware::from_fn(raw_body::capture))
        .with_state(state)
}

async fn root() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
