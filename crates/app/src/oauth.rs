use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use hm_relay_core::{AccessToken, Platform};
use hm_relay_upstream::OAuthError;
use metrics::counter;
use tracing::{error, info, warn};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::telemetry;

pub async fn ec_login(State(state): State<AppState>) -> Response {
    login(&state, Platform::EcCube)
}

pub async fn mt_login(State(state): State<AppState>) -> Response {
    login(&state, Platform::Mautic)
}

pub async fn ec_callback(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Response, ProblemResponse> {
    callback(&state, Platform::EcCube, &uri).await
}

pub async fn mt_callback(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Response, ProblemResponse> {
    callback(&state, Platform::Mautic, &uri).await
}

fn login(state: &AppState, platform: Platform) -> Response {
    let client = state.oauth_client(platform);
    let authorize_url = client.authorize_url();
    info!(
        stage = "oauth",
        platform = %platform,
        env = state.environment().as_str(),
        redirect_uri = %client.config().redirect_uri,
        "redirecting to authorization endpoint"
    );
    redirect_found(authorize_url.as_str())
}

/// Exchanges the code carried by the callback URL and stores the token,
/// replacing whatever the platform's slot held before.
async fn callback(
    state: &AppState,
    platform: Platform,
    uri: &Uri,
) -> Result<Response, ProblemResponse> {
    let client = state.oauth_client(platform);
    let callback_uri = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or_else(|| uri.path());

    let code = client.code_from_callback(callback_uri).map_err(|err| {
        counter!(telemetry::OAUTH_EXCHANGE_TOTAL, "platform" => platform.as_str(), "result" => "rejected")
            .increment(1);
        warn!(stage = "oauth", platform = %platform, error = %err, "oauth callback rejected");
        oauth_problem(&err)
    })?;

    let token = client.exchange_code(&code).await.map_err(|err| {
        counter!(telemetry::OAUTH_EXCHANGE_TOTAL, "platform" => platform.as_str(), "result" => "failed")
            .increment(1);
        warn!(stage = "oauth", platform = %platform, error = %err, "failed to exchange authorization code");
        oauth_problem(&err)
    })?;

    let access_token = AccessToken::new(token.access_token.clone());
    state
        .tokens()
        .set(platform, &access_token)
        .await
        .map_err(|err| {
            counter!(telemetry::OAUTH_EXCHANGE_TOTAL, "platform" => platform.as_str(), "result" => "store_failed")
                .increment(1);
            error!(stage = "token_store", platform = %platform, error = %err, "failed to persist access token");
            ProblemResponse::internal("token_store_failed", "failed to persist access token")
        })?;

    counter!(telemetry::OAUTH_EXCHANGE_TOTAL, "platform" => platform.as_str(), "result" => "success")
        .increment(1);
    info!(
        stage = "oauth",
        platform = %platform,
        token_type = token.token_type.as_deref().unwrap_or("unknown"),
        expires_at = ?token.expires_at(state.now()),
        has_refresh_token = token.refresh_token.is_some(),
        "access token stored"
    );

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        access_token.into_inner(),
    )
        .into_response())
}

fn oauth_problem(err: &OAuthError) -> ProblemResponse {
    match err {
        OAuthError::Denied { error, description } => ProblemResponse::bad_request(
            "oauth_denied",
            match description {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            },
        ),
        OAuthError::InvalidState => ProblemResponse::bad_request(
            "invalid_state",
            "callback state does not match the issued state",
        ),
        OAuthError::MissingCode => {
            ProblemResponse::bad_request("missing_code", "callback is missing the code parameter")
        }
        other => ProblemResponse::bad_gateway(
            "oauth_exchange_failed",
            format!("token exchange failed: {other}"),
        ),
    }
}

fn redirect_found(location: &str) -> Response {
    let mut response = Redirect::temporary(location).into_response();
    *response.status_mut() = StatusCode::FOUND;
    response
}
