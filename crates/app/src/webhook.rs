use std::time::Instant;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use hm_relay_core::{CustomerUpdateEvent, MauticWebhookEvent, PayloadError, Platform};
use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::problem::ProblemResponse;
use crate::raw_body::RawBody;
use crate::relay;
use crate::router::AppState;
use crate::telemetry;

/// `POST /webhook/ec`: customer-update notification from EC-CUBE.
pub async fn eccube(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(raw): Extension<RawBody>,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();
    let result = handle_eccube(&state, &headers, &raw, Uuid::new_v4()).await;
    histogram!(telemetry::WEBHOOK_ACK_LATENCY_SECONDS, "source" => Platform::EcCube.as_str())
        .record(start.elapsed().as_secs_f64());
    result
}

/// `POST /mt-webhook`: acknowledged after verification and parsing only.
pub async fn mautic(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(raw): Extension<RawBody>,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();
    let result = handle_mautic(&state, &headers, &raw, Uuid::new_v4());
    histogram!(telemetry::WEBHOOK_ACK_LATENCY_SECONDS, "source" => Platform::Mautic.as_str())
        .record(start.elapsed().as_secs_f64());
    result
}

async fn handle_eccube(
    state: &AppState,
    headers: &HeaderMap,
    raw: &RawBody,
    delivery_id: Uuid,
) -> Result<Response, ProblemResponse> {
    let source = Platform::EcCube;
    check_signature(state, source, headers, raw, delivery_id)?;
    counter!(telemetry::WEBHOOK_INGRESS_TOTAL, "source" => source.as_str()).increment(1);

    let event = CustomerUpdateEvent::parse(raw.as_str()).map_err(|err| {
        warn!(stage = "ingress", source = source.as_str(), %delivery_id, error = %err, "invalid customer update payload");
        payload_problem(&err)
    })?;
    let customer_id = event.customer_id();
    info!(
        stage = "ingress",
        source = source.as_str(),
        %delivery_id,
        customer_id = %customer_id,
        entries = event.entry_count(),
        body_len = raw.as_str().len(),
        "customer update received"
    );

    let record = relay::fetch_customer_with_retry(
        state.tokens(),
        state.eccube(),
        state.fetch_policy(),
        customer_id,
    )
    .await
    .map_err(|err| {
        warn!(stage = "fetch", %delivery_id, customer_id = %customer_id, error = %err, "giving up on customer fetch");
        err.to_problem()
    })?;

    match relay::forward_contact(state.tokens(), state.mautic(), &record).await {
        Ok(reply) => {
            counter!(telemetry::RELAY_FORWARD_TOTAL, "result" => "ok").increment(1);
            info!(stage = "forward", %delivery_id, customer_id = %customer_id, "contact forwarded to Mautic");
            debug!(stage = "forward", %delivery_id, response = %reply, "Mautic upsert response");
        }
        Err(err) => {
            counter!(telemetry::RELAY_FORWARD_TOTAL, "result" => "failed").increment(1);
            error!(stage = "forward", %delivery_id, customer_id = %customer_id, error = %err, "failed to forward contact");
        }
    }

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "success",
    )
        .into_response())
}

fn handle_mautic(
    state: &AppState,
    headers: &HeaderMap,
    raw: &RawBody,
    delivery_id: Uuid,
) -> Result<Response, ProblemResponse> {
    let source = Platform::Mautic;
    check_signature(state, source, headers, raw, delivery_id)?;
    counter!(telemetry::WEBHOOK_INGRESS_TOTAL, "source" => source.as_str()).increment(1);

    let event = MauticWebhookEvent::parse(raw.as_str()).map_err(|err| {
        warn!(stage = "ingress", source = source.as_str(), %delivery_id, error = %err, "invalid Mautic payload");
        payload_problem(&err)
    })?;
    info!(
        stage = "ingress",
        source = source.as_str(),
        %delivery_id,
        events = ?event.event_types(),
        body_len = raw.as_str().len(),
        "Mautic webhook received"
    );

    Ok(StatusCode::OK.into_response())
}

/// Counts and logs failed checks; only strict mode turns them into a 401.
fn check_signature(
    state: &AppState,
    source: Platform,
    headers: &HeaderMap,
    raw: &RawBody,
    delivery_id: Uuid,
) -> Result<(), ProblemResponse> {
    let verifier = state.verifier(source);
    let provided = headers
        .get(verifier.header())
        .and_then(|value| value.to_str().ok());
    let outcome = verifier.verify(raw.as_str(), provided);
    if !outcome.is_failure() {
        return Ok(());
    }

    counter!(telemetry::WEBHOOK_INVALID_SIGNATURE_TOTAL, "source" => source.as_str()).increment(1);
    warn!(
        stage = "signature",
        source = source.as_str(),
        %delivery_id,
        header = verifier.header(),
        outcome = outcome.as_str(),
        mode = verifier.mode().as_str(),
        "webhook signature check failed"
    );

    if verifier.rejects(outcome) {
        return Err(ProblemResponse::new(
            StatusCode::UNAUTHORIZED,
            "invalid_signature",
            format!(
                "{} header is missing or does not match the body",
                verifier.header()
            ),
        ));
    }
    Ok(())
}

fn payload_problem(err: &PayloadError) -> ProblemResponse {
    match err {
        PayloadError::Json(err) => {
            ProblemResponse::bad_request("invalid_json", format!("failed to parse payload: {err}"))
        }
        other => ProblemResponse::bad_request("invalid_payload", other.to_string()),
    }
}
