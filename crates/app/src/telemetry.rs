use std::{
    fmt::Write as _,
    sync::{Mutex, OnceLock},
    time::Instant,
};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self as tracing_fmt, time::UtcTime},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use hm_relay_util::{AppConfig, Environment};

pub const WEBHOOK_INGRESS_TOTAL: &str = "webhook_ingress_total";
pub const WEBHOOK_INVALID_SIGNATURE_TOTAL: &str = "webhook_invalid_signature_total";
pub const WEBHOOK_ACK_LATENCY_SECONDS: &str = "webhook_ack_latency_seconds";
pub const OAUTH_EXCHANGE_TOTAL: &str = "oauth_exchange_total";
pub const RELAY_FETCH_ATTEMPTS_TOTAL: &str = "relay_fetch_attempts_total";
pub const RELAY_FORWARD_TOTAL: &str = "relay_forward_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricKind {
    Counter,
    Histogram,
}

struct RelayMetric {
    name: &'static str,
    kind: MetricKind,
    labels: &'static [&'static str],
    help: &'static str,
}

/// Every series the relay records, with the label keys its call sites attach.
const RELAY_METRICS: &[RelayMetric] = &[
    RelayMetric {
        name: WEBHOOK_INGRESS_TOTAL,
        kind: MetricKind::Counter,
        labels: &["source"],
        help: "Webhook requests that passed the signature gate",
    },
    RelayMetric {
        name: WEBHOOK_INVALID_SIGNATURE_TOTAL,
        kind: MetricKind::Counter,
        labels: &["source"],
        help: "Webhook requests with a missing or mismatched signature",
    },
    RelayMetric {
        name: WEBHOOK_ACK_LATENCY_SECONDS,
        kind: MetricKind::Histogram,
        labels: &["source"],
        help: "Seconds from receiving a webhook to answering it",
    },
    RelayMetric {
        name: OAUTH_EXCHANGE_TOTAL,
        kind: MetricKind::Counter,
        labels: &["platform", "result"],
        help: "OAuth callbacks by platform and outcome",
    },
    RelayMetric {
        name: RELAY_FETCH_ATTEMPTS_TOTAL,
        kind: MetricKind::Counter,
        labels: &["result"],
        help: "EC-CUBE customer fetch attempts by outcome",
    },
    RelayMetric {
        name: RELAY_FORWARD_TOTAL,
        kind: MetricKind::Counter,
        labels: &["result"],
        help: "Mautic contact upserts by outcome",
    },
];

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to initialize tracing: {0}")]
    Tracing(#[from] TryInitError),
    #[error("failed to install prometheus recorder: {0}")]
    Metrics(#[from] BuildError),
}

static TRACING_INIT: OnceLock<()> = OnceLock::new();
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static METRICS_INSTALL_GUARD: Mutex<()> = Mutex::new(());
static START_TIME: OnceLock<Instant> = OnceLock::new();

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_git_sha() -> &'static str {
    option_env!("GIT_SHA").unwrap_or("unknown")
}

/// Development gets multi-line pretty events, tests get compact lines routed
/// through the test harness capture, production gets JSON lines.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryError> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    let base = tracing_fmt::layer()
        .with_target(false)
        .with_timer(UtcTime::rfc_3339());

    match config.environment {
        Environment::Development => registry.with(base.pretty()).try_init()?,
        Environment::Test => registry
            .with(base.compact().with_ansi(false).with_test_writer())
            .try_init()?,
        Environment::Production => registry
            .with(base.json().flatten_event(true))
            .try_init()?,
    }

    TRACING_INIT.set(()).ok();
    tracing::info!(
        stage = "telemetry",
        env = config.environment.as_str(),
        version = BUILD_VERSION,
        git_sha = build_git_sha(),
        "tracing initialized"
    );
    Ok(())
}

/// Installs the process-wide Prometheus recorder once and describes the
/// relay's series. Later calls hand back the same handle.
pub fn init_metrics() -> Result<PrometheusHandle, TelemetryError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let _guard = METRICS_INSTALL_GUARD
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    METRICS_HANDLE.set(handle.clone()).ok();

    describe_gauge!("app_build_info", "Build metadata for the running binary");
    describe_gauge!("app_uptime_seconds", "Seconds since the process started");
    for metric in RELAY_METRICS {
        match metric.kind {
            MetricKind::Counter => describe_counter!(metric.name, metric.help),
            MetricKind::Histogram => describe_histogram!(metric.name, metric.help),
        }
    }
    START_TIME.get_or_init(Instant::now);

    Ok(handle)
}

/// Recorder output followed by the build info and uptime gauges, which are
/// computed at scrape time.
pub fn render_metrics(handle: &PrometheusHandle) -> String {
    let mut body = handle.render();
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }

    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs_f64())
        .unwrap_or_default();
    let _ = writeln!(body, "# TYPE app_build_info gauge");
    let _ = writeln!(
        body,
        "app_build_info{{service=\"hm-relay\",version=\"{BUILD_VERSION}\",git=\"{}\"}} 1",
        build_git_sha()
    );
    let _ = writeln!(body, "# TYPE app_uptime_seconds gauge");
    let _ = writeln!(body, "app_uptime_seconds {uptime}");

    body
}
