mod oauth;
mod problem;
mod raw_body;
mod relay;
mod router;
mod signature;
mod telemetry;
#[cfg(test)]
mod test_support;
mod webhook;

use std::{net::SocketAddr, sync::Arc};

use hm_relay_storage::FileTokenStore;
use hm_relay_util::{load_env_file, AppConfig, SignatureMode};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let tokens = Arc::new(FileTokenStore::new(config.token_dir.clone()));
    let http = reqwest::Client::builder().build()?;
    let state = router::AppState::new(&config, metrics, tokens, http);

    if config.environment.is_development() {
        warn!(stage = "app", "signature checks are disabled in development");
    } else if config.signature_mode == SignatureMode::Permissive {
        warn!(stage = "app", "signature mismatches will be logged but not rejected");
    }

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        signature_mode = config.signature_mode.as_str(),
        token_dir = %config.token_dir.display(),
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
