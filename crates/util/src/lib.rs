pub mod config;

use std::net::SocketAddr;

pub use config::{
    AppConfig, ConfigError, Environment, FetchSettings, OAuthSettings, SignatureMode,
};

pub const DEFAULT_PORT: u16 = 3000;

/// Loads environment variables from `.env` when available.
///
/// Missing files are ignored so the function is safe in production builds
/// where dotenv files are not deployed.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

pub(crate) fn parse_port(value: Option<&str>) -> Result<u16, ConfigError> {
    match value.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidPort(raw.to_string())),
        None => Ok(DEFAULT_PORT),
    }
}

pub(crate) fn resolve_bind_address(
    bind: Option<&str>,
    port: u16,
) -> Result<SocketAddr, ConfigError> {
    match bind.filter(|raw| !raw.is_empty()) {
        Some(raw) => raw.parse().map_err(ConfigError::BindAddress),
        None => Ok(SocketAddr::from(([0, 0, 0, 0], port))),
    }
}
