use std::{env, fmt, net::SocketAddr, path::PathBuf, time::Duration};

use url::Url;

use super::{parse_port, resolve_bind_address};

const DEFAULT_OAUTH_STATE: &str = "abcd";
const DEFAULT_FETCH_INITIAL_DELAY_MS: u64 = 5_000;
const DEFAULT_FETCH_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_FETCH_BACKOFF_MS: u64 = 1_000;
const DEFAULT_FETCH_MAX_BACKOFF_MS: u64 = 8_000;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// How webhook signature mismatches are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMode {
    /// Reject the request with 401.
    Strict,
    /// Log the mismatch and keep processing.
    Permissive,
}

impl SignatureMode {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            other => Err(ConfigError::InvalidSignatureMode(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Permissive => "permissive",
        }
    }
}

/// Credentials and endpoints of one OAuth2 authorization-code client.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub authorization_url: Url,
    pub token_url: Url,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

/// Budget for the read-after-webhook consistency wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub initial_delay: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_FETCH_INITIAL_DELAY_MS),
            max_attempts: DEFAULT_FETCH_MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(DEFAULT_FETCH_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_FETCH_MAX_BACKOFF_MS),
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub ec_webhook_secret: String,
    pub mt_webhook_secret: String,
    pub ec_endpoint: Url,
    pub mt_endpoint: Url,
    pub ec_oauth: OAuthSettings,
    pub mt_oauth: OAuthSettings,
    pub oauth_state: String,
    pub signature_mode: SignatureMode,
    pub token_dir: PathBuf,
    pub fetch: FetchSettings,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Constructs the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as missing.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source(lookup);

        let env_value = source
            .optional("APP_ENV")
            .or_else(|| source.optional("NODE_ENV"))
            .unwrap_or_else(|| "development".to_string());
        let environment = Environment::from_str(&env_value)?;

        let port = parse_port(source.optional("PORT").as_deref())?;
        let bind_addr = resolve_bind_address(source.optional("APP_BIND_ADDR").as_deref(), port)?;

        let callback_base = if environment.is_development() {
            format!("http://localhost:{port}")
        } else {
            source
                .required("HM_HEROKU_APP_URL")?
                .trim_end_matches('/')
                .to_string()
        };

        let ec_oauth = OAuthSettings {
            client_id: source.required("HM_EC_CLIENTID")?,
            client_secret: source.required("HM_EC_CLIENTSECRET")?,
            authorization_url: source.url("HM_EC_AUTH_URL")?,
            token_url: source.url("HM_EC_TOKEN_URL")?,
            redirect_uri: format!("{callback_base}/auth/ec/callback"),
            scopes: vec!["read".to_string()],
        };
        let mt_oauth = OAuthSettings {
            client_id: source.required("HM_MT_CLIENTID")?,
            client_secret: source.required("HM_MT_CLIENTSECRET")?,
            authorization_url: source.url("HM_MT_AUTH_URL")?,
            token_url: source.url("HM_MT_TOKEN_URL")?,
            redirect_uri: format!("{callback_base}/auth/mt/callback"),
            scopes: Vec::new(),
        };

        let signature_mode = match source.optional("HM_SIGNATURE_MODE") {
            Some(raw) => SignatureMode::from_str(&raw)?,
            None => SignatureMode::Strict,
        };

        let defaults = FetchSettings::default();
        let fetch = FetchSettings {
            initial_delay: source
                .millis("HM_FETCH_INITIAL_DELAY_MS")?
                .unwrap_or(defaults.initial_delay),
            max_attempts: match source.number("HM_FETCH_MAX_ATTEMPTS")? {
                Some(0) => {
                    return Err(ConfigError::InvalidNumber {
                        var: "HM_FETCH_MAX_ATTEMPTS",
                        value: "0".to_string(),
                    })
                }
                Some(value) => u32::try_from(value).map_err(|_| ConfigError::InvalidNumber {
                    var: "HM_FETCH_MAX_ATTEMPTS",
                    value: value.to_string(),
                })?,
                None => defaults.max_attempts,
            },
            base_backoff: source
                .millis("HM_FETCH_BACKOFF_MS")?
                .unwrap_or(defaults.base_backoff),
            max_backoff: source
                .millis("HM_FETCH_MAX_BACKOFF_MS")?
                .unwrap_or(defaults.max_backoff),
        };

        Ok(Self {
            bind_addr,
            environment,
            ec_webhook_secret: source.required("HM_EC_WEBHOOK_SECRET")?,
            mt_webhook_secret: source.required("HM_MT_WEBHOOK_SECRET")?,
            ec_endpoint: source.url("HM_EC_ENDPOINT")?,
            mt_endpoint: source.url("HM_MT_ENDPOINT")?,
            ec_oauth,
            mt_oauth,
            oauth_state: source
                .optional("HM_OAUTH_STATE")
                .unwrap_or_else(|| DEFAULT_OAUTH_STATE.to_string()),
            signature_mode,
            token_dir: source
                .optional("HM_TOKEN_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            fetch,
        })
    }
}

struct Source<F>(F);

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn url(&self, key: &'static str) -> Result<Url, ConfigError> {
        let raw = self.required(key)?;
        Url::parse(raw.trim()).map_err(|error| ConfigError::InvalidUrl { var: key, error })
    }

    fn number(&self, key: &'static str) -> Result<Option<u64>, ConfigError> {
        self.optional(key)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidNumber { var: key, value: raw })
            })
            .transpose()
    }

    fn millis(&self, key: &'static str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.number(key)?.map(Duration::from_millis))
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    InvalidPort(String),
    Missing(&'static str),
    InvalidUrl {
        var: &'static str,
        error: url::ParseError,
    },
    InvalidNumber {
        var: &'static str,
        value: String,
    },
    InvalidSignatureMode(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::InvalidPort(value) => write!(f, "PORT must be a port number (got {value})"),
            Self::Missing(var) => write!(f, "required environment variable {var} is not set"),
            Self::InvalidUrl { var, error } => write!(f, "{var} is not a valid URL: {error}"),
            Self::InvalidNumber { var, value } => {
                write!(f, "{var} must be a positive integer (got {value})")
            }
            Self::InvalidSignatureMode(value) => write!(
                f,
                "HM_SIGNATURE_MODE must be 'strict' or 'permissive' (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
