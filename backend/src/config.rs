use std::time::Duration;
use url::Url;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PORT: &str = "8081";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid proxy URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub proxy_url: Url,
    pub proxy_secret: String,
    pub gemini_key: String,
    pub model: String,
    pub request_timeout: Duration,
    pub port: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let raw_url = required("PROXY_URL")?;
        let proxy_url = Url::parse(&raw_url).map_err(|source| ConfigError::InvalidUrl {
            value: raw_url.clone(),
            source,
        })?;

        let request_timeout = match lookup("PROXY_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or(ConfigError::InvalidValue {
                        name: "PROXY_TIMEOUT_SECS",
                        value: value.clone(),
                    })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            proxy_url,
            proxy_secret: required("PROXY_SECRET")?,
            gemini_key: required("GEMINI_API_KEY")?,
            model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            request_timeout,
            port: lookup("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string()),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
