//! Relay configuration read from the process environment.
//!
//! A `.env` file in the working directory is loaded by the binary before
//! [`RelayConfig::from_env`] runs.

use std::net::SocketAddr;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_FROM: &str = "Momentum Maker <noreply@momentum-maker.local>";

/// HTTP mail API the relay hands messages to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailApiConfig {
    pub url: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// `RELAY_HOST`
    pub host: String,
    /// `PORT`
    pub port: u16,
    /// `MAIL_API_URL` and `MAIL_API_TOKEN`. Without a URL the relay only
    /// logs outgoing mail.
    pub mail_api: Option<MailApiConfig>,
    /// `MAIL_FROM`
    pub from: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            mail_api: None,
            from: DEFAULT_FROM.into(),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();
        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".into(),
                value: raw,
            })?,
            None => defaults.port,
        };

        let mail_api = match get("MAIL_API_URL") {
            Some(url) => {
                validate_mail_api_url(&url)?;
                Some(MailApiConfig {
                    url,
                    token: get("MAIL_API_TOKEN"),
                })
            }
            None => None,
        };

        Ok(Self {
            host: get("RELAY_HOST").unwrap_or(defaults.host),
            port,
            mail_api,
            from: get("MAIL_FROM").unwrap_or(defaults.from),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "RELAY_HOST".into(),
            value: self.host.clone(),
        })
    }
}

/// The mail API must be an absolute http(s) URL with a host.
fn validate_mail_api_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: "MAIL_API_URL".into(),
        value: raw.to_string(),
    };
    let url = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().map_or(true, str::is_empty) {
        return Err(invalid());
    }
    Ok(())
}
