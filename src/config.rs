use std::time::Duration;

use url::Url;

use crate::{ConfigError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com/1.1/";
pub const DEFAULT_OAUTH_BASE: &str = "https://api.twitter.com/";

pub(crate) const REQUEST_TOKEN_PATH: &str = "oauth/request_token";
pub(crate) const AUTHORIZE_PATH: &str = "oauth/authorize";
pub(crate) const ACCESS_TOKEN_PATH: &str = "oauth/access_token";
pub(crate) const BEARER_TOKEN_PATH: &str = "oauth2/token";
pub(crate) const INVALIDATE_TOKEN_PATH: &str = "oauth2/invalidate_token";
const VERIFY_CREDENTIALS_PATH: &str = "account/verify_credentials.json";

/// Endpoint and transport settings of a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_base: Url,
    oauth_base: Url,
    verify_credentials_path: String,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            api_base: Url::parse(DEFAULT_API_BASE).expect("valid default api base"),
            oauth_base: Url::parse(DEFAULT_OAUTH_BASE).expect("valid default oauth base"),
            verify_credentials_path: VERIFY_CREDENTIALS_PATH.to_string(),
            user_agent: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Base URL that resource paths are resolved against, e.g. `https://api.twitter.com/1.1/`.
    pub fn api_base(self, base: &str) -> Result<Self> {
        Ok(ClientConfig {
            api_base: parse_base(base)?,
            ..self
        })
    }

    /// Base URL of the `oauth/*` and `oauth2/*` endpoints.
    pub fn oauth_base(self, base: &str) -> Result<Self> {
        Ok(ClientConfig {
            oauth_base: parse_base(base)?,
            ..self
        })
    }

    pub fn verify_credentials_path<T: Into<String>>(self, path: T) -> Self {
        ClientConfig {
            verify_credentials_path: path.into(),
            ..self
        }
    }

    pub fn user_agent<T: Into<String>>(self, user_agent: T) -> Self {
        ClientConfig {
            user_agent: Some(user_agent.into()),
            ..self
        }
    }

    /// Transport timeout. None by default.
    pub fn timeout(self, timeout: Duration) -> Self {
        ClientConfig {
            timeout: Some(timeout),
            ..self
        }
    }

    pub(crate) fn resource_url(&self, path: &str) -> Result<Url> {
        join(&self.api_base, path)
    }

    pub(crate) fn oauth_url(&self, path: &str) -> Result<Url> {
        join(&self.oauth_base, path)
    }

    pub(crate) fn verify_path(&self) -> &str {
        &self.verify_credentials_path
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(ref user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

/// Parses a base URL, forcing a trailing `/` so that joins append rather
/// than replace the last segment.
fn parse_base(base: &str) -> Result<Url> {
    let normalized = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    Url::parse(&normalized).map_err(|_| ConfigError::InvalidUrl(base.to_string()).into())
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path.trim_start_matches('/'))
        .map_err(|_| ConfigError::InvalidUrl(path.to_string()).into())
}
