//! Run configuration collected from the CI environment.

use std::time::Duration;

use crate::{resolver::DEFAULT_TIMEOUT, ConfigError};

/// Path of the key set document relative to the server URL.
pub const DISCOVERY_PATH: &str = "/oauth/discovery/keys";
/// Environment variable with the base URL of the CI server.
pub const SERVER_URL_VAR: &str = "CI_SERVER_URL";
/// Environment variable with the host name of the CI server. Tokens must be issued by it.
pub const SERVER_HOST_VAR: &str = "CI_SERVER_HOST";

/// Inputs of a single validation run.
#[derive(Clone)]
pub struct Config {
    token: String,
    server_url: String,
    expected_issuer: String,
    timeout: Duration,
    leeway: chrono::Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("expected_issuer", &self.expected_issuer)
            .field("timeout", &self.timeout)
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Creates a configuration with the default timeout and no leeway.
    pub fn new(
        token: impl Into<String>,
        server_url: impl Into<String>,
        expected_issuer: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let server_url = server_url.into();
        let parsed = reqwest::Url::parse(&server_url)
            .map_err(|_| ConfigError::InvalidServerUrl(server_url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") || !parsed.has_host() {
            return Err(ConfigError::InvalidServerUrl(server_url));
        }

        Ok(Self {
            token: token.into(),
            server_url,
            expected_issuer: expected_issuer.into(),
            timeout: DEFAULT_TIMEOUT,
            leeway: chrono::Duration::zero(),
        })
    }

    /// Reads the configuration using `lookup` for environment variables.
    ///
    /// The token is read from the variable named `token_var`; the server URL and
    /// the expected issuer are read from [`SERVER_URL_VAR`] and [`SERVER_HOST_VAR`].
    /// Every variable must be set to a non-empty value.
    pub fn from_env<F>(token_var: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| match lookup(name) {
            None => Err(ConfigError::Missing(name.to_owned())),
            Some(value) if value.is_empty() => Err(ConfigError::Empty(name.to_owned())),
            Some(value) => Ok(value),
        };

        let token = require(token_var)?;
        let server_url = require(SERVER_URL_VAR)?;
        let expected_issuer = require(SERVER_HOST_VAR)?;
        Self::new(token, server_url, expected_issuer)
    }

    /// Sets the timeout of the key set request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the clock skew tolerated when checking `nbf` and `exp`.
    #[must_use]
    pub fn with_leeway(mut self, leeway: chrono::Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Gets the compact token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Gets the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Gets the expected value of the `iss` claim.
    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// Gets the timeout of the key set request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Gets the tolerated clock skew.
    pub fn leeway(&self) -> chrono::Duration {
        self.leeway
    }

    /// Returns the URL of the key set document.
    pub fn key_set_url(&self) -> String {
        format!("{}{DISCOVERY_PATH}", self.server_url.trim_end_matches('/'))
    }
}
