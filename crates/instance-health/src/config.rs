//! Configuration of the monitored Atlassian instance.

use url::Url;

use std::{fmt, str::FromStr, time::Duration};

/// Path of the instance health endpoint provided by the Troubleshooting and Support Tools plugin.
pub const CHECK_PATH: &str = "/rest/troubleshooting/1.0/check/";

/// Error building a [`TargetConfig`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Target FQDN is empty.
    #[error("FQDN of the application must be set")]
    MissingFqdn,
    /// Credential token is empty.
    #[error("token for the application must be set")]
    MissingToken,
    /// Scheme is neither `http` nor `https`.
    #[error("unsupported scheme `{0}`; expected `http` or `https`")]
    UnsupportedScheme(String),
    /// FQDN doesn't produce a valid endpoint URL.
    #[error("FQDN `{fqdn}` does not form a valid endpoint URL: {reason}")]
    InvalidFqdn {
        /// Supplied FQDN.
        fqdn: String,
        /// Human-readable reason.
        reason: String,
    },
    /// HTTP client cannot be initialized.
    #[error("failed initializing HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// URL scheme used to reach the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scheme {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    #[default]
    Https,
}

impl Scheme {
    /// Returns the scheme as used in URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            _ => Err(ConfigError::UnsupportedScheme(s.to_owned())),
        }
    }
}

/// Upstream target monitored by a [`HealthCollector`](crate::HealthCollector).
#[derive(Clone)]
pub struct TargetConfig {
    fqdn: String,
    token: String,
    url: Url,
    timeout: Duration,
    max_entries: Option<usize>,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TargetConfig")
            .field("url", &self.url.as_str())
            .field("timeout", &self.timeout)
            .field("max_entries", &self.max_entries)
            .finish_non_exhaustive()
    }
}

impl TargetConfig {
    /// Default timeout for upstream requests.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a target for the application at `{scheme}://{fqdn}`, authenticated with a basic
    /// `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if `fqdn` or `token` is empty, or if `fqdn` is not a valid URL authority
    /// (e.g., contains a path).
    pub fn new(
        scheme: Scheme,
        fqdn: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let fqdn = fqdn.into();
        let token = token.into();
        if fqdn.is_empty() {
            return Err(ConfigError::MissingFqdn);
        }
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }

        let invalid_fqdn = |reason: String| ConfigError::InvalidFqdn {
            fqdn: fqdn.clone(),
            reason,
        };
        let url = Url::parse(&format!("{scheme}://{fqdn}{CHECK_PATH}"))
            .map_err(|err| invalid_fqdn(err.to_string()))?;
        if url.path() != CHECK_PATH || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid_fqdn("FQDN must not contain a path".to_owned()));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid_fqdn("FQDN must not contain credentials".to_owned()));
        }

        Ok(Self {
            fqdn,
            token,
            url,
            timeout: Self::DEFAULT_TIMEOUT,
            max_entries: None,
        })
    }

    /// Sets the timeout for a single upstream request, including reading the response body.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Caps the number of health checks converted to metrics on a single scrape.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// FQDN of the application, as reported in the `fqdn` label.
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Full URL of the instance health endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    /// Timeout for a single upstream request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum number of checks converted to metrics, if set.
    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }
}
