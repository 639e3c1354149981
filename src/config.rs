//! Resolved client configuration.
//!
//! A [`Config`] is produced by [`ClientBuilder`](crate::ClientBuilder) and is
//! read-only afterwards. Every clone of a [`Client`](crate::Client) shares the
//! same instance, including the transport and its connection pool.

use crate::retry::{RetryPolicy, RetryPredicate};
use crate::transport::Transport;
use http::HeaderMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("mgc-core/", env!("CARGO_PKG_VERSION"));

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Well-known API endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// Brazil Northeast 1.
    BrNe1,
    /// Brazil Southeast 1.
    #[default]
    BrSe1,
    /// Brazil Magalu 1.
    BrMgl1,
    /// Products without a regional endpoint.
    Global,
}

impl Region {
    pub fn base_url(self) -> &'static str {
        match self {
            Region::BrNe1 => "https://api.magalu.cloud/br-ne1",
            Region::BrSe1 => "https://api.magalu.cloud/br-se1",
            Region::BrMgl1 => "https://api.magalu.cloud/br-se-1",
            Region::Global => "https://api.magalu.cloud",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_url())
    }
}

/// Immutable settings shared by all calls of a client.
pub struct Config {
    pub(crate) base_url: Url,
    pub(crate) default_headers: HeaderMap,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) retry_predicate: Box<dyn RetryPredicate>,
    pub(crate) transport: Arc<dyn Transport>,
}

impl Config {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Headers sent with every request (auth, user agent, custom headers).
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Per-attempt timeout handed to the transport.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn retry_predicate(&self) -> &dyn RetryPredicate {
        self.retry_predicate.as_ref()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Header values carry credentials.
        let header_names: Vec<_> = self.default_headers.keys().map(|k| k.as_str()).collect();
        f.debug_struct("Config")
            .field("base_url", &self.base_url.as_str())
            .field("default_headers", &header_names)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}
