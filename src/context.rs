//! Per-call context: cancellation, deadline and propagated headers.

use crate::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Header carrying the caller's correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header scoping a call to a tenant.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Caller-supplied scope for one logical call (or one whole list traversal).
///
/// The context is threaded through request building, every attempt, every
/// backoff sleep and the transport call. Cancelling its token, or letting its
/// deadline pass, aborts the call with a cancelled
/// [`Error::Transport`](crate::Error::Transport) as soon as the current await
/// point is reached.
///
/// # Examples
///
/// ```
/// use mgc_core::RequestContext;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let token = CancellationToken::new();
/// let ctx = RequestContext::new()
///     .with_request_id("req-42")
///     .with_timeout(Duration::from_secs(30))
///     .with_cancellation(token.clone());
///
/// assert_eq!(ctx.request_id(), Some("req-42"));
/// token.cancel();
/// assert!(ctx.check().is_err());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    request_id: Option<String>,
    tenant_id: Option<String>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context with no deadline, no propagated headers and a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the correlation id sent as `X-Request-ID`.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Sets the tenant sent as `X-Tenant-ID`.
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Uses `token` as the cancellation signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sets an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails if the call was cancelled or its deadline already passed.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::cancelled("call cancelled by caller"));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(Error::cancelled("deadline exceeded"))
            }
            _ => Ok(()),
        }
    }

    /// Resolves once the call is cancelled or the deadline passes.
    ///
    /// Never resolves for a context without a deadline whose token is never
    /// cancelled; meant to be raced against real work with `tokio::select!`.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => Error::cancelled("call cancelled by caller"),
                _ = tokio::time::sleep_until(deadline) => Error::cancelled("deadline exceeded"),
            },
            None => {
                self.cancel.cancelled().await;
                Error::cancelled("call cancelled by caller")
            }
        }
    }
}
