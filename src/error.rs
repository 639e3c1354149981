//! Error types for API calls.
//!
//! Every failed call resolves to exactly one [`Error`] variant. Four of them
//! describe what went wrong with a call:
//!
//! * [`Error::Validation`] - the request was rejected locally and never sent.
//! * [`Error::Transport`] - no response was obtained (connect failure, timeout,
//!   cancellation).
//! * [`Error::Status`] - the server answered with a status code of 400 or above.
//! * [`Error::Decode`] - the server answered successfully but the body did not
//!   match the expected shape.
//!
//! [`Error::Configuration`] is only produced while building a
//! [`Client`](crate::Client), never by a call.

use crate::rate_limit::RateLimitInfo;
use http::{HeaderMap, StatusCode};
use std::fmt;

/// Why a request never produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// DNS resolution or TCP/TLS connection failed.
    Connect,
    /// A single attempt exceeded the configured per-attempt timeout.
    Timeout,
    /// The caller cancelled the call or its deadline passed.
    Cancelled,
    /// Any other failure while sending the request or reading the response.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// The main error type for API calls.
///
/// # Examples
///
/// ```no_run
/// use mgc_core::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().api_key("secret")?.build()?;
///
/// match client.get::<serde_json::Value>("/v0/vpcs/abc").await {
///     Ok(response) => println!("vpc: {:?}", response.data),
///     Err(Error::Status { status, message, .. }) => {
///         eprintln!("server said {status}: {message}");
///     }
///     Err(e) => eprintln!("call failed: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request was invalid and was never sent.
    #[error("validation error: {field} - {message}")]
    Validation {
        /// The offending field, path parameter or descriptor part.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// No response was obtained from the server.
    #[error("transport error ({kind}): {message}")]
    Transport {
        /// The failure category.
        kind: TransportErrorKind,
        /// Human readable detail from the underlying transport.
        message: String,
    },

    /// The server responded with a status code of 400 or above.
    ///
    /// `message` is extracted best-effort from the body (the JSON `"error"`
    /// field when present), falling back to the raw body or the status phrase.
    #[error("HTTP error {status}: {message}")]
    Status {
        /// The HTTP status code.
        status: StatusCode,
        /// The server-provided message.
        message: String,
        /// The raw response body.
        raw_response: String,
        /// The response headers.
        headers: HeaderMap,
        /// Rate limit hints parsed from the headers, when a limit is active.
        rate_limit_info: Option<RateLimitInfo>,
    },

    /// The response was successful but could not be decoded into the expected type.
    #[error("failed to decode response (status {status}): {message}")]
    Decode {
        /// The HTTP status code.
        status: StatusCode,
        /// The decoder's error message.
        message: String,
        /// The raw response body.
        raw_response: String,
    },

    /// The client could not be built from the provided settings.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Error::Transport {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cancelled(message: impl Into<String>) -> Self {
        Self::transport(TransportErrorKind::Cancelled, message)
    }

    pub(crate) fn decode(
        status: StatusCode,
        message: impl Into<String>,
        raw_response: impl Into<String>,
    ) -> Self {
        Error::Decode {
            status,
            message: message.into(),
            raw_response: raw_response.into(),
        }
    }

    /// Returns `true` if this error is considered transient.
    ///
    /// Transport failures other than cancellation, 5xx responses and
    /// 429 (Too Many Requests) are transient. Everything else is not.
    ///
    /// # Examples
    ///
    /// ```
    /// use mgc_core::Error;
    /// use http::{HeaderMap, StatusCode};
    ///
    /// let err = Error::Status {
    ///     status: StatusCode::SERVICE_UNAVAILABLE,
    ///     message: "try later".to_string(),
    ///     raw_response: String::new(),
    ///     headers: HeaderMap::new(),
    ///     rate_limit_info: None,
    /// };
    /// assert!(err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { kind, .. } => *kind != TransportErrorKind::Cancelled,
            Error::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Error::Validation { .. } => false,
            Error::Decode { .. } => false,
            Error::Configuration(_) => false,
        }
    }

    /// Returns `true` if the call was cancelled or ran past its deadline.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Transport {
                kind: TransportErrorKind::Cancelled,
                ..
            }
        )
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the best-effort human readable message of this error.
    pub fn message(&self) -> &str {
        match self {
            Error::Validation { message, .. } => message,
            Error::Transport { message, .. } => message,
            Error::Status { message, .. } => message,
            Error::Decode { message, .. } => message,
            Error::Configuration(message) => message,
        }
    }

    /// Returns the raw response body if a response was received.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Status { raw_response, .. } => Some(raw_response),
            Error::Decode { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns rate limit information if the server reported an active limit.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        match self {
            Error::Status {
                rate_limit_info, ..
            } => rate_limit_info.as_ref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Error::transport(kind, err.to_string())
    }
}

/// A specialized `Result` type for API calls.
pub type Result<T> = std::result::Result<T, Error>;
