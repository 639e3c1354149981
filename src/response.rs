//! Successful call results with their HTTP details.

use crate::context::REQUEST_ID_HEADER;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// Header carrying the provider's trace id.
pub const TRACE_ID_HEADER: &str = "x-mgc-trace-id";

/// A decoded response together with the details of the HTTP exchange.
///
/// Dereferences to the decoded data.
///
/// # Examples
///
/// ```no_run
/// use mgc_core::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Vpc {
///     id: String,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), mgc_core::Error> {
/// let client = Client::builder().api_key("secret")?.build()?;
///
/// let vpc = client.get::<Vpc>("/v0/vpcs/3f2a").await?;
/// println!("{} answered in {:?}", vpc.name, vpc.latency);
/// if vpc.was_retried() {
///     println!("needed {} attempts", vpc.attempts);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response data.
    pub data: T,

    /// The raw response body.
    pub raw_body: String,

    /// The HTTP status code of the final attempt.
    pub status: StatusCode,

    /// The headers of the final attempt.
    pub headers: HeaderMap,

    /// Time from the first attempt until the final response, including backoff.
    pub latency: Duration,

    /// Number of attempts made, `1` when no retry was needed.
    pub attempts: usize,
}

impl<T> Response<T> {
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the data while keeping the exchange details.
    ///
    /// # Examples
    ///
    /// ```
    /// # use mgc_core::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     vec![1, 2, 3],
    ///     "[1,2,3]".to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(12),
    ///     1,
    /// );
    ///
    /// let count = response.map(|items| items.len());
    /// assert_eq!(count.data, 3);
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if more than one attempt was needed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The `X-Request-ID` echoed by the server.
    pub fn request_id(&self) -> Option<&str> {
        self.header(REQUEST_ID_HEADER)
    }

    /// The provider's `X-Mgc-Trace-Id`.
    pub fn trace_id(&self) -> Option<&str> {
        self.header(TRACE_ID_HEADER)
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
