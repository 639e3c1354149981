//! Rate limit hints parsed from response headers.
//!
//! The retry controller only consults these hints when
//! [`RetryPolicy::respect_retry_after`](crate::RetryPolicy::respect_retry_after)
//! is enabled; otherwise the regular backoff formula applies.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Rate limit data extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// How long the server asked us to wait (`Retry-After`).
    pub retry_after: Option<Duration>,

    /// When the current window resets (`X-RateLimit-Reset` or `RateLimit-Reset`).
    pub reset_at: Option<SystemTime>,

    /// Requests left in the current window (`X-RateLimit-Remaining`).
    pub remaining: Option<u64>,
}

impl RateLimitInfo {
    /// Reads the rate limit headers of a response.
    ///
    /// # Examples
    ///
    /// ```
    /// use mgc_core::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    /// use std::time::Duration;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "5".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.retry_after, Some(Duration::from_secs(5)));
    /// assert!(info.is_rate_limited());
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            retry_after: header_str(headers, "retry-after").and_then(parse_retry_after),
            reset_at: header_str(headers, "x-ratelimit-reset")
                .or_else(|| header_str(headers, "ratelimit-reset"))
                .and_then(|value| value.parse::<u64>().ok())
                .map(|secs| UNIX_EPOCH + Duration::from_secs(secs)),
            remaining: header_str(headers, "x-ratelimit-remaining")
                .and_then(|value| value.parse().ok()),
        }
    }

    /// Parses the headers and keeps the result only when a limit is active.
    pub(crate) fn active(headers: &HeaderMap) -> Option<Self> {
        let info = Self::from_headers(headers);
        info.is_rate_limited().then_some(info)
    }

    /// Returns the wait the server asked for, capped at `max_wait`.
    ///
    /// `Retry-After` wins over the reset timestamp. A reset time in the past
    /// yields `None`.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        if let Some(retry_after) = self.retry_after {
            return Some(retry_after.min(max_wait));
        }

        let until_reset = self.reset_at?.duration_since(SystemTime::now()).ok()?;
        Some(until_reset.min(max_wait))
    }

    /// Returns `true` when the server signalled an active limit.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.remaining == Some(0)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// Accepts both delay-seconds and HTTP-date forms.
fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = httpdate::parse_http_date(value).ok()?;
    Some(at.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
}
