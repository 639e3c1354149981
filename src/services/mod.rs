//! Resource services built on [`Client`](crate::Client).
//!
//! Each service only supplies verbs, paths, bodies, query parameters and
//! response types; building, retrying, decoding and paging are left to the
//! client.

pub mod audit;
pub mod network;

use crate::{Error, Result};

/// Rejects blank values of required request fields before anything is sent.
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "cannot be empty"));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::transport::{Transport, TransportRequest, TransportResponse};
    use crate::{Client, Result, RetryPolicy};
    use async_trait::async_trait;
    use http::{HeaderMap, StatusCode};
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays queued responses and records every request it is handed.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        responses: Mutex<VecDeque<TransportResponse>>,
        requests: Mutex<Vec<TransportRequest>>,
    }

    impl RecordingTransport {
        pub(crate) fn replying(responses: Vec<(u16, Value)>) -> Arc<Self> {
            let responses = responses
                .into_iter()
                .map(|(status, body)| {
                    let body = if body.is_null() { String::new() } else { body.to_string() };
                    TransportResponse::new(StatusCode::from_u16(status).unwrap(), HeaderMap::new(), body)
                })
                .collect();
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::default(),
            })
        }

        pub(crate) fn client(self: &Arc<Self>) -> Client {
            Client::builder()
                .base_url("https://api.test/br-se1")
                .unwrap()
                .retry_policy(RetryPolicy::none())
                .transport(self.clone())
                .build()
                .unwrap()
        }

        pub(crate) fn requests(&self) -> Vec<TransportRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
            self.requests.lock().unwrap().push(request);
            let next = self.responses.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| {
                TransportResponse::new(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), "no response queued")
            }))
        }
    }
}
