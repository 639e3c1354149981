//! Request descriptors: what a single call should do, before it is executed.

use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;

/// An immutable description of one logical HTTP call.
///
/// Resource services build a descriptor and hand it to the
/// [`Client`](crate::Client); the client never modifies it. The path may
/// contain `{name}` placeholders that are filled from path parameters when the
/// request is built, so a blank identifier is caught before anything is sent.
///
/// # Examples
///
/// ```
/// use mgc_core::RequestDescriptor;
///
/// let descriptor = RequestDescriptor::get("/v1/vpcs/{vpc_id}/route_table/routes")
///     .with_path_param("vpc_id", "vpc-1")
///     .with_query_param("zone", "a")
///     .with_optional_query_param("sort", None::<String>);
///
/// assert_eq!(descriptor.query(), &[("zone".to_string(), "a".to_string())]);
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    path_params: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    idempotent: Option<bool>,
}

impl RequestDescriptor {
    /// Creates a descriptor for `method` on `path` (relative to the base URL).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: Vec::new(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
            idempotent: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Binds the `{name}` placeholder of the path.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    /// Appends a query parameter. Repeated keys are kept in insertion order.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends a query parameter only when `value` is present.
    pub fn with_optional_query_param<V: ToString>(
        self,
        key: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.with_query_param(key, value.to_string()),
            None => self,
        }
    }

    /// Appends several query parameters.
    pub fn with_query_params(
        mut self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.query.extend(params);
        self
    }

    /// Sets the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `body` cannot be serialized.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::validation("body", format!("cannot serialize body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Adds a header sent with this call only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::validation("header", format!("invalid header name: {e}")))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::validation("header", format!("invalid header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Overrides whether this call may be retried after a transient failure.
    ///
    /// Without an override, reads and `PUT` are retried and `POST`, `PATCH`
    /// and `DELETE` follow
    /// [`RetryPolicy::retry_mutations`](crate::RetryPolicy::retry_mutations).
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = Some(idempotent);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_params(&self) -> &[(String, String)] {
        &self.path_params
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn idempotency(&self) -> Option<bool> {
        self.idempotent
    }

    /// Returns a copy whose query drops every key in `keys` and then gains `extra`.
    pub(crate) fn with_replaced_query(&self, keys: &[&str], extra: Vec<(String, String)>) -> Self {
        let mut next = self.clone();
        next.query.retain(|(key, _)| !keys.contains(&key.as_str()));
        next.query.extend(extra);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_json_stores_value() {
        #[derive(Serialize)]
        struct Rename {
            name: String,
        }

        let descriptor = RequestDescriptor::patch("/v0/vpcs/{id}/rename")
            .with_json(&Rename {
                name: "edge".to_string(),
            })
            .unwrap();

        assert_eq!(descriptor.method(), &Method::PATCH);
        assert_eq!(descriptor.body(), Some(&json!({"name": "edge"})));
    }

    #[test]
    fn test_with_json_rejects_unserializable_body() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);

        match RequestDescriptor::post("/x").with_json(&map) {
            Err(Error::Validation { field, .. }) => assert_eq!(field, "body"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_header_is_validation_error() {
        let result = RequestDescriptor::get("/x").with_header("bad header", "v");
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_replaced_query_keeps_filters() {
        let descriptor = RequestDescriptor::get("/v0/events")
            .with_query_param("type__like", "vpc")
            .with_query_param("_offset", "0");

        let next = descriptor.with_replaced_query(
            &["_offset", "_limit"],
            vec![("_offset".to_string(), "50".to_string())],
        );

        assert_eq!(
            next.query(),
            &[
                ("type__like".to_string(), "vpc".to_string()),
                ("_offset".to_string(), "50".to_string()),
            ]
        );
        assert_eq!(descriptor.query().len(), 2);
    }
}
