//! Turns a [`RequestDescriptor`] into a [`TransportRequest`].

use crate::config::Config;
use crate::context::{RequestContext, REQUEST_ID_HEADER, TENANT_ID_HEADER};
use crate::descriptor::RequestDescriptor;
use crate::transport::TransportRequest;
use crate::{Error, Result};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

/// Materializes `descriptor` against `config`.
///
/// This is a pure transform: nothing is sent. It fails with
/// [`Error::Validation`] when the path is blank, when a `{name}` placeholder
/// has no value, or when a path parameter is blank.
///
/// Query parameters are emitted sorted by key (stable for repeated keys) so
/// every attempt of a call, and every run of a test, produces the same URL.
pub fn build_request(
    descriptor: &RequestDescriptor,
    config: &Config,
    ctx: &RequestContext,
) -> Result<TransportRequest> {
    if descriptor.path().trim().is_empty() {
        return Err(Error::validation("path", "cannot be empty"));
    }

    let path = expand_path(descriptor.path(), descriptor.path_params())?;
    let separator = if path.starts_with('/') { "" } else { "/" };
    let raw_url = format!(
        "{}{}{}",
        config.base_url.as_str().trim_end_matches('/'),
        separator,
        path
    );
    let mut url = Url::parse(&raw_url)
        .map_err(|e| Error::validation("path", format!("invalid URL {raw_url}: {e}")))?;

    let mut query = descriptor.query().to_vec();
    query.sort_by(|a, b| a.0.cmp(&b.0));
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &query {
            pairs.append_pair(key, value);
        }
    }

    let mut headers = config.default_headers.clone();
    for (name, value) in descriptor.headers() {
        headers.insert(name.clone(), value.clone());
    }
    if let Some(request_id) = ctx.request_id() {
        insert_header(&mut headers, REQUEST_ID_HEADER, request_id, "request_id")?;
    }
    if let Some(tenant_id) = ctx.tenant_id() {
        insert_header(&mut headers, TENANT_ID_HEADER, tenant_id, "tenant_id")?;
    }

    let body = match descriptor.body() {
        Some(value) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            let bytes = serde_json::to_vec(value)
                .map_err(|e| Error::validation("body", format!("cannot serialize body: {e}")))?;
            Some(bytes)
        }
        None => None,
    };

    tracing::debug!(
        method = %descriptor.method(),
        url = %url,
        has_body = body.is_some(),
        "Built HTTP request"
    );

    Ok(TransportRequest {
        method: descriptor.method().clone(),
        url,
        headers,
        body,
        timeout: config.timeout,
    })
}

/// Replaces every `{name}` in `template` with its percent-encoded value.
fn expand_path(template: &str, params: &[(String, String)]) -> Result<String> {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        path.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| Error::validation("path", format!("unclosed placeholder in {template}")))?;
        let name = &after[..close];

        let value = params
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| Error::validation(name, "missing path parameter"))?;
        if value.trim().is_empty() {
            return Err(Error::validation(name, "cannot be empty"));
        }

        path.push_str(&urlencoding::encode(value));
        rest = &after[close + 1..];
    }
    path.push_str(rest);

    Ok(path)
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str, field: &str) -> Result<()> {
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::validation(field, format!("invalid header value: {e}")))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}
