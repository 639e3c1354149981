//! The API client and its builder.
//!
//! The [`Client`] type is the main entry point for making calls. Use
//! [`ClientBuilder`] to configure and create clients.

use crate::config::{Config, Region, API_KEY_HEADER, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use crate::context::{RequestContext, REQUEST_ID_HEADER};
use crate::decode;
use crate::descriptor::RequestDescriptor;
use crate::pagination::{self, ListRequest, Page, RequestedPage};
use crate::request_builder::build_request;
use crate::response::TRACE_ID_HEADER;
use crate::retry::{RetryController, RetryOnTransient, RetryPolicy, RetryPredicate};
use crate::transport::{ReqwestTransport, Transport, TransportResponse};
use crate::{Error, Response, Result};
use futures::{Stream, TryStreamExt};
use http::header::{AUTHORIZATION, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A client for the cloud REST API with retries, cancellation and pagination.
///
/// The client is designed to be reused across calls. Clones are cheap and
/// share one configuration and one connection pool.
///
/// # Examples
///
/// ```no_run
/// use mgc_core::{Client, RequestContext, RequestDescriptor, RetryPolicy};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct CreateVpc {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct Created {
///     id: String,
/// }
///
/// # async fn example() -> Result<(), mgc_core::Error> {
/// let client = Client::builder()
///     .api_key("secret")?
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::exponential(5, Duration::from_millis(200), Duration::from_secs(10)))
///     .build()?;
///
/// let ctx = RequestContext::new()
///     .with_request_id("req-42")
///     .with_timeout(Duration::from_secs(120));
/// let descriptor = RequestDescriptor::post("/v1/vpcs").with_json(&CreateVpc {
///     name: "edge".to_string(),
/// })?;
///
/// let created = client.call::<Created>(&ctx, descriptor).await?;
/// println!("created {} after {} attempt(s)", created.id, created.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<Config>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The configuration shared by every clone of this client.
    pub fn config(&self) -> &Config {
        &self.inner
    }

    /// Executes `descriptor` and decodes the response body into `T`.
    ///
    /// The request is built and validated once, before the first attempt; a
    /// [`Error::Validation`] therefore never reaches the transport. Each
    /// attempt sends the same request, and transient failures are retried
    /// according to the configured [`RetryPolicy`] while `ctx` allows it.
    ///
    /// Use `T = ()` or `T = Option<_>` for calls that may answer with an empty
    /// body, or [`Client::execute`] to ignore the body altogether.
    pub async fn call<T>(&self, ctx: &RequestContext, descriptor: RequestDescriptor) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        self.run(ctx, &descriptor, |method, response| decode::decode::<T>(method, response))
            .await
    }

    /// Executes `descriptor` and ignores whatever body comes back.
    ///
    /// Statuses of 400 and above are still reported as [`Error::Status`].
    pub async fn execute(&self, ctx: &RequestContext, descriptor: RequestDescriptor) -> Result<Response<()>> {
        self.run(ctx, &descriptor, |_, response| decode::discard(response))
            .await
    }

    async fn run<T, D>(&self, ctx: &RequestContext, descriptor: &RequestDescriptor, decoder: D) -> Result<Response<T>>
    where
        D: Fn(&Method, TransportResponse) -> Result<T>,
    {
        let config = self.inner.as_ref();
        let request = build_request(descriptor, config, ctx)?;
        let method = descriptor.method();
        let transport = config.transport();
        let start_time = Instant::now();

        let controller = RetryController::new(config.retry_policy(), config.retry_predicate());
        let request = &request;
        let decoder = &decoder;
        let (response, attempts) = controller
            .execute(ctx, method, descriptor.idempotency(), move |attempt| async move {
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    attempt = attempt,
                    "Executing HTTP request"
                );

                let response = transport.send(request.clone()).await?;
                tracing::info!(
                    status = response.status.as_u16(),
                    latency_ms = start_time.elapsed().as_millis() as u64,
                    attempt = attempt,
                    "Received HTTP response"
                );
                if let Some(request_id) = response.header(REQUEST_ID_HEADER) {
                    tracing::debug!(request_id = %request_id, "Server request id");
                }
                if let Some(trace_id) = response.header(TRACE_ID_HEADER) {
                    tracing::debug!(trace_id = %trace_id, "Server trace id");
                }

                let status = response.status;
                let headers = response.headers.clone();
                let raw_body = response.body.clone();
                let data = decoder(method, response)?;
                Ok((data, raw_body, status, headers))
            })
            .await?;

        let (data, raw_body, status, headers) = response;
        Ok(Response::new(
            data,
            raw_body,
            status,
            headers,
            start_time.elapsed(),
            attempts,
        ))
    }

    /// Fetches exactly one page of a list endpoint.
    ///
    /// `descriptor` must carry the pagination parameters of the wanted page;
    /// `items_key` names the item array when it is not one of `results`,
    /// `result` or `items`.
    pub async fn list_page<T>(
        &self,
        ctx: &RequestContext,
        descriptor: RequestDescriptor,
        items_key: Option<&str>,
    ) -> Result<Response<Page<T>>>
    where
        T: DeserializeOwned,
    {
        let requested = RequestedPage::from_query(descriptor.query());
        let response = self.call::<Value>(ctx, descriptor).await?;
        pagination::parse_page(response, items_key, requested)
    }

    /// Returns a lazy stream over every page of a list endpoint.
    ///
    /// Nothing is fetched until the stream is polled. Pages are fetched one at
    /// a time, in order; the stream ends after the last page or with the first
    /// error. Calling `pages` again starts a fresh traversal.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use futures::TryStreamExt;
    /// use mgc_core::{Client, ListRequest, RequestContext, RequestDescriptor};
    ///
    /// # async fn example(client: Client) -> Result<(), mgc_core::Error> {
    /// let pages = client.pages::<serde_json::Value>(
    ///     RequestContext::new(),
    ///     ListRequest::new(RequestDescriptor::get("/v0/events")).page_size(100),
    /// );
    /// futures::pin_mut!(pages);
    ///
    /// while let Some(page) = pages.try_next().await? {
    ///     println!("{} events", page.items.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn pages<T>(&self, ctx: RequestContext, request: ListRequest) -> impl Stream<Item = Result<Page<T>>>
    where
        T: DeserializeOwned,
    {
        pagination::traverse(self.clone(), ctx, request)
    }

    /// Collects every item of a list endpoint, in server order.
    ///
    /// Either all items are returned or the first error is; items collected
    /// before a failing page are discarded.
    pub async fn list_all<T>(&self, ctx: &RequestContext, request: ListRequest) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.pages::<T>(ctx.clone(), request)
            .try_fold(Vec::new(), |mut items, page| async move {
                items.extend(page.items);
                Ok(items)
            })
            .await
    }

    /// Makes a GET request to the specified path.
    pub async fn get<T>(&self, path: impl Into<String>) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        self.call(&RequestContext::new(), RequestDescriptor::get(path))
            .await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<B, T>(&self, path: impl Into<String>, body: &B) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let descriptor = RequestDescriptor::post(path).with_json(body)?;
        self.call(&RequestContext::new(), descriptor).await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<B, T>(&self, path: impl Into<String>, body: &B) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let descriptor = RequestDescriptor::put(path).with_json(body)?;
        self.call(&RequestContext::new(), descriptor).await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<B, T>(&self, path: impl Into<String>, body: &B) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let descriptor = RequestDescriptor::patch(path).with_json(body)?;
        self.call(&RequestContext::new(), descriptor).await
    }

    /// Makes a DELETE request to the specified path.
    pub async fn delete<T>(&self, path: impl Into<String>) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        self.call(&RequestContext::new(), RequestDescriptor::delete(path))
            .await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// Without a base URL the client talks to [`Region::BrSe1`]. Every request
/// carries a `User-Agent` and a 60 second per-attempt timeout unless
/// configured otherwise.
///
/// # Examples
///
/// ```no_run
/// use mgc_core::{ClientBuilder, Region, RetryPolicy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), mgc_core::Error> {
/// let client = ClientBuilder::new()
///     .region(Region::BrNe1)
///     .bearer_token("eyJhbGciOi...")?
///     .user_agent("my-tool/1.0")?
///     .default_header("X-Tenant-ID", "tenant-1")?
///     .retry_policy(RetryPolicy::default().with_jitter(true))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    region: Region,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    retry_predicate: Option<Box<dyn RetryPredicate>>,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            region: Region::default(),
            default_headers: HeaderMap::new(),
            retry_policy: RetryPolicy::default(),
            retry_predicate: None,
            timeout: Some(DEFAULT_TIMEOUT),
            transport: None,
        }
    }

    /// Sets an explicit base URL, overriding [`ClientBuilder::region`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid base URL: {}", e)))?;
        self.base_url = Some(url);
        Ok(self)
    }

    /// Targets one of the well-known regional endpoints.
    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Authenticates with an API key sent as `X-API-Key`.
    pub fn api_key(self, key: impl AsRef<str>) -> Result<Self> {
        self.auth_header(API_KEY_HEADER, key)
    }

    /// Authenticates with a bearer token sent as `Authorization`.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Result<Self> {
        self.auth_header(AUTHORIZATION.as_str(), format!("Bearer {}", token.as_ref()))
    }

    /// Sends a credential under an arbitrary header name.
    ///
    /// The value is marked sensitive and is never logged.
    pub fn auth_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, mut value) = parse_header(name.as_ref(), value.as_ref())?;
        value.set_sensitive(true);
        self.default_headers.insert(name, value);
        Ok(self)
    }

    pub fn user_agent(self, user_agent: impl AsRef<str>) -> Result<Self> {
        self.default_header(USER_AGENT.as_str(), user_agent)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets a custom retry predicate.
    ///
    /// By default, failures are retried based on [`Error::is_retryable`].
    pub fn retry_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Replaces the default `reqwest` transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the region URL cannot be parsed or if the HTTP
    /// client cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(self.region.base_url())
                .map_err(|e| Error::Configuration(format!("Invalid region URL: {}", e)))?,
        };

        let mut default_headers = self.default_headers;
        if !default_headers.contains_key(USER_AGENT) {
            default_headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let http_client = reqwest::Client::builder().build().map_err(|e| {
                    Error::Configuration(format!("Failed to build HTTP client: {}", e))
                })?;
                Arc::new(ReqwestTransport::new(http_client))
            }
        };

        let retry_predicate = self
            .retry_predicate
            .unwrap_or_else(|| Box::new(RetryOnTransient));

        tracing::debug!(
            base_url = %base_url,
            timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
            max_attempts = self.retry_policy.max_attempts,
            "Built API client"
        );

        Ok(Client {
            inner: Arc::new(Config {
                base_url,
                default_headers,
                timeout: self.timeout,
                retry_policy: self.retry_policy,
                retry_predicate,
                transport,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}
