//! Pagination over list endpoints.
//!
//! List endpoints report their position in one of three wire shapes:
//!
//! * flat or nested offset/limit: `{"meta": {"total": 75, "offset": 0, "limit": 50}}`
//!   or `{"meta": {"page": {"total": 75, "offset": 0, "limit": 50}}}`,
//! * page/items-per-page: `{"meta": {"page": {"page": 1, "items_per_page": 50, "total": 75}}}`,
//! * cursor links: `{"meta": {"links": {"next": "...", "self": "..."}}}`.
//!
//! The shape is sniffed from each response ([`PageDescriptor::sniff`]), never
//! configured per endpoint. A traversal commits to the shape of its first page
//! and stops as soon as the last response proves there is nothing left.

use crate::client::Client;
use crate::context::RequestContext;
use crate::descriptor::RequestDescriptor;
use crate::response::Response;
use crate::{Error, Result};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

/// Page size used when a [`ListRequest`] does not set one.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

const OFFSET_PARAM: &str = "_offset";
const LIMIT_PARAM: &str = "_limit";
const PAGE_PARAM: &str = "page";
const ITEMS_PER_PAGE_PARAM: &str = "items_per_page";
const PAGINATION_PARAMS: [&str; 4] = [OFFSET_PARAM, LIMIT_PARAM, PAGE_PARAM, ITEMS_PER_PAGE_PARAM];

/// Keys probed, in order, for the item array when none is configured.
const ITEM_KEYS: [&str; 3] = ["results", "result", "items"];

/// Where a page sits in its collection, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageDescriptor {
    /// `_limit` / `_offset` with a total item count.
    OffsetLimit { limit: u64, offset: u64, total: u64 },
    /// `page` / `items_per_page` with a total item count.
    PageSize {
        page: u64,
        items_per_page: u64,
        total: u64,
    },
    /// Opaque server-provided link to the next page; `None` on the last page.
    CursorLinks { next: Option<String> },
}

/// The pagination scheme of a [`PageDescriptor`], without its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScheme {
    OffsetLimit,
    PageSize,
    CursorLinks,
}

/// The page a request asked for. Fills values a response leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedPage {
    pub offset: u64,
    pub page: u64,
    pub size: u64,
}

impl Default for RequestedPage {
    fn default() -> Self {
        Self {
            offset: 0,
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RequestedPage {
    /// Reads the pagination parameters of a descriptor's query.
    pub fn from_query(query: &[(String, String)]) -> Self {
        let lookup = |key: &str| {
            query
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.parse::<u64>().ok())
        };
        let default = Self::default();

        Self {
            offset: lookup(OFFSET_PARAM).unwrap_or(default.offset),
            page: lookup(PAGE_PARAM).unwrap_or(default.page),
            size: lookup(LIMIT_PARAM)
                .or_else(|| lookup(ITEMS_PER_PAGE_PARAM))
                .unwrap_or(default.size),
        }
    }
}

impl PageDescriptor {
    /// Detects the pagination shape of a list response body.
    ///
    /// Detection order: a `meta.links` object means cursor links; a
    /// `meta.page` object with `page`, `items_per_page` or
    /// `max_items_per_page` means page/items-per-page; any other `meta.page`
    /// object, or a flat `meta` with `total`, means offset/limit. Returns
    /// `None` when no shape matches or a required `total` is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use mgc_core::pagination::{PageDescriptor, RequestedPage};
    /// use serde_json::json;
    ///
    /// let body = json!({"meta": {"total": 75, "offset": 50, "limit": 50}, "results": []});
    /// assert_eq!(
    ///     PageDescriptor::sniff(&body, RequestedPage::default()),
    ///     Some(PageDescriptor::OffsetLimit { limit: 50, offset: 50, total: 75 })
    /// );
    /// ```
    pub fn sniff(body: &Value, requested: RequestedPage) -> Option<Self> {
        let meta = body.get("meta")?.as_object()?;

        if let Some(links) = meta.get("links").and_then(Value::as_object) {
            let next = links
                .get("next")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|next| !next.is_empty())
                .map(str::to_string);
            return Some(PageDescriptor::CursorLinks { next });
        }

        if let Some(page) = meta.get("page").and_then(Value::as_object) {
            let total = page.get("total").and_then(Value::as_u64)?;
            let number = |key: &str| page.get(key).and_then(Value::as_u64);

            let page_numbered = ["page", "items_per_page", "max_items_per_page"]
                .iter()
                .any(|key| page.contains_key(*key));
            if page_numbered {
                return Some(PageDescriptor::PageSize {
                    page: number("page").unwrap_or(requested.page),
                    items_per_page: number("items_per_page")
                        .or_else(|| number("limit"))
                        .unwrap_or(requested.size),
                    total,
                });
            }

            return Some(PageDescriptor::OffsetLimit {
                limit: number("limit").unwrap_or(requested.size),
                offset: number("offset").unwrap_or(requested.offset),
                total,
            });
        }

        let total = meta.get("total").and_then(Value::as_u64)?;
        let number = |key: &str| meta.get(key).and_then(Value::as_u64);
        Some(PageDescriptor::OffsetLimit {
            limit: number("limit").unwrap_or(requested.size),
            offset: number("offset").unwrap_or(requested.offset),
            total,
        })
    }

    pub fn scheme(&self) -> PageScheme {
        match self {
            PageDescriptor::OffsetLimit { .. } => PageScheme::OffsetLimit,
            PageDescriptor::PageSize { .. } => PageScheme::PageSize,
            PageDescriptor::CursorLinks { .. } => PageScheme::CursorLinks,
        }
    }

    /// The reported total item count, when the shape carries one.
    pub fn total(&self) -> Option<u64> {
        match self {
            PageDescriptor::OffsetLimit { total, .. } => Some(*total),
            PageDescriptor::PageSize { total, .. } => Some(*total),
            PageDescriptor::CursorLinks { .. } => None,
        }
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in server order.
    pub items: Vec<T>,
    pub descriptor: PageDescriptor,
}

/// Which pagination parameters the first page request carries.
///
/// The shape of an endpoint is only known once it answered, so by default the
/// first request carries both `_offset=0&_limit=N` and `page=1&items_per_page=N`,
/// which address the same first page. Endpoints that reject unknown
/// parameters can be limited to one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartParams {
    #[default]
    Both,
    OffsetLimit,
    PageSize,
}

/// A list endpoint to traverse: its template descriptor and traversal settings.
///
/// Pagination parameters already on the template are replaced by the
/// traversal; every other query parameter (filters, sort) is sent with every
/// page.
///
/// # Examples
///
/// ```
/// use mgc_core::{ListRequest, RequestDescriptor};
///
/// let request = ListRequest::new(
///     RequestDescriptor::get("/v1/vpcs/{vpc_id}/route_table/routes")
///         .with_path_param("vpc_id", "vpc-1"),
/// )
/// .page_size(100)
/// .items_key("result");
/// # let _ = request;
/// ```
#[derive(Debug, Clone)]
pub struct ListRequest {
    template: RequestDescriptor,
    page_size: u64,
    items_key: Option<String>,
    start: StartParams,
}

impl ListRequest {
    pub fn new(template: RequestDescriptor) -> Self {
        Self {
            template,
            page_size: DEFAULT_PAGE_SIZE,
            items_key: None,
            start: StartParams::default(),
        }
    }

    /// Items requested per page. `0` is treated as `1`.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The top-level key holding the item array (probed when unset).
    pub fn items_key(mut self, key: impl Into<String>) -> Self {
        self.items_key = Some(key.into());
        self
    }

    pub fn start_params(mut self, start: StartParams) -> Self {
        self.start = start;
        self
    }

    pub fn template(&self) -> &RequestDescriptor {
        &self.template
    }
}

/// Splits one decoded list response into its items and page descriptor.
pub(crate) fn parse_page<T: DeserializeOwned>(
    response: Response<Value>,
    items_key: Option<&str>,
    requested: RequestedPage,
) -> Result<Response<Page<T>>> {
    let Response {
        mut data,
        raw_body,
        status,
        headers,
        latency,
        attempts,
    } = response;

    let Some(descriptor) = PageDescriptor::sniff(&data, requested) else {
        return Err(Error::decode(
            status,
            "response carries no recognizable pagination metadata",
            raw_body,
        ));
    };

    let items = match take_items(&mut data, items_key) {
        Ok(items) => items,
        Err(message) => return Err(Error::decode(status, message, raw_body)),
    };
    let items = match serde_json::from_value::<Vec<T>>(items) {
        Ok(items) => items,
        Err(e) => return Err(Error::decode(status, e.to_string(), raw_body)),
    };

    Ok(Response::new(
        Page { items, descriptor },
        raw_body,
        status,
        headers,
        latency,
        attempts,
    ))
}

fn take_items(body: &mut Value, items_key: Option<&str>) -> std::result::Result<Value, String> {
    let fields = body
        .as_object_mut()
        .ok_or_else(|| "list response is not a JSON object".to_string())?;

    let key = match items_key {
        Some(key) => key.to_string(),
        None => ITEM_KEYS
            .iter()
            .find(|key| fields.get(**key).is_some_and(Value::is_array))
            .map(|key| key.to_string())
            .ok_or_else(|| format!("list response has none of the item keys {ITEM_KEYS:?}"))?,
    };

    match fields.remove(&key) {
        Some(items @ Value::Array(_)) => Ok(items),
        Some(_) => Err(format!("`{key}` is not an array")),
        None => Err(format!("list response has no `{key}` field")),
    }
}

/// Reads the query pairs out of an opaque next-page link.
///
/// Accepts absolute URLs, relative paths with a query, `?a=b` fragments and
/// bare `a=b&c=d` strings.
fn link_query(link: &str) -> Vec<(String, String)> {
    let query = match link.split_once('?') {
        Some((_, query)) => query,
        None if link.contains('=') => link,
        None => "",
    };
    let query = query.split('#').next().unwrap_or_default();

    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

enum Step {
    Start,
    Offset(u64),
    Page(u64),
    Link(Vec<(String, String)>),
    Done,
}

/// State of one `list_all` / `pages` traversal. Never shared between calls.
struct Traversal {
    client: Client,
    ctx: RequestContext,
    request: ListRequest,
    step: Step,
    scheme: Option<PageScheme>,
    pages: usize,
    /// Link queries already requested; a repeat means the server cycles.
    followed: HashSet<Vec<(String, String)>>,
}

impl Traversal {
    fn new(client: Client, ctx: RequestContext, request: ListRequest) -> Self {
        Self {
            client,
            ctx,
            request,
            step: Step::Start,
            scheme: None,
            pages: 0,
            followed: HashSet::new(),
        }
    }

    fn next_descriptor(&self) -> Option<(RequestDescriptor, RequestedPage)> {
        let size = self.request.page_size;
        let template = &self.request.template;
        let pair = |key: &str, value: u64| (key.to_string(), value.to_string());

        let (params, requested) = match &self.step {
            Step::Done => return None,
            Step::Start => {
                let mut params = Vec::new();
                if self.request.start != StartParams::PageSize {
                    params.push(pair(OFFSET_PARAM, 0));
                    params.push(pair(LIMIT_PARAM, size));
                }
                if self.request.start != StartParams::OffsetLimit {
                    params.push(pair(PAGE_PARAM, 1));
                    params.push(pair(ITEMS_PER_PAGE_PARAM, size));
                }
                (params, RequestedPage { offset: 0, page: 1, size })
            }
            Step::Offset(offset) => (
                vec![pair(OFFSET_PARAM, *offset), pair(LIMIT_PARAM, size)],
                RequestedPage { offset: *offset, page: 1, size },
            ),
            Step::Page(page) => (
                vec![pair(PAGE_PARAM, *page), pair(ITEMS_PER_PAGE_PARAM, size)],
                RequestedPage { offset: 0, page: *page, size },
            ),
            Step::Link(pairs) => {
                let mut keys: Vec<&str> = PAGINATION_PARAMS.to_vec();
                keys.extend(pairs.iter().map(|(k, _)| k.as_str()));
                let descriptor = template.with_replaced_query(&keys, pairs.clone());
                return Some((descriptor, RequestedPage::from_query(pairs)));
            }
        };

        Some((template.with_replaced_query(&PAGINATION_PARAMS, params), requested))
    }

    async fn next_page<T: DeserializeOwned>(&mut self) -> Result<Option<Page<T>>> {
        let Some((descriptor, requested)) = self.next_descriptor() else {
            return Ok(None);
        };

        let response = self.client.call::<Value>(&self.ctx, descriptor).await?;
        let response = parse_page::<T>(response, self.request.items_key.as_deref(), requested)?;
        let scheme = response.data.descriptor.scheme();

        match self.scheme {
            Some(committed) if committed != scheme => {
                return Err(Error::decode(
                    response.status,
                    format!("pagination changed from {committed:?} to {scheme:?} mid-traversal"),
                    response.raw_body,
                ));
            }
            Some(_) => {}
            None => self.scheme = Some(scheme),
        }
        self.pages += 1;

        let count = response.data.items.len() as u64;
        let size = self.request.page_size;
        let next = match &response.data.descriptor {
            PageDescriptor::OffsetLimit { total, .. } => {
                let next_offset = requested.offset.saturating_add(size);
                if count < size || next_offset >= *total {
                    Step::Done
                } else {
                    Step::Offset(next_offset)
                }
            }
            PageDescriptor::PageSize {
                page,
                items_per_page,
                total,
            } => {
                if count == 0 || page.saturating_mul(*items_per_page) >= *total {
                    Step::Done
                } else {
                    Step::Page(page + 1)
                }
            }
            PageDescriptor::CursorLinks { next: None } => Step::Done,
            PageDescriptor::CursorLinks { next: Some(link) } => {
                let pairs = link_query(link);
                if pairs.is_empty() || !self.followed.insert(pairs.clone()) {
                    return Err(Error::decode(
                        response.status,
                        format!("next-page link {link:?} does not advance the traversal"),
                        response.raw_body,
                    ));
                }
                Step::Link(pairs)
            }
        };

        tracing::debug!(
            path = %self.request.template.path(),
            page = self.pages,
            scheme = ?scheme,
            items = count,
            total = ?response.data.descriptor.total(),
            done = matches!(next, Step::Done),
            "Fetched list page"
        );

        self.step = next;
        Ok(Some(response.data))
    }
}

/// A lazy stream of pages; each call starts a fresh traversal.
pub(crate) fn traverse<T: DeserializeOwned>(
    client: Client,
    ctx: RequestContext,
    request: ListRequest,
) -> impl Stream<Item = Result<Page<T>>> {
    futures::stream::try_unfold(
        Traversal::new(client, ctx, request),
        |mut traversal| async move {
            let page = traversal.next_page::<T>().await?;
            Ok::<_, Error>(page.map(|page| (page, traversal)))
        },
    )
}
