//! Audit events.

use crate::pagination::{ListRequest, Page, StartParams};
use crate::{Client, RequestContext, RequestDescriptor, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const EVENTS_PATH: &str = "/v0/events";
const EVENTS_KEY: &str = "results";

/// An action recorded by the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "specversion")]
    pub spec_version: String,
    pub subject: String,
    /// Local date-time without zone, as sent by the server.
    pub time: String,
    #[serde(rename = "authid")]
    pub auth_id: String,
    #[serde(rename = "authtype")]
    pub auth_type: String,
    pub product: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "tenantid")]
    pub tenant_id: String,
    #[serde(default)]
    pub data: Value,
}

/// Filters shared by [`EventService::list`] and [`EventService::list_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub id: Option<String>,
    pub source_like: Option<String>,
    pub type_like: Option<String>,
    pub product_like: Option<String>,
    pub auth_id: Option<String>,
    pub tenant_id: Option<String>,
    /// Matches on event payload fields, sent as `data.<key>=<value>`.
    pub data: BTreeMap<String, String>,
}

impl EventFilter {
    fn apply(&self, descriptor: RequestDescriptor) -> RequestDescriptor {
        descriptor
            .with_optional_query_param("id", self.id.as_ref())
            .with_optional_query_param("source__like", self.source_like.as_ref())
            .with_optional_query_param("type__like", self.type_like.as_ref())
            .with_optional_query_param("product__like", self.product_like.as_ref())
            .with_optional_query_param("authid", self.auth_id.as_ref())
            .with_optional_query_param("X-Tenant-ID", self.tenant_id.as_ref())
            .with_query_params(
                self.data
                    .iter()
                    .map(|(key, value)| (format!("data.{key}"), value.clone())),
            )
    }
}

/// One page request for [`EventService::list`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListEventsParams {
    pub filter: EventFilter,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Lists audit events.
///
/// # Examples
///
/// ```no_run
/// use mgc_core::services::audit::{EventFilter, EventService};
/// use mgc_core::{Client, RequestContext};
///
/// # async fn example() -> Result<(), mgc_core::Error> {
/// let events = EventService::new(Client::builder().api_key("secret")?.build()?);
/// let filter = EventFilter {
///     product_like: Some("network".to_string()),
///     ..Default::default()
/// };
///
/// for event in events.list_all(&RequestContext::new(), &filter).await? {
///     println!("{} {}", event.time, event.event_type);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EventService {
    client: Client,
}

impl EventService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetches one page of events.
    pub async fn list(&self, ctx: &RequestContext, params: &ListEventsParams) -> Result<Page<Event>> {
        let descriptor = params
            .filter
            .apply(RequestDescriptor::get(EVENTS_PATH))
            .with_optional_query_param("_limit", params.limit)
            .with_optional_query_param("_offset", params.offset);

        let page = self
            .client
            .list_page(ctx, descriptor, Some(EVENTS_KEY))
            .await?;
        Ok(page.data)
    }

    /// Fetches every event matching `filter`.
    pub async fn list_all(&self, ctx: &RequestContext, filter: &EventFilter) -> Result<Vec<Event>> {
        let request = ListRequest::new(filter.apply(RequestDescriptor::get(EVENTS_PATH)))
            .items_key(EVENTS_KEY)
            .start_params(StartParams::OffsetLimit);
        self.client.list_all(ctx, request).await
    }
}
