//! VPCs and VPC routes.

use crate::pagination::{ListRequest, StartParams};
use crate::services::require;
use crate::{Client, Error, RequestContext, RequestDescriptor, Result};
use serde::{Deserialize, Serialize};

/// Items per page when walking route tables; the largest the API accepts.
const ROUTES_PAGE_SIZE: u64 = 100;

const ROUTE_SORT_FIELDS: [&str; 7] = [
    "id",
    "port_id",
    "vpc_id",
    "description",
    "cidr_destination",
    "type",
    "status",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vpc {
    pub id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub router_id: Option<String>,
    #[serde(default)]
    pub external_network: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateVpcRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct CreatedResource {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VpcList {
    vpcs: Vec<Vpc>,
}

#[derive(Debug, Serialize)]
struct RenameVpc<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListVpcOptions {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// `field:asc` or `field:desc`.
    pub sort: Option<String>,
    /// Related collections to inline, such as `subnets` or `security_groups`.
    pub expand: Vec<String>,
}

/// Manages VPCs.
#[derive(Debug, Clone)]
pub struct VpcService {
    client: Client,
}

impl VpcService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Lists VPCs in one call; this endpoint reports no pagination metadata.
    pub async fn list(&self, ctx: &RequestContext, options: &ListVpcOptions) -> Result<Vec<Vpc>> {
        let mut descriptor = RequestDescriptor::get("/v0/vpcs")
            .with_optional_query_param("_limit", options.limit)
            .with_optional_query_param("_offset", options.offset)
            .with_optional_query_param("_sort", options.sort.as_ref());
        if !options.expand.is_empty() {
            descriptor = descriptor.with_query_param("expand", options.expand.join(","));
        }

        let list = self.client.call::<VpcList>(ctx, descriptor).await?;
        Ok(list.data.vpcs)
    }

    pub async fn get(&self, ctx: &RequestContext, id: &str, expand: &[&str]) -> Result<Vpc> {
        let mut descriptor = RequestDescriptor::get("/v0/vpcs/{id}").with_path_param("id", id);
        if !expand.is_empty() {
            descriptor = descriptor.with_query_param("expand", expand.join(","));
        }

        Ok(self.client.call(ctx, descriptor).await?.data)
    }

    /// Creates a VPC and returns its id.
    pub async fn create(&self, ctx: &RequestContext, request: &CreateVpcRequest) -> Result<String> {
        require("name", &request.name)?;
        let descriptor = RequestDescriptor::post("/v1/vpcs").with_json(request)?;

        let created = self.client.call::<CreatedResource>(ctx, descriptor).await?;
        Ok(created.data.id)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        let descriptor = RequestDescriptor::delete("/v1/vpcs/{id}").with_path_param("id", id);
        self.client.execute(ctx, descriptor).await?;
        Ok(())
    }

    pub async fn rename(&self, ctx: &RequestContext, id: &str, name: &str) -> Result<()> {
        require("name", name)?;
        let descriptor = RequestDescriptor::patch("/v0/vpcs/{id}/rename")
            .with_path_param("id", id)
            .with_json(&RenameVpc { name })?;

        self.client.execute(ctx, descriptor).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Processing,
    Created,
    Pending,
    Deleting,
    Deleted,
    Updating,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDetail {
    pub id: String,
    pub port_id: String,
    pub cidr_destination: String,
    #[serde(default)]
    pub description: Option<String>,
    pub next_hop: String,
    #[serde(rename = "type")]
    pub route_type: String,
    pub status: RouteStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(flatten)]
    pub detail: RouteDetail,
    pub vpc_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRouteRequest {
    pub port_id: String,
    pub cidr_destination: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateRouteResponse {
    pub id: String,
    pub status: RouteStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRoutesOptions {
    pub zone: Option<String>,
    /// `field:asc` or `field:desc`.
    pub sort: Option<String>,
}

/// Manages the routes of a VPC's route table.
#[derive(Debug, Clone)]
pub struct RouteService {
    client: Client,
}

impl RouteService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, ctx: &RequestContext, vpc_id: &str, route_id: &str) -> Result<Route> {
        let descriptor = RequestDescriptor::get("/v1/vpcs/{vpc_id}/route_table/{route_id}")
            .with_path_param("vpc_id", vpc_id)
            .with_path_param("route_id", route_id);

        Ok(self.client.call(ctx, descriptor).await?.data)
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        vpc_id: &str,
        request: &CreateRouteRequest,
    ) -> Result<CreateRouteResponse> {
        require("port_id", &request.port_id)?;
        require("cidr_destination", &request.cidr_destination)?;
        let descriptor = RequestDescriptor::post("/v1/vpcs/{vpc_id}/route_table/routes")
            .with_path_param("vpc_id", vpc_id)
            .with_json(request)?;

        Ok(self.client.call(ctx, descriptor).await?.data)
    }

    pub async fn delete(&self, ctx: &RequestContext, vpc_id: &str, route_id: &str) -> Result<()> {
        let descriptor = RequestDescriptor::delete("/v1/vpcs/{vpc_id}/route_table/{route_id}")
            .with_path_param("vpc_id", vpc_id)
            .with_path_param("route_id", route_id);

        self.client.execute(ctx, descriptor).await?;
        Ok(())
    }

    /// Fetches every route of the VPC, following the server's page links.
    pub async fn list_all(
        &self,
        ctx: &RequestContext,
        vpc_id: &str,
        options: &ListRoutesOptions,
    ) -> Result<Vec<RouteDetail>> {
        if let Some(sort) = &options.sort {
            validate_sort(sort)?;
        }
        let template = RequestDescriptor::get("/v1/vpcs/{vpc_id}/route_table/routes")
            .with_path_param("vpc_id", vpc_id)
            .with_optional_query_param("zone", options.zone.as_ref())
            .with_optional_query_param("sort", options.sort.as_ref());

        let request = ListRequest::new(template)
            .page_size(ROUTES_PAGE_SIZE)
            .items_key("result")
            .start_params(StartParams::PageSize);
        self.client.list_all(ctx, request).await
    }
}

fn validate_sort(sort: &str) -> Result<()> {
    let Some((field, direction)) = sort.split_once(':') else {
        return Err(Error::validation("sort", "expected field:asc|desc"));
    };

    let field = field.to_lowercase();
    if !ROUTE_SORT_FIELDS.contains(&field.as_str()) {
        return Err(Error::validation(
            "sort",
            format!("unknown field {field:?}, expected one of {}", ROUTE_SORT_FIELDS.join(", ")),
        ));
    }
    if !matches!(direction.to_lowercase().as_str(), "asc" | "desc") {
        return Err(Error::validation("sort", "direction must be asc or desc"));
    }
    Ok(())
}
