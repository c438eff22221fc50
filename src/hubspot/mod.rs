//! HubSpot API v3 module
//!
//! - [`HubSpotClient`]: list, search, create, update and delete calls
//! - [`ResourceApi`]: the read seam the change-capture iterators consume
//! - [`ResourceRegistry`]: resource name to endpoints and pagination capability
//! - Wire models: [`ListOptions`], [`ListResponse`], [`SearchRequest`], [`Item`]

mod client;
mod resources;
mod types;

pub use client::{HubSpotClient, HubSpotClientConfig, ResourceApi, DEFAULT_BASE_URL};
pub use resources::{
    PaginationCapability, ResourceDefinition, ResourceRegistry, SearchFields, TimestampFields,
    UpdateEndpoint, OBJECT_ID_PLACEHOLDER,
};
pub use types::{
    format_query_time, format_rfc3339, search_time_value, Filter, FilterGroup, FilterOperator,
    Item, ListOptions, ListResponse, Paging, PagingNext, SearchRequest, SearchSort,
    SortDirection, FIELD_ID,
};
