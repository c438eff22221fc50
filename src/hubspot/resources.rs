//! Resource registry
//!
//! Maps resource names (e.g. `crm.contacts`) to their endpoints and to the
//! pagination capability the change-capture iterators rely on. The registry is
//! immutable once built and is shared through an `Arc`.

use crate::error::{Error, Result};
use crate::types::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Placeholder substituted with an item id in update/delete paths
pub const OBJECT_ID_PLACEHOLDER: &str = "{objectId}";

/// Endpoints and capabilities of a single resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    /// List endpoint
    #[serde(default)]
    pub list_path: Option<String>,
    /// Create endpoint
    #[serde(default)]
    pub create_path: Option<String>,
    /// Update endpoint, path contains `{objectId}`
    #[serde(default)]
    pub update: Option<UpdateEndpoint>,
    /// Delete endpoint, path contains `{objectId}`
    #[serde(default)]
    pub delete_path: Option<String>,
    /// How items of this resource can be paged through by time
    #[serde(default)]
    pub pagination: Option<PaginationCapability>,
}

/// Update endpoint with its HTTP method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEndpoint {
    pub path: String,
    #[serde(default = "default_update_method")]
    pub method: Method,
}

fn default_update_method() -> Method {
    Method::PATCH
}

/// Pagination capability of a readable resource. Exactly one applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationCapability {
    /// List endpoint filtered by `createdBefore`/`updatedAfter` with cursor links
    Timestamp(TimestampFields),
    /// Search endpoint filtered by properties, bounded by object id
    Search(SearchFields),
}

impl PaginationCapability {
    /// Short name used in logs and listings
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timestamp(_) => "timestamp",
            Self::Search(_) => "search",
        }
    }
}

/// Field names of a timestamp-paged resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampFields {
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub deleted_at: Option<String>,
}

/// Field and property names of a search-paged resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFields {
    /// Search endpoint
    pub path: String,
    /// Item field holding the creation time
    pub created_at: String,
    /// Item field holding the last update time
    pub updated_at: String,
    /// Searchable property matching `created_at`
    pub created_at_property: String,
    /// Searchable property matching `updated_at`
    pub updated_at_property: String,
    /// Searchable property holding the numeric object id
    #[serde(default = "default_object_id_property")]
    pub object_id_property: String,
}

fn default_object_id_property() -> String {
    "hs_object_id".to_string()
}

/// Immutable lookup of resource name to definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, ResourceDefinition>,
}

impl ResourceRegistry {
    /// Create a registry from explicit definitions
    pub fn new(resources: BTreeMap<String, ResourceDefinition>) -> Self {
        Self { resources }
    }

    /// Load a registry from a YAML document mapping names to definitions
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let resources: BTreeMap<String, ResourceDefinition> = serde_yaml::from_str(yaml)?;
        Ok(Self { resources })
    }

    /// Load a registry from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Look up a resource
    pub fn get(&self, resource: &str) -> Result<&ResourceDefinition> {
        self.resources
            .get(resource)
            .ok_or_else(|| Error::unsupported_resource(resource))
    }

    /// Look up the pagination capability of a readable resource
    pub fn capability(&self, resource: &str) -> Result<&PaginationCapability> {
        self.get(resource)?
            .pagination
            .as_ref()
            .ok_or_else(|| Error::unsupported_resource(resource))
    }

    /// Whether the resource is known at all
    pub fn contains(&self, resource: &str) -> bool {
        self.resources.contains_key(resource)
    }

    /// Iterate over all resources in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceDefinition)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// The HubSpot API v3 resources supported out of the box
    pub fn hubspot() -> Self {
        let mut resources = BTreeMap::new();

        // https://developers.hubspot.com/docs/api/cms/blog-authors
        resources.insert(
            "cms.blogs.authors".to_string(),
            cms("/cms/v3/blogs/authors", "created", "updated", Some("deletedAt")),
        );
        // https://developers.hubspot.com/docs/api/cms/blog-post
        resources.insert(
            "cms.blogs.posts".to_string(),
            cms("/cms/v3/blogs/posts", "created", "updated", Some("deletedAt")),
        );
        // https://developers.hubspot.com/docs/api/cms/blog-tags
        resources.insert(
            "cms.blogs.tags".to_string(),
            cms("/cms/v3/blogs/tags", "created", "updated", Some("deletedAt")),
        );
        // https://developers.hubspot.com/docs/api/cms/pages
        resources.insert(
            "cms.pages.landing".to_string(),
            cms(
                "/cms/v3/pages/landing-pages",
                "createdAt",
                "updatedAt",
                Some("deletedAt"),
            ),
        );
        resources.insert(
            "cms.pages.site".to_string(),
            cms(
                "/cms/v3/pages/site-pages",
                "createdAt",
                "updatedAt",
                Some("deletedAt"),
            ),
        );
        // https://developers.hubspot.com/docs/api/cms/hubdb
        let mut hubdb = cms("/cms/v3/hubdb/tables", "createdAt", "updatedAt", None);
        hubdb.update = Some(UpdateEndpoint {
            path: "/cms/v3/hubdb/tables/{objectId}/draft".to_string(),
            method: Method::PATCH,
        });
        hubdb.delete_path = Some("/cms/v3/hubdb/tables/{objectId}/draft".to_string());
        resources.insert("cms.hubdb.tables".to_string(), hubdb);
        // https://developers.hubspot.com/docs/api/cms/url-redirects
        resources.insert(
            "cms.urlRedirects".to_string(),
            cms("/cms/v3/url-redirects", "createdAt", "updatedAt", None),
        );
        // https://developers.hubspot.com/docs/api/cms/domains
        resources.insert(
            "cms.domains".to_string(),
            ResourceDefinition {
                create_path: Some("/cms/v3/domains".to_string()),
                ..Default::default()
            },
        );

        // https://developers.hubspot.com/docs/api/conversations/conversations
        for (name, path) in [
            ("conversations.channels", "channels"),
            ("conversations.channelAccounts", "channel-accounts"),
            ("conversations.inboxes", "inboxes"),
        ] {
            resources.insert(
                name.to_string(),
                ResourceDefinition {
                    create_path: Some(format!("/conversations/v3/conversations/{path}")),
                    ..Default::default()
                },
            );
        }
        resources.insert(
            "conversations.threads".to_string(),
            writable("/conversations/v3/conversations/threads", Method::PATCH),
        );

        // https://developers.hubspot.com/docs/api/crm/understanding-the-crm
        for (name, object, updated_at_property, created_at_property) in [
            ("crm.companies", "companies", "hs_lastmodifieddate", "createdate"),
            ("crm.contacts", "contacts", "lastmodifieddate", "createdate"),
            ("crm.deals", "deals", "hs_lastmodifieddate", "createdate"),
            (
                "crm.feedbackSubmissions",
                "feedback_submissions",
                "hs_lastmodifieddate",
                "hs_createdate",
            ),
            ("crm.lineItems", "line_items", "hs_lastmodifieddate", "hs_createdate"),
            ("crm.products", "products", "hs_lastmodifieddate", "hs_createdate"),
            ("crm.tickets", "tickets", "hs_lastmodifieddate", "createdate"),
            ("crm.quotes", "quotes", "hs_lastmodifieddate", "hs_createdate"),
            ("crm.calls", "calls", "hs_lastmodifieddate", "hs_createdate"),
            ("crm.emails", "emails", "hs_lastmodifieddate", "hs_createdate"),
            ("crm.meetings", "meetings", "hs_lastmodifieddate", "hs_createdate"),
            ("crm.notes", "notes", "hs_lastmodifieddate", "hs_createdate"),
            ("crm.tasks", "tasks", "hs_lastmodifieddate", "hs_createdate"),
        ] {
            let base = format!("/crm/v3/objects/{object}");
            let mut definition = writable(&base, Method::PATCH);
            definition.list_path = Some(base.clone());
            definition.pagination = Some(PaginationCapability::Search(SearchFields {
                path: format!("{base}/search"),
                created_at: "createdAt".to_string(),
                updated_at: "updatedAt".to_string(),
                created_at_property: created_at_property.to_string(),
                updated_at_property: updated_at_property.to_string(),
                object_id_property: default_object_id_property(),
            }));
            resources.insert(name.to_string(), definition);
        }

        // https://developers.hubspot.com/docs/api/marketing/forms
        resources.insert(
            "marketing.forms".to_string(),
            writable("/marketing/v3/forms", Method::PATCH),
        );
        // https://developers.hubspot.com/docs/api/settings/user-provisioning
        resources.insert(
            "settings.users".to_string(),
            writable("/settings/v3/users", Method::PUT),
        );

        Self { resources }
    }
}

/// A writable resource with the usual `{base}/{objectId}` item endpoints
fn writable(base: &str, update_method: Method) -> ResourceDefinition {
    ResourceDefinition {
        list_path: None,
        create_path: Some(base.to_string()),
        update: Some(UpdateEndpoint {
            path: format!("{base}/{OBJECT_ID_PLACEHOLDER}"),
            method: update_method,
        }),
        delete_path: Some(format!("{base}/{OBJECT_ID_PLACEHOLDER}")),
        pagination: None,
    }
}

/// A CMS resource paged by timestamp filters
fn cms(base: &str, created_at: &str, updated_at: &str, deleted_at: Option<&str>) -> ResourceDefinition {
    let mut definition = writable(base, Method::PATCH);
    definition.list_path = Some(base.to_string());
    definition.pagination = Some(PaginationCapability::Timestamp(TimestampFields {
        created_at: created_at.to_string(),
        updated_at: updated_at.to_string(),
        deleted_at: deleted_at.map(str::to_string),
    }));
    definition
}
