//! Resources that execute tasks

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource identifier, e.g. `"OR1"` or `"B_BED12"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A resource and the type that decides which tasks it may execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    id: ResourceId,
    resource_type: String,
}

impl Resource {
    pub fn new(id: impl Into<ResourceId>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Enumerate `count` resources of one type, named `{prefix}1..={prefix}{count}`.
///
/// # Example
/// ```
/// use case_sim_core::models::resource::numbered;
///
/// let beds = numbered("A_BED", "A_BED", 2);
/// assert_eq!(beds[1].id().as_str(), "A_BED2");
/// ```
pub fn numbered(prefix: &str, resource_type: &str, count: usize) -> Vec<Resource> {
    (1..=count)
        .map(|n| Resource::new(format!("{prefix}{n}"), resource_type))
        .collect()
}
