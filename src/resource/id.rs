//! Resource identities
//!
//! Identities are slash-delimited hierarchical paths,
//! `{parentId}/{moduleName}/{resourceName}`, compared case-insensitively.
//! Scopes that live under a resource group embed [`RESOURCE_GROUP_PLACEHOLDER`]
//! in their id; it is substituted when a child id is built.

/// Token standing for "no resource group / global scope"
pub const RESOURCE_GROUP_PLACEHOLDER: &str = "${rg}";

const RESOURCE_GROUPS_SEGMENT: &str = "resourceGroups";

/// Build the identity of `name` in module `module_name` under `parent_id`
pub fn format_id(parent_id: &str, module_name: &str, name: &str, resource_group: &str) -> String {
    format!("{}/{}/{}", parent_id, module_name, name)
        .replace(RESOURCE_GROUP_PLACEHOLDER, resource_group)
}

/// Normalized cache key for an identity
pub fn cache_key(id: &str) -> String {
    id.to_lowercase()
}

/// Whether a resource group value means "unscoped"
pub fn is_unscoped(resource_group: Option<&str>) -> bool {
    match resource_group.map(str::trim) {
        None | Some("") => true,
        Some(rg) => rg.eq_ignore_ascii_case(RESOURCE_GROUP_PLACEHOLDER),
    }
}

/// First value naming an actual resource group
pub fn first_scoped<'a>(values: &[Option<&'a str>]) -> Option<&'a str> {
    values
        .iter()
        .flatten()
        .copied()
        .find(|v| !is_unscoped(Some(v)))
}

/// Parsed form of an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    /// Identity of the owning scope
    pub parent: String,
    /// Name of the collection within the parent
    pub module: String,
    /// Resource name (last segment)
    pub name: String,
    /// Resource group found in the path, if any
    pub resource_group: Option<String>,
}

impl ResourceId {
    /// Parse `{parent}/{module}/{name}`. Returns `None` when fewer than
    /// two segments are present.
    pub fn parse(id: &str) -> Option<Self> {
        let trimmed = id.trim_end_matches('/');
        let (rest, name) = trimmed.rsplit_once('/')?;
        let (parent, module) = rest.rsplit_once('/').unwrap_or(("", rest));
        if name.is_empty() || module.is_empty() {
            return None;
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        let resource_group = segments
            .iter()
            .position(|s| s.eq_ignore_ascii_case(RESOURCE_GROUPS_SEGMENT))
            .and_then(|i| segments.get(i + 1))
            .filter(|rg| !rg.is_empty() && **rg != RESOURCE_GROUP_PLACEHOLDER)
            .map(|rg| rg.to_string());

        Some(Self {
            parent: parent.to_string(),
            module: module.to_string(),
            name: name.to_string(),
            resource_group,
        })
    }
}
