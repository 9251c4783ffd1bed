use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::folder::GENERAL_FOLDER_UID;

/// What a library element holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ElementKind {
    Panel = 1,
    Variable = 2,
}

impl TryFrom<i64> for ElementKind {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ElementKind::Panel),
            2 => Ok(ElementKind::Variable),
            other => Err(format!("invalid kind {}", other)),
        }
    }
}

impl From<ElementKind> for i64 {
    fn from(kind: ElementKind) -> Self {
        kind as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaUser {
    pub id: i64,
    pub name: String,
}

/// A stored library element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryElement {
    pub id: i64,
    pub org_id: i64,
    /// `None` means the General folder
    pub folder_uid: Option<String>,
    pub uid: String,
    pub name: String,
    pub kind: ElementKind,
    pub element_type: String,
    pub description: String,
    pub model: Value,
    pub version: i64,
    pub created: DateTime<Utc>,
    pub created_by: MetaUser,
    pub updated: DateTime<Utc>,
    pub updated_by: MetaUser,
}

impl LibraryElement {
    pub fn folder_uid_or_general(&self) -> &str {
        self.folder_uid.as_deref().unwrap_or(GENERAL_FOLDER_UID)
    }

    pub fn summary(&self) -> LibraryElementSummary {
        LibraryElementSummary {
            uid: self.uid.clone(),
            name: self.name.clone(),
            kind: self.kind,
            element_type: self.element_type.clone(),
            folder_uid: self.folder_uid.clone(),
        }
    }
}

/// Fields an insert supplies; the store assigns `id`
#[derive(Debug, Clone)]
pub struct NewLibraryElement {
    pub org_id: i64,
    pub folder_uid: Option<String>,
    pub uid: String,
    pub name: String,
    pub kind: ElementKind,
    pub element_type: String,
    pub description: String,
    pub model: Value,
    pub created: DateTime<Utc>,
    pub created_by: MetaUser,
}

/// Minimal shape used for permission filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryElementSummary {
    pub uid: String,
    pub name: String,
    pub kind: ElementKind,
    #[serde(rename = "type")]
    pub element_type: String,
    pub folder_uid: Option<String>,
}

/// Anything the permission filter can scope by uid
pub trait ElementScope {
    fn element_uid(&self) -> &str;
}

impl ElementScope for LibraryElement {
    fn element_uid(&self) -> &str {
        &self.uid
    }
}

impl ElementScope for LibraryElementSummary {
    fn element_uid(&self) -> &str {
        &self.uid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryElementDtoMeta {
    pub folder_name: String,
    pub folder_uid: String,
    pub connected_dashboards: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub created_by: MetaUser,
    pub updated_by: MetaUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryElementDto {
    pub id: i64,
    pub org_id: i64,
    pub folder_uid: String,
    pub uid: String,
    pub name: String,
    pub kind: ElementKind,
    #[serde(rename = "type")]
    pub element_type: String,
    pub description: String,
    pub model: Value,
    pub version: i64,
    pub meta: LibraryElementDtoMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLibraryElementCommand {
    #[serde(default)]
    pub folder_uid: Option<String>,
    pub name: String,
    pub model: Value,
    pub kind: i64,
    #[serde(default)]
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchLibraryElementCommand {
    #[serde(default)]
    pub folder_uid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<Value>,
    pub kind: i64,
    pub version: i64,
    #[serde(default)]
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "alpha-asc")]
    AlphaAsc,
    #[serde(rename = "alpha-desc")]
    AlphaDesc,
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alpha-asc" => Ok(SortDirection::AlphaAsc),
            "alpha-desc" => Ok(SortDirection::AlphaDesc),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

/// Listing parameters. Zero page values fall back to the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLibraryElementsQuery {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub search_string: Option<String>,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub kind: Option<ElementKind>,
    /// Comma separated panel types
    #[serde(default)]
    pub type_filter: Option<String>,
    #[serde(default)]
    pub exclude_uid: Option<String>,
    /// Comma separated folder uids; `general` selects the General folder
    #[serde(default)]
    pub folder_filter_uids: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryElementSearchResult {
    pub total_count: i64,
    pub elements: Vec<LibraryElementDto>,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ConnectionKind {
    Dashboard = 1,
}

impl TryFrom<i64> for ConnectionKind {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ConnectionKind::Dashboard),
            other => Err(format!("invalid connection kind {}", other)),
        }
    }
}

impl From<ConnectionKind> for i64 {
    fn from(kind: ConnectionKind) -> Self {
        kind as i64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryElementConnection {
    pub id: i64,
    pub element_id: i64,
    pub kind: ConnectionKind,
    pub connection_uid: String,
    pub created: DateTime<Utc>,
    pub created_by: MetaUser,
}

/// Splits a comma separated filter, dropping blanks
pub(crate) fn split_filter(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_serializes_as_integer() {
        assert_eq!(serde_json::to_value(ElementKind::Variable).unwrap(), json!(2));
        assert_eq!(serde_json::from_value::<ElementKind>(json!(1)).unwrap(), ElementKind::Panel);
        assert!(serde_json::from_value::<ElementKind>(json!(3)).is_err());
    }

    #[test]
    fn search_query_uses_camel_case() {
        let query: SearchLibraryElementsQuery = serde_json::from_value(json!({
            "perPage": 1,
            "page": 2,
            "searchString": "panel",
            "sortDirection": "alpha-desc",
            "typeFilter": "gauge,bargauge",
            "folderFilterUids": "general"
        }))
        .unwrap();

        assert_eq!(query.per_page, 1);
        assert_eq!(query.page, 2);
        assert_eq!(query.sort_direction, SortDirection::AlphaDesc);
        assert_eq!(split_filter(query.type_filter.as_deref()), vec!["gauge", "bargauge"]);
    }

    #[test]
    fn split_filter_drops_blanks() {
        assert_eq!(split_filter(Some(" a, ,b ,")), vec!["a", "b"]);
        assert!(split_filter(None).is_empty());
    }
}
