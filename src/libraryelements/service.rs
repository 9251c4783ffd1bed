use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::filter::{filter_by_permission, read_evaluator};
use super::guard::LibraryPanelScopeResolver;
use super::model::{
    split_filter, CreateLibraryElementCommand, ElementKind, ElementScope, LibraryElement,
    LibraryElementConnection, LibraryElementDto, LibraryElementDtoMeta, LibraryElementSearchResult, MetaUser,
    NewLibraryElement, PatchLibraryElementCommand, SearchLibraryElementsQuery, SortDirection,
};
use super::store::LibraryElementStore;
use super::LibraryElementError;
use crate::accesscontrol::{
    folder_scope, library_panel_scope, AccessControl, Evaluator, ScopedAccessControl, SignedInUser,
    ACTION_LIBRARY_PANELS_CREATE, ACTION_LIBRARY_PANELS_DELETE, ACTION_LIBRARY_PANELS_WRITE,
};
use crate::config::{self, LibraryConfig};
use crate::context::RequestContext;
use crate::folder::tree::is_general;
use crate::folder::{FolderScopeResolver, FolderTree, FolderTreeCache, GENERAL_FOLDER_UID};

/// Reusable panels and variables, scoped to folders.
pub struct LibraryElementService {
    store: Arc<dyn LibraryElementStore>,
    folders: Arc<FolderTreeCache>,
    access: Arc<dyn AccessControl>,
    config: LibraryConfig,
}

impl LibraryElementService {
    pub fn new(
        store: Arc<dyn LibraryElementStore>,
        folders: Arc<FolderTreeCache>,
        access: Arc<dyn AccessControl>,
    ) -> Self {
        Self {
            store,
            folders,
            access,
            config: config::config().library.clone(),
        }
    }

    /// Service whose permission checks resolve library panels and folders
    /// through the folder tree cache.
    pub fn with_scoped_access(store: Arc<dyn LibraryElementStore>, folders: Arc<FolderTreeCache>) -> Self {
        let access = ScopedAccessControl::new()
            .with_resolver(Arc::new(FolderScopeResolver::new(Arc::clone(&folders))))
            .with_resolver(Arc::new(LibraryPanelScopeResolver::new(
                Arc::clone(&store),
                Arc::clone(&folders),
            )));
        Self::new(store, folders, Arc::new(access))
    }

    pub fn with_config(mut self, config: LibraryConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        cmd: CreateLibraryElementCommand,
    ) -> Result<LibraryElementDto, LibraryElementError> {
        ctx.ensure_active()?;
        let user = ctx.user();

        let name = cmd.name.trim().to_string();
        if name.is_empty() {
            return Err(LibraryElementError::NameMissing);
        }
        let kind = parse_kind(cmd.kind)?;
        let uid = match cmd.uid.filter(|u| !u.is_empty()) {
            Some(uid) => {
                self.validate_uid(&uid)?;
                uid
            }
            None => Uuid::new_v4().simple().to_string(),
        };
        let folder_uid = normalize_folder(cmd.folder_uid);

        let tree = self.require_folder(ctx, folder_uid.as_deref()).await?;
        self.require(ctx, create_evaluator(folder_uid.as_deref())).await?;

        let (model, element_type, description) = model_details(kind, &name, cmd.model)?;
        let element = self
            .store
            .insert(NewLibraryElement {
                org_id: user.org_id,
                folder_uid,
                uid,
                name,
                kind,
                element_type,
                description,
                model,
                created: Utc::now(),
                created_by: meta_user(user),
            })
            .await?;

        info!(org_id = element.org_id, uid = %element.uid, name = %element.name, "Created library element");
        Ok(to_dto(&tree, element, 0))
    }

    pub async fn get(&self, ctx: &RequestContext, uid: &str) -> Result<LibraryElementDto, LibraryElementError> {
        ctx.ensure_active()?;
        let element = self.load(ctx.user(), uid).await?;
        self.require(ctx, read_evaluator(&element.uid)).await?;

        let tree = self.folders.get(ctx, ctx.user()).await?;
        let connected = self.store.connection_count(element.id).await?;
        Ok(to_dto(&tree, element, connected))
    }

    /// Search the org's library elements the user may read.
    ///
    /// Paging applies after permission filtering, so `total_count` only
    /// counts readable elements.
    pub async fn get_all(
        &self,
        ctx: &RequestContext,
        query: SearchLibraryElementsQuery,
    ) -> Result<LibraryElementSearchResult, LibraryElementError> {
        ctx.ensure_active()?;
        let user = ctx.user();

        let per_page = match query.per_page {
            0 => self.config.default_per_page,
            n => n.min(self.config.max_per_page),
        };
        let page = query.page.max(1);

        let search = query
            .search_string
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let type_filter = split_filter(query.type_filter.as_deref());
        let folder_filter: Vec<String> = split_filter(query.folder_filter_uids.as_deref())
            .into_iter()
            .map(|f| if is_general(&f) { GENERAL_FOLDER_UID.to_string() } else { f })
            .collect();

        let mut candidates = self.store.list(user.org_id, query.kind).await?;
        candidates.retain(|e| {
            if query.exclude_uid.as_deref() == Some(e.uid.as_str()) {
                return false;
            }
            if let Some(search) = &search {
                if !e.name.to_lowercase().contains(search) && !e.description.to_lowercase().contains(search) {
                    return false;
                }
            }
            if !type_filter.is_empty() && !type_filter.iter().any(|t| t == &e.element_type) {
                return false;
            }
            if !folder_filter.is_empty() && !folder_filter.iter().any(|f| f == e.folder_uid_or_general()) {
                return false;
            }
            true
        });

        // A folder outage fails the listing instead of hiding every element
        let tree = self.folders.get(ctx, user).await?;
        let mut elements = filter_by_permission(self.access.as_ref(), ctx, candidates).await?;
        elements.sort_by(|a, b| compare_names(a, b, query.sort_direction));

        let total_count = elements.len() as i64;
        let offset = (page as usize - 1).saturating_mul(per_page as usize);
        let page_elements: Vec<LibraryElement> =
            elements.into_iter().skip(offset).take(per_page as usize).collect();

        let mut dtos = Vec::with_capacity(page_elements.len());
        for element in page_elements {
            let connected = self.store.connection_count(element.id).await?;
            dtos.push(to_dto(&tree, element, connected));
        }

        Ok(LibraryElementSearchResult {
            total_count,
            elements: dtos,
            page,
            per_page,
        })
    }

    pub async fn patch(
        &self,
        ctx: &RequestContext,
        uid: &str,
        cmd: PatchLibraryElementCommand,
    ) -> Result<LibraryElementDto, LibraryElementError> {
        ctx.ensure_active()?;
        let user = ctx.user();

        let mut element = self.load(user, uid).await?;
        self.require(ctx, write_evaluator(&element.uid)).await?;
        let kind = parse_kind(cmd.kind)?;
        if kind != element.kind {
            return Err(LibraryElementError::InvalidKind(cmd.kind));
        }
        if cmd.version != element.version {
            return Err(LibraryElementError::VersionMismatch);
        }
        let expected_version = element.version;

        if let Some(folder) = cmd.folder_uid {
            let folder_uid = normalize_folder(Some(folder));
            if folder_uid != element.folder_uid {
                self.require_folder(ctx, folder_uid.as_deref()).await?;
                self.require(ctx, create_evaluator(folder_uid.as_deref())).await?;
                element.folder_uid = folder_uid;
            }
        }
        if let Some(name) = cmd.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(LibraryElementError::NameMissing);
            }
            element.name = name.to_string();
        }
        if let Some(new_uid) = cmd.uid.filter(|u| !u.is_empty() && u != uid) {
            self.validate_uid(&new_uid)?;
            element.uid = new_uid;
        }

        let model = cmd.model.unwrap_or_else(|| element.model.clone());
        let (model, element_type, description) = model_details(kind, &element.name, model)?;
        element.model = model;
        element.element_type = element_type;
        element.description = description;
        element.version += 1;
        element.updated = Utc::now();
        element.updated_by = meta_user(user);

        if !self.store.update(&element, expected_version).await? {
            return Err(LibraryElementError::VersionMismatch);
        }

        let tree = self.folders.get(ctx, user).await?;
        let connected = self.store.connection_count(element.id).await?;
        Ok(to_dto(&tree, element, connected))
    }

    /// Removes an element that no dashboard uses. Returns its id.
    pub async fn delete(&self, ctx: &RequestContext, uid: &str) -> Result<i64, LibraryElementError> {
        ctx.ensure_active()?;
        let user = ctx.user();

        let element = self.load(user, uid).await?;
        self.require(
            ctx,
            Evaluator::permission(ACTION_LIBRARY_PANELS_DELETE, vec![library_panel_scope(&element.uid)]),
        )
        .await?;

        if self.store.connection_count(element.id).await? > 0 {
            return Err(LibraryElementError::HasConnections);
        }
        if !self.store.delete(user.org_id, element.id).await? {
            return Err(LibraryElementError::NotFound);
        }

        info!(org_id = user.org_id, uid = %element.uid, "Deleted library element");
        Ok(element.id)
    }

    pub async fn get_connections(
        &self,
        ctx: &RequestContext,
        uid: &str,
    ) -> Result<Vec<LibraryElementConnection>, LibraryElementError> {
        ctx.ensure_active()?;
        let element = self.load(ctx.user(), uid).await?;
        self.require(ctx, read_evaluator(&element.uid)).await?;
        Ok(self.store.connections(element.id).await?)
    }

    pub async fn connect(
        &self,
        ctx: &RequestContext,
        uid: &str,
        dashboard_uid: &str,
    ) -> Result<LibraryElementConnection, LibraryElementError> {
        ctx.ensure_active()?;
        if dashboard_uid.trim().is_empty() {
            return Err(LibraryElementError::InvalidUid(dashboard_uid.to_string()));
        }
        let element = self.load(ctx.user(), uid).await?;
        self.require(ctx, write_evaluator(&element.uid)).await?;
        Ok(self.store.connect(element.id, dashboard_uid, meta_user(ctx.user())).await?)
    }

    pub async fn disconnect(
        &self,
        ctx: &RequestContext,
        uid: &str,
        dashboard_uid: &str,
    ) -> Result<(), LibraryElementError> {
        ctx.ensure_active()?;
        let element = self.load(ctx.user(), uid).await?;
        self.require(ctx, write_evaluator(&element.uid)).await?;
        if !self.store.disconnect(element.id, dashboard_uid).await? {
            return Err(LibraryElementError::ConnectionNotFound);
        }
        Ok(())
    }

    /// See [`filter_by_permission`]
    pub async fn filter_by_permission<E: ElementScope>(
        &self,
        ctx: &RequestContext,
        candidates: Vec<E>,
    ) -> Result<Vec<E>, LibraryElementError> {
        filter_by_permission(self.access.as_ref(), ctx, candidates).await
    }

    async fn load(&self, user: &SignedInUser, uid: &str) -> Result<LibraryElement, LibraryElementError> {
        self.store
            .get_by_uid(user.org_id, uid)
            .await?
            .ok_or(LibraryElementError::NotFound)
    }

    async fn require(&self, ctx: &RequestContext, evaluator: Evaluator) -> Result<(), LibraryElementError> {
        if self.access.evaluate(ctx, ctx.user(), &evaluator).await? {
            Ok(())
        } else {
            Err(LibraryElementError::Forbidden)
        }
    }

    async fn require_folder(
        &self,
        ctx: &RequestContext,
        folder_uid: Option<&str>,
    ) -> Result<Arc<FolderTree>, LibraryElementError> {
        let tree = self.folders.get(ctx, ctx.user()).await?;
        match folder_uid {
            Some(uid) if !tree.contains(uid) => Err(LibraryElementError::FolderNotFound(uid.to_string())),
            _ => Ok(tree),
        }
    }

    fn validate_uid(&self, uid: &str) -> Result<(), LibraryElementError> {
        if uid.len() > self.config.max_uid_length {
            return Err(LibraryElementError::UidTooLong);
        }
        if !uid.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(LibraryElementError::InvalidUid(uid.to_string()));
        }
        Ok(())
    }
}

fn parse_kind(kind: i64) -> Result<ElementKind, LibraryElementError> {
    ElementKind::try_from(kind).map_err(|_| LibraryElementError::InvalidKind(kind))
}

/// `None` for the General folder
fn normalize_folder(folder_uid: Option<String>) -> Option<String> {
    folder_uid.map(|f| f.trim().to_string()).filter(|f| !is_general(f))
}

fn create_evaluator(folder_uid: Option<&str>) -> Evaluator {
    Evaluator::permission(
        ACTION_LIBRARY_PANELS_CREATE,
        vec![folder_scope(folder_uid.unwrap_or(GENERAL_FOLDER_UID))],
    )
}

fn write_evaluator(element_uid: &str) -> Evaluator {
    Evaluator::permission(ACTION_LIBRARY_PANELS_WRITE, vec![library_panel_scope(element_uid)])
}

fn meta_user(user: &SignedInUser) -> MetaUser {
    MetaUser {
        id: user.user_id,
        name: user.name.clone(),
    }
}

/// Normalizes the model and pulls out its type and description. Panels
/// carry their name as `title`, variables as `name`.
fn model_details(kind: ElementKind, name: &str, model: Value) -> Result<(Value, String, String), LibraryElementError> {
    let Value::Object(mut map) = model else {
        return Err(LibraryElementError::InvalidModel("model must be a JSON object".into()));
    };

    let element_type = match (kind, map.get("type").and_then(Value::as_str)) {
        (_, Some(t)) if !t.is_empty() => t.to_string(),
        (ElementKind::Panel, _) => {
            return Err(LibraryElementError::InvalidModel("panel model is missing type".into()));
        }
        (ElementKind::Variable, _) => String::new(),
    };
    let description = map
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let name_key = match kind {
        ElementKind::Panel => "title",
        ElementKind::Variable => "name",
    };
    map.insert(name_key.to_string(), Value::String(name.to_string()));

    Ok((Value::Object(map), element_type, description))
}

fn compare_names(a: &LibraryElement, b: &LibraryElement, direction: SortDirection) -> Ordering {
    let ord = a
        .name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name));
    let ord = match direction {
        SortDirection::AlphaAsc => ord,
        SortDirection::AlphaDesc => ord.reverse(),
    };
    ord.then_with(|| a.id.cmp(&b.id))
}

fn to_dto(tree: &FolderTree, element: LibraryElement, connected_dashboards: i64) -> LibraryElementDto {
    let folder_uid = element.folder_uid.clone().unwrap_or_default();
    let folder_name = tree
        .title(&folder_uid)
        .map(str::to_string)
        .unwrap_or_default();

    LibraryElementDto {
        id: element.id,
        org_id: element.org_id,
        folder_uid: folder_uid.clone(),
        uid: element.uid,
        name: element.name,
        kind: element.kind,
        element_type: element.element_type,
        description: element.description,
        model: element.model,
        version: element.version,
        meta: LibraryElementDtoMeta {
            folder_name,
            folder_uid,
            connected_dashboards,
            created: element.created,
            updated: element.updated,
            created_by: element.created_by,
            updated_by: element.updated_by,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn panel_model_requires_type() {
        let err = model_details(ElementKind::Panel, "x", json!({"title": "x"})).unwrap_err();
        assert!(matches!(err, LibraryElementError::InvalidModel(_)));

        let err = model_details(ElementKind::Panel, "x", json!("not an object")).unwrap_err();
        assert!(matches!(err, LibraryElementError::InvalidModel(_)));
    }

    #[test]
    fn model_details_extracts_and_renames() {
        let (model, t, d) = model_details(
            ElementKind::Panel,
            "Renamed",
            json!({"type": "text", "title": "Old", "description": "A description"}),
        )
        .unwrap();
        assert_eq!(t, "text");
        assert_eq!(d, "A description");
        assert_eq!(model["title"], "Renamed");

        let (model, t, _) = model_details(ElementKind::Variable, "query0", json!({"type": "query"})).unwrap();
        assert_eq!(t, "query");
        assert_eq!(model["name"], "query0");
    }

    #[test]
    fn general_folder_normalizes_to_none() {
        assert_eq!(normalize_folder(None), None);
        assert_eq!(normalize_folder(Some("".into())), None);
        assert_eq!(normalize_folder(Some("general".into())), None);
        assert_eq!(normalize_folder(Some(" f1 ".into())), Some("f1".into()));
    }
}
