use std::sync::Arc;

use async_trait::async_trait;

use super::store::LibraryElementStore;
use crate::accesscontrol::{
    folder_scope, AccessControlError, ScopeResolver, SignedInUser, LIBRARY_PANEL_SCOPE_PREFIX,
};
use crate::context::RequestContext;
use crate::folder::tree::is_general;
use crate::folder::FolderTreeCache;

/// Expands `library.panels:uid:<uid>` to the element's own scope plus the
/// scopes of its folder and that folder's ancestors.
///
/// Fails when the element is gone or when its folder is not in the caller's
/// folder tree (deleted, moved out of sight, or never visible). Listing code
/// treats such failures as "not permitted" for that one element.
pub struct LibraryPanelScopeResolver {
    store: Arc<dyn LibraryElementStore>,
    folders: Arc<FolderTreeCache>,
}

impl LibraryPanelScopeResolver {
    pub fn new(store: Arc<dyn LibraryElementStore>, folders: Arc<FolderTreeCache>) -> Self {
        Self { store, folders }
    }
}

#[async_trait]
impl ScopeResolver for LibraryPanelScopeResolver {
    fn prefix(&self) -> &'static str {
        LIBRARY_PANEL_SCOPE_PREFIX
    }

    async fn resolve(
        &self,
        ctx: &RequestContext,
        user: &SignedInUser,
        scope: &str,
    ) -> Result<Vec<String>, AccessControlError> {
        let uid = scope.strip_prefix(LIBRARY_PANEL_SCOPE_PREFIX).unwrap_or_default();
        if uid == "*" {
            return Ok(vec![scope.to_string()]);
        }

        let element = self
            .store
            .get_by_uid(user.org_id, uid)
            .await?
            .ok_or_else(|| AccessControlError::resolution(scope, "library element not found"))?;

        let folder_uid = element.folder_uid_or_general();
        let mut scopes = vec![scope.to_string(), folder_scope(folder_uid)];
        if is_general(folder_uid) {
            return Ok(scopes);
        }

        let tree = self.folders.get(ctx, user).await?;
        if !tree.contains(folder_uid) {
            return Err(AccessControlError::resolution(
                scope,
                format!("folder {} not found", folder_uid),
            ));
        }
        scopes.extend(tree.ancestors(folder_uid).into_iter().map(folder_scope));
        Ok(scopes)
    }
}
