use std::sync::Arc;

use async_trait::async_trait;

use super::tree::is_general;
use super::FolderTreeCache;
use crate::accesscontrol::{folder_scope, AccessControlError, ScopeResolver, SignedInUser, FOLDER_SCOPE_PREFIX};
use crate::context::RequestContext;

/// Expands `folders:uid:<uid>` to the folder's own scope followed by the
/// scopes of its ancestors, so a grant on any parent applies.
pub struct FolderScopeResolver {
    folders: Arc<FolderTreeCache>,
}

impl FolderScopeResolver {
    pub fn new(folders: Arc<FolderTreeCache>) -> Self {
        Self { folders }
    }
}

#[async_trait]
impl ScopeResolver for FolderScopeResolver {
    fn prefix(&self) -> &'static str {
        FOLDER_SCOPE_PREFIX
    }

    async fn resolve(
        &self,
        ctx: &RequestContext,
        user: &SignedInUser,
        scope: &str,
    ) -> Result<Vec<String>, AccessControlError> {
        let uid = scope.strip_prefix(FOLDER_SCOPE_PREFIX).unwrap_or_default();
        if uid == "*" || is_general(uid) {
            return Ok(vec![scope.to_string()]);
        }

        let tree = self.folders.get(ctx, user).await?;
        if !tree.contains(uid) {
            return Err(AccessControlError::resolution(scope, "folder not found"));
        }

        let mut scopes = vec![scope.to_string()];
        scopes.extend(tree.ancestors(uid).into_iter().map(folder_scope));
        Ok(scopes)
    }
}
