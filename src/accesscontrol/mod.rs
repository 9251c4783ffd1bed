pub mod evaluator;
pub mod identity;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::{Cancelled, RequestContext};
use crate::database::manager::DatabaseError;
use crate::folder::FolderError;

pub use evaluator::{scope_matches, Evaluator};
pub use identity::{OrgRole, Permissions, SignedInUser};

pub const ACTION_FOLDERS_READ: &str = "folders:read";
pub const ACTION_LIBRARY_PANELS_CREATE: &str = "library.panels:create";
pub const ACTION_LIBRARY_PANELS_READ: &str = "library.panels:read";
pub const ACTION_LIBRARY_PANELS_WRITE: &str = "library.panels:write";
pub const ACTION_LIBRARY_PANELS_DELETE: &str = "library.panels:delete";

pub const SCOPE_ALL: &str = "*";
pub const SCOPE_FOLDERS_ALL: &str = "folders:*";
pub const FOLDER_SCOPE_PREFIX: &str = "folders:uid:";
pub const LIBRARY_PANEL_SCOPE_PREFIX: &str = "library.panels:uid:";

pub fn folder_scope(folder_uid: &str) -> String {
    format!("{}{}", FOLDER_SCOPE_PREFIX, folder_uid)
}

pub fn library_panel_scope(element_uid: &str) -> String {
    format!("{}{}", LIBRARY_PANEL_SCOPE_PREFIX, element_uid)
}

#[derive(Debug, Error)]
pub enum AccessControlError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("could not resolve scope {scope}: {reason}")]
    ScopeResolution { scope: String, reason: String },

    #[error(transparent)]
    Folder(#[from] FolderError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl AccessControlError {
    pub fn resolution(scope: &str, reason: impl Into<String>) -> Self {
        AccessControlError::ScopeResolution {
            scope: scope.to_string(),
            reason: reason.into(),
        }
    }
}

/// Answers "may this identity do that".
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn evaluate(
        &self,
        ctx: &RequestContext,
        user: &SignedInUser,
        evaluator: &Evaluator,
    ) -> Result<bool, AccessControlError>;
}

/// Expands a scope into every scope that grants it, e.g. a library panel into
/// its own scope plus its folder chain.
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    fn prefix(&self) -> &'static str;

    async fn resolve(
        &self,
        ctx: &RequestContext,
        user: &SignedInUser,
        scope: &str,
    ) -> Result<Vec<String>, AccessControlError>;
}

/// Evaluates against the user's own permission set after scope resolution.
#[derive(Default, Clone)]
pub struct ScopedAccessControl {
    resolvers: Vec<Arc<dyn ScopeResolver>>,
}

impl ScopedAccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ScopeResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    fn resolver_for(&self, scope: &str) -> Option<&Arc<dyn ScopeResolver>> {
        self.resolvers.iter().find(|r| scope.starts_with(r.prefix()))
    }
}

#[async_trait]
impl AccessControl for ScopedAccessControl {
    async fn evaluate(
        &self,
        ctx: &RequestContext,
        user: &SignedInUser,
        evaluator: &Evaluator,
    ) -> Result<bool, AccessControlError> {
        ctx.ensure_active()?;

        let mut resolved: HashMap<String, Vec<String>> = HashMap::new();
        for scope in evaluator.scopes() {
            if resolved.contains_key(scope) {
                continue;
            }
            if let Some(resolver) = self.resolver_for(scope) {
                let scopes = resolver.resolve(ctx, user, scope).await?;
                resolved.insert(scope.to_string(), scopes);
            }
        }

        let allowed = evaluator.with_resolved_scopes(&resolved).evaluate(&user.permissions);
        tracing::trace!(user = %user.uid, %evaluator, allowed, "evaluated permission");
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticResolver;

    #[async_trait]
    impl ScopeResolver for StaticResolver {
        fn prefix(&self) -> &'static str {
            "thing:uid:"
        }

        async fn resolve(
            &self,
            _ctx: &RequestContext,
            _user: &SignedInUser,
            scope: &str,
        ) -> Result<Vec<String>, AccessControlError> {
            match scope {
                "thing:uid:broken" => Err(AccessControlError::resolution(scope, "no such thing")),
                _ => Ok(vec![scope.to_string(), folder_scope("parent")]),
            }
        }
    }

    fn user() -> SignedInUser {
        SignedInUser::without_permissions(1, 7, "user-7").grant("thing:read", &folder_scope("parent"))
    }

    #[tokio::test]
    async fn grants_through_resolved_scope() {
        let ac = ScopedAccessControl::new().with_resolver(Arc::new(StaticResolver));
        let ctx = RequestContext::new(user());
        let eval = Evaluator::permission("thing:read", vec!["thing:uid:a".into()]);

        assert!(ac.evaluate(&ctx, ctx.user(), &eval).await.unwrap());
    }

    #[tokio::test]
    async fn without_resolver_the_scope_must_match_directly() {
        let ac = ScopedAccessControl::new();
        let ctx = RequestContext::new(user());
        let eval = Evaluator::permission("thing:read", vec!["thing:uid:a".into()]);

        assert!(!ac.evaluate(&ctx, ctx.user(), &eval).await.unwrap());
    }

    #[tokio::test]
    async fn resolution_failure_is_an_error() {
        let ac = ScopedAccessControl::new().with_resolver(Arc::new(StaticResolver));
        let ctx = RequestContext::new(user());
        let eval = Evaluator::permission("thing:read", vec!["thing:uid:broken".into()]);

        let err = ac.evaluate(&ctx, ctx.user(), &eval).await.unwrap_err();
        assert!(matches!(err, AccessControlError::ScopeResolution { .. }));
    }

    #[tokio::test]
    async fn cancelled_context_is_rejected() {
        let ac = ScopedAccessControl::new();
        let ctx = RequestContext::new(user());
        ctx.cancellation_token().cancel();

        let eval = Evaluator::permission("thing:read", vec![]);
        let err = ac.evaluate(&ctx, ctx.user(), &eval).await.unwrap_err();
        assert!(matches!(err, AccessControlError::Cancelled(_)));
    }
}
