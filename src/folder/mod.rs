pub mod cache;
pub mod postgres;
pub mod resolver;
pub mod tree;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

use crate::accesscontrol::{folder_scope, Evaluator, SignedInUser, ACTION_FOLDERS_READ};
use crate::context::{Cancelled, RequestContext};
use crate::database::manager::DatabaseError;

pub use cache::FolderTreeCache;
pub use postgres::PgFolderDirectory;
pub use resolver::FolderScopeResolver;
pub use tree::{FolderTree, GENERAL_FOLDER_TITLE, GENERAL_FOLDER_UID};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Folder {
    pub id: i64,
    pub uid: String,
    pub org_id: i64,
    pub title: String,
    pub parent_uid: Option<String>,
}

impl Folder {
    pub fn new(org_id: i64, uid: impl Into<String>, title: impl Into<String>, parent_uid: Option<&str>) -> Self {
        Self {
            id: 0,
            uid: uid.into(),
            org_id,
            title: title.into(),
            parent_uid: parent_uid.map(str::to_string),
        }
    }
}

#[derive(Debug, Error)]
pub enum FolderError {
    #[error("folder not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("folder listing failed: {0}")]
    ListingFailed(#[source] Box<FolderError>),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub struct GetFoldersQuery<'a> {
    pub org_id: i64,
    pub user: &'a SignedInUser,
}

/// Source of the folders an identity may see.
#[async_trait]
pub trait FolderDirectory: Send + Sync {
    async fn get_folders(
        &self,
        ctx: &RequestContext,
        query: GetFoldersQuery<'_>,
    ) -> Result<Vec<Folder>, FolderError>;
}

/// Keep the folders `user` can read, either directly or through any ancestor.
pub fn visible_folders(user: &SignedInUser, folders: Vec<Folder>) -> Vec<Folder> {
    let Some(org_id) = folders.first().map(|f| f.org_id) else {
        return folders;
    };
    let tree = FolderTree::new(org_id, folders.clone());

    folders
        .into_iter()
        .filter(|folder| {
            let mut scopes = vec![folder_scope(&folder.uid)];
            scopes.extend(tree.ancestors(&folder.uid).into_iter().map(folder_scope));
            Evaluator::permission(ACTION_FOLDERS_READ, scopes).evaluate(&user.permissions)
        })
        .collect()
}
