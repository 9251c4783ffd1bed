use async_trait::async_trait;
use sqlx::PgPool;

use super::{visible_folders, Folder, FolderDirectory, FolderError, GetFoldersQuery};
use crate::context::RequestContext;
use crate::database::manager::DatabaseError;

/// Folder directory backed by the `folder` table
pub struct PgFolderDirectory {
    pool: PgPool,
}

impl PgFolderDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FolderDirectory for PgFolderDirectory {
    async fn get_folders(
        &self,
        ctx: &RequestContext,
        query: GetFoldersQuery<'_>,
    ) -> Result<Vec<Folder>, FolderError> {
        ctx.ensure_active()?;

        let folders: Vec<Folder> = sqlx::query_as(
            "SELECT id, uid, org_id, title, parent_uid FROM folder WHERE org_id = $1 ORDER BY title",
        )
        .bind(query.org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(visible_folders(query.user, folders))
    }
}
