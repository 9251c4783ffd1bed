use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, FromRow, PgPool};

use super::model::{
    ConnectionKind, ElementKind, LibraryElement, LibraryElementConnection, MetaUser, NewLibraryElement,
};
use super::store::{LibraryElementStore, NAME_CONFLICT, UID_CONFLICT};
use crate::database::manager::DatabaseError;

const SCHEMA: &str = include_str!("../../migrations/0001_library_elements.sql");

const ELEMENT_COLUMNS: &str = "id, org_id, folder_uid, uid, name, kind, type, description, model, version, \
     created, created_by, created_by_name, updated, updated_by, updated_by_name";

const CONNECTION_COLUMNS: &str = "id, element_id, kind, connection_uid, created, created_by, created_by_name";

#[derive(Debug, FromRow)]
struct ElementRow {
    id: i64,
    org_id: i64,
    folder_uid: String,
    uid: String,
    name: String,
    kind: i64,
    #[sqlx(rename = "type")]
    element_type: String,
    description: String,
    model: Value,
    version: i64,
    created: DateTime<Utc>,
    created_by: i64,
    created_by_name: String,
    updated: DateTime<Utc>,
    updated_by: i64,
    updated_by_name: String,
}

impl TryFrom<ElementRow> for LibraryElement {
    type Error = DatabaseError;

    fn try_from(row: ElementRow) -> Result<Self, Self::Error> {
        let kind = ElementKind::try_from(row.kind).map_err(DatabaseError::QueryError)?;
        Ok(LibraryElement {
            id: row.id,
            org_id: row.org_id,
            folder_uid: Some(row.folder_uid).filter(|f| !f.is_empty()),
            uid: row.uid,
            name: row.name,
            kind,
            element_type: row.element_type,
            description: row.description,
            model: row.model,
            version: row.version,
            created: row.created,
            created_by: MetaUser {
                id: row.created_by,
                name: row.created_by_name,
            },
            updated: row.updated,
            updated_by: MetaUser {
                id: row.updated_by,
                name: row.updated_by_name,
            },
        })
    }
}

#[derive(Debug, FromRow)]
struct ConnectionRow {
    id: i64,
    element_id: i64,
    kind: i64,
    connection_uid: String,
    created: DateTime<Utc>,
    created_by: i64,
    created_by_name: String,
}

impl TryFrom<ConnectionRow> for LibraryElementConnection {
    type Error = DatabaseError;

    fn try_from(row: ConnectionRow) -> Result<Self, Self::Error> {
        Ok(LibraryElementConnection {
            id: row.id,
            element_id: row.element_id,
            kind: ConnectionKind::try_from(row.kind).map_err(DatabaseError::QueryError)?,
            connection_uid: row.connection_uid,
            created: row.created,
            created_by: MetaUser {
                id: row.created_by,
                name: row.created_by_name,
            },
        })
    }
}

/// Maps unique violations to the conflict the constraint stands for
fn write_error(err: sqlx::Error) -> DatabaseError {
    let constraint = match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => db.constraint().map(str::to_string),
        _ => None,
    };
    match constraint.as_deref() {
        Some("library_element_uid_unique") => DatabaseError::Conflict(UID_CONFLICT.to_string()),
        Some(_) => DatabaseError::Conflict(NAME_CONFLICT.to_string()),
        None => DatabaseError::from_write(err, NAME_CONFLICT),
    }
}

pub struct PgLibraryElementStore {
    pool: PgPool,
}

impl PgLibraryElementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables if they are missing
    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        (&self.pool).execute(SCHEMA).await?;
        Ok(())
    }
}

#[async_trait]
impl LibraryElementStore for PgLibraryElementStore {
    async fn insert(&self, new: NewLibraryElement) -> Result<LibraryElement, DatabaseError> {
        let sql = format!(
            "INSERT INTO library_element \
             (org_id, folder_uid, uid, name, kind, type, description, model, version, \
              created, created_by, created_by_name, updated, updated_by, updated_by_name) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9, $10, $11, $9, $10, $11) \
             RETURNING {}",
            ELEMENT_COLUMNS
        );
        let row: ElementRow = sqlx::query_as(&sql)
            .bind(new.org_id)
            .bind(new.folder_uid.unwrap_or_default())
            .bind(&new.uid)
            .bind(&new.name)
            .bind(i64::from(new.kind))
            .bind(&new.element_type)
            .bind(&new.description)
            .bind(&new.model)
            .bind(new.created)
            .bind(new.created_by.id)
            .bind(&new.created_by.name)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error)?;

        row.try_into()
    }

    async fn get_by_uid(&self, org_id: i64, uid: &str) -> Result<Option<LibraryElement>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM library_element WHERE org_id = $1 AND uid = $2",
            ELEMENT_COLUMNS
        );
        let row: Option<ElementRow> = sqlx::query_as(&sql)
            .bind(org_id)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;

        row.map(LibraryElement::try_from).transpose()
    }

    async fn list(&self, org_id: i64, kind: Option<ElementKind>) -> Result<Vec<LibraryElement>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM library_element WHERE org_id = $1 AND ($2::BIGINT IS NULL OR kind = $2) ORDER BY id",
            ELEMENT_COLUMNS
        );
        let rows: Vec<ElementRow> = sqlx::query_as(&sql)
            .bind(org_id)
            .bind(kind.map(i64::from))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(LibraryElement::try_from).collect()
    }

    async fn update(&self, element: &LibraryElement, expected_version: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE library_element SET folder_uid = $1, uid = $2, name = $3, type = $4, description = $5, \
             model = $6, version = $7, updated = $8, updated_by = $9, updated_by_name = $10 \
             WHERE id = $11 AND org_id = $12 AND version = $13",
        )
        .bind(element.folder_uid.clone().unwrap_or_default())
        .bind(&element.uid)
        .bind(&element.name)
        .bind(&element.element_type)
        .bind(&element.description)
        .bind(&element.model)
        .bind(element.version)
        .bind(element.updated)
        .bind(element.updated_by.id)
        .bind(&element.updated_by.name)
        .bind(element.id)
        .bind(element.org_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, org_id: i64, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM library_element WHERE id = $1 AND org_id = $2")
            .bind(id)
            .bind(org_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn connection_count(&self, element_id: i64) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM library_element_connection WHERE element_id = $1")
            .bind(element_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn connections(&self, element_id: i64) -> Result<Vec<LibraryElementConnection>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM library_element_connection WHERE element_id = $1 ORDER BY id",
            CONNECTION_COLUMNS
        );
        let rows: Vec<ConnectionRow> = sqlx::query_as(&sql)
            .bind(element_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(LibraryElementConnection::try_from).collect()
    }

    async fn connect(
        &self,
        element_id: i64,
        dashboard_uid: &str,
        created_by: MetaUser,
    ) -> Result<LibraryElementConnection, DatabaseError> {
        let kind = i64::from(ConnectionKind::Dashboard);
        sqlx::query(
            "INSERT INTO library_element_connection \
             (element_id, kind, connection_uid, created, created_by, created_by_name) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (element_id, kind, connection_uid) DO NOTHING",
        )
        .bind(element_id)
        .bind(kind)
        .bind(dashboard_uid)
        .bind(Utc::now())
        .bind(created_by.id)
        .bind(&created_by.name)
        .execute(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM library_element_connection WHERE element_id = $1 AND kind = $2 AND connection_uid = $3",
            CONNECTION_COLUMNS
        );
        let row: ConnectionRow = sqlx::query_as(&sql)
            .bind(element_id)
            .bind(kind)
            .bind(dashboard_uid)
            .fetch_one(&self.pool)
            .await?;

        row.try_into()
    }

    async fn disconnect(&self, element_id: i64, dashboard_uid: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "DELETE FROM library_element_connection WHERE element_id = $1 AND kind = $2 AND connection_uid = $3",
        )
        .bind(element_id)
        .bind(i64::from(ConnectionKind::Dashboard))
        .bind(dashboard_uid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
