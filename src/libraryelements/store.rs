use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::model::{
    ConnectionKind, ElementKind, LibraryElement, LibraryElementConnection, MetaUser, NewLibraryElement,
};
use crate::database::manager::DatabaseError;

pub const NAME_CONFLICT: &str = "library element with that name already exists";
pub const UID_CONFLICT: &str = "library element with that uid already exists";

/// Persistence for library elements and their dashboard connections.
/// All element lookups are org-scoped.
#[async_trait]
pub trait LibraryElementStore: Send + Sync {
    async fn insert(&self, element: NewLibraryElement) -> Result<LibraryElement, DatabaseError>;

    async fn get_by_uid(&self, org_id: i64, uid: &str) -> Result<Option<LibraryElement>, DatabaseError>;

    /// Elements of the org ordered by id
    async fn list(&self, org_id: i64, kind: Option<ElementKind>) -> Result<Vec<LibraryElement>, DatabaseError>;

    /// Writes `element` only while the stored version is still
    /// `expected_version`; returns false otherwise.
    async fn update(&self, element: &LibraryElement, expected_version: i64) -> Result<bool, DatabaseError>;

    async fn delete(&self, org_id: i64, id: i64) -> Result<bool, DatabaseError>;

    async fn connection_count(&self, element_id: i64) -> Result<i64, DatabaseError>;

    async fn connections(&self, element_id: i64) -> Result<Vec<LibraryElementConnection>, DatabaseError>;

    /// Connecting twice returns the existing connection
    async fn connect(
        &self,
        element_id: i64,
        dashboard_uid: &str,
        created_by: MetaUser,
    ) -> Result<LibraryElementConnection, DatabaseError>;

    async fn disconnect(&self, element_id: i64, dashboard_uid: &str) -> Result<bool, DatabaseError>;
}

#[derive(Default)]
struct MemoryState {
    next_element_id: i64,
    elements: BTreeMap<i64, LibraryElement>,
    next_connection_id: i64,
    connections: Vec<LibraryElementConnection>,
}

impl MemoryState {
    fn conflict(&self, candidate: &LibraryElement) -> Option<&'static str> {
        self.elements.values().filter(|e| e.id != candidate.id && e.org_id == candidate.org_id).find_map(|e| {
            if e.uid == candidate.uid {
                Some(UID_CONFLICT)
            } else if e.folder_uid == candidate.folder_uid && e.name == candidate.name && e.kind == candidate.kind {
                Some(NAME_CONFLICT)
            } else {
                None
            }
        })
    }
}

/// In-process store with the same uniqueness rules as the SQL schema
#[derive(Default)]
pub struct MemoryLibraryElementStore {
    state: RwLock<MemoryState>,
}

impl MemoryLibraryElementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryElementStore for MemoryLibraryElementStore {
    async fn insert(&self, new: NewLibraryElement) -> Result<LibraryElement, DatabaseError> {
        let mut state = self.state.write().await;

        let element = LibraryElement {
            id: state.next_element_id + 1,
            org_id: new.org_id,
            folder_uid: new.folder_uid,
            uid: new.uid,
            name: new.name,
            kind: new.kind,
            element_type: new.element_type,
            description: new.description,
            model: new.model,
            version: 1,
            created: new.created,
            updated: new.created,
            updated_by: new.created_by.clone(),
            created_by: new.created_by,
        };
        if let Some(conflict) = state.conflict(&element) {
            return Err(DatabaseError::Conflict(conflict.to_string()));
        }

        state.next_element_id = element.id;
        state.elements.insert(element.id, element.clone());
        Ok(element)
    }

    async fn get_by_uid(&self, org_id: i64, uid: &str) -> Result<Option<LibraryElement>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .elements
            .values()
            .find(|e| e.org_id == org_id && e.uid == uid)
            .cloned())
    }

    async fn list(&self, org_id: i64, kind: Option<ElementKind>) -> Result<Vec<LibraryElement>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .elements
            .values()
            .filter(|e| e.org_id == org_id && kind.map_or(true, |k| e.kind == k))
            .cloned()
            .collect())
    }

    async fn update(&self, element: &LibraryElement, expected_version: i64) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;

        match state.elements.get(&element.id) {
            Some(stored) if stored.org_id == element.org_id && stored.version == expected_version => {}
            _ => return Ok(false),
        }
        if let Some(conflict) = state.conflict(element) {
            return Err(DatabaseError::Conflict(conflict.to_string()));
        }

        state.elements.insert(element.id, element.clone());
        Ok(true)
    }

    async fn delete(&self, org_id: i64, id: i64) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        match state.elements.get(&id) {
            Some(e) if e.org_id == org_id => {
                state.elements.remove(&id);
                state.connections.retain(|c| c.element_id != id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn connection_count(&self, element_id: i64) -> Result<i64, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.connections.iter().filter(|c| c.element_id == element_id).count() as i64)
    }

    async fn connections(&self, element_id: i64) -> Result<Vec<LibraryElementConnection>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .connections
            .iter()
            .filter(|c| c.element_id == element_id)
            .cloned()
            .collect())
    }

    async fn connect(
        &self,
        element_id: i64,
        dashboard_uid: &str,
        created_by: MetaUser,
    ) -> Result<LibraryElementConnection, DatabaseError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .connections
            .iter()
            .find(|c| c.element_id == element_id && c.connection_uid == dashboard_uid)
        {
            return Ok(existing.clone());
        }

        state.next_connection_id += 1;
        let connection = LibraryElementConnection {
            id: state.next_connection_id,
            element_id,
            kind: ConnectionKind::Dashboard,
            connection_uid: dashboard_uid.to_string(),
            created: Utc::now(),
            created_by,
        };
        state.connections.push(connection.clone());
        Ok(connection)
    }

    async fn disconnect(&self, element_id: i64, dashboard_uid: &str) -> Result<bool, DatabaseError> {
        let mut state = self.state.write().await;
        let before = state.connections.len();
        state
            .connections
            .retain(|c| !(c.element_id == element_id && c.connection_uid == dashboard_uid));
        Ok(state.connections.len() != before)
    }
}
