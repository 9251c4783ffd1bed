pub mod filter;
pub mod guard;
pub mod model;
pub mod postgres;
pub mod service;
pub mod store;

use thiserror::Error;

use crate::accesscontrol::AccessControlError;
use crate::context::Cancelled;
use crate::database::manager::DatabaseError;
use crate::folder::FolderError;

pub use filter::{filter_by_permission, Outcome};
pub use guard::LibraryPanelScopeResolver;
pub use model::*;
pub use postgres::PgLibraryElementStore;
pub use service::LibraryElementService;
pub use store::{LibraryElementStore, MemoryLibraryElementStore};

#[derive(Debug, Error)]
pub enum LibraryElementError {
    #[error("library element could not be found")]
    NotFound,

    #[error("{0}")]
    AlreadyExists(String),

    #[error("the library element has been changed by someone else")]
    VersionMismatch,

    #[error("the library element has connections")]
    HasConnections,

    #[error("library element connection could not be found")]
    ConnectionNotFound,

    #[error("invalid kind: {0}")]
    InvalidKind(i64),

    #[error("library element model is invalid: {0}")]
    InvalidModel(String),

    #[error("library element name cannot be empty")]
    NameMissing,

    #[error("library element UID is too long")]
    UidTooLong,

    #[error("invalid UID: {0}")]
    InvalidUid(String),

    #[error("folder not found: {0}")]
    FolderNotFound(String),

    #[error("access denied to library element")]
    Forbidden,

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Folder(FolderError),

    #[error(transparent)]
    AccessControl(AccessControlError),

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<Cancelled> for LibraryElementError {
    fn from(_: Cancelled) -> Self {
        LibraryElementError::Cancelled
    }
}

impl From<FolderError> for LibraryElementError {
    fn from(err: FolderError) -> Self {
        match err {
            FolderError::Cancelled(_) => LibraryElementError::Cancelled,
            other => LibraryElementError::Folder(other),
        }
    }
}

impl From<AccessControlError> for LibraryElementError {
    fn from(err: AccessControlError) -> Self {
        match err {
            AccessControlError::Cancelled(_) => LibraryElementError::Cancelled,
            other => LibraryElementError::AccessControl(other),
        }
    }
}

impl From<DatabaseError> for LibraryElementError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(msg) => LibraryElementError::AlreadyExists(msg),
            DatabaseError::NotFound(_) => LibraryElementError::NotFound,
            other => LibraryElementError::Database(other),
        }
    }
}
