// Client-facing error taxonomy
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::database::manager::DatabaseError;
use crate::libraryelements::LibraryElementError;

/// Error with a status code and a client-friendly message
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 412 Precondition Failed
    PreconditionFailed(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::PreconditionFailed(_) => 412,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::PreconditionFailed(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => json!({
                "error": true,
                "message": self.message(),
                "code": self.error_code()
            }),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        ApiError::PreconditionFailed(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

fn field_error(field: &str, message: String) -> ApiError {
    let mut field_errors = HashMap::new();
    field_errors.insert(field.to_string(), message);
    ApiError::validation_error("Invalid field format", Some(field_errors))
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Database configuration error: {}", err);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::Sqlx(sqlx::Error::PoolTimedOut) | DatabaseError::Sqlx(sqlx::Error::PoolClosed) => {
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            DatabaseError::QueryError(msg) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("Database query error: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<LibraryElementError> for ApiError {
    fn from(err: LibraryElementError) -> Self {
        match err {
            LibraryElementError::NameMissing => field_error("name", err.to_string()),
            LibraryElementError::UidTooLong | LibraryElementError::InvalidUid(_) => {
                field_error("uid", err.to_string())
            }
            LibraryElementError::InvalidKind(_) => field_error("kind", err.to_string()),
            LibraryElementError::InvalidModel(_) => field_error("model", err.to_string()),
            LibraryElementError::Forbidden => ApiError::forbidden(err.to_string()),
            LibraryElementError::NotFound
            | LibraryElementError::ConnectionNotFound
            | LibraryElementError::FolderNotFound(_) => ApiError::not_found(err.to_string()),
            LibraryElementError::AlreadyExists(msg) => ApiError::conflict(msg),
            LibraryElementError::HasConnections => ApiError::conflict(err.to_string()),
            LibraryElementError::VersionMismatch => ApiError::precondition_failed(err.to_string()),
            LibraryElementError::Cancelled => ApiError::service_unavailable("Request was cancelled"),
            LibraryElementError::Database(db) => db.into(),
            other => {
                tracing::error!("Library element error: {}", other);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_errors_map_to_status_codes() {
        let cases = [
            (LibraryElementError::NameMissing, 400),
            (LibraryElementError::InvalidKind(9), 400),
            (LibraryElementError::Forbidden, 403),
            (LibraryElementError::NotFound, 404),
            (LibraryElementError::FolderNotFound("f".into()), 404),
            (LibraryElementError::AlreadyExists("dup".into()), 409),
            (LibraryElementError::HasConnections, 409),
            (LibraryElementError::VersionMismatch, 412),
            (LibraryElementError::Cancelled, 503),
        ];
        for (err, status) in cases {
            let label = err.to_string();
            assert_eq!(ApiError::from(err).status_code(), status, "{}", label);
        }
    }

    #[test]
    fn validation_errors_carry_field() {
        let api = ApiError::from(LibraryElementError::UidTooLong);
        let body = api.to_json();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["field_errors"]["uid"].is_string());
    }

    #[test]
    fn internal_errors_hide_details() {
        let api = ApiError::from(DatabaseError::QueryError("syntax error at SELECT".into()));
        assert_eq!(api.status_code(), 500);
        assert!(!api.message().contains("SELECT"));
    }
}
