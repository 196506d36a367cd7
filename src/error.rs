use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Workflow error taxonomy. Every variant carries a stable SCREAMING_SNAKE
/// code for machines and a message for humans; nothing else leaks out.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Validation { code: &'static str, message: String },
    #[error("{message}")]
    Authentication { code: &'static str, message: String },
    #[error("{message}")]
    Authorization { code: &'static str, message: String },
    #[error("{message}")]
    NotFound { code: &'static str, message: String },
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("{message}")]
    Database { code: &'static str, message: String },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: &'a str,
    error: &'a str,
    message: &'a str,
}

impl Error {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }
    pub fn unauthenticated() -> Self {
        Self::Authentication {
            code: "UNAUTHORIZED",
            message: "authentication required".to_string(),
        }
    }
    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::Authorization {
            code,
            message: message.into(),
        }
    }
    pub fn not_found(code: &'static str) -> Self {
        Self::NotFound {
            code,
            message: "resource not found".to_string(),
        }
    }
    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }
    pub fn database(code: &'static str) -> Self {
        Self::Database {
            code,
            message: "database operation failed".to_string(),
        }
    }
    /// Two transactions writing the same incident lose to each other as a
    /// transient transaction error; that is a retry-after-refetch conflict,
    /// not a server fault.
    pub fn from_write(error: mongodb::error::Error, code: &'static str) -> Self {
        if error.contains_label("TransientTransactionError") {
            Self::conflict("WRITE_CONFLICT", "concurrent update, refetch and retry")
        } else {
            Self::database(code)
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. }
            | Self::Authentication { code, .. }
            | Self::Authorization { code, .. }
            | Self::NotFound { code, .. }
            | Self::Conflict { code, .. }
            | Self::Database { code, .. } => code,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Authentication { .. } => "authentication",
            Self::Authorization { .. } => "authorization",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Database { .. } => "database",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Database { code, .. } = self {
            tracing::error!(code, "database error");
        }
        HttpResponse::build(self.status_code()).json(ErrorBody {
            kind: self.kind(),
            error: self.code(),
            message: &self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            Error::validation("INVALID_ID", "bad id").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::unauthenticated().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::forbidden("FORBIDDEN", "no").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::not_found("INCIDENT_NOT_FOUND").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::conflict("STATUS_CONFLICT", "incident is closed").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::database("INSERTING_FAILED").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unlabeled_write_errors_stay_database_errors() {
        let driver_error = mongodb::error::Error::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            "connection reset",
        ));
        let mapped = Error::from_write(driver_error, "UPDATE_FAILED");
        assert_eq!(mapped.code(), "UPDATE_FAILED");
        assert_eq!(mapped.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn conflict_keeps_its_code_and_message() {
        let error = Error::conflict("ACTIONS_STILL_OPEN", "2 corrective action(s) still open");
        assert_eq!(error.code(), "ACTIONS_STILL_OPEN");
        assert_eq!(error.to_string(), "2 corrective action(s) still open");
    }
}
