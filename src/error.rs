use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service limit reached, please try again later")]
    RateLimited,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Classify a database error into the taxonomy the booking flows care about:
/// transient backend overload, permission denial, data-integrity violation,
/// or anything else. Classification is by substring matching on the error
/// message, which is the only signal the hosted backend exposes uniformly.
pub fn classify_db_error(err: sqlx::Error) -> AppError {
    let msg = err.to_string().to_lowercase();

    if msg.contains("rate") || msg.contains("limit") || msg.contains("quota") {
        return AppError::RateLimited;
    }

    if msg.contains("permission") || msg.contains("policy") || msg.contains("denied") {
        return AppError::Forbidden;
    }

    // Unique violations are kept distinct from other constraint failures so
    // callers can branch on them (confirmation-code collision handling).
    if msg.contains("unique constraint") {
        return AppError::Conflict(err.to_string());
    }

    if msg.contains("foreign key") || msg.contains("constraint") || msg.contains("not null") {
        return AppError::Validation(
            "The appointment references invalid or missing data".to_string(),
        );
    }

    AppError::Database(err)
}

/// Whether a conflict error originated from the given column's unique index.
/// SQLite reports the column as a `table.column` token, so matching the
/// dot-qualified name avoids false positives from the column name appearing
/// as a plain word elsewhere in the message.
pub fn is_unique_violation_on(err: &AppError, column: &str) -> bool {
    let qualified = format!(".{}", column.to_lowercase());
    matches!(err, AppError::Conflict(msg) if msg.to_lowercase().contains(&qualified))
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "You do not have permission to perform this action".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                self.to_string(),
            ),
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                msg.clone(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol_err(msg: &str) -> sqlx::Error {
        sqlx::Error::Protocol(msg.to_string())
    }

    #[test]
    fn classifies_rate_limit_messages() {
        for msg in [
            "rate limit exceeded",
            "request quota exhausted",
            "too many requests: limit reached",
        ] {
            assert!(matches!(
                classify_db_error(protocol_err(msg)),
                AppError::RateLimited
            ));
        }
    }

    #[test]
    fn classifies_permission_messages() {
        assert!(matches!(
            classify_db_error(protocol_err("permission denied for table appointments")),
            AppError::Forbidden
        ));
        assert!(matches!(
            classify_db_error(protocol_err("new row violates row security policy")),
            AppError::Forbidden
        ));
    }

    #[test]
    fn classifies_constraint_messages() {
        assert!(matches!(
            classify_db_error(protocol_err("FOREIGN KEY constraint failed")),
            AppError::Validation(_)
        ));
        assert!(matches!(
            classify_db_error(protocol_err("NOT NULL constraint failed: appointments.date")),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn unique_violations_become_conflicts() {
        let err = classify_db_error(protocol_err(
            "UNIQUE constraint failed: appointments.confirmation_code",
        ));
        assert!(is_unique_violation_on(&err, "confirmation_code"));
        assert!(!is_unique_violation_on(&err, "id"));
    }

    #[test]
    fn column_match_requires_the_qualified_name() {
        // "id" appears as a plain word ("invalid") but not as a column token.
        let err = classify_db_error(protocol_err(
            "UNIQUE constraint failed: invalid reuse of appointments.confirmation_code",
        ));
        assert!(!is_unique_violation_on(&err, "id"));
        assert!(is_unique_violation_on(&err, "confirmation_code"));
    }

    #[test]
    fn unknown_errors_pass_through() {
        assert!(matches!(
            classify_db_error(protocol_err("something odd happened")),
            AppError::Database(_)
        ));
    }
}
