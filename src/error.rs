use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// A fetched row that could not be turned into a typed record.
#[derive(thiserror::Error, Debug)]
#[error("column `{column}`: {reason}")]
pub struct DecodeError {
    pub column: &'static str,
    pub reason: String,
}

impl DecodeError {
    pub fn null(column: &'static str) -> Self {
        DecodeError {
            column,
            reason: "unexpected NULL".to_string(),
        }
    }

    pub fn from_sqlx(column: &'static str, err: sqlx::Error) -> Self {
        DecodeError {
            column,
            reason: err.to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A failed primary query, reported to the client with a fixed message.
    #[error("{message}: {source}")]
    Fetch {
        message: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Tags a database failure with the message the endpoint reports for it.
    /// Other variants pass through unchanged.
    pub fn fetching(self, message: &'static str) -> Self {
        match self {
            AppError::Database(source) => AppError::Fetch { message, source },
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            ),
            AppError::Fetch { message, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message }))
            }
            AppError::Decode(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error", "details": err.to_string() }),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn body_json(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn database_errors_hide_driver_details() {
        let (status, body) = body_json(AppError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
    }

    #[tokio::test]
    async fn fetch_errors_report_the_endpoint_message() {
        let err = AppError::from(sqlx::Error::PoolTimedOut).fetching("Failed to fetch result data");
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "Failed to fetch result data" }));
    }

    #[tokio::test]
    async fn decode_errors_carry_details() {
        let err = AppError::from(DecodeError::null("is_pass")).fetching("Failed to fetch program data");
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Internal server error",
                "details": "column `is_pass`: unexpected NULL"
            })
        );
    }

    #[test]
    fn validation_errors_are_client_errors() {
        let response = AppError::Validation("bad semester".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn decode_error_names_the_column() {
        let err = DecodeError::null("is_pass");
        assert_eq!(err.to_string(), "column `is_pass`: unexpected NULL");
    }
}
