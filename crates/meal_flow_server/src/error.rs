//! HTTP mapping for [`FulfillmentError`].

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meal_flow_core::error::{FieldError, FulfillmentError};
use serde::Serialize;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

#[derive(Debug)]
pub struct AppError(pub FulfillmentError);

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self(FulfillmentError::invalid("body", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = match &err {
            FulfillmentError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            FulfillmentError::Validation(fields) => fields
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join("; "),
            FulfillmentError::Unauthenticated(msg)
            | FulfillmentError::Forbidden(msg)
            | FulfillmentError::NotFound(msg)
            | FulfillmentError::Conflict(msg) => msg.clone(),
        };

        let body = ErrorResponse {
            error: err.kind(),
            message,
            fields: err.fields().to_vec(),
        };
        (status, Json(body)).into_response()
    }
}
