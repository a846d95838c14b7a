use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use catalog_core::DomainError;
use catalog_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let status = match &err {
        ServiceError::Validation(_)
        | ServiceError::MissingIdentifier
        | ServiceError::InvalidStockAction(_)
        | ServiceError::InvalidId(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::DuplicateSku(_) | ServiceError::InsufficientStock { .. } => StatusCode::CONFLICT,
        ServiceError::InvalidReleaseQuantity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    service_error_to_response(err.into())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Malformed or wrongly-typed JSON bodies and query strings.
pub fn rejection_to_response(rejection: impl core::fmt::Display) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.to_string())
}
