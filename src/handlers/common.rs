use crate::errors::ServiceError;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Unwraps a JSON body, turning any rejection (bad syntax, wrong types,
/// missing or unknown fields) into a 400 with the rejection text.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ServiceError::BadRequest(rejection.body_text()))
}

/// Unwraps a path parameter, turning a rejection (for example a non-numeric
/// id) into a 400 with the rejection text.
pub fn path_param<T>(param: Result<Path<T>, PathRejection>) -> Result<T, ServiceError> {
    param
        .map(|Path(value)| value)
        .map_err(|rejection| ServiceError::BadRequest(rejection.body_text()))
}
