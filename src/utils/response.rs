use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// The `{success, message, data}` envelope every endpoint answers with.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    Json(ApiResponse::new(message, Some(data))).into_response()
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::new(message, Some(data)))).into_response()
}

pub fn message(message: impl Into<String>) -> Response {
    Json(ApiResponse::<()>::new(message, None)).into_response()
}
