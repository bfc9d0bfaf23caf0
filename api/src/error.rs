// SPDX-License-Identifier: CC0-1.0

//! `AppError` maps domain failures onto the `{detail: string}` response
//! contract and its four HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    ServiceUnavailable(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            Self::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
            Self::ServiceUnavailable(detail) => (StatusCode::SERVICE_UNAVAILABLE, detail),
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

impl From<trace_engine::NodeSourceError> for AppError {
    fn from(e: trace_engine::NodeSourceError) -> Self {
        Self::ServiceUnavailable(e.to_string())
    }
}

impl From<labels::StoreError> for AppError {
    fn from(e: labels::StoreError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<rpc_client::Error> for AppError {
    fn from(e: rpc_client::Error) -> Self {
        Self::ServiceUnavailable(e.to_string())
    }
}
