//! Success encoding.
//!
//! Values are serialized into a [`Payload`] before any status is chosen, so a
//! value that fails to encode becomes an [`ApiError::Encode`] instead of a
//! half-written success.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

/// An encoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn json<T: Serialize>(value: &T) -> ApiResult<Self> {
        serde_json::to_vec(value)
            .map(Payload::Json)
            .map_err(ApiError::Encode)
    }
}

impl IntoResponse for Payload {
    fn into_response(self) -> Response {
        match self {
            Payload::Json(bytes) => {
                ([(header::CONTENT_TYPE, "application/json")], bytes).into_response()
            }
            Payload::Text(text) => text.into_response(),
        }
    }
}

/// Successful outcome of a dispatched operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 with a body.
    Retrieved(Payload),
    /// 201, optionally with a body.
    Created(Option<Payload>),
    /// 202, optionally with a body.
    Accepted(Option<Payload>),
    /// 204: deleted, or the looked-up resource does not exist.
    NoContent,
}

impl Reply {
    /// 200 with the value, or 204 if the daemon reported it absent.
    pub fn found<T: Serialize>(value: Option<T>) -> ApiResult<Self> {
        match value {
            Some(v) => Ok(Reply::Retrieved(Payload::json(&v)?)),
            None => Ok(Reply::NoContent),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Reply::Retrieved(_) => StatusCode::OK,
            Reply::Created(_) => StatusCode::CREATED,
            Reply::Accepted(_) => StatusCode::ACCEPTED,
            Reply::NoContent => StatusCode::NO_CONTENT,
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Reply::Retrieved(payload)
            | Reply::Created(Some(payload))
            | Reply::Accepted(Some(payload)) => (status, payload).into_response(),
            Reply::Created(None) | Reply::Accepted(None) | Reply::NoContent => {
                status.into_response()
            }
        }
    }
}
