//! Error translation.
//!
//! [`ApiError`] is the only way a request fails. Its [`IntoResponse`] impl
//! decides the status code and writes the fault body; nothing else in the
//! gateway renders a failure.

use std::fmt;

use axum::Json;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use cnet_daemon::DaemonError;

/// Result type alias for gateway operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// A named path parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamField {
    EndpointId,
    ContainerId,
    LabelUuid,
    Sha256Sum,
    PolicyPath,
}

impl ParamField {
    /// Name of the capture in the route pattern.
    pub fn param(self) -> &'static str {
        match self {
            ParamField::EndpointId => "endpoint_id",
            ParamField::ContainerId => "container_id",
            ParamField::LabelUuid => "uuid",
            ParamField::Sha256Sum => "sha256sum",
            ParamField::PolicyPath => "path",
        }
    }
}

impl fmt::Display for ParamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamField::EndpointId => "endpoint id",
            ParamField::ContainerId => "container id",
            ParamField::LabelUuid => "labels UUID",
            ParamField::Sha256Sum => "sha256sum",
            ParamField::PolicyPath => "policy path",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("server received empty {0}")]
    MissingParam(ParamField),

    #[error("server received invalid {field} '{value}': {reason}")]
    InvalidParam {
        field: ParamField,
        value: String,
        reason: String,
    },

    #[error("server received malformed {what}: {source}")]
    MalformedBody {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The HTTP layer refused the request before it could be resolved.
    #[error("{1}")]
    Rejected(StatusCode, String),

    #[error("no route for {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("request handler failed: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParam(_) | ApiError::InvalidParam { .. } => StatusCode::BAD_REQUEST,
            ApiError::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            ApiError::Rejected(status, _) => *status,
            ApiError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Daemon(e) => match e {
                DaemonError::NotFound(_) => StatusCode::NOT_FOUND,
                DaemonError::Conflict(_) => StatusCode::CONFLICT,
                DaemonError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                DaemonError::Exhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
                DaemonError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Encode(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the fault body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingParam(_) => "MISSING_PARAMETER",
            ApiError::InvalidParam { .. } => "INVALID_PARAMETER",
            ApiError::MalformedBody { .. } => "MALFORMED_BODY",
            ApiError::Rejected(..) => "REQUEST_REJECTED",
            ApiError::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            ApiError::Daemon(e) => match e {
                DaemonError::NotFound(_) => "NOT_FOUND",
                DaemonError::Conflict(_) => "CONFLICT",
                DaemonError::InvalidArgument(_) => "INVALID_ARGUMENT",
                DaemonError::Exhausted(_) => "EXHAUSTED",
                DaemonError::Other(_) => "DAEMON_ERROR",
            },
            ApiError::Encode(_) => "ENCODE_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    code: &'static str,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            success: false,
            code: self.code(),
            error: self.to_string(),
        };
        if status.is_server_error() {
            warn!(%status, code = body.code, error = %body.error, "request failed");
        } else {
            debug!(%status, code = body.code, error = %body.error, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_param_names_the_field() {
        let (status, body) = body_json(ApiError::MissingParam(ParamField::EndpointId)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "MISSING_PARAMETER");
        assert_eq!(body["error"], "server received empty endpoint id");
    }

    #[tokio::test]
    async fn invalid_param_names_the_literal() {
        let err = ApiError::InvalidParam {
            field: ParamField::LabelUuid,
            value: "abc".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let msg = body["error"].as_str().unwrap();
        assert!(msg.contains("labels UUID"));
        assert!(msg.contains("'abc'"));
    }

    #[test]
    fn daemon_faults_keep_their_class() {
        let cases = [
            (DaemonError::NotFound("endpoint 1".into()), StatusCode::NOT_FOUND),
            (DaemonError::Conflict("x".into()), StatusCode::CONFLICT),
            (DaemonError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (DaemonError::Exhausted("x".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[tokio::test]
    async fn unclassified_daemon_fault_is_verbatim_500() {
        let (status, body) =
            body_json(ApiError::from(DaemonError::Other("datapath exploded".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "datapath exploded");
    }

    #[test]
    fn route_not_found_is_distinct_from_resource_not_found() {
        let route = ApiError::RouteNotFound {
            method: Method::PATCH,
            path: "/endpoint/1".into(),
        };
        let resource = ApiError::from(DaemonError::NotFound("endpoint 1".into()));
        assert_eq!(route.status(), resource.status());
        assert_ne!(route.code(), resource.code());
    }
}
