//! cnet-api — REST gateway in front of the cnet daemon.
//!
//! Every request is resolved into one typed [`Operation`], dispatched to
//! exactly one [`Daemon`] capability, and the outcome is rendered either by
//! the success encoder ([`Reply`]) or the error translator ([`ApiError`]).
//!
//! # API Routes
//!
//! | Method | Path | Success | Absent |
//! |---|---|---|---|
//! | GET | `/ping` | 200 text | |
//! | POST | `/endpoint`, `/endpoint/{endpoint_id}` | 201 | |
//! | DELETE | `/endpoint/{endpoint_id}` | 204 | |
//! | POST | `/endpoint/update/{endpoint_id}` | 202 | |
//! | GET | `/endpoint/{endpoint_id}` | 200 endpoint | 204 |
//! | GET | `/endpoints` | 200 endpoint list | 204 |
//! | PUT | `/allocator/container/{container_id}` | 201 IPAM config | |
//! | DELETE | `/allocator/container/{container_id}` | 204 | |
//! | POST | `/labels` | 202 identity | |
//! | GET | `/labels/by-uuid/{uuid}` | 200 labels | 204 |
//! | GET | `/labels/by-sha256sum/{sha256sum}` | 200 labels | 204 |
//! | DELETE | `/labels/by-uuid/{uuid}` | 204 | |
//! | DELETE | `/labels/by-sha256sum/{sha256sum}` | 204 | |
//! | GET | `/labels/status/max-uuid` | 200 integer | |
//! | POST | `/policy/{*path}` | 201 | |
//! | DELETE | `/policy/{*path}` | 204 | |
//! | GET | `/policy/{*path}` | 200 policy node | 204 |
//! | POST | `/policy-consume-decision` | 202 decision | |
//!
//! Faults carry `{"success": false, "code": ..., "error": ...}`.

pub mod dispatch;
pub mod encode;
pub mod error;
pub mod resolve;
pub mod routes;

#[cfg(test)]
mod test_support;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use serde::{Deserialize, Serialize};

use cnet_daemon::Daemon;

pub use dispatch::Operation;
pub use encode::{Payload, Reply};
pub use error::{ApiError, ApiResult, ParamField};

/// How `GET /policy/{path}` renders the addressed node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyView {
    /// The node together with all of its descendants.
    #[default]
    Subtree,
    /// The node's own rules only; children are stripped.
    Node,
}

impl FromStr for PolicyView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subtree" => Ok(PolicyView::Subtree),
            "node" => Ok(PolicyView::Node),
            other => Err(format!("unknown policy view '{other}' (expected 'subtree' or 'node')")),
        }
    }
}

impl fmt::Display for PolicyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyView::Subtree => f.write_str("subtree"),
            PolicyView::Node => f.write_str("node"),
        }
    }
}

/// Gateway behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub policy_view: PolicyView,
}

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub daemon: Arc<dyn Daemon>,
    pub config: ApiConfig,
}

/// Build the API router over the given daemon.
pub fn build_router(daemon: Arc<dyn Daemon>, config: ApiConfig) -> Router {
    routes::router(ApiState { daemon, config })
}
