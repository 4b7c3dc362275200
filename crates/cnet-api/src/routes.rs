//! Route table and axum wiring.
//!
//! [`ROUTES`] is the single source of truth for what the gateway serves.
//! Patterns whose last segment is a capture are also bound without it, so a
//! request that leaves the identifier out reaches the resolver and fails as
//! a missing parameter instead of falling through to route-not-found.

use std::collections::{BTreeMap, HashMap, HashSet};

use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{Method, Uri};
use axum::routing::{MethodFilter, MethodRouter};
use tracing::debug;

use crate::ApiState;
use crate::dispatch::dispatch;
use crate::encode::Reply;
use crate::error::{ApiError, ApiResult};
use crate::resolve::{PathParams, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Delete => MethodFilter::DELETE,
        }
    }
}

/// What a matched route asks the daemon to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Ping,
    EndpointJoin,
    EndpointLeave,
    EndpointUpdate,
    EndpointGet,
    EndpointsList,
    IpAllocate,
    IpRelease,
    LabelsPut,
    LabelsGetByUuid,
    LabelsGetBySha256,
    LabelsDeleteByUuid,
    LabelsDeleteBySha256,
    MaxIdentity,
    PolicyAdd,
    PolicyDelete,
    PolicyGet,
    PolicyDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub verb: Verb,
    pub pattern: &'static str,
    pub kind: RouteKind,
}

const fn route(verb: Verb, pattern: &'static str, kind: RouteKind) -> RouteSpec {
    RouteSpec { verb, pattern, kind }
}

pub const ROUTES: &[RouteSpec] = &[
    route(Verb::Get, "/ping", RouteKind::Ping),
    // ── Endpoints ──────────────────────────────────────────────────
    route(Verb::Post, "/endpoint", RouteKind::EndpointJoin),
    route(Verb::Post, "/endpoint/{endpoint_id}", RouteKind::EndpointJoin),
    route(Verb::Delete, "/endpoint/{endpoint_id}", RouteKind::EndpointLeave),
    route(Verb::Post, "/endpoint/update/{endpoint_id}", RouteKind::EndpointUpdate),
    route(Verb::Get, "/endpoint/{endpoint_id}", RouteKind::EndpointGet),
    route(Verb::Get, "/endpoints", RouteKind::EndpointsList),
    // ── IPAM ───────────────────────────────────────────────────────
    route(Verb::Put, "/allocator/container/{container_id}", RouteKind::IpAllocate),
    route(Verb::Delete, "/allocator/container/{container_id}", RouteKind::IpRelease),
    // ── Labels ─────────────────────────────────────────────────────
    route(Verb::Post, "/labels", RouteKind::LabelsPut),
    route(Verb::Get, "/labels/by-uuid/{uuid}", RouteKind::LabelsGetByUuid),
    route(Verb::Get, "/labels/by-sha256sum/{sha256sum}", RouteKind::LabelsGetBySha256),
    route(Verb::Delete, "/labels/by-uuid/{uuid}", RouteKind::LabelsDeleteByUuid),
    route(Verb::Delete, "/labels/by-sha256sum/{sha256sum}", RouteKind::LabelsDeleteBySha256),
    route(Verb::Get, "/labels/status/max-uuid", RouteKind::MaxIdentity),
    // ── Policy ─────────────────────────────────────────────────────
    route(Verb::Post, "/policy/{*path}", RouteKind::PolicyAdd),
    route(Verb::Delete, "/policy/{*path}", RouteKind::PolicyDelete),
    route(Verb::Get, "/policy/{*path}", RouteKind::PolicyGet),
    route(Verb::Post, "/policy-consume-decision", RouteKind::PolicyDecision),
];

/// Every (pattern, verb) the router answers, explicit routes first.
pub fn bindings() -> Vec<RouteSpec> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let bare = ROUTES.iter().flat_map(|r| {
        without_capture(r.pattern)
            .into_iter()
            .flatten()
            .map(move |pattern| RouteSpec { pattern, ..*r })
    });
    for spec in ROUTES.iter().copied().chain(bare) {
        if seen.insert((spec.pattern, spec.verb)) {
            out.push(spec);
        }
    }
    out
}

/// `/a/{x}` → `["/a/", "/a"]`.
fn without_capture(pattern: &'static str) -> Option<[&'static str; 2]> {
    let idx = pattern.rfind('/')?;
    if !pattern[idx + 1..].starts_with('{') || idx == 0 {
        return None;
    }
    Some([&pattern[..=idx], &pattern[..idx]])
}

pub fn router(state: ApiState) -> Router {
    let mut by_pattern: BTreeMap<&'static str, Vec<RouteSpec>> = BTreeMap::new();
    for spec in bindings() {
        by_pattern.entry(spec.pattern).or_default().push(spec);
    }

    let mut router = Router::new();
    for (pattern, specs) in by_pattern {
        let methods = specs
            .into_iter()
            .fold(MethodRouter::<ApiState>::new(), |methods, spec| {
                let kind = spec.kind;
                methods.on(
                    spec.verb.filter(),
                    move |State(state): State<ApiState>,
                          params: Result<Path<HashMap<String, String>>, PathRejection>,
                          body: Result<Bytes, BytesRejection>| {
                        handle(state, kind, params, body)
                    },
                )
            })
            .fallback(route_not_found);
        router = router.route(pattern, methods);
    }
    router.fallback(route_not_found).with_state(state)
}

async fn handle(
    state: ApiState,
    kind: RouteKind,
    params: Result<Path<HashMap<String, String>>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Reply> {
    let params = match params {
        Ok(Path(map)) => PathParams::from(map),
        Err(PathRejection::MissingPathParams(_)) => PathParams::default(),
        Err(e) => return Err(ApiError::Rejected(e.status(), e.body_text())),
    };
    let body = body.map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;

    let op = resolve(kind, &params, &body)?;
    debug!(op = op.name(), "dispatching request");

    let ApiState { daemon, config } = state;
    tokio::task::spawn_blocking(move || dispatch(daemon.as_ref(), &config, op))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
}

async fn route_not_found(method: Method, uri: Uri) -> ApiError {
    ApiError::RouteNotFound {
        method,
        path: uri.path().to_string(),
    }
}
