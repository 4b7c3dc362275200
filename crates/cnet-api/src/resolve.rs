//! Path and body resolution.
//!
//! Turns a matched route, its captured path segments, and the raw body into
//! an [`Operation`]. Everything that can be wrong with a request's shape is
//! caught here, so the daemon only ever sees fully decoded values.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use cnet_core::{
    Endpoint, EndpointOptions, Identity, Labels, PolicyNode, PolicyPath, PolicyPathError,
    SearchContext,
};

use crate::dispatch::{EndpointOp, IpamOp, LabelOp, Operation, PolicyOp};
use crate::error::{ApiError, ApiResult, ParamField};
use crate::routes::RouteKind;

/// Length of a hex-encoded SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;

/// Segments captured from the request path, keyed by capture name.
#[derive(Debug, Clone, Default)]
pub struct PathParams(HashMap<String, String>);

impl From<HashMap<String, String>> for PathParams {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl PathParams {
    /// The segment, if captured and non-empty.
    pub fn optional(&self, field: ParamField) -> Option<&str> {
        self.0
            .get(field.param())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, field: ParamField) -> ApiResult<&str> {
        self.optional(field).ok_or(ApiError::MissingParam(field))
    }

    /// Label UUID segment as a decimal `u32`. A leading `+` is accepted.
    pub fn identity(&self) -> ApiResult<Identity> {
        let raw = self.required(ParamField::LabelUuid)?;
        raw.parse::<Identity>().map_err(|e| ApiError::InvalidParam {
            field: ParamField::LabelUuid,
            value: raw.to_string(),
            reason: e.to_string(),
        })
    }

    /// Digest segment, normalized to lowercase.
    pub fn sha256sum(&self) -> ApiResult<String> {
        let raw = self.required(ParamField::Sha256Sum)?;
        if raw.len() != SHA256_HEX_LEN || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ApiError::InvalidParam {
                field: ParamField::Sha256Sum,
                value: raw.to_string(),
                reason: format!("expected {SHA256_HEX_LEN} hex characters"),
            });
        }
        Ok(raw.to_ascii_lowercase())
    }

    pub fn policy_path(&self) -> ApiResult<PolicyPath> {
        let raw = self.optional(ParamField::PolicyPath).unwrap_or_default();
        PolicyPath::parse(raw).map_err(|e| match e {
            PolicyPathError::Empty => ApiError::MissingParam(ParamField::PolicyPath),
            PolicyPathError::EmptySegment(_) => ApiError::InvalidParam {
                field: ParamField::PolicyPath,
                value: raw.to_string(),
                reason: e.to_string(),
            },
        })
    }
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &'static str) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|source| ApiError::MalformedBody { what, source })
}

/// Resolve a routed request into the operation it asks for.
pub fn resolve(kind: RouteKind, params: &PathParams, body: &[u8]) -> ApiResult<Operation> {
    let op = match kind {
        RouteKind::Ping => Operation::Ping,

        RouteKind::EndpointJoin => {
            let mut endpoint: Endpoint = decode(body, "endpoint")?;
            if let Some(id) = params.optional(ParamField::EndpointId) {
                if endpoint.id.is_empty() {
                    endpoint.id = id.to_string();
                } else if endpoint.id != id {
                    return Err(ApiError::InvalidParam {
                        field: ParamField::EndpointId,
                        value: endpoint.id,
                        reason: format!("body id does not match route id '{id}'"),
                    });
                }
            }
            Operation::Endpoint(EndpointOp::Join(endpoint))
        }
        RouteKind::EndpointLeave => {
            let id = params.required(ParamField::EndpointId)?;
            Operation::Endpoint(EndpointOp::Leave(id.to_string()))
        }
        RouteKind::EndpointUpdate => {
            let id = params.required(ParamField::EndpointId)?;
            let options: EndpointOptions = decode(body, "endpoint options")?;
            Operation::Endpoint(EndpointOp::Update(id.to_string(), options))
        }
        RouteKind::EndpointGet => {
            let id = params.required(ParamField::EndpointId)?;
            Operation::Endpoint(EndpointOp::Get(id.to_string()))
        }
        RouteKind::EndpointsList => Operation::Endpoint(EndpointOp::List),

        RouteKind::IpAllocate => {
            let id = params.required(ParamField::ContainerId)?;
            Operation::Ipam(IpamOp::Allocate(id.to_string()))
        }
        RouteKind::IpRelease => {
            let id = params.required(ParamField::ContainerId)?;
            Operation::Ipam(IpamOp::Release(id.to_string()))
        }

        RouteKind::LabelsPut => {
            let labels: Labels = decode(body, "labels")?;
            Operation::Labels(LabelOp::Put(labels))
        }
        RouteKind::LabelsGetByUuid => Operation::Labels(LabelOp::GetByUuid(params.identity()?)),
        RouteKind::LabelsGetBySha256 => {
            Operation::Labels(LabelOp::GetBySha256(params.sha256sum()?))
        }
        RouteKind::LabelsDeleteByUuid => {
            Operation::Labels(LabelOp::DeleteByUuid(params.identity()?))
        }
        RouteKind::LabelsDeleteBySha256 => {
            Operation::Labels(LabelOp::DeleteBySha256(params.sha256sum()?))
        }
        RouteKind::MaxIdentity => Operation::Labels(LabelOp::MaxId),

        RouteKind::PolicyAdd => {
            let path = params.policy_path()?;
            let node: PolicyNode = decode(body, "policy node")?;
            Operation::Policy(PolicyOp::Add(path, node))
        }
        RouteKind::PolicyDelete => Operation::Policy(PolicyOp::Delete(params.policy_path()?)),
        RouteKind::PolicyGet => Operation::Policy(PolicyOp::Get(params.policy_path()?)),
        RouteKind::PolicyDecision => {
            let ctx: SearchContext = decode(body, "search context")?;
            Operation::Policy(PolicyOp::CanConsume(ctx))
        }
    };
    Ok(op)
}
