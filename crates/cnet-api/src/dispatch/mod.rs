//! Capability dispatch.
//!
//! Each [`Operation`] maps to exactly one [`Daemon`] call. The submodules
//! pick the success status for their subsystem; daemon faults propagate
//! unchanged into [`ApiError::Daemon`](crate::ApiError::Daemon).

mod endpoint;
mod ipam;
mod labels;
mod policy;

pub use endpoint::EndpointOp;
pub use ipam::IpamOp;
pub use labels::LabelOp;
pub use policy::PolicyOp;

use cnet_daemon::Daemon;

use crate::ApiConfig;
use crate::encode::{Payload, Reply};
use crate::error::ApiResult;

/// A fully resolved request.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Ping,
    Endpoint(EndpointOp),
    Ipam(IpamOp),
    Labels(LabelOp),
    Policy(PolicyOp),
}

impl Operation {
    /// Short name used in request logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Ping => "ping",
            Operation::Endpoint(op) => op.name(),
            Operation::Ipam(op) => op.name(),
            Operation::Labels(op) => op.name(),
            Operation::Policy(op) => op.name(),
        }
    }
}

/// Run `op` against the daemon. Blocks for as long as the daemon does.
pub fn dispatch(daemon: &dyn Daemon, config: &ApiConfig, op: Operation) -> ApiResult<Reply> {
    match op {
        Operation::Ping => Ok(Reply::Retrieved(Payload::Text(daemon.ping()?))),
        Operation::Endpoint(op) => endpoint::dispatch(daemon, op),
        Operation::Ipam(op) => ipam::dispatch(daemon, op),
        Operation::Labels(op) => labels::dispatch(daemon, op),
        Operation::Policy(op) => policy::dispatch(daemon, config.policy_view, op),
    }
}
