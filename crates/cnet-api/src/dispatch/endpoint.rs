use cnet_core::{Endpoint, EndpointId, EndpointOptions};
use cnet_daemon::Daemon;
use tracing::info;

use crate::encode::Reply;
use crate::error::ApiResult;

#[derive(Debug, Clone, PartialEq)]
pub enum EndpointOp {
    Join(Endpoint),
    Leave(EndpointId),
    Update(EndpointId, EndpointOptions),
    Get(EndpointId),
    List,
}

impl EndpointOp {
    pub(super) fn name(&self) -> &'static str {
        match self {
            EndpointOp::Join(_) => "endpoint_join",
            EndpointOp::Leave(_) => "endpoint_leave",
            EndpointOp::Update(..) => "endpoint_update",
            EndpointOp::Get(_) => "endpoint_get",
            EndpointOp::List => "endpoints_get",
        }
    }
}

pub(super) fn dispatch(daemon: &dyn Daemon, op: EndpointOp) -> ApiResult<Reply> {
    match op {
        EndpointOp::Join(endpoint) => {
            let docker_id = endpoint.docker_id.clone();
            daemon.endpoint_join(endpoint)?;
            info!(%docker_id, "endpoint joined");
            Ok(Reply::Created(None))
        }
        EndpointOp::Leave(id) => {
            daemon.endpoint_leave(&id)?;
            info!(endpoint_id = %id, "endpoint left");
            Ok(Reply::NoContent)
        }
        EndpointOp::Update(id, options) => {
            daemon.endpoint_update(&id, options)?;
            Ok(Reply::Accepted(None))
        }
        EndpointOp::Get(id) => Reply::found(daemon.endpoint_get(&id)?),
        EndpointOp::List => {
            let endpoints = daemon.endpoints_get()?.filter(|eps| !eps.is_empty());
            Reply::found(endpoints)
        }
    }
}
