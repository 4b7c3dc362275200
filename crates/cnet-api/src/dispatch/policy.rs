use cnet_core::{PolicyNode, PolicyPath, SearchContext};
use cnet_daemon::Daemon;
use tracing::{debug, info};

use crate::PolicyView;
use crate::encode::{Payload, Reply};
use crate::error::ApiResult;

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyOp {
    Add(PolicyPath, PolicyNode),
    Delete(PolicyPath),
    Get(PolicyPath),
    CanConsume(SearchContext),
}

impl PolicyOp {
    pub(super) fn name(&self) -> &'static str {
        match self {
            PolicyOp::Add(..) => "policy_add",
            PolicyOp::Delete(_) => "policy_delete",
            PolicyOp::Get(_) => "policy_get",
            PolicyOp::CanConsume(_) => "policy_can_consume",
        }
    }
}

pub(super) fn dispatch(daemon: &dyn Daemon, view: PolicyView, op: PolicyOp) -> ApiResult<Reply> {
    match op {
        PolicyOp::Add(path, node) => {
            daemon.policy_add(&path, node)?;
            info!(%path, "policy added");
            Ok(Reply::Created(None))
        }
        PolicyOp::Delete(path) => {
            daemon.policy_delete(&path)?;
            info!(%path, "policy deleted");
            Ok(Reply::NoContent)
        }
        PolicyOp::Get(path) => {
            let node = daemon.policy_get(&path)?;
            let node = match view {
                PolicyView::Subtree => node,
                PolicyView::Node => node.map(|n| n.without_children()),
            };
            Reply::found(node)
        }
        PolicyOp::CanConsume(ctx) => {
            let decision = daemon.policy_can_consume(&ctx)?;
            debug!(?decision, "policy decision");
            Ok(Reply::Accepted(Some(Payload::json(&decision)?)))
        }
    }
}
