use cnet_core::{Identity, Labels};
use cnet_daemon::Daemon;
use tracing::{debug, info};

use crate::encode::{Payload, Reply};
use crate::error::ApiResult;

#[derive(Debug, Clone, PartialEq)]
pub enum LabelOp {
    Put(Labels),
    GetByUuid(Identity),
    GetBySha256(String),
    DeleteByUuid(Identity),
    DeleteBySha256(String),
    MaxId,
}

impl LabelOp {
    pub(super) fn name(&self) -> &'static str {
        match self {
            LabelOp::Put(_) => "put_labels",
            LabelOp::GetByUuid(_) => "get_labels",
            LabelOp::GetBySha256(_) => "get_labels_by_sha256",
            LabelOp::DeleteByUuid(_) => "delete_labels_by_uuid",
            LabelOp::DeleteBySha256(_) => "delete_labels_by_sha256",
            LabelOp::MaxId => "get_max_id",
        }
    }
}

pub(super) fn dispatch(daemon: &dyn Daemon, op: LabelOp) -> ApiResult<Reply> {
    match op {
        LabelOp::Put(labels) => {
            let (identity, is_new) = daemon.put_labels(labels)?;
            if is_new {
                info!(id = identity.id, sha256sum = %identity.sha256sum, "allocated identity");
            } else {
                debug!(id = identity.id, "reused identity");
            }
            Ok(Reply::Accepted(Some(Payload::json(&identity)?)))
        }
        LabelOp::GetByUuid(id) => Reply::found(daemon.get_labels(id)?),
        LabelOp::GetBySha256(sum) => Reply::found(daemon.get_labels_by_sha256(&sum)?),
        LabelOp::DeleteByUuid(id) => {
            daemon.delete_labels_by_uuid(id)?;
            Ok(Reply::NoContent)
        }
        LabelOp::DeleteBySha256(sum) => {
            daemon.delete_labels_by_sha256(&sum)?;
            Ok(Reply::NoContent)
        }
        LabelOp::MaxId => Ok(Reply::Retrieved(Payload::json(&daemon.get_max_id()?)?)),
    }
}
