use cnet_daemon::Daemon;
use tracing::info;

use crate::encode::{Payload, Reply};
use crate::error::ApiResult;

#[derive(Debug, Clone, PartialEq)]
pub enum IpamOp {
    Allocate(String),
    Release(String),
}

impl IpamOp {
    pub(super) fn name(&self) -> &'static str {
        match self {
            IpamOp::Allocate(_) => "allocate_ips",
            IpamOp::Release(_) => "release_ips",
        }
    }
}

pub(super) fn dispatch(daemon: &dyn Daemon, op: IpamOp) -> ApiResult<Reply> {
    match op {
        IpamOp::Allocate(container_id) => {
            let config = daemon.allocate_ips(&container_id)?;
            if let Some(ip6) = &config.ip6 {
                info!(%container_id, ip = %ip6.ip, "allocated addresses");
            }
            Ok(Reply::Created(Some(Payload::json(&config)?)))
        }
        IpamOp::Release(container_id) => {
            daemon.release_ips(&container_id)?;
            info!(%container_id, "released addresses");
            Ok(Reply::NoContent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnet_core::IpamConfig;
    use cnet_daemon::{MemoryConfig, MemoryDaemon};

    #[test]
    fn allocate_returns_config_and_release_frees_it() {
        let d = MemoryDaemon::new(MemoryConfig::default()).unwrap();
        let reply = dispatch(&d, IpamOp::Allocate("c1".into())).unwrap();
        let Reply::Created(Some(Payload::Json(bytes))) = reply else {
            panic!("unexpected {reply:?}");
        };
        let config: IpamConfig = serde_json::from_slice(&bytes).unwrap();
        assert!(config.ip6.is_some());

        assert_eq!(
            dispatch(&d, IpamOp::Release("c1".into())).unwrap(),
            Reply::NoContent
        );
        assert!(dispatch(&d, IpamOp::Release("c1".into())).is_err());
    }
}
