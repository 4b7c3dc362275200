//! Test double that records which daemon capabilities were invoked.

use parking_lot::Mutex;

use cnet_core::{
    Decision, Endpoint, EndpointOptions, Identity, IpamConfig, Labels, PolicyNode, PolicyPath,
    SearchContext, SecurityIdentity,
};
use cnet_daemon::{Daemon, DaemonError, DaemonResult, MemoryConfig, MemoryDaemon};

/// Wraps a [`MemoryDaemon`], logging every call by name. When `fail_with`
/// is set, every call returns a clone of that error instead.
pub struct RecordingDaemon {
    inner: MemoryDaemon,
    calls: Mutex<Vec<&'static str>>,
    fail_with: Option<DaemonError>,
}

impl RecordingDaemon {
    pub fn new() -> Self {
        Self {
            inner: MemoryDaemon::new(MemoryConfig::default()).unwrap(),
            calls: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    pub fn failing(err: DaemonError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, name: &'static str) -> DaemonResult<()> {
        self.calls.lock().push(name);
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Daemon for RecordingDaemon {
    fn ping(&self) -> DaemonResult<String> {
        self.record("ping")?;
        self.inner.ping()
    }

    fn endpoint_join(&self, endpoint: Endpoint) -> DaemonResult<()> {
        self.record("endpoint_join")?;
        self.inner.endpoint_join(endpoint)
    }

    fn endpoint_leave(&self, id: &str) -> DaemonResult<()> {
        self.record("endpoint_leave")?;
        self.inner.endpoint_leave(id)
    }

    fn endpoint_update(&self, id: &str, options: EndpointOptions) -> DaemonResult<()> {
        self.record("endpoint_update")?;
        self.inner.endpoint_update(id, options)
    }

    fn endpoint_get(&self, id: &str) -> DaemonResult<Option<Endpoint>> {
        self.record("endpoint_get")?;
        self.inner.endpoint_get(id)
    }

    fn endpoints_get(&self) -> DaemonResult<Option<Vec<Endpoint>>> {
        self.record("endpoints_get")?;
        self.inner.endpoints_get()
    }

    fn allocate_ips(&self, container_id: &str) -> DaemonResult<IpamConfig> {
        self.record("allocate_ips")?;
        self.inner.allocate_ips(container_id)
    }

    fn release_ips(&self, container_id: &str) -> DaemonResult<()> {
        self.record("release_ips")?;
        self.inner.release_ips(container_id)
    }

    fn put_labels(&self, labels: Labels) -> DaemonResult<(SecurityIdentity, bool)> {
        self.record("put_labels")?;
        self.inner.put_labels(labels)
    }

    fn get_labels(&self, id: Identity) -> DaemonResult<Option<Labels>> {
        self.record("get_labels")?;
        self.inner.get_labels(id)
    }

    fn get_labels_by_sha256(&self, sha256sum: &str) -> DaemonResult<Option<Labels>> {
        self.record("get_labels_by_sha256")?;
        self.inner.get_labels_by_sha256(sha256sum)
    }

    fn delete_labels_by_uuid(&self, id: Identity) -> DaemonResult<()> {
        self.record("delete_labels_by_uuid")?;
        self.inner.delete_labels_by_uuid(id)
    }

    fn delete_labels_by_sha256(&self, sha256sum: &str) -> DaemonResult<()> {
        self.record("delete_labels_by_sha256")?;
        self.inner.delete_labels_by_sha256(sha256sum)
    }

    fn get_max_id(&self) -> DaemonResult<Identity> {
        self.record("get_max_id")?;
        self.inner.get_max_id()
    }

    fn policy_add(&self, path: &PolicyPath, node: PolicyNode) -> DaemonResult<()> {
        self.record("policy_add")?;
        self.inner.policy_add(path, node)
    }

    fn policy_delete(&self, path: &PolicyPath) -> DaemonResult<()> {
        self.record("policy_delete")?;
        self.inner.policy_delete(path)
    }

    fn policy_get(&self, path: &PolicyPath) -> DaemonResult<Option<PolicyNode>> {
        self.record("policy_get")?;
        self.inner.policy_get(path)
    }

    fn policy_can_consume(&self, ctx: &SearchContext) -> DaemonResult<Decision> {
        self.record("policy_can_consume")?;
        self.inner.policy_can_consume(ctx)
    }
}
