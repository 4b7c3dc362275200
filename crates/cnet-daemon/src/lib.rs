//! cnet-daemon — the capability interface the API gateway drives.
//!
//! The gateway never touches endpoint, address, identity, or policy state
//! itself. It holds an `Arc<dyn Daemon>` and calls exactly one method per
//! request. Implementations must be safe to call concurrently, and
//! [`Daemon::put_labels`] must converge concurrent identical submissions to a
//! single identity.
//!
//! [`MemoryDaemon`] is an in-process implementation used by `cnetd`'s
//! standalone mode and by tests.

pub mod error;
pub mod memory;

pub use error::{DaemonError, DaemonResult};
pub use memory::{IpamSettings, LabelSettings, MemoryConfig, MemoryDaemon};

use cnet_core::{
    Decision, Endpoint, EndpointOptions, Identity, IpamConfig, Labels, PolicyNode, PolicyPath,
    SearchContext, SecurityIdentity,
};

/// Operations the gateway may invoke on the daemon's subsystems.
///
/// Lookups return `Ok(None)` when the resource does not exist.
pub trait Daemon: Send + Sync {
    /// Liveness check; returns a short status string.
    fn ping(&self) -> DaemonResult<String>;

    // ── Endpoints ──────────────────────────────────────────────────

    fn endpoint_join(&self, endpoint: Endpoint) -> DaemonResult<()>;
    fn endpoint_leave(&self, id: &str) -> DaemonResult<()>;
    fn endpoint_update(&self, id: &str, options: EndpointOptions) -> DaemonResult<()>;
    fn endpoint_get(&self, id: &str) -> DaemonResult<Option<Endpoint>>;
    /// All endpoints ordered by ID, or `None` if there are none.
    fn endpoints_get(&self) -> DaemonResult<Option<Vec<Endpoint>>>;

    // ── IPAM ───────────────────────────────────────────────────────

    fn allocate_ips(&self, container_id: &str) -> DaemonResult<IpamConfig>;
    fn release_ips(&self, container_id: &str) -> DaemonResult<()>;

    // ── Label identities ───────────────────────────────────────────

    /// Get-or-create the identity for `labels`. The flag is true when a new
    /// identity was allocated.
    fn put_labels(&self, labels: Labels) -> DaemonResult<(SecurityIdentity, bool)>;
    fn get_labels(&self, id: Identity) -> DaemonResult<Option<Labels>>;
    fn get_labels_by_sha256(&self, sha256sum: &str) -> DaemonResult<Option<Labels>>;
    fn delete_labels_by_uuid(&self, id: Identity) -> DaemonResult<()>;
    fn delete_labels_by_sha256(&self, sha256sum: &str) -> DaemonResult<()>;
    /// Identity watermark; never decreases.
    fn get_max_id(&self) -> DaemonResult<Identity>;

    // ── Policy ─────────────────────────────────────────────────────

    fn policy_add(&self, path: &PolicyPath, node: PolicyNode) -> DaemonResult<()>;
    /// Removing a path that does not exist succeeds.
    fn policy_delete(&self, path: &PolicyPath) -> DaemonResult<()>;
    fn policy_get(&self, path: &PolicyPath) -> DaemonResult<Option<PolicyNode>>;
    fn policy_can_consume(&self, ctx: &SearchContext) -> DaemonResult<Decision>;
}
