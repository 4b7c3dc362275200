//! MemoryDaemon — in-process daemon backend.
//!
//! Keeps endpoints, address allocations, label identities, and the policy
//! tree in memory. Each subsystem sits behind its own lock so unrelated
//! requests never contend. Nothing survives a restart.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::{IpAddr, Ipv6Addr};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use cnet_core::{
    ConsumableAction, Decision, Endpoint, EndpointId, EndpointOptions, Identity, IpConfig,
    IpamConfig, Labels, PolicyNode, PolicyPath, PolicyRule, Route, SearchContext,
    SecurityIdentity,
};

use crate::Daemon;
use crate::error::{DaemonError, DaemonResult};

/// Tunables for the in-memory backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    pub ipam: IpamSettings,
    pub labels: LabelSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IpamSettings {
    /// /112 prefix; container addresses take the low 16 bits.
    pub node_prefix: Ipv6Addr,
    /// Host number of the node's gateway address within the prefix.
    pub gateway_host: u16,
}

impl Default for IpamSettings {
    fn default() -> Self {
        Self {
            node_prefix: Ipv6Addr::new(0xf00d, 0, 0, 0, 0, 0xc0a8, 1, 0),
            gateway_host: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelSettings {
    /// First identity handed out; lower values are reserved.
    pub first_identity: Identity,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            first_identity: 256,
        }
    }
}

const HOST_MASK: u128 = 0xffff;

#[derive(Default)]
struct EndpointTable {
    endpoints: BTreeMap<EndpointId, Endpoint>,
    next_generated: u64,
}

struct AddressPool {
    prefix: u128,
    gateway_host: u16,
    allocations: HashMap<String, (u16, IpamConfig)>,
    in_use: BTreeSet<u16>,
}

struct IdentityTable {
    by_id: BTreeMap<Identity, SecurityIdentity>,
    by_digest: HashMap<String, Identity>,
    next_id: Identity,
}

/// Daemon backend holding all state in process memory.
pub struct MemoryDaemon {
    endpoints: RwLock<EndpointTable>,
    addresses: Mutex<AddressPool>,
    identities: RwLock<IdentityTable>,
    policy: RwLock<PolicyNode>,
}

impl MemoryDaemon {
    pub fn new(config: MemoryConfig) -> DaemonResult<Self> {
        let prefix = u128::from(config.ipam.node_prefix);
        if prefix & HOST_MASK != 0 {
            return Err(DaemonError::InvalidArgument(format!(
                "node prefix {} has host bits set",
                config.ipam.node_prefix
            )));
        }
        if config.ipam.gateway_host == 0 {
            return Err(DaemonError::InvalidArgument(
                "gateway host must be non-zero".to_string(),
            ));
        }
        debug!(prefix = %config.ipam.node_prefix, first_identity = config.labels.first_identity, "memory daemon created");
        Ok(Self {
            endpoints: RwLock::new(EndpointTable::default()),
            addresses: Mutex::new(AddressPool {
                prefix,
                gateway_host: config.ipam.gateway_host,
                allocations: HashMap::new(),
                in_use: BTreeSet::new(),
            }),
            identities: RwLock::new(IdentityTable {
                by_id: BTreeMap::new(),
                by_digest: HashMap::new(),
                next_id: config.labels.first_identity,
            }),
            policy: RwLock::new(PolicyNode::default()),
        })
    }
}

impl AddressPool {
    fn address(&self, host: u16) -> Ipv6Addr {
        Ipv6Addr::from(self.prefix | u128::from(host))
    }

    fn next_free_host(&self) -> Option<u16> {
        (1..=u16::MAX).find(|h| *h != self.gateway_host && !self.in_use.contains(h))
    }

    fn config_for(&self, host: u16) -> IpamConfig {
        let gateway = IpAddr::V6(self.address(self.gateway_host));
        IpamConfig {
            ip6: Some(IpConfig {
                ip: IpAddr::V6(self.address(host)),
                prefix_len: 128,
                gateway,
                routes: vec![
                    Route {
                        destination: gateway,
                        prefix_len: 128,
                        next_hop: None,
                    },
                    Route {
                        destination: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                        prefix_len: 0,
                        next_hop: Some(gateway),
                    },
                ],
            }),
            ip4: None,
        }
    }
}

impl IdentityTable {
    fn remove(&mut self, id: Identity) -> Option<SecurityIdentity> {
        let identity = self.by_id.remove(&id)?;
        self.by_digest.remove(&identity.sha256sum);
        Some(identity)
    }
}

/// Evaluate a consumption query against the whole tree.
///
/// Rules apply when their coverage is carried by `ctx.to`. A matching deny
/// or an unmet requirement denies outright; otherwise any matching accept
/// allows.
fn evaluate(root: &PolicyNode, ctx: &SearchContext) -> Decision {
    let mut decision = Decision::Undecided;
    for node in root.walk() {
        for rule in &node.rules {
            match rule {
                PolicyRule::Consumers { coverage, allow } if ctx.to.contains_all(coverage) => {
                    for entry in allow.iter().filter(|a| ctx.from.contains(&a.label)) {
                        match entry.action {
                            ConsumableAction::Deny => return Decision::Denied,
                            ConsumableAction::Accept => decision = Decision::Allowed,
                        }
                    }
                }
                PolicyRule::Requires { coverage, requires } if ctx.to.contains_all(coverage) => {
                    if !ctx.from.contains_all(requires) {
                        return Decision::Denied;
                    }
                }
                _ => {}
            }
        }
    }
    decision
}

impl Daemon for MemoryDaemon {
    fn ping(&self) -> DaemonResult<String> {
        Ok("OK".to_string())
    }

    // ── Endpoints ──────────────────────────────────────────────────

    fn endpoint_join(&self, mut endpoint: Endpoint) -> DaemonResult<()> {
        let mut table = self.endpoints.write();
        if endpoint.id.is_empty() {
            loop {
                table.next_generated += 1;
                let candidate = table.next_generated.to_string();
                if !table.endpoints.contains_key(&candidate) {
                    endpoint.id = candidate;
                    break;
                }
            }
        } else if table.endpoints.contains_key(&endpoint.id) {
            return Err(DaemonError::Conflict(format!(
                "endpoint {} already joined",
                endpoint.id
            )));
        }
        debug!(id = %endpoint.id, "endpoint joined");
        table.endpoints.insert(endpoint.id.clone(), endpoint);
        Ok(())
    }

    fn endpoint_leave(&self, id: &str) -> DaemonResult<()> {
        match self.endpoints.write().endpoints.remove(id) {
            Some(_) => {
                debug!(%id, "endpoint left");
                Ok(())
            }
            None => Err(DaemonError::NotFound(format!("endpoint {id}"))),
        }
    }

    fn endpoint_update(&self, id: &str, options: EndpointOptions) -> DaemonResult<()> {
        let mut table = self.endpoints.write();
        let endpoint = table
            .endpoints
            .get_mut(id)
            .ok_or_else(|| DaemonError::NotFound(format!("endpoint {id}")))?;
        endpoint.apply_options(&options);
        debug!(%id, changed = options.len(), "endpoint options updated");
        Ok(())
    }

    fn endpoint_get(&self, id: &str) -> DaemonResult<Option<Endpoint>> {
        Ok(self.endpoints.read().endpoints.get(id).cloned())
    }

    fn endpoints_get(&self) -> DaemonResult<Option<Vec<Endpoint>>> {
        let table = self.endpoints.read();
        if table.endpoints.is_empty() {
            return Ok(None);
        }
        Ok(Some(table.endpoints.values().cloned().collect()))
    }

    // ── IPAM ───────────────────────────────────────────────────────

    fn allocate_ips(&self, container_id: &str) -> DaemonResult<IpamConfig> {
        let mut pool = self.addresses.lock();
        if pool.allocations.contains_key(container_id) {
            return Err(DaemonError::Conflict(format!(
                "container {container_id} already holds an allocation"
            )));
        }
        let host = pool
            .next_free_host()
            .ok_or_else(|| DaemonError::Exhausted("no free addresses in node prefix".to_string()))?;
        let config = pool.config_for(host);
        pool.in_use.insert(host);
        pool.allocations
            .insert(container_id.to_string(), (host, config.clone()));
        debug!(container = %container_id, host, "addresses allocated");
        Ok(config)
    }

    fn release_ips(&self, container_id: &str) -> DaemonResult<()> {
        let mut pool = self.addresses.lock();
        let (host, _) = pool
            .allocations
            .remove(container_id)
            .ok_or_else(|| DaemonError::NotFound(format!("allocation for container {container_id}")))?;
        pool.in_use.remove(&host);
        debug!(container = %container_id, host, "addresses released");
        Ok(())
    }

    // ── Label identities ───────────────────────────────────────────

    fn put_labels(&self, labels: Labels) -> DaemonResult<(SecurityIdentity, bool)> {
        let digest = labels.sha256sum();
        // Lookup and insert happen under one write lock so concurrent
        // identical submissions resolve to the same identity.
        let mut table = self.identities.write();
        if let Some(id) = table.by_digest.get(&digest) {
            if let Some(existing) = table.by_id.get(id) {
                return Ok((existing.clone(), false));
            }
        }
        let id = table.next_id;
        table.next_id = id
            .checked_add(1)
            .ok_or_else(|| DaemonError::Exhausted("identity space".to_string()))?;
        let identity = SecurityIdentity::new(id, labels);
        table.by_digest.insert(digest, id);
        table.by_id.insert(id, identity.clone());
        debug!(id, sha256sum = %identity.sha256sum, "identity allocated");
        Ok((identity, true))
    }

    fn get_labels(&self, id: Identity) -> DaemonResult<Option<Labels>> {
        Ok(self.identities.read().by_id.get(&id).map(|i| i.labels.clone()))
    }

    fn get_labels_by_sha256(&self, sha256sum: &str) -> DaemonResult<Option<Labels>> {
        let table = self.identities.read();
        Ok(table
            .by_digest
            .get(sha256sum)
            .and_then(|id| table.by_id.get(id))
            .map(|i| i.labels.clone()))
    }

    fn delete_labels_by_uuid(&self, id: Identity) -> DaemonResult<()> {
        match self.identities.write().remove(id) {
            Some(_) => {
                debug!(id, "identity deleted");
                Ok(())
            }
            None => Err(DaemonError::NotFound(format!("identity {id}"))),
        }
    }

    fn delete_labels_by_sha256(&self, sha256sum: &str) -> DaemonResult<()> {
        let mut table = self.identities.write();
        let id = table
            .by_digest
            .get(sha256sum)
            .copied()
            .ok_or_else(|| DaemonError::NotFound(format!("identity with sha256sum {sha256sum}")))?;
        table.remove(id);
        debug!(id, %sha256sum, "identity deleted");
        Ok(())
    }

    fn get_max_id(&self) -> DaemonResult<Identity> {
        Ok(self.identities.read().next_id)
    }

    // ── Policy ─────────────────────────────────────────────────────

    fn policy_add(&self, path: &PolicyPath, node: PolicyNode) -> DaemonResult<()> {
        if let Some(name) = node.invalid_child_name() {
            return Err(DaemonError::InvalidArgument(format!(
                "policy node name '{name}' is not a valid path segment"
            )));
        }
        self.policy.write().graft(path, node);
        debug!(%path, "policy subtree stored");
        Ok(())
    }

    fn policy_delete(&self, path: &PolicyPath) -> DaemonResult<()> {
        let removed = self.policy.write().prune(path).is_some();
        debug!(%path, removed, "policy subtree deleted");
        Ok(())
    }

    fn policy_get(&self, path: &PolicyPath) -> DaemonResult<Option<PolicyNode>> {
        Ok(self.policy.read().lookup(path).cloned())
    }

    fn policy_can_consume(&self, ctx: &SearchContext) -> DaemonResult<Decision> {
        Ok(evaluate(&self.policy.read(), ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnet_core::{AllowRule, Label};
    use std::sync::Arc;

    fn daemon() -> MemoryDaemon {
        MemoryDaemon::new(MemoryConfig::default()).unwrap()
    }

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| Label::new(*k, *v)).collect()
    }

    fn path(s: &str) -> PolicyPath {
        PolicyPath::parse(s).unwrap()
    }

    #[test]
    fn rejects_prefix_with_host_bits() {
        let mut config = MemoryConfig::default();
        config.ipam.node_prefix = "f00d::1".parse().unwrap();
        assert!(matches!(
            MemoryDaemon::new(config),
            Err(DaemonError::InvalidArgument(_))
        ));
    }

    #[test]
    fn endpoint_lifecycle() {
        let d = daemon();
        let ep = Endpoint {
            id: "4242".to_string(),
            ..Default::default()
        };
        d.endpoint_join(ep.clone()).unwrap();
        assert_eq!(d.endpoint_get("4242").unwrap(), Some(ep.clone()));
        assert!(matches!(d.endpoint_join(ep), Err(DaemonError::Conflict(_))));

        let patch = EndpointOptions::from([("Debug".to_string(), true)]);
        d.endpoint_update("4242", patch).unwrap();
        assert_eq!(d.endpoint_get("4242").unwrap().unwrap().options["Debug"], true);

        d.endpoint_leave("4242").unwrap();
        assert_eq!(d.endpoint_get("4242").unwrap(), None);
        assert!(matches!(d.endpoint_leave("4242"), Err(DaemonError::NotFound(_))));
        assert!(matches!(
            d.endpoint_update("4242", EndpointOptions::new()),
            Err(DaemonError::NotFound(_))
        ));
    }

    #[test]
    fn endpoint_without_id_gets_one() {
        let d = daemon();
        d.endpoint_join(Endpoint::default()).unwrap();
        d.endpoint_join(Endpoint::default()).unwrap();
        let all = d.endpoints_get().unwrap().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|ep| !ep.id.is_empty()));
        assert_ne!(all[0].id, all[1].id);
    }

    #[test]
    fn endpoints_list_is_none_when_empty_and_sorted_otherwise() {
        let d = daemon();
        assert_eq!(d.endpoints_get().unwrap(), None);
        for id in ["b", "a", "c"] {
            d.endpoint_join(Endpoint {
                id: id.to_string(),
                ..Default::default()
            })
            .unwrap();
        }
        let ids: Vec<String> = d
            .endpoints_get()
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|ep| ep.id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn allocation_skips_gateway_and_reuses_released_hosts() {
        let d = daemon();
        let first = d.allocate_ips("c1").unwrap().ip6.unwrap();
        let second = d.allocate_ips("c2").unwrap().ip6.unwrap();
        assert_eq!(first.ip, "f00d::c0a8:1:2".parse::<IpAddr>().unwrap());
        assert_eq!(first.gateway, "f00d::c0a8:1:1".parse::<IpAddr>().unwrap());
        assert_eq!(second.ip, "f00d::c0a8:1:3".parse::<IpAddr>().unwrap());

        assert!(matches!(d.allocate_ips("c1"), Err(DaemonError::Conflict(_))));

        d.release_ips("c1").unwrap();
        assert!(matches!(d.release_ips("c1"), Err(DaemonError::NotFound(_))));
        let again = d.allocate_ips("c3").unwrap().ip6.unwrap();
        assert_eq!(again.ip, first.ip);
    }

    #[test]
    fn put_labels_is_idempotent() {
        let d = daemon();
        let (a, created) = d.put_labels(labels(&[("role", "frontend")])).unwrap();
        assert!(created);
        assert_eq!(a.id, 256);
        let max = d.get_max_id().unwrap();

        let (b, created) = d.put_labels(labels(&[("role", "frontend")])).unwrap();
        assert!(!created);
        assert_eq!(a.id, b.id);
        assert_eq!(d.get_max_id().unwrap(), max);

        let (c, _) = d.put_labels(labels(&[("role", "backend")])).unwrap();
        assert_ne!(c.id, a.id);
        assert_eq!(d.get_max_id().unwrap(), max + 1);
    }

    #[test]
    fn look_alike_label_sets_get_distinct_identities() {
        let d = daemon();
        let (a, _) = d.put_labels(labels(&[("a=b", "c")])).unwrap();
        let (b, created) = d.put_labels(labels(&[("a", "b=c")])).unwrap();
        assert!(created);
        assert_ne!(a.id, b.id);
        assert_eq!(d.get_labels(b.id).unwrap(), Some(labels(&[("a", "b=c")])));
    }

    #[test]
    fn concurrent_identical_puts_converge() {
        let d = Arc::new(daemon());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = Arc::clone(&d);
                std::thread::spawn(move || d.put_labels(labels(&[("app", "db")])).unwrap().0.id)
            })
            .collect();
        let ids: BTreeSet<Identity> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(d.get_max_id().unwrap(), 257);
    }

    #[test]
    fn labels_are_addressable_by_either_key() {
        let d = daemon();
        let set = labels(&[("role", "frontend")]);
        let (identity, _) = d.put_labels(set.clone()).unwrap();

        assert_eq!(d.get_labels(identity.id).unwrap(), Some(set.clone()));
        assert_eq!(d.get_labels_by_sha256(&set.sha256sum()).unwrap(), Some(set.clone()));

        d.delete_labels_by_sha256(&set.sha256sum()).unwrap();
        assert_eq!(d.get_labels(identity.id).unwrap(), None);
        assert!(matches!(
            d.delete_labels_by_uuid(identity.id),
            Err(DaemonError::NotFound(_))
        ));

        // Deletion never lowers the watermark or recycles the id.
        let (again, created) = d.put_labels(set).unwrap();
        assert!(created);
        assert_eq!(again.id, identity.id + 1);
    }

    #[test]
    fn policy_round_trip_and_absent_paths() {
        let d = daemon();
        assert_eq!(d.policy_get(&path("io/web")).unwrap(), None);
        d.policy_delete(&path("io/web")).unwrap();

        let node: PolicyNode = serde_json::from_str(
            r#"{"rules":[{"kind":"requires","requires":[{"key":"env","value":"prod"}]}]}"#,
        )
        .unwrap();
        d.policy_add(&path("io/web"), node.clone()).unwrap();
        assert_eq!(d.policy_get(&path("io/web")).unwrap(), Some(node));

        d.policy_delete(&path("io")).unwrap();
        assert_eq!(d.policy_get(&path("io/web")).unwrap(), None);
    }

    #[test]
    fn policy_add_rejects_unaddressable_children() {
        let d = daemon();
        let mut node = PolicyNode::default();
        node.children.insert("a/b".to_string(), PolicyNode::default());
        assert!(matches!(
            d.policy_add(&path("io"), node),
            Err(DaemonError::InvalidArgument(_))
        ));
    }

    #[test]
    fn consumption_decisions() {
        let d = daemon();
        let node = PolicyNode {
            rules: vec![PolicyRule::Consumers {
                coverage: vec![Label::new("role", "db")],
                allow: vec![
                    AllowRule {
                        action: ConsumableAction::Accept,
                        label: Label::new("role", "web"),
                    },
                    AllowRule {
                        action: ConsumableAction::Deny,
                        label: Label::new("env", "dev"),
                    },
                ],
            }],
            children: BTreeMap::new(),
        };
        d.policy_add(&path("io/db"), node).unwrap();

        let ctx = |from: &[(&str, &str)], to: &[(&str, &str)]| SearchContext {
            from: labels(from),
            to: labels(to),
        };

        assert_eq!(
            d.policy_can_consume(&ctx(&[("role", "web")], &[("role", "db")])).unwrap(),
            Decision::Allowed
        );
        assert_eq!(
            d.policy_can_consume(&ctx(&[("role", "web"), ("env", "dev")], &[("role", "db")]))
                .unwrap(),
            Decision::Denied
        );
        assert_eq!(
            d.policy_can_consume(&ctx(&[("role", "web")], &[("role", "cache")])).unwrap(),
            Decision::Undecided
        );

        d.policy_add(
            &path("io/db/strict"),
            PolicyNode {
                rules: vec![PolicyRule::Requires {
                    coverage: vec![Label::new("role", "db")],
                    requires: vec![Label::new("env", "prod")],
                }],
                children: BTreeMap::new(),
            },
        )
        .unwrap();
        assert_eq!(
            d.policy_can_consume(&ctx(&[("role", "web")], &[("role", "db")])).unwrap(),
            Decision::Denied
        );
    }
}
