//! Workload endpoints.

use std::collections::BTreeMap;
use std::net::Ipv6Addr;

use serde::{Deserialize, Serialize};

use crate::labels::Identity;

/// Opaque endpoint identifier.
pub type EndpointId = String;

/// Runtime option toggles for an endpoint, keyed by option name.
pub type EndpointOptions = BTreeMap<String, bool>;

/// A container's attachment point to the host network.
///
/// Every field defaults, so a join body only needs to carry what the caller
/// knows; the daemon fills in the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub id: EndpointId,
    pub docker_id: String,
    pub docker_network_id: String,
    pub docker_endpoint_id: String,
    pub ifname: String,
    pub lxc_mac: String,
    pub lxc_ip: Option<Ipv6Addr>,
    pub node_mac: String,
    pub node_ip: Option<Ipv6Addr>,
    pub ifindex: u32,
    pub sec_label_id: Option<Identity>,
    pub consumable: bool,
    pub options: EndpointOptions,
}

impl Endpoint {
    /// Merge an options patch into this endpoint's options.
    pub fn apply_options(&mut self, patch: &EndpointOptions) {
        for (name, enabled) in patch {
            self.options.insert(name.clone(), *enabled);
        }
    }
}
