//! cnet-core — domain types shared by the cnet daemon, gateway, and clients.
//!
//! Everything here is plain data plus the few pure functions that define
//! identity: the canonical label digest and policy path addressing.

pub mod endpoint;
pub mod ipam;
pub mod labels;
pub mod policy;

pub use endpoint::{Endpoint, EndpointId, EndpointOptions};
pub use ipam::{IpConfig, IpamConfig, Route};
pub use labels::{Identity, Label, Labels, SecurityIdentity, DEFAULT_LABEL_SOURCE};
pub use policy::{
    AllowRule, ConsumableAction, Decision, PolicyNode, PolicyPath, PolicyPathError, PolicyRule,
    SearchContext,
};
