//! Contract for the management interface that supplies raw cluster facts.
//!
//! Every `ClusterProbe` call stands for a remote operation. The status
//! command awaits them strictly one after another; nothing here is
//! expected to be pipelined.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{HostIdMap, LoadMap, OwnershipMap};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    /// the requested keyspace does not exist
    #[error("{0}")]
    InvalidKeyspace(String),
    /// effective ownership cannot be computed for the request
    #[error("{0}")]
    OwnershipIndeterminate(String),
    #[error("unknown host: {0}")]
    UnknownHost(String),
    /// the management interface itself failed
    #[error("probe unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ClusterProbe: Send + Sync {
    async fn joining_nodes(&self) -> Result<Vec<String>, ProbeError>;
    async fn leaving_nodes(&self) -> Result<Vec<String>, ProbeError>;
    async fn moving_nodes(&self) -> Result<Vec<String>, ProbeError>;
    async fn load_map(&self) -> Result<LoadMap, ProbeError>;
    /// token (wire form) -> endpoint address
    async fn token_to_endpoint_map(&self) -> Result<BTreeMap<String, String>, ProbeError>;
    async fn live_nodes(&self) -> Result<Vec<String>, ProbeError>;
    async fn unreachable_nodes(&self) -> Result<Vec<String>, ProbeError>;
    async fn host_id_map(&self) -> Result<HostIdMap, ProbeError>;
    async fn endpoint_snitch_info(&self) -> Result<Arc<dyn EndpointSnitchInfo>, ProbeError>;
    /// Keyspace-aware ownership. Fails with `InvalidKeyspace` or
    /// `OwnershipIndeterminate`.
    async fn effective_ownership(&self, keyspace: Option<&str>)
    -> Result<OwnershipMap, ProbeError>;
    /// Schema-agnostic ownership by token range
    async fn ownership(&self) -> Result<OwnershipMap, ProbeError>;
}

/// Datacenter/rack placement of endpoints
pub trait EndpointSnitchInfo: Send + Sync {
    fn datacenter(&self, endpoint: &str) -> Result<String, ProbeError>;
    fn rack(&self, endpoint: &str) -> Result<String, ProbeError>;
}

/// Reverse name lookup for display purposes. `None` means the lookup failed.
pub trait NameResolver: Send + Sync {
    fn reverse_lookup(&self, address: &str) -> Option<String>;
}

/// Resolver used when names are not requested: every address stays literal
pub struct LiteralNames;

impl NameResolver for LiteralNames {
    fn reverse_lookup(&self, _address: &str) -> Option<String> {
        None
    }
}
