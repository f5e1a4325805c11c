use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{HostIdMap, LoadMap, OwnershipMap};
use crate::probe::{ClusterProbe, EndpointSnitchInfo, NameResolver, ProbeError};

/// Environment variable naming the snapshot file when `--snapshot` is not given
pub const SNAPSHOT_ENV: &str = "RINGSTAT_SNAPSHOT";

const LOCAL_STRATEGY: &str = "LocalStrategy";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyspaceInfo {
    /// replication class plus options, e.g. `NetworkTopologyStrategy {dc1: 3}`
    pub replication: String,
    #[serde(default)]
    pub effective_ownership: OwnershipMap,
}

/// Cluster facts captured from the management interface at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSnapshot {
    pub captured_at: Option<DateTime<Utc>>,
    pub live: Vec<String>,
    pub unreachable: Vec<String>,
    pub joining: Vec<String>,
    pub leaving: Vec<String>,
    pub moving: Vec<String>,
    pub load: LoadMap,
    pub host_ids: HostIdMap,
    /// token -> endpoint
    pub tokens: BTreeMap<String, String>,
    pub datacenters: BTreeMap<String, String>,
    pub racks: BTreeMap<String, String>,
    /// reverse-DNS names by address
    pub hostnames: BTreeMap<String, String>,
    /// raw ownership; derived from the token ring when absent
    pub ownership: Option<OwnershipMap>,
    pub keyspaces: BTreeMap<String, KeyspaceInfo>,
}

impl ClusterSnapshot {
    /// Reads a snapshot, choosing YAML or JSON by file extension
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot file {:?}", path))?;

        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        let snapshot: ClusterSnapshot = if is_yaml {
            serde_yaml::from_str(&data).context("Failed to parse YAML snapshot")?
        } else {
            serde_json::from_str(&data).context("Failed to parse JSON snapshot")?
        };

        match snapshot.captured_at {
            Some(captured_at) => info!(
                "Using snapshot captured {} ago ({})",
                humanize_duration(Utc::now() - captured_at),
                captured_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => debug!("Snapshot {:?} carries no capture time", path),
        }

        Ok(snapshot)
    }

    /// `--snapshot` flag, then the environment, then the XDG cache directory
    pub fn resolve_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path);
        }
        if let Ok(path) = std::env::var(SNAPSHOT_ENV) {
            return Ok(PathBuf::from(path));
        }
        let path = dirs::cache_dir()
            .context("Failed to determine XDG cache directory")?
            .join("ringstat")
            .join("snapshot.json");
        Ok(path)
    }

    fn effective_ownership(&self, keyspace: Option<&str>) -> Result<OwnershipMap, ProbeError> {
        match keyspace {
            Some(name) => {
                let info = self.keyspaces.get(name).ok_or_else(|| {
                    ProbeError::InvalidKeyspace(format!("The keyspace {}, does not exist", name))
                })?;
                if info.replication.starts_with(LOCAL_STRATEGY) {
                    return Err(ProbeError::OwnershipIndeterminate(
                        "Ownership values for keyspaces with LocalStrategy are meaningless"
                            .to_string(),
                    ));
                }
                Ok(info.effective_ownership.clone())
            }
            None => {
                let mut keyspaces = self.keyspaces.values();
                let first = keyspaces.next();
                match first {
                    Some(first) if keyspaces.all(|ks| ks.replication == first.replication) => {
                        Ok(first.effective_ownership.clone())
                    }
                    _ => Err(ProbeError::OwnershipIndeterminate(
                        "Non-system keyspaces don't have the same replication settings, \
                         effective ownership information is meaningless"
                            .to_string(),
                    )),
                }
            }
        }
    }
}

/// Serves a [`ClusterSnapshot`] through the probe contract
#[derive(Debug, Clone)]
pub struct SnapshotProbe {
    snapshot: Arc<ClusterSnapshot>,
}

impl SnapshotProbe {
    pub fn new(snapshot: ClusterSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    /// reverse lookups answered from the snapshot's hostname table
    pub fn hostnames(&self) -> HostnameTable {
        HostnameTable(self.snapshot.hostnames.clone())
    }
}

#[async_trait]
impl ClusterProbe for SnapshotProbe {
    async fn joining_nodes(&self) -> Result<Vec<String>, ProbeError> {
        Ok(self.snapshot.joining.clone())
    }

    async fn leaving_nodes(&self) -> Result<Vec<String>, ProbeError> {
        Ok(self.snapshot.leaving.clone())
    }

    async fn moving_nodes(&self) -> Result<Vec<String>, ProbeError> {
        Ok(self.snapshot.moving.clone())
    }

    async fn load_map(&self) -> Result<LoadMap, ProbeError> {
        Ok(self.snapshot.load.clone())
    }

    async fn token_to_endpoint_map(&self) -> Result<BTreeMap<String, String>, ProbeError> {
        Ok(self.snapshot.tokens.clone())
    }

    async fn live_nodes(&self) -> Result<Vec<String>, ProbeError> {
        Ok(self.snapshot.live.clone())
    }

    async fn unreachable_nodes(&self) -> Result<Vec<String>, ProbeError> {
        Ok(self.snapshot.unreachable.clone())
    }

    async fn host_id_map(&self) -> Result<HostIdMap, ProbeError> {
        Ok(self.snapshot.host_ids.clone())
    }

    async fn endpoint_snitch_info(&self) -> Result<Arc<dyn EndpointSnitchInfo>, ProbeError> {
        Ok(Arc::new(SnapshotSnitch(self.snapshot.clone())))
    }

    async fn effective_ownership(
        &self,
        keyspace: Option<&str>,
    ) -> Result<OwnershipMap, ProbeError> {
        self.snapshot.effective_ownership(keyspace)
    }

    async fn ownership(&self) -> Result<OwnershipMap, ProbeError> {
        Ok(match &self.snapshot.ownership {
            Some(ownership) => ownership.clone(),
            None => ring_ownership(&self.snapshot.tokens),
        })
    }
}

struct SnapshotSnitch(Arc<ClusterSnapshot>);

impl EndpointSnitchInfo for SnapshotSnitch {
    fn datacenter(&self, endpoint: &str) -> Result<String, ProbeError> {
        self.0
            .datacenters
            .get(endpoint)
            .cloned()
            .ok_or_else(|| ProbeError::UnknownHost(endpoint.to_string()))
    }

    fn rack(&self, endpoint: &str) -> Result<String, ProbeError> {
        self.0
            .racks
            .get(endpoint)
            .cloned()
            .ok_or_else(|| ProbeError::UnknownHost(endpoint.to_string()))
    }
}

/// Address -> hostname table standing in for reverse DNS
#[derive(Debug, Clone, Default)]
pub struct HostnameTable(BTreeMap<String, String>);

impl NameResolver for HostnameTable {
    fn reverse_lookup(&self, address: &str) -> Option<String> {
        self.0.get(address).filter(|name| !name.is_empty()).cloned()
    }
}

/// Fraction of the Murmur3 ring owned by each endpoint.
///
/// A token owns the range from its predecessor (exclusive) up to itself,
/// wrapping around the ring. Tokens that are not 64-bit integers get an
/// even split instead.
pub fn ring_ownership(tokens: &BTreeMap<String, String>) -> OwnershipMap {
    let mut ownership = OwnershipMap::new();
    if tokens.is_empty() {
        return ownership;
    }

    let parsed: Option<Vec<(i64, &String)>> = tokens
        .iter()
        .map(|(token, endpoint)| token.trim().parse::<i64>().ok().map(|t| (t, endpoint)))
        .collect();

    let Some(mut ring) = parsed else {
        let share = 1.0 / tokens.len() as f64;
        for endpoint in tokens.values() {
            *ownership.entry(endpoint.clone()).or_insert(0.0) += share as f32;
        }
        return ownership;
    };

    ring.sort_by_key(|(token, _)| *token);
    let ring_size = 2f64.powi(64);

    let mut shares: BTreeMap<&String, f64> = BTreeMap::new();
    for (i, (token, endpoint)) in ring.iter().enumerate() {
        let range = if ring.len() == 1 {
            ring_size
        } else {
            let previous = ring[(i + ring.len() - 1) % ring.len()].0;
            token.wrapping_sub(previous) as u64 as f64
        };
        *shares.entry(*endpoint).or_insert(0.0) += range / ring_size;
    }

    for (endpoint, share) in shares {
        ownership.insert(endpoint.clone(), share as f32);
    }
    ownership
}

/// converts chrono duration to human-readable format
fn humanize_duration(duration: Duration) -> String {
    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;

    if hours > 0 {
        if minutes > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}h", hours)
        }
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        let seconds = duration.num_seconds();
        format!("{}s", seconds)
    }
}
