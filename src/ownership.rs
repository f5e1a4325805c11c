use tracing::{info, warn};

use crate::models::OwnershipMap;
use crate::probe::{ClusterProbe, ProbeError};
use crate::profiler::profile;

/// Outcome of the two-tier ownership lookup
#[derive(Debug, Clone, PartialEq)]
pub enum OwnershipResolution {
    /// keyspace-aware figures
    Effective(OwnershipMap),
    /// raw figures, with the note explaining why effective ownership was unavailable
    Fallback {
        ownership: OwnershipMap,
        warning: String,
    },
    /// the report must not be produced
    Fatal(String),
}

impl OwnershipResolution {
    pub fn is_effective(&self) -> bool {
        matches!(self, Self::Effective(_))
    }
}

pub struct OwnershipResolver;

impl OwnershipResolver {
    /// Tries effective ownership first and falls back to raw ownership when
    /// the figures are indeterminate. Only probe failures unrelated to
    /// ownership classification are returned as errors.
    pub async fn resolve(
        probe: &dyn ClusterProbe,
        keyspace: Option<&str>,
    ) -> Result<OwnershipResolution, ProbeError> {
        let effective = profile("Getting effective ownerships", || {
            probe.effective_ownership(keyspace)
        })
        .await;

        match effective {
            Ok(ownership) => Ok(OwnershipResolution::Effective(ownership)),
            Err(ProbeError::InvalidKeyspace(message)) => {
                warn!("Effective ownership rejected keyspace: {}", message);
                Ok(OwnershipResolution::Fatal(message))
            }
            Err(ProbeError::OwnershipIndeterminate(message)) => {
                info!("Falling back to raw ownership: {}", message);
                let ownership = profile("Getting ownerships", || probe.ownership()).await?;
                Ok(OwnershipResolution::Fallback {
                    ownership,
                    warning: message,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HostIdMap, LoadMap};
    use crate::probe::EndpointSnitchInfo;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct OwnershipOnly {
        effective: Result<OwnershipMap, ProbeError>,
        raw: OwnershipMap,
    }

    #[async_trait]
    impl ClusterProbe for OwnershipOnly {
        async fn joining_nodes(&self) -> Result<Vec<String>, ProbeError> {
            Ok(Vec::new())
        }
        async fn leaving_nodes(&self) -> Result<Vec<String>, ProbeError> {
            Ok(Vec::new())
        }
        async fn moving_nodes(&self) -> Result<Vec<String>, ProbeError> {
            Ok(Vec::new())
        }
        async fn load_map(&self) -> Result<LoadMap, ProbeError> {
            Ok(LoadMap::new())
        }
        async fn token_to_endpoint_map(&self) -> Result<BTreeMap<String, String>, ProbeError> {
            Ok(BTreeMap::new())
        }
        async fn live_nodes(&self) -> Result<Vec<String>, ProbeError> {
            Ok(Vec::new())
        }
        async fn unreachable_nodes(&self) -> Result<Vec<String>, ProbeError> {
            Ok(Vec::new())
        }
        async fn host_id_map(&self) -> Result<HostIdMap, ProbeError> {
            Ok(HostIdMap::new())
        }
        async fn endpoint_snitch_info(&self) -> Result<Arc<dyn EndpointSnitchInfo>, ProbeError> {
            Err(ProbeError::Unavailable("no snitch".to_string()))
        }
        async fn effective_ownership(
            &self,
            _keyspace: Option<&str>,
        ) -> Result<OwnershipMap, ProbeError> {
            self.effective.clone()
        }
        async fn ownership(&self) -> Result<OwnershipMap, ProbeError> {
            Ok(self.raw.clone())
        }
    }

    fn ownership(pairs: &[(&str, f32)]) -> OwnershipMap {
        pairs.iter().map(|(ep, f)| (ep.to_string(), *f)).collect()
    }

    #[tokio::test]
    async fn test_effective_ownership_used_when_available() {
        let probe = OwnershipOnly {
            effective: Ok(ownership(&[("10.0.0.1", 0.6), ("10.0.0.2", 0.4)])),
            raw: ownership(&[("10.0.0.1", 0.5), ("10.0.0.2", 0.5)]),
        };
        let resolution = OwnershipResolver::resolve(&probe, Some("ks1")).await.unwrap();
        assert!(resolution.is_effective());
        assert_eq!(
            resolution,
            OwnershipResolution::Effective(ownership(&[("10.0.0.1", 0.6), ("10.0.0.2", 0.4)]))
        );
    }

    #[tokio::test]
    async fn test_indeterminate_falls_back_to_raw() {
        let probe = OwnershipOnly {
            effective: Err(ProbeError::OwnershipIndeterminate(
                "replication settings differ".to_string(),
            )),
            raw: ownership(&[("10.0.0.1", 0.5), ("10.0.0.2", 0.5)]),
        };
        let resolution = OwnershipResolver::resolve(&probe, None).await.unwrap();
        assert!(!resolution.is_effective());
        assert_eq!(
            resolution,
            OwnershipResolution::Fallback {
                ownership: ownership(&[("10.0.0.1", 0.5), ("10.0.0.2", 0.5)]),
                warning: "replication settings differ".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_keyspace_is_fatal() {
        let probe = OwnershipOnly {
            effective: Err(ProbeError::InvalidKeyspace("nosuchks".to_string())),
            raw: OwnershipMap::new(),
        };
        let resolution = OwnershipResolver::resolve(&probe, Some("nosuchks"))
            .await
            .unwrap();
        assert_eq!(resolution, OwnershipResolution::Fatal("nosuchks".to_string()));
        assert!(!resolution.is_effective());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let probe = OwnershipOnly {
            effective: Err(ProbeError::Unavailable("connection refused".to_string())),
            raw: OwnershipMap::new(),
        };
        let err = OwnershipResolver::resolve(&probe, None).await.unwrap_err();
        assert_eq!(err, ProbeError::Unavailable("connection refused".to_string()));
    }
}
