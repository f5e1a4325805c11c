use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::models::*;
use crate::probe::{EndpointSnitchInfo, NameResolver};

/// Result of grouping the token map by datacenter
#[derive(Debug, Clone)]
pub struct Topology {
    pub datacenters: DatacenterMap,
    /// false when some endpoint owns more than one token (vnodes)
    pub token_per_node: bool,
}

impl Topology {
    /// Width of the widest display name across every datacenter
    pub fn max_address_length(&self) -> usize {
        self.datacenters
            .values()
            .flat_map(|group| group.hosts())
            .map(|stat| stat.resolved_name.chars().count())
            .max()
            .unwrap_or(0)
    }
}

pub struct TopologyAggregator;

impl TopologyAggregator {
    pub fn aggregate(
        tokens_to_endpoints: &BTreeMap<String, String>,
        snitch: &dyn EndpointSnitchInfo,
        names: &dyn NameResolver,
        resolve_names: bool,
    ) -> Topology {
        let mut hosts_by_dc: BTreeMap<String, Vec<HostStat>> = BTreeMap::new();
        let mut endpoints = BTreeSet::new();
        // one lookup per endpoint, not per token
        let mut placements: BTreeMap<&str, (String, String)> = BTreeMap::new();

        for (token, endpoint) in tokens_to_endpoints {
            endpoints.insert(endpoint.as_str());

            let (datacenter, resolved_name) = placements
                .entry(endpoint.as_str())
                .or_insert_with(|| {
                    (
                        Self::datacenter_of(snitch, endpoint),
                        Self::display_name(names, endpoint, resolve_names),
                    )
                })
                .clone();

            let stat = HostStat {
                endpoint: endpoint.clone(),
                resolved_name,
                token: Token::new(token.as_str()),
                datacenter: datacenter.clone(),
            };

            hosts_by_dc.entry(datacenter).or_default().push(stat);
        }

        // token keys arrive in string order; each group sorts once by ring order
        let datacenters: DatacenterMap = hosts_by_dc
            .into_iter()
            .map(|(name, hosts)| (name.clone(), DatacenterGroup::from_hosts(name, hosts)))
            .collect();

        let token_per_node = endpoints.len() == tokens_to_endpoints.len();
        debug!(
            "Aggregated {} tokens over {} endpoints in {} datacenters (token per node: {})",
            tokens_to_endpoints.len(),
            endpoints.len(),
            datacenters.len(),
            token_per_node
        );

        Topology {
            datacenters,
            token_per_node,
        }
    }

    fn datacenter_of(snitch: &dyn EndpointSnitchInfo, endpoint: &str) -> String {
        match snitch.datacenter(endpoint) {
            Ok(dc) => dc,
            Err(e) => {
                warn!("Could not resolve datacenter of {}: {}", endpoint, e);
                UNKNOWN.to_string()
            }
        }
    }

    fn display_name(names: &dyn NameResolver, endpoint: &str, resolve_names: bool) -> String {
        if !resolve_names {
            return endpoint.to_string();
        }
        names.reverse_lookup(endpoint).unwrap_or_else(|| {
            debug!("Reverse lookup failed for {}, using address", endpoint);
            endpoint.to_string()
        })
    }
}
