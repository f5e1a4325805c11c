use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

use crate::aggregator::TopologyAggregator;
use crate::formatters::{ReportContext, TableFormatter};
use crate::models::{ClusterFacts, MembershipSets};
use crate::ownership::{OwnershipResolution, OwnershipResolver};
use crate::probe::{ClusterProbe, NameResolver, ProbeError};
use crate::profiler::{profile, profile_blocking};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatusError {
    /// the requested keyspace does not exist; no table may be printed
    #[error("{0}")]
    InvalidKeyspace(String),
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    pub keyspace: Option<String>,
    /// show reverse-DNS names instead of addresses
    pub resolve_ip: bool,
}

/// Rendered report: datacenter tables followed by the trailer notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub text: String,
    pub notes: Vec<String>,
    pub token_per_node: bool,
    pub effective: bool,
}

pub struct StatusReportController<'a> {
    probe: &'a dyn ClusterProbe,
    names: &'a dyn NameResolver,
}

impl<'a> StatusReportController<'a> {
    pub fn new(probe: &'a dyn ClusterProbe, names: &'a dyn NameResolver) -> Self {
        Self { probe, names }
    }

    pub async fn run(&self, options: &StatusOptions) -> Result<StatusReport, StatusError> {
        let probe = self.probe;

        let joining = profile("Getting joining nodes", || probe.joining_nodes()).await?;
        let leaving = profile("Getting leaving nodes", || probe.leaving_nodes()).await?;
        let moving = profile("Getting moving nodes", || probe.moving_nodes()).await?;
        let load = profile("Getting load map", || probe.load_map()).await?;
        let tokens_to_endpoints = profile("Getting tokens to endpoints", || {
            probe.token_to_endpoint_map()
        })
        .await?;
        let live = profile("Getting live nodes", || probe.live_nodes()).await?;
        let unreachable =
            profile("Getting unreachable nodes", || probe.unreachable_nodes()).await?;
        let host_ids = profile("Getting host id map", || probe.host_id_map()).await?;
        let snitch = profile("Getting snitch info", || probe.endpoint_snitch_info()).await?;

        let facts = ClusterFacts {
            membership: MembershipSets {
                live: into_set(live),
                unreachable: into_set(unreachable),
                joining: into_set(joining),
                leaving: into_set(leaving),
                moving: into_set(moving),
            },
            load,
            host_ids,
            snitch,
        };

        let resolution = OwnershipResolver::resolve(probe, options.keyspace.as_deref()).await?;
        let effective = resolution.is_effective();
        let (ownership, notes) = match resolution {
            OwnershipResolution::Fatal(message) => {
                return Err(StatusError::InvalidKeyspace(message));
            }
            OwnershipResolution::Effective(ownership) => (ownership, Vec::new()),
            OwnershipResolution::Fallback { ownership, warning } => (ownership, vec![warning]),
        };

        let topology = profile_blocking("Getting ownership by dc", || {
            TopologyAggregator::aggregate(
                &tokens_to_endpoints,
                facts.snitch.as_ref(),
                self.names,
                options.resolve_ip,
            )
        });

        let ctx = ReportContext::new(&topology, effective);
        info!(
            "Rendering {} datacenter(s) with {} layout, address width {}",
            topology.datacenters.len(),
            ctx.layout().name(),
            ctx.address_width()
        );

        let text = profile_blocking("Printing output", || {
            let formatter = TableFormatter;
            let mut text = String::new();
            for group in topology.datacenters.values() {
                text.push_str(&formatter.format_datacenter(group, &ctx, &facts, &ownership));
            }

            text.push('\n');
            for note in &notes {
                text.push_str(&format!("Note: {}\n", note));
            }
            text
        });

        Ok(StatusReport {
            text,
            notes,
            token_per_node: topology.token_per_node,
            effective,
        })
    }
}

fn into_set(nodes: Vec<String>) -> BTreeSet<String> {
    nodes.into_iter().collect()
}
