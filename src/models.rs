use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::probe::EndpointSnitchInfo;

/// Placeholder rendered for any value the cluster could not supply
pub const UNKNOWN: &str = "?";

/// A position on the partitioner ring, kept in its wire representation.
///
/// Numeric tokens (Murmur3, Random) compare by value, anything else
/// (byte-ordered hex) compares lexically after all numeric tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    raw: String,
    /// `raw` parsed as an integer, if it is one
    numeric: Option<i128>,
}

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let numeric = raw.trim().parse::<i128>().ok();
        Self { raw, numeric }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric, other.numeric) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.raw.cmp(&other.raw)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One (endpoint, token) pair as seen in a single report run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStat {
    pub endpoint: String,
    /// literal address, or the reverse-DNS name when name resolution was requested
    pub resolved_name: String,
    pub token: Token,
    pub datacenter: String,
}

/// Hosts of one datacenter, ordered by token ascending
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatacenterGroup {
    name: String,
    hosts: Vec<HostStat>,
}

impl DatacenterGroup {
    /// Builds a group from unordered stats, sorting once by token. Stats of
    /// other datacenters are dropped.
    pub fn from_hosts(name: impl Into<String>, hosts: Vec<HostStat>) -> Self {
        let name = name.into();
        let mut hosts: Vec<HostStat> = hosts
            .into_iter()
            .filter(|stat| stat.datacenter == name)
            .collect();
        hosts.sort_by(|a, b| a.token.cmp(&b.token));
        Self { name, hosts }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hosts(&self) -> &[HostStat] {
        &self.hosts
    }

    /// Collapses the group to one entry per endpoint, in order of each
    /// endpoint's lowest token, with all of that endpoint's stats attached.
    pub fn by_endpoint(&self) -> Vec<(&str, Vec<&HostStat>)> {
        let mut rows: Vec<(&str, Vec<&HostStat>)> = Vec::new();
        let mut index: BTreeMap<&str, usize> = BTreeMap::new();
        for stat in &self.hosts {
            let endpoint = stat.endpoint.as_str();
            match index.get(endpoint) {
                Some(&row) => rows[row].1.push(stat),
                None => {
                    index.insert(endpoint, rows.len());
                    rows.push((endpoint, vec![stat]));
                }
            }
        }
        rows
    }
}

/// Datacenter name -> group, iterated in name order
pub type DatacenterMap = BTreeMap<String, DatacenterGroup>;

/// Endpoint -> ownership fraction in [0.0, 1.0]
pub type OwnershipMap = BTreeMap<String, f32>;

/// Endpoint -> opaque host identifier
pub type HostIdMap = BTreeMap<String, String>;

/// Endpoint -> human-formatted load
pub type LoadMap = BTreeMap<String, String>;

/// Gossip membership snapshot, read-only once fetched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipSets {
    pub live: BTreeSet<String>,
    pub unreachable: BTreeSet<String>,
    pub joining: BTreeSet<String>,
    pub leaving: BTreeSet<String>,
    pub moving: BTreeSet<String>,
}

impl MembershipSets {
    pub fn status_of(&self, endpoint: &str) -> NodeStatus {
        if self.live.contains(endpoint) {
            NodeStatus::Up
        } else if self.unreachable.contains(endpoint) {
            NodeStatus::Down
        } else {
            NodeStatus::Unknown
        }
    }

    /// joining wins over leaving, leaving over moving
    pub fn state_of(&self, endpoint: &str) -> NodeState {
        if self.joining.contains(endpoint) {
            NodeState::Joining
        } else if self.leaving.contains(endpoint) {
            NodeState::Leaving
        } else if self.moving.contains(endpoint) {
            NodeState::Moving
        } else {
            NodeState::Normal
        }
    }
}

/// Per-endpoint facts consulted while rendering rows
#[derive(Clone)]
pub struct ClusterFacts {
    pub membership: MembershipSets,
    pub load: LoadMap,
    pub host_ids: HostIdMap,
    pub snitch: Arc<dyn EndpointSnitchInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Up,
    Down,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Normal,
    Leaving,
    Joining,
    Moving,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Up => write!(f, "U"),
            NodeStatus::Down => write!(f, "D"),
            NodeStatus::Unknown => write!(f, "{}", UNKNOWN),
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Normal => write!(f, "N"),
            NodeState::Leaving => write!(f, "L"),
            NodeState::Joining => write!(f, "J"),
            NodeState::Moving => write!(f, "M"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(endpoint: &str, token: &str, dc: &str) -> HostStat {
        HostStat {
            endpoint: endpoint.to_string(),
            resolved_name: endpoint.to_string(),
            token: Token::new(token),
            datacenter: dc.to_string(),
        }
    }

    #[test]
    fn test_token_ordering() {
        let mut tokens = vec![
            Token::new("200"),
            Token::new("-9223372036854775808"),
            Token::new("30"),
            Token::new("0a"),
            Token::new("170141183460469231731687303715884105727"),
            Token::new("00ff"),
        ];
        tokens.sort();
        let sorted: Vec<&str> = tokens.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            sorted,
            vec![
                "-9223372036854775808",
                "30",
                "200",
                "170141183460469231731687303715884105727",
                "00ff",
                "0a",
            ]
        );
    }

    #[test]
    fn test_group_keeps_token_order() {
        let group = DatacenterGroup::from_hosts(
            "dc1",
            vec![
                stat("10.0.0.2", "200", "dc1"),
                stat("10.0.0.1", "100", "dc1"),
                stat("10.0.0.3", "-5", "dc1"),
                stat("10.0.0.4", "1", "dc2"),
            ],
        );

        let tokens: Vec<&str> = group.hosts().iter().map(|h| h.token.as_str()).collect();
        assert_eq!(tokens, vec!["-5", "100", "200"]);
        assert!(group.hosts().iter().all(|h| h.datacenter == group.name()));
    }

    #[test]
    fn test_by_endpoint_uses_lowest_token_order() {
        // given out of ring order on purpose
        let group = DatacenterGroup::from_hosts(
            "dc1",
            [
                ("10.0.0.1", "90"),
                ("10.0.0.2", "70"),
                ("10.0.0.2", "30"),
                ("10.0.0.1", "10"),
            ]
            .into_iter()
            .map(|(ep, token)| stat(ep, token, "dc1"))
            .collect(),
        );

        let rows = group.by_endpoint();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "10.0.0.1");
        assert_eq!(rows[0].1.len(), 2);
        assert_eq!(rows[0].1[0].token.as_str(), "10");
        assert_eq!(rows[1].0, "10.0.0.2");
        assert_eq!(rows[1].1[0].token.as_str(), "30");
    }

    #[test]
    fn test_status_and_state_precedence() {
        let mut sets = MembershipSets::default();
        sets.live.insert("a".to_string());
        sets.unreachable.insert("b".to_string());
        sets.joining.insert("a".to_string());
        sets.leaving.insert("a".to_string());
        sets.leaving.insert("b".to_string());
        sets.moving.insert("b".to_string());
        sets.moving.insert("c".to_string());

        assert_eq!(sets.status_of("a"), NodeStatus::Up);
        assert_eq!(sets.status_of("b"), NodeStatus::Down);
        assert_eq!(sets.status_of("c"), NodeStatus::Unknown);
        assert_eq!(sets.state_of("a"), NodeState::Joining);
        assert_eq!(sets.state_of("b"), NodeState::Leaving);
        assert_eq!(sets.state_of("c"), NodeState::Moving);
        assert_eq!(sets.state_of("d"), NodeState::Normal);

        assert_eq!(format!("{}{}", sets.status_of("c"), sets.state_of("d")), "?N");
    }
}
