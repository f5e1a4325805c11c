use tracing::warn;

use crate::aggregator::Topology;
use crate::models::*;

const LOAD_WIDTH: usize = 9;
const TOKENS_WIDTH: usize = 11;
const OWNS_WIDTH: usize = 6;
const EFFECTIVE_OWNS_WIDTH: usize = 16;
const HOST_ID_WIDTH: usize = 36;
const TOKEN_WIDTH: usize = 39;

const COLUMN_GAP: &str = "  ";

/// Column values shared by both layouts for one endpoint
pub struct RowCells<'a> {
    pub address: &'a str,
    pub load: &'a str,
    pub owns: &'a str,
    pub host_id: &'a str,
    pub rack: &'a str,
    /// every token of the endpoint, lowest first
    pub tokens: &'a [&'a HostStat],
}

/// Shape of the node table: which columns exist and in what order
pub trait TableLayout: Send + Sync {
    fn name(&self) -> &'static str;

    /// widths of every padded column; the trailing column is never padded
    fn column_widths(&self, address_width: usize, owns_width: usize) -> Vec<usize>;

    fn header(&self, owns_header: &str) -> Vec<String>;

    fn cells(&self, row: &RowCells<'_>) -> Vec<String>;
}

/// One row per endpoint, showing its single token
pub struct TokenPerNodeLayout;

/// One row per endpoint, showing how many tokens it owns
pub struct MultiTokenLayout;

impl TableLayout for TokenPerNodeLayout {
    fn name(&self) -> &'static str {
        "token-per-node"
    }

    fn column_widths(&self, address_width: usize, owns_width: usize) -> Vec<usize> {
        vec![
            address_width,
            LOAD_WIDTH,
            owns_width,
            HOST_ID_WIDTH,
            TOKEN_WIDTH,
        ]
    }

    fn header(&self, owns_header: &str) -> Vec<String> {
        ["Address", "Load", owns_header, "Host ID", "Token", "Rack"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn cells(&self, row: &RowCells<'_>) -> Vec<String> {
        let token = row
            .tokens
            .first()
            .map(|stat| stat.token.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());
        vec![
            row.address.to_string(),
            row.load.to_string(),
            row.owns.to_string(),
            row.host_id.to_string(),
            token,
            row.rack.to_string(),
        ]
    }
}

impl TableLayout for MultiTokenLayout {
    fn name(&self) -> &'static str {
        "multi-token"
    }

    fn column_widths(&self, address_width: usize, owns_width: usize) -> Vec<usize> {
        vec![
            address_width,
            LOAD_WIDTH,
            TOKENS_WIDTH,
            owns_width,
            HOST_ID_WIDTH,
        ]
    }

    fn header(&self, owns_header: &str) -> Vec<String> {
        ["Address", "Load", "Tokens", owns_header, "Host ID", "Rack"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn cells(&self, row: &RowCells<'_>) -> Vec<String> {
        vec![
            row.address.to_string(),
            row.load.to_string(),
            row.tokens.len().to_string(),
            row.owns.to_string(),
            row.host_id.to_string(),
            row.rack.to_string(),
        ]
    }
}

pub fn get_layout(token_per_node: bool) -> Box<dyn TableLayout> {
    if token_per_node {
        Box::new(TokenPerNodeLayout)
    } else {
        Box::new(MultiTokenLayout)
    }
}

/// Left-aligned column widths, rendered as `<status><state>  <col>  <col> ... <last>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowTemplate {
    widths: Vec<usize>,
}

impl RowTemplate {
    pub fn new(widths: Vec<usize>) -> Self {
        Self { widths }
    }

    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    pub fn render(&self, status: &str, state: &str, cells: &[String]) -> String {
        let mut line = format!("{}{}{}", status, state, COLUMN_GAP);
        for (i, cell) in cells.iter().enumerate() {
            match self.widths.get(i) {
                Some(&width) if i + 1 < cells.len() => {
                    line.push_str(&format!("{:<width$}", cell, width = width));
                    line.push_str(COLUMN_GAP);
                }
                _ => line.push_str(cell),
            }
        }
        line.push('\n');
        line
    }
}

/// Per-run rendering state, fixed before the first table is drawn
pub struct ReportContext {
    address_width: usize,
    effective: bool,
    layout: Box<dyn TableLayout>,
    template: RowTemplate,
}

impl ReportContext {
    /// The address width spans every datacenter so all tables line up.
    pub fn new(topology: &Topology, effective: bool) -> Self {
        Self::with_layout(
            get_layout(topology.token_per_node),
            topology.max_address_length(),
            effective,
        )
    }

    pub fn with_layout(
        layout: Box<dyn TableLayout>,
        address_width: usize,
        effective: bool,
    ) -> Self {
        let owns_width = if effective {
            EFFECTIVE_OWNS_WIDTH
        } else {
            OWNS_WIDTH
        };
        let template = RowTemplate::new(layout.column_widths(address_width, owns_width));
        Self {
            address_width,
            effective,
            layout,
            template,
        }
    }

    pub fn address_width(&self) -> usize {
        self.address_width
    }

    pub fn is_effective(&self) -> bool {
        self.effective
    }

    pub fn layout(&self) -> &dyn TableLayout {
        self.layout.as_ref()
    }

    pub fn template(&self) -> &RowTemplate {
        &self.template
    }

    pub fn owns_header(&self) -> &'static str {
        if self.effective {
            "Owns (effective)"
        } else {
            "Owns"
        }
    }

    /// Raw figures are not meaningful per keyspace and render as `?`
    pub fn format_ownership(&self, owns: Option<f32>) -> String {
        match owns {
            Some(fraction) if self.effective => format!("{:.1}%", fraction * 100.0),
            _ => UNKNOWN.to_string(),
        }
    }
}

pub struct TableFormatter;

impl TableFormatter {
    pub fn format_datacenter(
        &self,
        group: &DatacenterGroup,
        ctx: &ReportContext,
        facts: &ClusterFacts,
        ownership: &OwnershipMap,
    ) -> String {
        let mut output = String::new();

        let banner = format!("Datacenter: {}", group.name());
        output.push_str(&banner);
        output.push('\n');
        output.push_str(&"=".repeat(banner.chars().count()));
        output.push('\n');

        output.push_str("Status=Up/Down\n");
        output.push_str("|/ State=Normal/Leaving/Joining/Moving\n");

        let header = ctx.layout().header(ctx.owns_header());
        output.push_str(&ctx.template().render("-", "-", &header));

        for (endpoint, tokens) in group.by_endpoint() {
            output.push_str(&self.format_node(endpoint, &tokens, ctx, facts, ownership));
        }

        output
    }

    fn format_node(
        &self,
        endpoint: &str,
        tokens: &[&HostStat],
        ctx: &ReportContext,
        facts: &ClusterFacts,
        ownership: &OwnershipMap,
    ) -> String {
        let status = facts.membership.status_of(endpoint).to_string();
        let state = facts.membership.state_of(endpoint).to_string();

        let load = facts.load.get(endpoint).map(String::as_str).unwrap_or(UNKNOWN);
        let host_id = facts
            .host_ids
            .get(endpoint)
            .map(String::as_str)
            .unwrap_or(UNKNOWN);
        let owns = ctx.format_ownership(ownership.get(endpoint).copied());

        let rack = match facts.snitch.rack(endpoint) {
            Ok(rack) => rack,
            Err(e) => {
                warn!("Could not resolve rack of {}: {}", endpoint, e);
                UNKNOWN.to_string()
            }
        };

        let address = tokens
            .first()
            .map(|stat| stat.resolved_name.as_str())
            .unwrap_or(endpoint);

        let cells = ctx.layout().cells(&RowCells {
            address,
            load,
            owns: &owns,
            host_id,
            rack: &rack,
            tokens,
        });
        ctx.template().render(&status, &state, &cells)
    }
}
