//! Decoding and qualification of ODP audience records.

use serde_json::Value;

/// State value the ODP API reports for audiences the user belongs to.
const QUALIFIED_STATE: &str = "qualified";

/// A single audience node from the `customer.audiences` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceRecord {
    pub name: String,
    pub is_ready: bool,
    pub state: String,
    /// Not requested by the default query; kept when the server sends it.
    pub description: Option<String>,
}

impl AudienceRecord {
    /// Decode a `node` object. Returns `None` unless `name`, `is_ready` and
    /// `state` are all present with the right types.
    pub fn from_node(node: &Value) -> Option<Self> {
        Some(Self {
            name: node["name"].as_str()?.to_string(),
            is_ready: node["is_ready"].as_bool()?,
            state: node["state"].as_str()?.to_string(),
            description: node["description"].as_str().map(|s| s.to_string()),
        })
    }

    pub fn is_qualified(&self) -> bool {
        self.is_ready && self.state == QUALIFIED_STATE
    }
}

/// Decode every `edges[i].node`, silently dropping malformed entries.
pub fn decode_edges(edges: &[Value]) -> Vec<AudienceRecord> {
    edges
        .iter()
        .filter_map(|edge| AudienceRecord::from_node(&edge["node"]))
        .collect()
}

/// Names of the qualified audiences, in response order.
pub fn qualified_segments(records: impl IntoIterator<Item = AudienceRecord>) -> Vec<String> {
    records
        .into_iter()
        .filter(AudienceRecord::is_qualified)
        .map(|record| record.name)
        .collect()
}
