//! Workflow node types and their per-kind configuration.
//!
//! Nodes arrive from the flow builder as loosely-typed JSON. Each node has:
//! - A unique string ID within the submitted graph
//! - A type tag (parsed into [`NodeKind`] when the walker reaches it)
//! - Kind-specific configuration under `data`
//! - Its own incoming/outgoing connection lists

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A unique identifier for a node within a submitted graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node ID from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The closed set of node kinds the executor knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Entry point of every run.
    Start,
    /// Terminal marker.
    End,
    /// Fetches rows from a shared Google Sheet.
    GoogleIntegration,
    /// Generates context text from sheet content.
    Llm,
    /// Produces a portfolio report from sheet rows.
    CryptoAnalyzer,
    /// Generates images for sheet rows and returns the populated sheet URL.
    ImageGeneration,
    /// Sends a notification about an upstream result.
    TextMessage,
    /// Calls an arbitrary HTTP endpoint.
    ApiRequest,
}

impl NodeKind {
    /// Every kind, in declaration order.
    pub const ALL: [NodeKind; 8] = [
        NodeKind::Start,
        NodeKind::End,
        NodeKind::GoogleIntegration,
        NodeKind::Llm,
        NodeKind::CryptoAnalyzer,
        NodeKind::ImageGeneration,
        NodeKind::TextMessage,
        NodeKind::ApiRequest,
    ];

    /// Returns the wire tag for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::GoogleIntegration => "google-integration",
            Self::Llm => "llm",
            Self::CryptoAnalyzer => "crypto-analyzer",
            Self::ImageGeneration => "image-generation",
            Self::TextMessage => "text-message",
            Self::ApiRequest => "api-request",
        }
    }

    /// Returns the predecessor results this kind needs before it can run.
    ///
    /// The walker resolves these from the node's incoming neighbors; handlers
    /// never go looking for predecessors themselves.
    #[must_use]
    pub const fn dependencies(&self) -> &'static [Dependency] {
        match self {
            Self::Llm | Self::CryptoAnalyzer | Self::ImageGeneration => &[Dependency::SHEET],
            Self::TextMessage => &[Dependency::NOTIFICATION_SOURCE],
            Self::Start | Self::End | Self::GoogleIntegration | Self::ApiRequest => &[],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a type tag names no known node kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNodeKind {
    /// The unrecognized tag.
    pub tag: String,
}

impl fmt::Display for UnknownNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown node type '{}'", self.tag)
    }
}

impl std::error::Error for UnknownNodeKind {}

impl FromStr for NodeKind {
    type Err = UnknownNodeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownNodeKind { tag: s.to_string() })
    }
}

/// A named predecessor requirement of a node kind.
///
/// A dependency is satisfied by the first incoming neighbor whose kind is in
/// `any_of`; its node and result are handed to the handler under `slot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    /// Name the handler uses to look the input up.
    pub slot: &'static str,
    /// Kinds that can satisfy this dependency.
    pub any_of: &'static [NodeKind],
}

impl Dependency {
    /// Tabular rows produced by a `google-integration` node.
    pub const SHEET: Dependency = Dependency {
        slot: "sheet",
        any_of: &[NodeKind::GoogleIntegration],
    };

    /// The result a `text-message` node reports on.
    pub const NOTIFICATION_SOURCE: Dependency = Dependency {
        slot: "source",
        any_of: &[NodeKind::ImageGeneration, NodeKind::CryptoAnalyzer],
    };

    /// Renders the accepted kinds for error messages (`a | b`).
    #[must_use]
    pub fn expected(&self) -> String {
        self.any_of
            .iter()
            .map(NodeKind::as_str)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// The connection lists a node carries for itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connections {
    /// IDs of nodes with an edge into this node.
    #[serde(default)]
    pub incoming: Vec<NodeId>,
    /// IDs of nodes this node has an edge to, in traversal order.
    #[serde(default)]
    pub outgoing: Vec<NodeId>,
}

/// A workflow node as submitted by the flow builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the graph.
    pub id: NodeId,
    /// The raw type tag.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Kind-specific configuration.
    #[serde(default)]
    pub data: JsonValue,
    /// Edges embedded in the node.
    #[serde(default)]
    pub connections: Connections,
}

impl Node {
    /// Creates a node of a known kind with no configuration or connections.
    #[must_use]
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self::with_type(id, kind.as_str())
    }

    /// Creates a node with an arbitrary type tag.
    #[must_use]
    pub fn with_type(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: JsonValue::Null,
            connections: Connections::default(),
        }
    }

    /// Sets the node's configuration payload.
    #[must_use]
    pub fn with_data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }

    /// Appends an incoming connection.
    #[must_use]
    pub fn with_incoming(mut self, id: impl Into<NodeId>) -> Self {
        self.connections.incoming.push(id.into());
        self
    }

    /// Appends an outgoing connection.
    #[must_use]
    pub fn with_outgoing(mut self, id: impl Into<NodeId>) -> Self {
        self.connections.outgoing.push(id.into());
        self
    }

    /// Parses the type tag.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownNodeKind`] when the tag is not a supported kind.
    pub fn kind(&self) -> Result<NodeKind, UnknownNodeKind> {
        self.node_type.parse()
    }

    /// Deserializes the whole `data` payload.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the payload does not match `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    /// Deserializes `data.config`, treating a missing section as `null`.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the section does not match `T`.
    pub fn config<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self.data.get("config") {
            Some(section) => T::deserialize(section),
            None => T::deserialize(&JsonValue::Null),
        }
    }
}

/// `google-integration` configuration (`data.config`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleIntegrationConfig {
    /// Shareable spreadsheet link.
    pub link: String,
    /// Columns selected in the editor, consumed by image generation.
    #[serde(default)]
    pub columns: Vec<String>,
}

/// `llm` configuration (top-level `data`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// How the content should be interpreted (e.g. "article").
    #[serde(default)]
    pub content_type: Option<String>,
    /// The prompt.
    pub input: String,
}

/// `image-generation` configuration (`data.config`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGenerationConfig {
    /// Prompt template applied per row.
    pub prompt: String,
}

/// `crypto-analyzer` configuration (`data.config`, optional).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoAnalyzerConfig {
    /// Symbol to focus on, if any.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Analysis timeframe (e.g. "1d").
    #[serde(default)]
    pub timeframe: Option<String>,
    /// Technical indicators to include.
    #[serde(default)]
    pub indicators: Vec<String>,
    /// Whether the analysis runs unattended.
    #[serde(default)]
    pub is_auto: bool,
}

/// HTTP methods supported by `api-request` nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Returns the method name as sent on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Returns true if repeating the request cannot duplicate a side effect.
    #[must_use]
    pub const fn is_idempotent(&self) -> bool {
        matches!(self, Self::Get | Self::Put | Self::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `api-request` configuration (`data.config`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequestConfig {
    /// Target URL.
    pub url: String,
    /// Request method.
    #[serde(default)]
    pub method: HttpMethod,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Raw request body (ignored for GET).
    #[serde(default)]
    pub body: Option<String>,
    /// Dotted paths to extract from the JSON response.
    #[serde(default)]
    pub output_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_tags_round_trip_through_from_str() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.as_str().parse::<NodeKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = "conditional-path".parse::<NodeKind>().unwrap_err();
        assert_eq!(err.tag, "conditional-path");
        assert!(err.to_string().contains("conditional-path"));
    }

    #[test]
    fn consumer_kinds_declare_sheet_dependency() {
        for kind in [NodeKind::Llm, NodeKind::CryptoAnalyzer, NodeKind::ImageGeneration] {
            assert_eq!(kind.dependencies(), &[Dependency::SHEET]);
        }
        assert!(NodeKind::Start.dependencies().is_empty());
        assert!(NodeKind::ApiRequest.dependencies().is_empty());
    }

    #[test]
    fn notification_source_accepts_both_producers() {
        assert_eq!(
            Dependency::NOTIFICATION_SOURCE.expected(),
            "image-generation | crypto-analyzer"
        );
    }

    #[test]
    fn deserializes_flow_builder_payload() {
        let node: Node = serde_json::from_value(json!({
            "id": "g1",
            "type": "google-integration",
            "position": { "x": 10, "y": 20 },
            "data": { "config": { "link": "https://docs.google.com/spreadsheets/d/abc/edit", "columns": ["Name"] } },
            "connections": { "incoming": ["s1"], "outgoing": ["i1"] }
        }))
        .expect("deserialize");

        assert_eq!(node.kind(), Ok(NodeKind::GoogleIntegration));
        assert_eq!(node.connections.incoming, vec![NodeId::from("s1")]);
        let config: GoogleIntegrationConfig = node.config().expect("config");
        assert_eq!(config.columns, vec!["Name".to_string()]);
    }

    #[test]
    fn missing_connections_default_to_empty() {
        let node: Node =
            serde_json::from_value(json!({ "id": "e1", "type": "end" })).expect("deserialize");
        assert!(node.connections.incoming.is_empty());
        assert!(node.connections.outgoing.is_empty());
        assert!(node.data.is_null());
    }

    #[test]
    fn llm_config_reads_camel_case_fields() {
        let node = Node::new("l1", NodeKind::Llm)
            .with_data(json!({ "contentType": "article", "input": "Summarize" }));
        let config: LlmConfig = node.data_as().expect("config");
        assert_eq!(config.content_type.as_deref(), Some("article"));
        assert_eq!(config.input, "Summarize");
    }

    #[test]
    fn optional_config_section_may_be_absent() {
        let node = Node::new("c1", NodeKind::CryptoAnalyzer);
        let config: Option<CryptoAnalyzerConfig> = node.config().expect("config");
        assert!(config.is_none());
    }

    #[test]
    fn api_request_defaults_to_get() {
        let node = Node::new("a1", NodeKind::ApiRequest)
            .with_data(json!({ "config": { "url": "https://api.example.com/items" } }));
        let config: ApiRequestConfig = node.config().expect("config");
        assert_eq!(config.method, HttpMethod::Get);
        assert!(config.output_fields.is_empty());
        assert!(!HttpMethod::Post.is_idempotent());
    }
}
