//! Per-run result store.

use crate::error::ContextError;
use crate::node::NodeId;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// The outcome of one node.
///
/// Absent fields are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Payload handed to downstream nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    /// Human-readable summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Delivery status, for nodes that report one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ExecutionResult {
    /// Creates a result carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Creates a result carrying data and a message.
    #[must_use]
    pub fn with_data(data: impl Into<JsonValue>, message: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            message: Some(message.into()),
            status: None,
        }
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

/// Insertion-ordered, append-only map of node results for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    entries: Vec<(NodeId, ExecutionResult)>,
    positions: HashMap<NodeId, usize>,
}

impl ExecutionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a node's result.
    ///
    /// # Errors
    ///
    /// Returns an error if the node already has a result.
    pub fn put(&mut self, node_id: NodeId, result: ExecutionResult) -> Result<(), ContextError> {
        if self.positions.contains_key(&node_id) {
            return Err(ContextError::AlreadyRecorded { node_id });
        }
        self.positions.insert(node_id.clone(), self.entries.len());
        self.entries.push((node_id, result));
        Ok(())
    }

    /// Returns a node's result.
    ///
    /// # Errors
    ///
    /// Returns an error if the node has no result.
    pub fn get(&self, node_id: &NodeId) -> Result<&ExecutionResult, ContextError> {
        self.positions
            .get(node_id)
            .map(|position| &self.entries[*position].1)
            .ok_or_else(|| ContextError::MissingResult {
                node_id: node_id.clone(),
            })
    }

    /// Returns true if the node has a result.
    #[must_use]
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.positions.contains_key(node_id)
    }

    /// Returns the number of recorded results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates results in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &ExecutionResult)> {
        self.entries.iter().map(|(id, result)| (id, result))
    }

    /// Returns node IDs in the order they were recorded.
    #[must_use]
    pub fn node_ids(&self) -> Vec<&NodeId> {
        self.iter().map(|(id, _)| id).collect()
    }
}

impl Serialize for ExecutionContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, result) in self.iter() {
            map.serialize_entry(id, result)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let mut context = ExecutionContext::new();
        context
            .put("s1".into(), ExecutionResult::message("Workflow started"))
            .expect("put");
        assert!(context.contains(&"s1".into()));
        assert_eq!(
            context.get(&"s1".into()).expect("get").message.as_deref(),
            Some("Workflow started")
        );
    }

    #[test]
    fn second_put_is_rejected() {
        let mut context = ExecutionContext::new();
        context
            .put("s1".into(), ExecutionResult::message("first"))
            .expect("put");
        let err = context
            .put("s1".into(), ExecutionResult::message("second"))
            .unwrap_err();
        assert_eq!(err, ContextError::AlreadyRecorded { node_id: "s1".into() });
        assert_eq!(
            context.get(&"s1".into()).expect("get").message.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn missing_result() {
        let context = ExecutionContext::new();
        assert_eq!(
            context.get(&"nope".into()).unwrap_err(),
            ContextError::MissingResult {
                node_id: "nope".into()
            }
        );
    }

    #[test]
    fn serializes_in_insertion_order_and_omits_absent_fields() {
        let mut context = ExecutionContext::new();
        for id in ["z", "a", "m"] {
            context
                .put(id.into(), ExecutionResult::message(id))
                .expect("put");
        }
        context
            .put(
                "t1".into(),
                ExecutionResult::message("Text message sent").with_status("sent"),
            )
            .expect("put");

        let rendered = serde_json::to_string(&context).expect("serialize");
        assert_eq!(
            rendered,
            r#"{"z":{"message":"z"},"a":{"message":"a"},"m":{"message":"m"},"t1":{"message":"Text message sent","status":"sent"}}"#
        );
        let ids: Vec<&str> = context.node_ids().into_iter().map(NodeId::as_str).collect();
        assert_eq!(ids, ["z", "a", "m", "t1"]);
    }
}
