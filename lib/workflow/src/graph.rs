//! Connection index over a submitted workflow, using petgraph.
//!
//! Submitted nodes carry their own `incoming`/`outgoing` lists. The index
//! takes the union of both views as the edge set, so an edge declared on only
//! one side still counts. Neighbor order is the order of first appearance,
//! with a node's own list taking precedence.

use crate::error::{GraphError, ValidationError};
use crate::node::{Node, NodeId, NodeKind};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Control, DfsEvent, depth_first_search};
use std::collections::{HashMap, HashSet};

/// Neighbor lookups for one submitted workflow.
#[derive(Debug, Clone)]
pub struct ConnectionIndex {
    /// The underlying directed graph, one vertex per submitted node.
    graph: DiGraph<Node, ()>,
    /// Map from NodeId to petgraph's NodeIndex for O(1) lookup.
    positions: HashMap<NodeId, NodeIndex>,
    /// Ordered predecessors per vertex.
    incoming: Vec<Vec<NodeIndex>>,
    /// Ordered successors per vertex.
    outgoing: Vec<Vec<NodeIndex>>,
}

impl ConnectionIndex {
    /// Builds the index from submitted nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if two nodes share an ID or a connection list names
    /// an ID that is not in `nodes`.
    pub fn build(nodes: impl IntoIterator<Item = Node>) -> Result<Self, ValidationError> {
        let mut graph = DiGraph::new();
        let mut positions = HashMap::new();

        for node in nodes {
            if positions.contains_key(&node.id) {
                return Err(ValidationError::DuplicateNodeId { node_id: node.id });
            }
            let id = node.id.clone();
            let index = graph.add_node(node);
            positions.insert(id, index);
        }

        let resolve = |owner: &NodeId, target: &NodeId| {
            positions
                .get(target)
                .copied()
                .ok_or_else(|| ValidationError::DanglingReference {
                    node_id: owner.clone(),
                    target: target.clone(),
                })
        };

        let count = graph.node_count();
        let mut incoming: Vec<Vec<NodeIndex>> = vec![Vec::new(); count];
        let mut outgoing: Vec<Vec<NodeIndex>> = vec![Vec::new(); count];

        // A node's own lists first.
        for index in graph.node_indices() {
            let node = &graph[index];
            for target in &node.connections.outgoing {
                push_unique(&mut outgoing[index.index()], resolve(&node.id, target)?);
            }
            for source in &node.connections.incoming {
                push_unique(&mut incoming[index.index()], resolve(&node.id, source)?);
            }
        }

        // Then the edges its neighbors declared.
        for index in graph.node_indices() {
            let node = &graph[index];
            for target in &node.connections.outgoing {
                let target = resolve(&node.id, target)?;
                push_unique(&mut incoming[target.index()], index);
            }
            for source in &node.connections.incoming {
                let source = resolve(&node.id, source)?;
                push_unique(&mut outgoing[source.index()], index);
            }
        }

        for (source, targets) in outgoing.iter().enumerate() {
            for target in targets {
                graph.add_edge(NodeIndex::new(source), *target, ());
            }
        }

        Ok(Self {
            graph,
            positions,
            incoming,
            outgoing,
        })
    }

    /// Returns a node by its ID.
    #[must_use]
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.positions.get(node_id).map(|index| &self.graph[*index])
    }

    /// Returns all nodes in submission order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns true if the index holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns the number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the node's predecessors, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not in the index.
    pub fn incoming_of(&self, node_id: &NodeId) -> Result<Vec<&Node>, GraphError> {
        let index = self.require(node_id)?;
        Ok(self.incoming[index.index()]
            .iter()
            .map(|i| &self.graph[*i])
            .collect())
    }

    /// Returns the node's successors, in traversal order.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not in the index.
    pub fn outgoing_of(&self, node_id: &NodeId) -> Result<Vec<&Node>, GraphError> {
        let index = self.require(node_id)?;
        Ok(self.outgoing[index.index()]
            .iter()
            .map(|i| &self.graph[*i])
            .collect())
    }

    /// Returns the first predecessor of the given kind.
    ///
    /// # Errors
    ///
    /// Returns `DependencyNotFound` when no predecessor has that kind.
    pub fn find_by_type_among_incoming(
        &self,
        node_id: &NodeId,
        kind: NodeKind,
    ) -> Result<&Node, GraphError> {
        self.find_by_kinds_among_incoming(node_id, &[kind])
    }

    /// Returns the first predecessor whose kind is any of `kinds`.
    ///
    /// # Errors
    ///
    /// Returns `DependencyNotFound` when no predecessor matches.
    pub fn find_by_kinds_among_incoming(
        &self,
        node_id: &NodeId,
        kinds: &[NodeKind],
    ) -> Result<&Node, GraphError> {
        self.incoming_of(node_id)?
            .into_iter()
            .find(|node| node.kind().is_ok_and(|kind| kinds.contains(&kind)))
            .ok_or_else(|| GraphError::DependencyNotFound {
                node_id: node_id.clone(),
                expected: kinds
                    .iter()
                    .map(NodeKind::as_str)
                    .collect::<Vec<_>>()
                    .join(" | "),
            })
    }

    /// Returns every node tagged `start`.
    #[must_use]
    pub fn start_nodes(&self) -> Vec<&Node> {
        self.nodes()
            .filter(|node| node.kind() == Ok(NodeKind::Start))
            .collect()
    }

    /// Returns the single `start` node.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no start node or more than one.
    pub fn start_node(&self) -> Result<&Node, ValidationError> {
        let starts = self.start_nodes();
        match starts.as_slice() {
            [] => Err(ValidationError::MissingStartNode),
            [start] => Ok(*start),
            many => Err(ValidationError::MultipleStartNodes {
                node_ids: many.iter().map(|node| node.id.clone()).collect(),
            }),
        }
    }

    /// Returns nodes without successors (branch ends).
    #[must_use]
    pub fn terminal_nodes(&self) -> Vec<&Node> {
        self.graph
            .node_indices()
            .filter(|index| self.outgoing[index.index()].is_empty())
            .map(|index| &self.graph[index])
            .collect()
    }

    /// Returns the IDs of every node reachable from `node_id`, itself included.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not in the index.
    pub fn reachable_from(&self, node_id: &NodeId) -> Result<HashSet<NodeId>, GraphError> {
        let start = self.require(node_id)?;
        Ok(self
            .reachable_indices(start)
            .into_iter()
            .map(|index| self.graph[index].id.clone())
            .collect())
    }

    /// Looks for a cycle reachable from `node_id`.
    ///
    /// Returns the back edge `(from, to)` that closes the first cycle found.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is not in the index.
    pub fn find_cycle_from(
        &self,
        node_id: &NodeId,
    ) -> Result<Option<(NodeId, NodeId)>, GraphError> {
        let start = self.require(node_id)?;
        let back_edge = depth_first_search(&self.graph, Some(start), |event| {
            if let DfsEvent::BackEdge(from, to) = event {
                return Control::Break((from, to));
            }
            Control::Continue
        })
        .break_value();

        Ok(back_edge.map(|(from, to)| (self.graph[from].id.clone(), self.graph[to].id.clone())))
    }

    pub(crate) fn index_of(&self, node_id: &NodeId) -> Option<NodeIndex> {
        self.positions.get(node_id).copied()
    }

    pub(crate) fn node_at(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    pub(crate) fn predecessors(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.incoming[index.index()]
    }

    pub(crate) fn successors(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.outgoing[index.index()]
    }

    /// Marks every vertex reachable from `start`.
    pub(crate) fn reachable_mask(&self, start: NodeIndex) -> Vec<bool> {
        let mut mask = vec![false; self.len()];
        for index in self.reachable_indices(start) {
            mask[index.index()] = true;
        }
        mask
    }

    fn reachable_indices(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut dfs = petgraph::visit::Dfs::new(&self.graph, start);
        let mut found = Vec::new();
        while let Some(index) = dfs.next(&self.graph) {
            found.push(index);
        }
        found
    }

    fn require(&self, node_id: &NodeId) -> Result<NodeIndex, GraphError> {
        self.index_of(node_id).ok_or_else(|| GraphError::NodeNotFound {
            node_id: node_id.clone(),
        })
    }
}

fn push_unique(list: &mut Vec<NodeIndex>, index: NodeIndex) {
    if !list.contains(&index) {
        list.push(index);
    }
}
