//! Cell Arena
//!
//! All cells of a model live in one arena and refer to each other by
//! [`CellId`]. Edges are index sets on both endpoints, so the graph can be
//! cyclic without any reference cycles in memory.
//!
//! The arena only stores and links nodes. Evaluation order is decided by the
//! model: the arena never walks the graph on its own.

use std::rc::Rc;

use indexmap::IndexMap;

use super::node::{CellId, Node};
use crate::error::CellError;

/// Storage for the cells of one model.
pub struct Arena<V> {
    /// Nodes indexed by `CellId`.
    nodes: Vec<Node<V>>,

    /// Name lookup, in definition order.
    names: IndexMap<Rc<str>, CellId>,
}

impl<V> Arena<V> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            names: IndexMap::new(),
        }
    }

    /// Add a node. Names must be unique within the arena.
    pub fn insert(&mut self, node: Node<V>) -> Result<CellId, CellError> {
        if self.names.contains_key(node.name()) {
            return Err(CellError::DuplicateCell(node.name().to_string()));
        }

        let id = CellId::new(self.nodes.len());
        self.names.insert(node.name_rc(), id);
        self.nodes.push(node);
        Ok(id)
    }

    /// Get a reference to a node.
    pub fn node(&self, id: CellId) -> Result<&Node<V>, CellError> {
        self.nodes.get(id.raw()).ok_or(CellError::InvalidCell(id))
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, id: CellId) -> Result<&mut Node<V>, CellError> {
        self.nodes.get_mut(id.raw()).ok_or(CellError::InvalidCell(id))
    }

    /// Find a node by name.
    pub fn lookup(&self, name: &str) -> Option<CellId> {
        self.names.get(name).copied()
    }

    /// Record that `reader` read `read` during its recomputation.
    ///
    /// Adds the forward edge on the reader and the reverse edge on the read
    /// node. Returns true if either edge is new. Edges are never removed.
    pub fn record_read(&mut self, reader: CellId, read: CellId) -> Result<bool, CellError> {
        let forward = self.node_mut(reader)?.add_read(read);
        let reverse = self.node_mut(read)?.add_reader(reader);
        Ok(forward || reverse)
    }

    /// Ids of all cells, in definition order.
    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.names.values().copied()
    }

    /// Get the total number of cells.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<V> Default for Arena<V> {
    fn default() -> Self {
        Self::new()
    }
}
