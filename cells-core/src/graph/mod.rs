//! Dependency Graph
//!
//! This module implements the storage side of the cell graph: the node type
//! and the arena that owns every node of a model.
//!
//! # Overview
//!
//! - Nodes represent cells (source, derived or transient).
//! - Edges represent reads: if B read A while B was recomputing, A lists B in
//!   its `read_by` set and B lists A in its `reads` set.
//!
//! Edges are discovered at runtime, never declared. They are additive: a
//! recomputation that stops reading a cell leaves the old edge in place, so
//! the reader keeps being rerun when that cell changes.
//!
//! # Design Decisions
//!
//! 1. Nodes live in a `Vec` and are addressed by [`CellId`]. Cyclic graphs
//!    are expressed with index sets, never with mutual references.
//!
//! 2. Edge sets are `IndexSet`s, so propagation visits dependents in the
//!    order they were first recorded. Correctness never depends on it.

mod arena;
mod node;

pub use arena::Arena;
pub use node::{CellId, CellKind, Node, ObserverFn, Rule};
