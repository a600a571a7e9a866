//! Graph Nodes
//!
//! This module defines the cell node stored in the model's arena and the
//! per-variant policies that distinguish source, derived and transient cells.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::CellError;
use crate::reactive::{Change, Model};

/// Stable index of a cell inside its model's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(usize);

impl CellId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the raw index value.
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Derivation function of a cell.
///
/// Called with the owning model and the cell's previous value. Reads of other
/// cells must go through [`Model::get`], which is what records the edges.
pub type Rule<V> = Rc<dyn Fn(&mut Model<V>, Option<V>) -> Result<V, CellError>>;

/// Callback fired after a cell's value changes, before dependents rerun.
pub type ObserverFn<V> = Rc<dyn Fn(&mut Model<V>, &Change<V>) -> Result<(), CellError>>;

/// The variant of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Externally settable, never recomputed.
    Source,

    /// Computed from other cells, never settable.
    Derived,

    /// Settable or computed, but only bound during the pass that produced
    /// its value. Models a one-shot pulse such as a click.
    Transient,
}

impl CellKind {
    /// Whether `set` is permitted.
    pub fn accepts_set(self) -> bool {
        !matches!(self, CellKind::Derived)
    }

    /// Whether the cell drops its binding at the end of every set/run.
    pub fn unbinds_after_pass(self) -> bool {
        matches!(self, CellKind::Transient)
    }

    /// Whether reading the cell while unbound is an error instead of a
    /// trigger for lazy evaluation.
    pub fn rejects_unbound_read(self) -> bool {
        matches!(self, CellKind::Transient)
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellKind::Source => "source",
            CellKind::Derived => "derived",
            CellKind::Transient => "transient",
        };
        f.write_str(name)
    }
}

/// A cell in the dependency graph.
pub struct Node<V> {
    name: Rc<str>,
    kind: CellKind,
    rule: Option<Rule<V>>,
    value: Option<V>,

    /// The value is valid and observable.
    bound: bool,

    /// A dependency changed; recompute before trusting the value.
    dirty: bool,

    /// The value came from `set` or the definition rather than the rule.
    value_set: bool,

    /// Clock at the last assignment or recomputation.
    time: Option<u64>,

    /// Cells this cell read while it was recomputing.
    reads: IndexSet<CellId>,

    /// Cells that read this cell while they were recomputing. Never pruned.
    read_by: IndexSet<CellId>,

    observers: SmallVec<[ObserverFn<V>; 2]>,
}

impl<V> Node<V> {
    /// Create an unbound node.
    pub fn new(name: Rc<str>, kind: CellKind, rule: Option<Rule<V>>) -> Self {
        Self {
            name,
            kind,
            rule,
            value: None,
            bound: false,
            dirty: true,
            value_set: false,
            time: None,
            reads: IndexSet::new(),
            read_by: IndexSet::new(),
            observers: SmallVec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> Rc<str> {
        Rc::clone(&self.name)
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub(crate) fn rule(&self) -> Option<&Rule<V>> {
        self.rule.as_ref()
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_value_set(&self) -> bool {
        self.value_set
    }

    pub fn time(&self) -> Option<u64> {
        self.time
    }

    pub fn reads(&self) -> &IndexSet<CellId> {
        &self.reads
    }

    pub fn read_by(&self) -> &IndexSet<CellId> {
        &self.read_by
    }

    pub(crate) fn observers(&self) -> &[ObserverFn<V>] {
        &self.observers
    }

    pub(crate) fn add_observer(&mut self, observer: ObserverFn<V>) {
        self.observers.push(observer);
    }

    /// Whether a `get` has to run the rule before returning.
    pub fn needs_run(&self) -> bool {
        !self.bound || (self.dirty && !self.value_set)
    }

    /// Install a definition-time value. Does not touch the clock.
    pub(crate) fn preset(&mut self, value: V) {
        self.value = Some(value);
        self.bound = true;
        self.value_set = true;
        self.dirty = false;
    }

    /// Store an externally assigned value.
    ///
    /// Returns the previous value and binding.
    pub(crate) fn assign(&mut self, value: V, time: u64) -> (Option<V>, bool) {
        let was_bound = self.bound;
        self.time = Some(time);
        self.bound = true;
        self.value_set = true;
        (self.value.replace(value), was_bound)
    }

    /// Store a freshly computed value and mark the node clean.
    pub(crate) fn settle(&mut self, value: V) {
        self.value = Some(value);
        self.bound = true;
        self.dirty = false;
    }

    pub(crate) fn stamp(&mut self, time: u64) {
        self.time = Some(time);
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn unbind(&mut self) {
        self.bound = false;
    }

    /// Record that this node read `cell`. Returns true if the edge is new.
    pub(crate) fn add_read(&mut self, cell: CellId) -> bool {
        self.reads.insert(cell)
    }

    /// Record that `cell` read this node. Returns true if the edge is new.
    pub(crate) fn add_reader(&mut self, cell: CellId) -> bool {
        self.read_by.insert(cell)
    }
}

impl<V: fmt::Debug> fmt::Debug for Node<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("bound", &self.bound)
            .field("dirty", &self.dirty)
            .field("value_set", &self.value_set)
            .field("time", &self.time)
            .field("reads", &self.reads)
            .field("read_by", &self.read_by)
            .field("observers", &self.observers.len())
            .finish()
    }
}
