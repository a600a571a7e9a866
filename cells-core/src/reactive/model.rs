//! Model
//!
//! A [`Model`] owns a set of named cells together with the
//! [`Environment`] they are evaluated in. It is the context handed to every
//! derivation function and observer: rules read other cells through
//! [`Model::get`], which is what records dependency edges.
//!
//! Cells are declared with [`CellDef`] and addressed afterwards by the
//! [`CellId`] returned from [`Model::define`], or by name.

use std::fmt::{self, Debug};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use super::context::Environment;
use super::observer::{Change, Observer};
use crate::config::ModelConfig;
use crate::error::CellError;
use crate::graph::{Arena, CellId, CellKind, Node, ObserverFn, Rule};

/// Declaration of a cell, consumed by [`Model::define`].
pub struct CellDef<V> {
    name: String,
    kind: CellKind,
    rule: Option<Rule<V>>,
    value: Option<V>,
    observers: SmallVec<[ObserverFn<V>; 2]>,
}

impl<V: 'static> CellDef<V> {
    fn new(name: impl Into<String>, kind: CellKind, rule: Option<Rule<V>>) -> Self {
        Self {
            name: name.into(),
            kind,
            rule,
            value: None,
            observers: SmallVec::new(),
        }
    }

    /// An externally settable cell without a rule.
    pub fn source(name: impl Into<String>) -> Self {
        Self::new(name, CellKind::Source, None)
    }

    /// A cell computed by `rule`. It cannot be set.
    pub fn derived<F>(name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&mut Model<V>, Option<V>) -> Result<V, CellError> + 'static,
    {
        Self::new(name, CellKind::Derived, Some(Rc::new(rule)))
    }

    /// A settable pulse cell, bound only during the pass it was set in.
    pub fn transient(name: impl Into<String>) -> Self {
        Self::new(name, CellKind::Transient, None)
    }

    /// A computed pulse cell, bound only during the pass it ran in.
    pub fn transient_rule<F>(name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&mut Model<V>, Option<V>) -> Result<V, CellError> + 'static,
    {
        Self::new(name, CellKind::Transient, Some(Rc::new(rule)))
    }

    /// Start the cell bound to `value`.
    pub fn value(mut self, value: V) -> Self {
        self.value = Some(value);
        self
    }

    /// Attach a callback fired on every change of this cell.
    pub fn observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&mut Model<V>, &Change<V>) -> Result<(), CellError> + 'static,
    {
        self.observers.push(Rc::new(observer));
        self
    }

    /// Attach a shared matcher.
    pub fn observed_by(mut self, observer: &Rc<Observer<V>>) -> Self
    where
        V: Clone + PartialEq + Debug,
    {
        self.observers.push(observer.handler());
        self
    }
}

/// Serializable view of a cell's bookkeeping, without its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub name: String,
    pub kind: CellKind,
    pub bound: bool,
    pub dirty: bool,
    pub value_set: bool,
    pub time: Option<u64>,
    pub reads: Vec<String>,
    pub read_by: Vec<String>,
}

/// A set of cells and the environment they are evaluated in.
pub struct Model<V> {
    pub(super) arena: Arena<V>,
    pub(super) env: Environment,
    pub(super) config: ModelConfig,
}

impl<V> Model<V>
where
    V: Clone + PartialEq + Debug + 'static,
{
    /// Create an empty model with the default config.
    pub fn new() -> Self {
        Self::with_config(ModelConfig::default())
    }

    pub fn with_config(config: ModelConfig) -> Self {
        Self {
            arena: Arena::new(),
            env: Environment::new(),
            config,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Add a cell to the model.
    ///
    /// A cell defined with a value starts bound, and its observers fire once
    /// right away with no old value. Outside of rules and observers that
    /// firing is a pulse of its own. A cell without a value stays unbound
    /// until it is first read, set or run.
    pub fn define(&mut self, def: CellDef<V>) -> Result<CellId, CellError> {
        let CellDef {
            name,
            kind,
            rule,
            value,
            observers,
        } = def;

        let mut node = Node::new(Rc::from(name), kind, rule);
        for observer in observers {
            node.add_observer(observer);
        }
        if let Some(value) = value.clone() {
            node.preset(value);
        }

        let id = self.arena.insert(node)?;
        debug!(model = %self.config.label, cell = %self.arena.node(id)?.name(), %kind, "defined cell");

        if let Some(value) = value {
            let _update = self.env.begin_update();
            let change = Change {
                cell: id,
                name: self.arena.node(id)?.name_rc(),
                new: value,
                old: None,
                was_bound: false,
            };
            self.notify(id, &change)?;
        }

        Ok(id)
    }

    /// Attach a callback to an existing cell.
    pub fn observe<F>(&mut self, id: CellId, observer: F) -> Result<(), CellError>
    where
        F: Fn(&mut Model<V>, &Change<V>) -> Result<(), CellError> + 'static,
    {
        self.arena.node_mut(id)?.add_observer(Rc::new(observer));
        Ok(())
    }

    /// Fire the observers of `id` for `change`.
    pub(super) fn notify(&mut self, id: CellId, change: &Change<V>) -> Result<(), CellError> {
        let observers: SmallVec<[ObserverFn<V>; 2]> =
            self.arena.node(id)?.observers().iter().cloned().collect();

        for observer in observers {
            observer(self, change)?;
        }
        Ok(())
    }

    /// Find a cell by name.
    pub fn lookup(&self, name: &str) -> Option<CellId> {
        self.arena.lookup(name)
    }

    fn require(&self, name: &str) -> Result<CellId, CellError> {
        self.lookup(name)
            .ok_or_else(|| CellError::UnknownCell(name.to_string()))
    }

    /// [`Model::get`] by name.
    pub fn get_named(&mut self, name: &str) -> Result<V, CellError> {
        let id = self.require(name)?;
        self.get(id)
    }

    /// [`Model::set`] by name.
    pub fn set_named(&mut self, name: &str, value: V) -> Result<(), CellError> {
        let id = self.require(name)?;
        self.set(id, value)
    }

    pub fn name(&self, id: CellId) -> Result<&str, CellError> {
        Ok(self.arena.node(id)?.name())
    }

    pub fn kind(&self, id: CellId) -> Result<CellKind, CellError> {
        Ok(self.arena.node(id)?.kind())
    }

    /// The stored value without evaluating or tracking. May be stale.
    pub fn peek(&self, id: CellId) -> Result<Option<&V>, CellError> {
        Ok(self.arena.node(id)?.value())
    }

    pub fn is_bound(&self, id: CellId) -> Result<bool, CellError> {
        Ok(self.arena.node(id)?.is_bound())
    }

    pub fn is_dirty(&self, id: CellId) -> Result<bool, CellError> {
        Ok(self.arena.node(id)?.is_dirty())
    }

    /// Clock stamp of the cell's last assignment or recomputation.
    pub fn time(&self, id: CellId) -> Result<Option<u64>, CellError> {
        Ok(self.arena.node(id)?.time())
    }

    /// Cells `id` has read, in first-read order.
    pub fn reads(&self, id: CellId) -> Result<Vec<CellId>, CellError> {
        Ok(self.arena.node(id)?.reads().iter().copied().collect())
    }

    /// Cells that have read `id`, in first-read order.
    pub fn read_by(&self, id: CellId) -> Result<Vec<CellId>, CellError> {
        Ok(self.arena.node(id)?.read_by().iter().copied().collect())
    }

    /// Current logical time.
    pub fn clock(&self) -> u64 {
        self.env.clock()
    }

    /// Current pulse number.
    pub fn pulse(&self) -> u64 {
        self.env.pulse()
    }

    /// The cell whose rule is currently running, if any.
    pub fn active(&self) -> Option<CellId> {
        self.env.active()
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Ids of all cells, in definition order.
    pub fn cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.arena.ids()
    }

    pub fn snapshot(&self, id: CellId) -> Result<CellSnapshot, CellError> {
        let node = self.arena.node(id)?;
        let names = |ids: &indexmap::IndexSet<CellId>| -> Result<Vec<String>, CellError> {
            ids.iter()
                .map(|id| self.arena.node(*id).map(|n| n.name().to_string()))
                .collect()
        };

        Ok(CellSnapshot {
            name: node.name().to_string(),
            kind: node.kind(),
            bound: node.is_bound(),
            dirty: node.is_dirty(),
            value_set: node.is_value_set(),
            time: node.time(),
            reads: names(node.reads())?,
            read_by: names(node.read_by())?,
        })
    }
}

impl<V> Default for Model<V>
where
    V: Clone + PartialEq + Debug + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Debug> Debug for Model<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("label", &self.config.label)
            .field("cells", &self.arena.len())
            .field("env", &self.env)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn define_and_lookup() {
        let mut model: Model<i32> = Model::new();

        let a = model.define(CellDef::source("a").value(1)).unwrap();
        let b = model
            .define(CellDef::derived("b", move |m: &mut Model<i32>, _| Ok(m.get(a)? + 1)))
            .unwrap();

        assert_eq!(model.len(), 2);
        assert_eq!(model.lookup("a"), Some(a));
        assert_eq!(model.name(b).unwrap(), "b");
        assert_eq!(model.kind(b).unwrap(), CellKind::Derived);
        assert_eq!(model.cells().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn duplicate_definition_fails() {
        let mut model: Model<i32> = Model::new();
        model.define(CellDef::source("a")).unwrap();

        let err = model.define(CellDef::source("a")).unwrap_err();
        assert_eq!(err, CellError::DuplicateCell("a".to_string()));
    }

    #[test]
    fn preset_value_fires_observers_without_old_value() {
        let seen = Rc::new(Cell::new(None));
        let seen_clone = seen.clone();

        let mut model: Model<i32> = Model::new();
        model
            .define(CellDef::source("a").value(4).observer(move |_: &mut Model<i32>, change| {
                seen_clone.set(Some((change.new, change.old, change.was_bound)));
                Ok(())
            }))
            .unwrap();

        assert_eq!(seen.get(), Some((4, None, false)));
    }

    #[test]
    fn observe_attaches_after_definition() {
        let fired = Rc::new(Cell::new(0));
        let fired_clone = fired.clone();

        let mut model: Model<i32> = Model::new();
        let a = model.define(CellDef::source("a").value(1)).unwrap();
        model
            .observe(a, move |_: &mut Model<i32>, change| {
                fired_clone.set(change.new);
                Ok(())
            })
            .unwrap();

        model.set(a, 9).unwrap();
        assert_eq!(fired.get(), 9);
    }

    #[test]
    fn unknown_names_are_errors() {
        let mut model: Model<i32> = Model::new();
        assert_eq!(
            model.get_named("missing").unwrap_err(),
            CellError::UnknownCell("missing".to_string())
        );
        assert_eq!(
            model.set_named("missing", 1).unwrap_err(),
            CellError::UnknownCell("missing".to_string())
        );
    }

    #[test]
    fn snapshot_lists_edges_by_name() {
        let mut model: Model<i32> = Model::new();
        let a = model.define(CellDef::source("a").value(2)).unwrap();
        let b = model
            .define(CellDef::derived("b", move |m: &mut Model<i32>, _| Ok(m.get(a)? * 3)))
            .unwrap();

        assert_eq!(model.get(b).unwrap(), 6);

        let snapshot = model.snapshot(b).unwrap();
        assert_eq!(snapshot.kind, CellKind::Derived);
        assert!(snapshot.bound);
        assert!(!snapshot.dirty);
        assert!(!snapshot.value_set);
        assert_eq!(snapshot.time, Some(0));
        assert_eq!(snapshot.reads, vec!["a".to_string()]);

        let json = serde_json::to_value(model.snapshot(a).unwrap()).unwrap();
        assert_eq!(json["kind"], "source");
        assert_eq!(json["read_by"], serde_json::json!(["b"]));
    }
}
