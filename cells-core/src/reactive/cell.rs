//! Cell Evaluation
//!
//! The three entry points of the cell protocol:
//!
//! - [`Model::get`] is lazy. It recomputes a cell only when it is unbound,
//!   or dirty without an explicitly set value, and always records a
//!   dependency edge from the active cell.
//!
//! - [`Model::set`] is eager. A changed value advances the clock, fires the
//!   cell's observers and propagates to its dependents before returning.
//!
//! - [`Model::run`] recomputes a cell from its rule and propagates only if
//!   the result differs from the previous value. This equality check is what
//!   keeps a cyclic graph from looping forever.
//!
//! A cell that runs opens an update scope, so a top-level `run`, or a
//! top-level `get` that recomputes, starts its own pulse just like a
//! top-level `set`. The running cell stays active while its observers fire,
//! so cells an observer reads are linked to the observed cell.
//!
//! Variant differences are confined to [`CellKind`] policies: derived cells
//! refuse `set`, source cells have no rule to run, and transient cells lose
//! their binding at the end of every set/run they take part in.
//!
//! [`CellKind`]: crate::graph::CellKind

use std::fmt::Debug;

use tracing::{debug, trace, warn};

use super::model::Model;
use super::observer::Change;
use crate::error::CellError;
use crate::graph::CellId;

impl<V> Model<V>
where
    V: Clone + PartialEq + Debug + 'static,
{
    /// Read a cell, computing it first if needed.
    ///
    /// When called from inside a rule, the rule's cell is recorded as a
    /// dependent of `id`, on cache hits as well as on recomputation.
    pub fn get(&mut self, id: CellId) -> Result<V, CellError> {
        let node = self.arena.node(id)?;

        if node.kind().rejects_unbound_read() && !node.is_bound() {
            let cell = node.name().to_string();
            // Record the edge first so the reader reruns on the next pulse.
            self.track_read(id)?;
            trace!(model = %self.config.label, %cell, "read of unbound transient");
            return Err(CellError::UnboundEphemeralRead { cell });
        }

        if node.needs_run() {
            self.run(id)?;
        } else {
            trace!(model = %self.config.label, cell = %node.name(), "cache hit");
        }

        self.track_read(id)?;

        // Binding always stores a value; see `CellError::MissingValue`.
        let node = self.arena.node(id)?;
        node.value().cloned().ok_or_else(|| CellError::MissingValue {
            cell: node.name().to_string(),
        })
    }

    /// Assign a value to a source or transient cell.
    ///
    /// Assigning a value equal to the current one does nothing: the clock
    /// stays put, no observer fires and nothing propagates.
    pub fn set(&mut self, id: CellId, value: V) -> Result<(), CellError> {
        let node = self.arena.node(id)?;
        let kind = node.kind();

        if !kind.accepts_set() {
            return Err(CellError::MutationOnDerivedCell {
                cell: node.name().to_string(),
            });
        }

        if node.value() == Some(&value) {
            trace!(model = %self.config.label, cell = %node.name(), "set to equal value ignored");
            if kind.unbinds_after_pass() {
                self.arena.node_mut(id)?.unbind();
            }
            return Ok(());
        }

        let _update = self.env.begin_update();
        let time = self.env.tick();

        let node = self.arena.node_mut(id)?;
        let (old, was_bound) = node.assign(value.clone(), time);
        let name = node.name_rc();

        debug!(
            model = %self.config.label,
            cell = %name,
            clock = time,
            pulse = self.env.pulse(),
            new = ?value,
            old = ?old,
            "set"
        );

        let change = Change {
            cell: id,
            name,
            new: value,
            old,
            was_bound,
        };
        let result = self.settle_dependents(id, &change);

        if kind.unbinds_after_pass() {
            self.arena.node_mut(id)?.unbind();
        }

        result
    }

    /// Recompute a cell from its rule.
    ///
    /// The cell becomes the active cell while its rule runs, so every cell
    /// the rule reads records it as a dependent. If the rule fails, the
    /// stored value is left untouched and the error is returned.
    pub fn run(&mut self, id: CellId) -> Result<(), CellError> {
        let node = self.arena.node(id)?;
        let Some(rule) = node.rule().cloned() else {
            return Err(CellError::RecomputeOnSourceCell {
                cell: node.name().to_string(),
            });
        };

        let kind = node.kind();
        let name = node.name_rc();
        let previous = node.value().cloned();
        let was_bound = node.is_bound();

        let _update = self.env.begin_update();
        let time = self.env.clock();
        self.arena.node_mut(id)?.stamp(time);

        // The frame stays open while observers fire and dependents rerun.
        let _frame = self.env.enter(id);
        self.warn_if_deep(&name);
        let computed = rule(self, previous.clone());

        let value = match computed {
            Ok(value) => value,
            Err(err) => {
                debug!(model = %self.config.label, cell = %name, error = %err, "rule failed");
                if kind.unbinds_after_pass() {
                    self.arena.node_mut(id)?.unbind();
                }
                return Err(err);
            }
        };

        let changed = previous.as_ref() != Some(&value);
        self.arena.node_mut(id)?.settle(value.clone());

        debug!(
            model = %self.config.label,
            cell = %name,
            clock = time,
            changed,
            value = ?value,
            "ran"
        );

        let result = if changed {
            let change = Change {
                cell: id,
                name,
                new: value,
                old: previous,
                was_bound,
            };
            self.settle_dependents(id, &change)
        } else {
            Ok(())
        };

        if kind.unbinds_after_pass() {
            self.arena.node_mut(id)?.unbind();
        }

        result
    }

    /// Fire the observers of a changed cell, then propagate. If an observer
    /// fails, the dependents are only marked dirty.
    fn settle_dependents(&mut self, id: CellId, change: &Change<V>) -> Result<(), CellError> {
        match self.notify(id, change) {
            Ok(()) => self.propagate(id),
            Err(err) => self.mark_dependents(id).and(Err(err)),
        }
    }

    /// Link the active cell, if any, as a reader of `id`.
    fn track_read(&mut self, id: CellId) -> Result<(), CellError> {
        let Some(reader) = self.env.active() else {
            return Ok(());
        };

        let new_edge = self.arena.record_read(reader, id)?;
        if new_edge && self.config.trace_edges {
            trace!(
                model = %self.config.label,
                reader = %self.arena.node(reader)?.name(),
                read = %self.arena.node(id)?.name(),
                "recorded edge"
            );
        }
        Ok(())
    }

    fn warn_if_deep(&self, cell: &str) {
        let depth = self.env.depth();
        if depth == self.config.nesting_warn_depth + 1 {
            warn!(
                model = %self.config.label,
                %cell,
                depth,
                "rule evaluation nested unusually deep; check for a dependency cycle"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CellKind;
    use crate::reactive::CellDef;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn derived_is_lazy_and_memoized() {
        let (calls, calls_clone) = counter();
        let mut model: Model<i32> = Model::new();

        let a = model.define(CellDef::source("a").value(1)).unwrap();
        let b = model
            .define(CellDef::derived("b", move |m: &mut Model<i32>, _| {
                calls_clone.set(calls_clone.get() + 1);
                Ok(m.get(a)? * 2)
            }))
            .unwrap();

        assert_eq!(calls.get(), 0);
        assert!(!model.is_bound(b).unwrap());

        assert_eq!(model.get(b).unwrap(), 2);
        assert_eq!(model.get(b).unwrap(), 2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn set_propagates_to_readers() {
        let (calls, calls_clone) = counter();
        let mut model: Model<i32> = Model::new();

        let a = model.define(CellDef::source("a").value(1)).unwrap();
        let b = model
            .define(CellDef::derived("b", move |m: &mut Model<i32>, _| {
                calls_clone.set(calls_clone.get() + 1);
                Ok(m.get(a)? * 2)
            }))
            .unwrap();

        assert_eq!(model.get(b).unwrap(), 2);
        let clock = model.clock();

        model.set(a, 5).unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(model.clock(), clock + 1);

        assert_eq!(model.get(b).unwrap(), 10);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn equal_set_is_a_no_op() {
        let (fired, fired_clone) = counter();
        let mut model: Model<i32> = Model::new();

        let a = model
            .define(CellDef::source("a").value(3).observer(move |_, _| {
                fired_clone.set(fired_clone.get() + 1);
                Ok(())
            }))
            .unwrap();
        assert_eq!(fired.get(), 1);

        let clock = model.clock();
        let pulse = model.pulse();
        model.set(a, 3).unwrap();

        assert_eq!(model.clock(), clock);
        assert_eq!(model.pulse(), pulse);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn set_on_derived_fails() {
        let mut model: Model<i32> = Model::new();
        let b = model
            .define(CellDef::derived("b", |_: &mut Model<i32>, _| Ok(1)))
            .unwrap();

        assert_eq!(
            model.set(b, 2).unwrap_err(),
            CellError::MutationOnDerivedCell {
                cell: "b".to_string()
            }
        );
        assert_eq!(model.clock(), 0);
    }

    #[test]
    fn run_on_source_fails() {
        let mut model: Model<i32> = Model::new();
        let a = model.define(CellDef::source("a").value(1)).unwrap();
        let empty = model.define(CellDef::source("empty")).unwrap();

        let expected = CellError::RecomputeOnSourceCell {
            cell: "a".to_string(),
        };
        assert_eq!(model.run(a).unwrap_err(), expected);

        // Lazy reads of an unbound source try to run it.
        assert!(matches!(
            model.get(empty),
            Err(CellError::RecomputeOnSourceCell { .. })
        ));
    }

    #[test]
    fn rule_receives_previous_value() {
        let mut model: Model<i32> = Model::new();
        let a = model.define(CellDef::source("a").value(1)).unwrap();
        let total = model
            .define(CellDef::derived("total", move |m: &mut Model<i32>, prev| {
                Ok(prev.unwrap_or(0) + m.get(a)?)
            }))
            .unwrap();

        assert_eq!(model.get(total).unwrap(), 1);
        model.set(a, 2).unwrap();
        assert_eq!(model.get(total).unwrap(), 3);
        model.set(a, 10).unwrap();
        assert_eq!(model.get(total).unwrap(), 13);
    }

    #[test]
    fn failing_rule_restores_active_cell() {
        let mut model: Model<i32> = Model::new();
        let a = model.define(CellDef::source("a").value(1)).unwrap();
        let b = model
            .define(CellDef::derived("b", move |m: &mut Model<i32>, _| {
                let value = m.get(a)?;
                if value > 1 {
                    return Err(CellError::rule("b", "too large"));
                }
                Ok(value)
            }))
            .unwrap();

        assert_eq!(model.get(b).unwrap(), 1);

        let err = model.set(a, 2).unwrap_err();
        assert_eq!(err, CellError::rule("b", "too large"));
        assert_eq!(model.active(), None);
        // The old value is kept.
        assert_eq!(model.peek(b).unwrap(), Some(&1));
    }

    #[test]
    fn set_transient_unbinds_after_pass() {
        let mut model: Model<i32> = Model::new();
        let click = model.define(CellDef::transient("click")).unwrap();

        model.set(click, 1).unwrap();
        assert_eq!(model.kind(click).unwrap(), CellKind::Transient);
        assert!(!model.is_bound(click).unwrap());
        assert_eq!(
            model.get(click).unwrap_err(),
            CellError::UnboundEphemeralRead {
                cell: "click".to_string()
            }
        );
    }

    #[test]
    fn edges_recorded_on_cache_hits() {
        let mut model: Model<i32> = Model::new();
        let a = model.define(CellDef::source("a").value(1)).unwrap();
        let b = model
            .define(CellDef::derived("b", move |m: &mut Model<i32>, _| m.get(a)))
            .unwrap();
        let c = model
            .define(CellDef::derived("c", move |m: &mut Model<i32>, _| m.get(a)))
            .unwrap();

        model.get(b).unwrap();
        model.get(c).unwrap();

        assert_eq!(model.read_by(a).unwrap(), vec![b, c]);
        assert_eq!(model.reads(b).unwrap(), vec![a]);
    }

    #[test]
    fn top_level_run_starts_a_pulse() {
        let mut model: Model<i32> = Model::new();
        let a = model.define(CellDef::source("a").value(1)).unwrap();
        let b = model
            .define(CellDef::derived("b", move |m: &mut Model<i32>, _| Ok(m.get(a)? + 1)))
            .unwrap();

        let pulse = model.pulse();
        model.get(b).unwrap();
        assert_eq!(model.pulse(), pulse + 1);

        model.run(b).unwrap();
        assert_eq!(model.pulse(), pulse + 2);

        // Cache hits run nothing.
        model.get(b).unwrap();
        assert_eq!(model.pulse(), pulse + 2);
    }

    #[test]
    fn observer_reads_link_to_the_observed_cell() {
        let mut model: Model<i32> = Model::new();
        let a = model.define(CellDef::source("a").value(1)).unwrap();
        let unit = model.define(CellDef::source("unit").value(10)).unwrap();
        let inner = model
            .define(
                CellDef::derived("inner", move |m: &mut Model<i32>, _| Ok(m.get(a)? * 2))
                    .observer(move |m: &mut Model<i32>, _| m.get(unit).map(|_| ())),
            )
            .unwrap();
        let outer = model
            .define(CellDef::derived("outer", move |m: &mut Model<i32>, _| {
                Ok(m.get(inner)? + 1)
            }))
            .unwrap();

        assert_eq!(model.get(outer).unwrap(), 3);

        assert_eq!(model.read_by(unit).unwrap(), vec![inner]);
        assert_eq!(model.reads(inner).unwrap(), vec![a, unit]);
        assert_eq!(model.reads(outer).unwrap(), vec![inner]);
    }
}
