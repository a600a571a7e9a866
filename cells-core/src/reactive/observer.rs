//! Observers
//!
//! An observer is a callback fired synchronously after a cell's value
//! changes, after the value is stored and before the cell's dependents are
//! rerun. Observers may read and write other cells; those writes join the
//! current pulse.
//!
//! Two flavours exist:
//!
//! - Plain callbacks ([`ObserverFn`]), attached to one cell, fired on every
//!   change of that cell.
//! - [`Observer`] matchers, which filter the change by cell name and by
//!   predicates on the new and old value, and fire at most once per pulse
//!   even when attached to several cells.
//!
//! ```rust,ignore
//! let alarm = Rc::new(
//!     Observer::new(|model: &mut Model<i64>, _change: &Change<i64>| {
//!         let id = model.lookup("alarm").unwrap();
//!         model.set(id, 1)
//!     })
//!     .on_cell("temperature")
//!     .when_new(|t| *t > 90),
//! );
//! model.define(CellDef::source("temperature").value(20).observed_by(&alarm))?;
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::model::Model;
use crate::error::CellError;
use crate::graph::{CellId, ObserverFn};

/// A value change delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct Change<V> {
    /// The cell that changed.
    pub cell: CellId,

    /// Its name.
    pub name: Rc<str>,

    /// The value just stored.
    pub new: V,

    /// The value before the change, if there was one.
    pub old: Option<V>,

    /// Whether the cell was bound before the change.
    pub was_bound: bool,
}

type Predicate<V> = Box<dyn Fn(&V) -> bool>;
type Action<V> = Box<dyn Fn(&mut Model<V>, &Change<V>) -> Result<(), CellError>>;

/// A filtered observer that fires at most once per pulse.
///
/// With no filters it fires for every change it is told about. Share one
/// matcher between several cells with [`Observer::handler`].
pub struct Observer<V> {
    cell_name: Option<String>,
    new_matches: Option<Predicate<V>>,
    old_matches: Option<Predicate<V>>,
    action: Action<V>,
    last_fired: Cell<Option<u64>>,
}

impl<V: 'static> Observer<V> {
    /// Create an observer running `action` when it matches.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&mut Model<V>, &Change<V>) -> Result<(), CellError> + 'static,
    {
        Self {
            cell_name: None,
            new_matches: None,
            old_matches: None,
            action: Box::new(action),
            last_fired: Cell::new(None),
        }
    }

    /// Only match changes of the cell with this name.
    pub fn on_cell(mut self, name: impl Into<String>) -> Self {
        self.cell_name = Some(name.into());
        self
    }

    /// Only match when the new value satisfies `predicate`.
    pub fn when_new<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&V) -> bool + 'static,
    {
        self.new_matches = Some(Box::new(predicate));
        self
    }

    /// Only match when there was an old value and it satisfies `predicate`.
    pub fn when_old<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&V) -> bool + 'static,
    {
        self.old_matches = Some(Box::new(predicate));
        self
    }

    /// Pulse in which the observer last fired.
    pub fn last_fired(&self) -> Option<u64> {
        self.last_fired.get()
    }

    /// Whether `change` passes the name and value filters.
    pub fn matches(&self, change: &Change<V>) -> bool {
        if let Some(name) = &self.cell_name {
            if name.as_str() != &*change.name {
                return false;
            }
        }

        if let Some(predicate) = &self.new_matches {
            if !predicate(&change.new) {
                return false;
            }
        }

        if let Some(predicate) = &self.old_matches {
            match &change.old {
                Some(old) if predicate(old) => {}
                _ => return false,
            }
        }

        true
    }

    /// Fire the action if the observer matches and has not fired in the
    /// model's current pulse.
    pub fn notify(&self, model: &mut Model<V>, change: &Change<V>) -> Result<(), CellError>
    where
        V: Clone + PartialEq + fmt::Debug,
    {
        let pulse = model.pulse();
        if self.last_fired.get() == Some(pulse) {
            trace!(cell = %change.name, pulse, "observer already fired in this pulse");
            return Ok(());
        }

        if !self.matches(change) {
            return Ok(());
        }

        self.last_fired.set(Some(pulse));
        (self.action)(model, change)
    }

    /// A callback that routes changes through this matcher, suitable for
    /// attaching to any number of cells.
    pub fn handler(self: &Rc<Self>) -> ObserverFn<V>
    where
        V: Clone + PartialEq + fmt::Debug,
    {
        let observer = Rc::clone(self);
        Rc::new(move |model: &mut Model<V>, change: &Change<V>| observer.notify(model, change))
    }
}

impl<V> fmt::Debug for Observer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("cell_name", &self.cell_name)
            .field("filters_new", &self.new_matches.is_some())
            .field("filters_old", &self.old_matches.is_some())
            .field("last_fired", &self.last_fired.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::CellDef;

    fn change(name: &str, new: i32, old: Option<i32>) -> Change<i32> {
        Change {
            cell: CellId::new(0),
            name: Rc::from(name),
            new,
            old,
            was_bound: old.is_some(),
        }
    }

    fn noop() -> Observer<i32> {
        Observer::new(|_: &mut Model<i32>, _: &Change<i32>| Ok(()))
    }

    #[test]
    fn unfiltered_observer_matches_everything() {
        let observer = noop();
        assert!(observer.matches(&change("a", 1, None)));
        assert!(observer.matches(&change("b", 2, Some(1))));
    }

    #[test]
    fn name_filter() {
        let observer = noop().on_cell("a");
        assert!(observer.matches(&change("a", 1, None)));
        assert!(!observer.matches(&change("b", 1, None)));
    }

    #[test]
    fn value_filters() {
        let observer = noop().when_new(|v| *v > 10).when_old(|v| *v < 0);

        assert!(observer.matches(&change("a", 11, Some(-1))));
        assert!(!observer.matches(&change("a", 5, Some(-1))));
        assert!(!observer.matches(&change("a", 11, Some(3))));
        // No old value means the old-value filter cannot pass.
        assert!(!observer.matches(&change("a", 11, None)));
    }

    #[test]
    fn fires_once_per_pulse() {
        let fired = Rc::new(Cell::new(0));
        let fired_clone = fired.clone();
        let observer = Rc::new(Observer::new(move |_: &mut Model<i32>, _: &Change<i32>| {
            fired_clone.set(fired_clone.get() + 1);
            Ok(())
        }));

        let mut model = Model::new();
        let a = model.define(CellDef::source("a").observed_by(&observer)).unwrap();

        model.set(a, 1).unwrap();
        assert_eq!(fired.get(), 1);
        assert_eq!(observer.last_fired(), Some(model.pulse()));

        // Firing again inside the same pulse is suppressed.
        let c = change("a", 1, None);
        observer.notify(&mut model, &c).unwrap();
        assert_eq!(fired.get(), 1);

        model.set(a, 2).unwrap();
        assert_eq!(fired.get(), 2);
    }
}
