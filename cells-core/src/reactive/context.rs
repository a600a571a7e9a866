//! Evaluation Environment
//!
//! The environment holds the temporal state shared by every cell of a model:
//!
//! - a logical clock, advanced once per distinct value assignment,
//! - a stack of cells currently running their derivation function,
//! - a pulse counter, advanced once per external update batch.
//!
//! The clock and the pulse counter are two separate mechanisms. Propagation
//! compares per-cell clock stamps; only observers look at the pulse.
//!
//! # Active Stack
//!
//! When a cell runs its rule, an [`ActiveFrame`] is pushed. Any cell read
//! while the frame is on top records an edge to that cell. Dropping the frame
//! pops it, so the previous active cell is restored on every exit path,
//! including early error returns and panics.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::graph::CellId;

type ActiveStack = SmallVec<[CellId; 8]>;

/// Clock, active stack and pulse counter of one model.
#[derive(Debug, Default)]
pub struct Environment {
    clock: u64,
    pulse: u64,
    active: Rc<RefCell<ActiveStack>>,
    updates: Rc<Cell<usize>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Advance the clock by one and return the new time.
    pub fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Current pulse (external update batch) number.
    pub fn pulse(&self) -> u64 {
        self.pulse
    }

    /// The cell currently running its rule, if any.
    pub fn active(&self) -> Option<CellId> {
        self.active.borrow().last().copied()
    }

    /// Number of nested rule evaluations in progress.
    pub fn depth(&self) -> usize {
        self.active.borrow().len()
    }

    /// Make `cell` the active cell until the returned frame is dropped.
    pub fn enter(&self, cell: CellId) -> ActiveFrame {
        self.active.borrow_mut().push(cell);
        ActiveFrame {
            stack: Rc::clone(&self.active),
            cell,
        }
    }

    /// Open an update scope for a value assignment.
    ///
    /// The outermost scope opened while no rule is running starts a new
    /// pulse. Scopes opened from observers or rules join the current one.
    pub fn begin_update(&mut self) -> UpdateScope {
        let external = self.updates.get() == 0 && self.active.borrow().is_empty();
        if external {
            self.pulse += 1;
        }
        self.updates.set(self.updates.get() + 1);
        UpdateScope {
            updates: Rc::clone(&self.updates),
        }
    }

    /// Whether an update scope is open.
    pub fn in_update(&self) -> bool {
        self.updates.get() > 0
    }
}

/// Guard that pops the active stack when dropped.
pub struct ActiveFrame {
    stack: Rc<RefCell<ActiveStack>>,
    cell: CellId,
}

impl ActiveFrame {
    pub fn cell(&self) -> CellId {
        self.cell
    }
}

impl Drop for ActiveFrame {
    fn drop(&mut self) {
        let popped = self.stack.borrow_mut().pop();
        debug_assert_eq!(
            popped,
            Some(self.cell),
            "active stack mismatch: expected {:?}, got {:?}",
            self.cell,
            popped
        );
    }
}

/// Guard that closes an update scope when dropped.
pub struct UpdateScope {
    updates: Rc<Cell<usize>>,
}

impl Drop for UpdateScope {
    fn drop(&mut self) {
        self.updates.set(self.updates.get().saturating_sub(1));
    }
}
