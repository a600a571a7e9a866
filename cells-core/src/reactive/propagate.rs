//! Propagation
//!
//! After a cell's value changes, its direct dependents are brought up to
//! date in two phases:
//!
//! 1. **Mark**: every cell in the changed cell's `read_by` set is marked
//!    dirty before any of them reruns. A cell that reads two of these
//!    dependents will then recompute a dirty sibling on demand instead of
//!    observing a stale one.
//!
//! 2. **Run**: each dependent whose clock stamp is older than the changed
//!    cell's stamp is rerun. A dependent already recomputed earlier in the
//!    same pulse, through another path, carries the current stamp and is
//!    skipped, so a cell runs at most once per change.
//!
//! A rerun that changes its own value propagates from that cell in turn, so
//! the walk goes depth-first along dependent chains. Sibling order does not
//! matter for correctness; the stamps alone decide what reruns.
//!
//! A dependent that fails because it read a transient cell outside its pulse
//! is skipped and the remaining dependents still run. Every other error
//! aborts the pass.
//!
//! When an observer of the changed cell fails, the run phase is skipped but
//! the mark phase still happens, so the dependents recompute on their next
//! read instead of serving a value computed from the old input.

use std::fmt::Debug;

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::model::Model;
use crate::error::CellError;
use crate::graph::CellId;

impl<V> Model<V>
where
    V: Clone + PartialEq + Debug + 'static,
{
    /// Bring the dependents of `root` up to date after `root` changed.
    pub(super) fn propagate(&mut self, root: CellId) -> Result<(), CellError> {
        let node = self.arena.node(root)?;
        let root_time = node.time();
        // Snapshot: reruns may record new readers of `root`.
        let dependents: SmallVec<[CellId; 8]> = node.read_by().iter().copied().collect();

        if dependents.is_empty() {
            return Ok(());
        }

        trace!(
            model = %self.config.label,
            root = %node.name(),
            dependents = dependents.len(),
            "propagating"
        );

        self.mark_dirty_all(&dependents)?;

        for dependent in dependents {
            let node = self.arena.node(dependent)?;
            if node.time() >= root_time {
                trace!(model = %self.config.label, cell = %node.name(), "already current");
                continue;
            }

            match self.run(dependent) {
                Ok(()) => {}
                Err(CellError::UnboundEphemeralRead { cell }) => {
                    debug!(
                        model = %self.config.label,
                        dependent = %self.arena.node(dependent)?.name(),
                        transient = %cell,
                        "dependent skipped: transient not bound"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    /// Mark the direct dependents of `root` dirty without rerunning them.
    pub(super) fn mark_dependents(&mut self, root: CellId) -> Result<(), CellError> {
        let dependents: SmallVec<[CellId; 8]> =
            self.arena.node(root)?.read_by().iter().copied().collect();
        self.mark_dirty_all(&dependents)
    }

    fn mark_dirty_all(&mut self, cells: &[CellId]) -> Result<(), CellError> {
        for &cell in cells {
            self.arena.node_mut(cell)?.mark_dirty();
        }
        Ok(())
    }
}
