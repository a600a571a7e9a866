//! Reactive Cells
//!
//! This module implements the evaluation side of the cell system: the
//! model that owns the cells, the lazy/eager cell protocol, propagation and
//! observers.
//!
//! # Concepts
//!
//! ## Source cells
//!
//! Hold a value assigned from outside with [`Model::set`]. They have no rule
//! and are never recomputed.
//!
//! ## Derived cells
//!
//! Compute their value with a rule over other cells. The rule runs lazily on
//! first read and again whenever a cell it has read changes. They cannot be
//! set.
//!
//! ## Transient cells
//!
//! Carry a one-shot pulse, such as a click or an incoming message. Their
//! value is readable only during the propagation pass that set or computed
//! it; outside it, reads fail with [`CellError::UnboundEphemeralRead`].
//!
//! # Implementation Notes
//!
//! Dependencies are discovered while rules run. The model keeps a stack of
//! cells whose rules are executing; every [`Model::get`] links the cell on
//! top of that stack as a reader of the cell being read. Nothing is declared
//! up front.
//!
//! Logical time decides what reruns. Every distinct assignment advances the
//! clock, every recomputation is stamped with the clock, and propagation
//! only reruns dependents stamped before the cell that changed.
//!
//! [`CellError::UnboundEphemeralRead`]: crate::CellError::UnboundEphemeralRead

mod cell;
mod context;
mod model;
mod observer;
mod propagate;

pub use context::{ActiveFrame, Environment, UpdateScope};
pub use model::{CellDef, CellSnapshot, Model};
pub use observer::{Change, Observer};
