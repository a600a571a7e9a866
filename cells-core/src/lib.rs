//! Cells Core
//!
//! This crate provides a lazy, dependency-tracking reactive evaluation
//! engine. Named cells hold a value that is either assigned directly or
//! derived by a rule over other cells, and changes propagate to every cell
//! whose rule transitively read the changed one.
//!
//! It implements:
//!
//! - Source, derived and transient (pulse) cells
//! - Dynamic dependency discovery from runtime reads
//! - Two-phase mark-then-rerun propagation with logical-time de-duplication
//! - Observers with name/value filters and once-per-pulse firing
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: the cell node, its variant policies and the arena holding them
//! - `reactive`: the model, the get/set/run protocol, propagation and observers
//!
//! # Example
//!
//! ```rust,ignore
//! use cells_core::{CellDef, Model};
//!
//! let mut model: Model<i64> = Model::new();
//!
//! let count = model.define(CellDef::source("count").value(1))?;
//! let doubled = model.define(CellDef::derived("doubled", move |m, _| {
//!     Ok(m.get(count)? * 2)
//! }))?;
//!
//! assert_eq!(model.get(doubled)?, 2);
//!
//! // Reruns `doubled` before returning.
//! model.set(count, 5)?;
//! assert_eq!(model.get(doubled)?, 10);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::ModelConfig;
pub use error::{CellError, ConfigError};
pub use graph::{CellId, CellKind};
pub use reactive::{CellDef, CellSnapshot, Change, Model, Observer};
