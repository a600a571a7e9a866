//! Error types for cell evaluation and model configuration.

use thiserror::Error;

use crate::graph::CellId;

/// Errors raised synchronously by [`Model::get`], [`Model::set`] and
/// [`Model::run`].
///
/// The first three variants are the cell protocol errors. Of those, only
/// [`CellError::UnboundEphemeralRead`] is routine: it means "no pulse is
/// available right now" and is swallowed by propagation when it surfaces
/// from a dependent's recomputation.
///
/// [`Model::get`]: crate::Model::get
/// [`Model::set`]: crate::Model::set
/// [`Model::run`]: crate::Model::run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    /// `set` was called on a derived cell.
    #[error("cannot set derived cell `{cell}`")]
    MutationOnDerivedCell { cell: String },

    /// `run` was called, directly or through a lazy `get`, on a source cell.
    #[error("cannot recompute source cell `{cell}`: it has no derivation function")]
    RecomputeOnSourceCell { cell: String },

    /// A transient cell was read outside the pass that produced its value.
    #[error("transient cell `{cell}` is not bound outside its pulse")]
    UnboundEphemeralRead { cell: String },

    /// A bound cell was found without a stored value.
    ///
    /// Every path that binds a cell stores a value first, so this signals a
    /// broken internal invariant rather than a misuse of the API. It is
    /// returned instead of panicking.
    #[error("cell `{cell}` is bound but holds no value")]
    MissingValue { cell: String },

    /// No cell with this name exists in the model.
    #[error("unknown cell `{0}`")]
    UnknownCell(String),

    /// A cell with this name is already defined in the model.
    #[error("cell `{0}` is already defined")]
    DuplicateCell(String),

    /// The id does not address a cell of this model.
    #[error("cell id {0:?} does not belong to this model")]
    InvalidCell(CellId),

    /// Failure reported by a derivation function or an observer.
    #[error("cell `{cell}`: {message}")]
    Rule { cell: String, message: String },
}

impl CellError {
    /// Build a [`CellError::Rule`] from user code.
    pub fn rule(cell: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rule {
            cell: cell.into(),
            message: message.into(),
        }
    }

    /// True for the routine "no pulse available" signal.
    ///
    /// Rules that want to tolerate a missing pulse can match on this and
    /// fall back to their previous value.
    pub fn is_unbound_ephemeral(&self) -> bool {
        matches!(self, Self::UnboundEphemeralRead { .. })
    }
}

/// Errors raised while loading a [`ModelConfig`](crate::ModelConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid model config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model config: {0}")]
    Invalid(String),
}
