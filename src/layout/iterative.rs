//! Driver-facing contract for incremental layout algorithms.
//!
//! An external loop (typically a render or animation loop) drives a
//! layout by calling `step()` once per tick. The trait's defaults encode
//! the relaxation-style contract: every call performs one bounded unit
//! of work, and the algorithm never decides on its own that it is done —
//! stopping is the driver's call, by iteration count, stability
//! heuristic, or wall-clock budget.

use thiserror::Error;

/// Lifecycle misuse on the layout surface.
///
/// Nothing inside a step is ever fatal; these only arise from calling
/// the lifecycle operations out of order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// `step()` was called before `attach()`.
    #[error("layout stepped before being attached to a model and graph")]
    NotAttached,
    /// `attach()` was called on an already-attached layout.
    #[error("layout is already attached")]
    AlreadyAttached,
}

/// An incremental layout algorithm driven by repeated `step()` calls.
pub trait IterativeLayout {
    /// One-time setup hook. The default does nothing; algorithms that
    /// bind their collaborators at attach time need nothing here.
    fn initialize(&mut self) {}

    /// Advance the layout by one discrete time step.
    fn step(&mut self) -> Result<(), LayoutError>;

    /// Whether each `step()` performs a bounded unit of work rather than
    /// a full solve. Always true for relaxation algorithms.
    fn is_incremental(&self) -> bool {
        true
    }

    /// Whether the algorithm considers itself finished. The default is
    /// false forever: termination is the driver's decision.
    fn done(&self) -> bool {
        false
    }

    /// Clear accumulated state, if any. The default does nothing;
    /// per-node state that decays on its own needs no explicit reset.
    fn reset(&mut self) {}
}
