//! The NPA scoring engine.
//!
//! # Architecture
//!
//! - [`NpaRunner`] owns a private copy of a [`Mechanism`](crate::mechanism::Mechanism)
//!   and a committed score per node. It scores sources from their
//!   measurements, then repeatedly scores leaf-eligible nodes in batches.
//! - When no node is leaf-eligible, a cycle blocks progress and
//!   [`NpaRunner::remove_random_edge`] cuts one in-edge of the unscored node
//!   with the lowest in/out degree ratio, using the injected RNG.
//! - [`RunSteps`] exposes the same state machine one step at a time, with a
//!   snapshot of the unscored remainder after every step.
//! - [`RunError`] aborts a single run.
//!
//! # Usage
//!
//! ```ignore
//! let mut npa = NpaRunner::new(&mechanism, RunnerConfig::new("weight"), rng)?;
//! npa.run()?;
//! let score = npa.get_final_score()?;
//! ```

pub mod error;
pub mod state;
pub mod step;

pub use error::RunError;
pub use state::{NodeState, NpaRunner, RemovedEdge, RunnerConfig, DEFAULT_TAG};
pub use step::{RunStep, RunSteps, StepKind};
