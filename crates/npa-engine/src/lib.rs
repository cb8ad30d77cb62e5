pub mod config;
pub mod mechanism;
pub mod montecarlo;
pub mod runner;

// Re-export commonly used types
pub use config::{ConfigError, NpaConfig};
pub use mechanism::{generate_mechanism, extract_upstream_mechanism, Mechanism, MechanismError};
pub use montecarlo::{
    multirun, run_rng, single_run, Batch, CancelToken, EngineError, MonteCarlo, Multirun, NpaScore,
    RunSummary,
};
pub use runner::{NodeState, NpaRunner, RunError, RunStep, RunnerConfig, StepKind};
