//! Monte Carlo aggregation of NPA runs.
//!
//! Cycle breaking is random, so a cyclic mechanism has a distribution of
//! scores rather than one score. A batch runs the state machine many times
//! over private copies of the same mechanism and averages the target
//! scores of the runs that succeed.
//!
//! Run `i` of a batch with base seed `s` draws from a `ChaCha8Rng` seeded
//! with `s` on stream `i` (see [`run_rng`]). Results therefore depend only
//! on the seed and the run count, never on how runs are spread over worker
//! threads. Failed runs are logged and dropped; a batch with no successful
//! run averages to [`NpaScore::Undefined`].

pub mod cancel;
pub mod workflow;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, NpaConfig};
use crate::mechanism::Mechanism;
use crate::runner::{NpaRunner, RunError, RunnerConfig};

pub use cancel::{CancelToken, StopCondition};

/// Errors raised while setting up the Monte Carlo engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Aggregate score of a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum NpaScore {
    /// Mean target score over the successful runs.
    Score(f64),
    /// No run succeeded.
    Undefined,
}

impl NpaScore {
    /// Arithmetic mean of `scores`, summed in iteration order.
    pub fn mean(scores: impl IntoIterator<Item = f64>) -> Self {
        let (sum, count) = scores
            .into_iter()
            .fold((0.0, 0usize), |(sum, count), score| (sum + score, count + 1));
        if count == 0 {
            NpaScore::Undefined
        } else {
            NpaScore::Score(sum / count as f64)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            NpaScore::Score(value) => Some(*value),
            NpaScore::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, NpaScore::Undefined)
    }
}

/// Bookkeeping of one batch of runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Runs never started because the batch was cancelled or ran out of time.
    pub skipped: usize,
    pub seed: u64,
}

/// The completed runs of one batch, in run order.
#[derive(Debug, Clone)]
pub struct Batch {
    pub runs: Vec<NpaRunner>,
    pub summary: RunSummary,
}

impl Batch {
    /// Final target score of every run, in run order.
    pub fn scores(&self) -> Vec<f64> {
        self.runs
            .iter()
            .filter_map(|run| run.get_final_score().ok())
            .collect()
    }

    pub fn average(&self) -> NpaScore {
        NpaScore::mean(self.scores())
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Single runs
// ---------------------------------------------------------------------------

/// The RNG of run `run` in a batch seeded with `seed`.
pub fn run_rng(seed: u64, run: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(run);
    rng
}

/// Copies `mechanism` and scores it to completion.
pub fn single_run<R: Rng>(
    mechanism: &Mechanism,
    config: &RunnerConfig,
    rng: R,
) -> Result<NpaRunner<R>, RunError> {
    let mut runner = NpaRunner::new(mechanism, config.clone(), rng)?;
    runner.run()?;
    Ok(runner)
}

/// Returns the configured seed, or draws and logs a fresh one.
pub(crate) fn resolve_seed(config: &NpaConfig) -> u64 {
    config.seed.unwrap_or_else(|| {
        let seed: u64 = rand::random();
        info!(seed, "no seed configured; generated one");
        seed
    })
}

// ---------------------------------------------------------------------------
// Lazy sequential batches
// ---------------------------------------------------------------------------

/// Lazily yields the successful runs of a batch, one run at a time on the
/// calling thread.
///
/// Failed runs are logged with `warn!` and skipped. Once cancelled or out of
/// time the iterator ends; [`summary`](Self::summary) tells how far it got.
#[derive(Debug)]
pub struct Multirun {
    mechanism: Mechanism,
    config: RunnerConfig,
    stop: StopCondition,
    next_run: usize,
    summary: RunSummary,
}

impl Multirun {
    pub fn new(
        mechanism: Mechanism,
        config: RunnerConfig,
        runs: usize,
        seed: u64,
        stop: StopCondition,
    ) -> Self {
        Multirun {
            mechanism,
            config,
            stop,
            next_run: 0,
            summary: RunSummary {
                requested: runs,
                seed,
                ..RunSummary::default()
            },
        }
    }

    /// Counts so far. Complete once the iterator is exhausted.
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Mean target score over the remaining runs.
    pub fn average(self) -> NpaScore {
        NpaScore::mean(self.filter_map(|run| run.get_final_score().ok()))
    }
}

impl Iterator for Multirun {
    type Item = NpaRunner;

    fn next(&mut self) -> Option<NpaRunner> {
        while self.next_run < self.summary.requested {
            if self.stop.should_stop() {
                self.summary.skipped = self.summary.requested - self.next_run;
                self.next_run = self.summary.requested;
                warn!(skipped = self.summary.skipped, "batch stopped early");
                return None;
            }

            let run = self.next_run;
            self.next_run += 1;
            let rng = run_rng(self.summary.seed, run as u64);
            match single_run(&self.mechanism, &self.config, rng) {
                Ok(runner) => {
                    self.summary.succeeded += 1;
                    return Some(runner);
                }
                Err(err) => {
                    self.summary.failed += 1;
                    warn!(run, error = %err, "NPA run failed; dropping it");
                }
            }
        }
        None
    }
}

impl std::iter::FusedIterator for Multirun {}

/// Lazily runs `config.runs` scoring runs over `mechanism` on the calling
/// thread.
pub fn multirun(mechanism: &Mechanism, config: &NpaConfig) -> Multirun {
    Multirun::new(
        mechanism.clone(),
        config.runner_config(),
        config.runs,
        resolve_seed(config),
        StopCondition::new(CancelToken::new(), config.max_duration()),
    )
}

// ---------------------------------------------------------------------------
// Parallel batches
// ---------------------------------------------------------------------------

enum Outcome {
    Done(NpaRunner),
    Failed(RunError),
    Skipped,
}

/// A configured Monte Carlo engine with its own worker pool.
pub struct MonteCarlo {
    config: NpaConfig,
    seed: u64,
    pool: rayon::ThreadPool,
    cancel: CancelToken,
}

impl std::fmt::Debug for MonteCarlo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonteCarlo")
            .field("config", &self.config)
            .field("seed", &self.seed)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl MonteCarlo {
    /// Validates `config` and starts the worker pool.
    pub fn new(config: NpaConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("npa-worker-{i}"));
        if let Some(threads) = config.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;
        let seed = resolve_seed(&config);

        info!(
            runs = config.runs,
            threads = pool.current_num_threads(),
            seed,
            "Monte Carlo engine ready"
        );

        Ok(MonteCarlo {
            config,
            seed,
            pool,
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &NpaConfig {
        &self.config
    }

    /// Base seed shared by every batch of this engine.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A handle that stops running and future batches between runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn stop_condition(&self) -> StopCondition {
        StopCondition::new(self.cancel.clone(), self.config.max_duration())
    }

    /// Runs the batch lazily on the calling thread instead of the pool.
    pub fn multirun(&self, mechanism: &Mechanism) -> Multirun {
        Multirun::new(
            mechanism.clone(),
            self.config.runner_config(),
            self.config.runs,
            self.seed,
            self.stop_condition(),
        )
    }

    /// Runs the batch on the worker pool and collects the successful runs in
    /// run order.
    pub fn collect_runs(&self, mechanism: &Mechanism) -> Batch {
        let runner_config = self.config.runner_config();
        let stop = self.stop_condition();
        let seed = self.seed;
        let requested = self.config.runs;

        let outcomes: Vec<Outcome> = self.pool.install(|| {
            (0..requested)
                .into_par_iter()
                .map(|run| {
                    if stop.should_stop() {
                        return Outcome::Skipped;
                    }
                    match single_run(mechanism, &runner_config, run_rng(seed, run as u64)) {
                        Ok(runner) => Outcome::Done(runner),
                        Err(err) => Outcome::Failed(err),
                    }
                })
                .collect()
        });

        let mut summary = RunSummary {
            requested,
            seed,
            ..RunSummary::default()
        };
        let mut runs = Vec::with_capacity(requested);
        for (run, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Outcome::Done(runner) => {
                    summary.succeeded += 1;
                    runs.push(runner);
                }
                Outcome::Failed(err) => {
                    summary.failed += 1;
                    warn!(run, error = %err, "NPA run failed; dropping it");
                }
                Outcome::Skipped => summary.skipped += 1,
            }
        }
        if summary.skipped > 0 {
            warn!(skipped = summary.skipped, "batch stopped early");
        }
        debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch finished"
        );

        Batch { runs, summary }
    }

    /// Mean target score over the successful runs of a batch.
    pub fn multirun_average(&self, mechanism: &Mechanism) -> NpaScore {
        self.collect_runs(mechanism).average()
    }
}
