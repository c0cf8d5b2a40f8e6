use ndarray::prelude::*;

pub mod annealing;
pub mod bracket;
pub mod brent;
pub mod evolution;
pub mod nelder_mead;
pub mod objective;
pub mod powell;
pub mod simplex;
pub mod swarm;

pub use crate::error::MinimizerError;
pub use annealing::{Annealing, AnnealingResult, AnnealingSchedule, BestPoint};
pub use evolution::{DifferentialEvolution, EvolutionResult, EvolutionSettings};
pub use nelder_mead::{NelderMead, NelderMeadResult};
pub use objective::{Evaluator, LegacyFn, MultiDimFn, ObjFn};
pub use powell::{Powell, PowellResult};
pub use simplex::Simplex;
pub use swarm::{ParticleSwarm, SwarmResult, SwarmSettings};

/// Absolute tolerance shared by the structure-search drivers.
pub const R_TOLERANCE: f64 = 5.0e-4;

/// Common view of every minimizer's outcome.
pub trait MinimizerResult {
    fn xmin(&self) -> &Array1<f64>;
    fn fmin(&self) -> f64;
    fn fn_evals(&self) -> usize;
    fn iters(&self) -> usize;
    fn converged(&self) -> bool;
}
