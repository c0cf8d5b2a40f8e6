//! csearch prelude.
//!
//! This module contains the most used types, traits and functions that you
//! can import easily as a group.
//!
//! ```
//! use csearch::prelude::*;
//!
//! ```

#[doc(no_inline)]
pub use crate::checkpoint::{Checkpoint, CheckpointSink};

#[doc(no_inline)]
pub use crate::config::{Budgets, EvolutionOverrides, OptimizerConfig, SwarmOverrides};

#[doc(no_inline)]
pub use crate::driver::{SearchJob, SearchReport};

#[doc(no_inline)]
pub use crate::error::{CheckpointError, MinimizerError};

#[doc(no_inline)]
pub use crate::minimize::{
    Annealing, AnnealingSchedule, DifferentialEvolution, EvolutionSettings, LegacyFn, MinimizerResult, MultiDimFn,
    NelderMead, ObjFn, ParticleSwarm, Powell, Simplex, SwarmSettings, R_TOLERANCE,
};

#[doc(no_inline)]
pub use crate::registry::{Algorithm, OptimizerDef};

#[doc(no_inline)]
pub use crate::rng::XorShift64Star;

#[doc(no_inline)]
pub use crate::stats::VertexStats;
