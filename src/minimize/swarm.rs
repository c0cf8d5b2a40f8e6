use crate::minimize::objective::{Evaluator, ObjFn};
use crate::minimize::{MinimizerError, MinimizerResult};
use crate::rng::XorShift64Star;
use ndarray::prelude::*;
use std::fmt;
use tracing::debug;

pub const DEFAULT_MAX_ITERS: usize = 200;
pub const DEFAULT_MAX_EVALS: usize = 10_000;

/// Particle swarm hyperparameters and budgets.
#[derive(Debug, Clone, PartialEq)]
pub struct SwarmSettings {
    pub swarm_size: usize,
    pub inertia: f64,
    pub c1: f64,
    pub c2: f64,
    /// Velocity cap, also the half-width of the initial positions
    pub v_max: f64,
    pub max_iters: usize,
    pub max_evals: usize,
    pub seed: u64,
    /// Stop once the best value is at or below this
    pub tolerance: f64,
}

impl SwarmSettings {
    /// Defaults for an `ndim`-dimensional search with step `dpos`.
    pub fn for_problem(ndim: usize, dpos: f64) -> Self {
        SwarmSettings {
            swarm_size: (5 * ndim).max(10),
            inertia: 0.72,
            c1: 1.49,
            c2: 1.49,
            v_max: if dpos > 0.0 { dpos } else { 1.0 },
            max_iters: DEFAULT_MAX_ITERS,
            max_evals: DEFAULT_MAX_EVALS,
            seed: 1,
            tolerance: super::R_TOLERANCE,
        }
    }

    pub fn with_pso_params(mut self, swarm_size: usize, inertia: f64, c1: f64, c2: f64) -> Self {
        self.swarm_size = swarm_size;
        self.inertia = inertia;
        self.c1 = c1;
        self.c2 = c2;
        self
    }

    pub fn with_v_max(mut self, v_max: f64) -> Self {
        self.v_max = v_max;
        self
    }

    pub fn with_budget(mut self, max_iters: usize, max_evals: usize) -> Self {
        self.max_iters = max_iters;
        self.max_evals = max_evals;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<(), MinimizerError> {
        if self.swarm_size == 0 {
            return Err(MinimizerError::InvalidParameters("swarm size must be positive".into()));
        }
        if !(self.v_max > 0.0) || !self.v_max.is_finite() {
            return Err(MinimizerError::InvalidParameters(format!(
                "velocity cap must be positive, got {}",
                self.v_max
            )));
        }
        Ok(())
    }
}

/// Result of a particle swarm run
#[derive(Debug, Clone)]
pub struct SwarmResult {
    pub xmin: Array1<f64>,
    pub fmin: f64,
    pub iters: usize,
    pub fn_evals: usize,
    pub converged: bool,
}

impl MinimizerResult for SwarmResult {
    fn xmin(&self) -> &Array1<f64> {
        &self.xmin
    }

    fn fmin(&self) -> f64 {
        self.fmin
    }

    fn fn_evals(&self) -> usize {
        self.fn_evals
    }

    fn iters(&self) -> usize {
        self.iters
    }

    fn converged(&self) -> bool {
        self.converged
    }
}

/// Particle swarm state, one row per particle
struct Swarm {
    pos: Array2<f64>,
    vel: Array2<f64>,
    pbest: Array2<f64>,
    pbest_val: Array1<f64>,
    gbest: Array1<f64>,
    gbest_val: f64,
}

#[derive(Clone)]
pub struct ParticleSwarm {
    f: Box<dyn ObjFn>,
    settings: SwarmSettings,
}

impl ParticleSwarm {
    pub fn new<F>(f: F, settings: SwarmSettings) -> Self
    where
        F: ObjFn + 'static,
    {
        ParticleSwarm::new_boxed(Box::new(f), settings)
    }

    pub fn new_boxed(f: Box<dyn ObjFn>, settings: SwarmSettings) -> Self {
        ParticleSwarm { f, settings }
    }

    pub fn settings(&self) -> &SwarmSettings {
        &self.settings
    }

    /// Scatter the swarm uniformly in `±v_max` and evaluate each particle
    /// while the budget lasts. Particles left unevaluated start with an
    /// infinite personal best.
    fn init_swarm(&self, ndim: usize, rng: &mut XorShift64Star, eval: &mut Evaluator) -> Result<Swarm, MinimizerError> {
        let n = self.settings.swarm_size;
        let span = self.settings.v_max;
        let mut pos = Array2::zeros((n, ndim));
        let mut vel = Array2::zeros((n, ndim));
        let mut pbest_val = Array1::from_elem(n, f64::INFINITY);
        let mut gbest_idx = 0;

        for i in 0..n {
            for j in 0..ndim {
                pos[[i, j]] = rng.uniform_span(span);
                vel[[i, j]] = rng.uniform_span(span);
            }
            if eval.exhausted() {
                continue;
            }
            pbest_val[i] = eval.eval(&pos.row(i).to_owned())?;
            if i == 0 || pbest_val[i] < pbest_val[gbest_idx] {
                gbest_idx = i;
            }
        }

        Ok(Swarm {
            pbest: pos.clone(),
            gbest: pos.row(gbest_idx).to_owned(),
            gbest_val: pbest_val[gbest_idx],
            pos,
            vel,
            pbest_val,
        })
    }

    /// Minimize over `ndim` parameters.
    ///
    /// # Returns
    /// * `SwarmResult` with the global best. Running out of iterations or
    ///   evaluations is a normal stop with `converged == false`.
    pub fn minimize(&mut self, ndim: usize) -> Result<SwarmResult, MinimizerError> {
        if ndim == 0 {
            return Err(MinimizerError::InvalidDimension);
        }
        self.settings.validate()?;
        let s = self.settings.clone();

        let mut rng = XorShift64Star::new(s.seed.max(1));
        let mut eval = Evaluator::new(self.f.as_ref(), Some(s.max_evals));
        let mut swarm = self.init_swarm(ndim, &mut rng, &mut eval)?;

        let mut iters = 0;
        'outer: while iters < s.max_iters && !eval.exhausted() {
            iters += 1;
            for i in 0..s.swarm_size {
                for j in 0..ndim {
                    let r1 = rng.uniform01();
                    let r2 = rng.uniform01();
                    let x = swarm.pos[[i, j]];
                    let v = s.inertia * swarm.vel[[i, j]]
                        + s.c1 * r1 * (swarm.pbest[[i, j]] - x)
                        + s.c2 * r2 * (swarm.gbest[j] - x);
                    let v = v.clamp(-s.v_max, s.v_max);
                    swarm.vel[[i, j]] = v;
                    swarm.pos[[i, j]] = x + v;
                }

                let fx = eval.eval(&swarm.pos.row(i).to_owned())?;
                if fx < swarm.pbest_val[i] {
                    swarm.pbest_val[i] = fx;
                    let row = swarm.pos.row(i).to_owned();
                    swarm.pbest.row_mut(i).assign(&row);
                    if fx < swarm.gbest_val {
                        swarm.gbest_val = fx;
                        swarm.gbest.assign(&row);
                    }
                }

                if eval.exhausted() {
                    break 'outer;
                }
            }
            debug!(iter = iters, best = swarm.gbest_val, evals = eval.evals(), "swarm iteration");
            if swarm.gbest_val <= s.tolerance {
                break;
            }
        }

        Ok(SwarmResult {
            xmin: swarm.gbest,
            fmin: swarm.gbest_val,
            iters,
            fn_evals: eval.evals(),
            converged: swarm.gbest_val <= s.tolerance,
        })
    }
}

impl fmt::Debug for ParticleSwarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticleSwarm( settings: {:?})", self.settings)
    }
}
