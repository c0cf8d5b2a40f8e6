use crate::minimize::objective::{Evaluator, ObjFn};
use crate::minimize::{MinimizerError, MinimizerResult};
use crate::rng::XorShift64Star;
use ndarray::prelude::*;
use std::fmt;
use tracing::debug;

pub const DEFAULT_MAX_ITERS: usize = 200;
pub const DEFAULT_MAX_EVALS: usize = 20_000;
/// Smallest population that leaves three donors besides the target
pub const MIN_POPULATION: usize = 4;

/// Differential evolution (DE/rand/1/bin) hyperparameters and budgets.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionSettings {
    pub population: usize,
    /// Differential weight `F`
    pub weight: f64,
    /// Binomial crossover probability, clamped to 1
    pub crossover: f64,
    /// Half-width of the initial population box
    pub init_span: f64,
    pub max_iters: usize,
    pub max_evals: usize,
    pub seed: u64,
    pub tolerance: f64,
}

impl EvolutionSettings {
    pub fn for_problem(ndim: usize, dpos: f64) -> Self {
        EvolutionSettings {
            population: (10 * ndim).max(20),
            weight: 0.8,
            crossover: 0.9,
            init_span: if dpos > 0.0 { dpos } else { 1.0 },
            max_iters: DEFAULT_MAX_ITERS,
            max_evals: DEFAULT_MAX_EVALS,
            seed: 1,
            tolerance: super::R_TOLERANCE,
        }
    }

    pub fn with_de_params(mut self, population: usize, weight: f64, crossover: f64) -> Self {
        self.population = population;
        self.weight = weight;
        self.crossover = crossover;
        self
    }

    pub fn with_init_span(mut self, span: f64) -> Self {
        self.init_span = span;
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
}

/// Result of a differential evolution run
#[derive(Debug, Clone)]
pub struct EvolutionResult {
    pub xmin: Array1<f64>,
    pub fmin: f64,
    pub iters: usize,
    pub fn_evals: usize,
    pub converged: bool,
}

impl MinimizerResult for EvolutionResult {
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

/// Three distinct population indices, all different from `skip`.
fn pick_donors(rng: &mut XorShift64Star, pop: usize, skip: usize) -> (usize, usize, usize) {
    let mut a = rng.index(pop);
    while a == skip {
        a = rng.index(pop);
    }
    let mut b = rng.index(pop);
    while b == skip || b == a {
        b = rng.index(pop);
    }
    let mut c = rng.index(pop);
    while c == skip || c == a || c == b {
        c = rng.index(pop);
    }
    (a, b, c)
}

#[derive(Clone)]
pub struct DifferentialEvolution {
    f: Box<dyn ObjFn>,
    settings: EvolutionSettings,
}

impl DifferentialEvolution {
    pub fn new<F>(f: F, settings: EvolutionSettings) -> Self
    where
        F: ObjFn + 'static,
    {
        DifferentialEvolution::new_boxed(Box::new(f), settings)
    }

    pub fn new_boxed(f: Box<dyn ObjFn>, settings: EvolutionSettings) -> Self {
        DifferentialEvolution { f, settings }
    }

    pub fn settings(&self) -> &EvolutionSettings {
        &self.settings
    }

    /// Minimize over `ndim` parameters.
    ///
    /// Each generation visits every candidate in order: a trial vector is
    /// built from three random donors, and replaces the candidate when it
    /// scores no worse. The best candidate ever seen is reported.
    ///
    /// # Returns
    /// * `EvolutionResult`; running out of iterations or evaluations is a
    ///   normal stop with `converged == false`.
    pub fn minimize(&mut self, ndim: usize) -> Result<EvolutionResult, MinimizerError> {
        if ndim == 0 {
            return Err(MinimizerError::InvalidDimension);
        }
        let s = &self.settings;
        if s.population < MIN_POPULATION {
            return Err(MinimizerError::InvalidParameters(format!(
                "population must hold at least {} candidates, got {}",
                MIN_POPULATION, s.population
            )));
        }
        let weight = if s.weight > 0.0 { s.weight } else { 0.8 };
        let cr = if s.crossover > 0.0 { s.crossover.min(1.0) } else { 0.9 };
        let span = if s.init_span > 0.0 { s.init_span } else { 1.0 };
        let pop = s.population;

        let mut rng = XorShift64Star::new(s.seed.max(1));
        let mut eval = Evaluator::new(self.f.as_ref(), Some(s.max_evals));

        let mut members = Array2::zeros((pop, ndim));
        let mut scores = Array1::from_elem(pop, f64::INFINITY);
        let mut best_idx = 0;
        for i in 0..pop {
            for j in 0..ndim {
                members[[i, j]] = rng.uniform_span(span);
            }
            if eval.exhausted() {
                continue;
            }
            scores[i] = eval.eval(&members.row(i).to_owned())?;
            if i == 0 || scores[i] < scores[best_idx] {
                best_idx = i;
            }
        }
        let mut best = members.row(best_idx).to_owned();
        let mut best_val = scores[best_idx];

        let mut iters = 0;
        let mut trial = Array1::zeros(ndim);
        'outer: while iters < s.max_iters && !eval.exhausted() {
            iters += 1;
            for i in 0..pop {
                let j_rand = rng.index(ndim);
                let (a, b, c) = pick_donors(&mut rng, pop, i);

                for j in 0..ndim {
                    let r = rng.uniform01();
                    trial[j] = if r < cr || j == j_rand {
                        members[[a, j]] + weight * (members[[b, j]] - members[[c, j]])
                    } else {
                        members[[i, j]]
                    };
                }

                let ft = eval.eval(&trial)?;
                if ft <= scores[i] {
                    scores[i] = ft;
                    members.row_mut(i).assign(&trial);
                    if ft < best_val {
                        best_val = ft;
                        best.assign(&trial);
                    }
                }

                if eval.exhausted() {
                    break 'outer;
                }
            }
            debug!(iter = iters, best = best_val, evals = eval.evals(), "evolution generation");
            if best_val <= s.tolerance {
                break;
            }
        }

        Ok(EvolutionResult {
            xmin: best,
            fmin: best_val,
            iters,
            fn_evals: eval.evals(),
            converged: best_val <= s.tolerance,
        })
    }
}

impl fmt::Debug for DifferentialEvolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DifferentialEvolution( settings: {:?})", self.settings)
    }
}
