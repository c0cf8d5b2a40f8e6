use crate::checkpoint::CheckpointSink;
use crate::minimize::objective::{Evaluator, ObjFn};
use crate::minimize::simplex::{centroid_excluding, Simplex};
use crate::minimize::{MinimizerError, MinimizerResult};
use ndarray::prelude::*;
use std::fmt;
use tracing::debug;

/// Default evaluation budget
pub const MAX_EVALUATIONS: usize = 2000;

const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Result of a Nelder–Mead search
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    pub simplex: Simplex,
    pub best: Array1<f64>,
    pub fmin: f64,
    pub fn_evals: usize,
    pub iters: usize,
}

impl MinimizerResult for NelderMeadResult {
    fn xmin(&self) -> &Array1<f64> {
        &self.best
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
        true
    }
}

#[derive(Clone)]
pub struct NelderMead {
    xmin: Array1<f64>,
    fmin: f64,
    f: Box<dyn ObjFn>,
    ftol: f64,
    max_evals: usize,
    max_iters: Option<usize>,
    checkpoint: Option<CheckpointSink>,
    iters: usize,
    converged: bool,
}

impl NelderMead {
    pub fn new<F>(f: F) -> Self
    where
        F: ObjFn + 'static,
    {
        NelderMead::new_boxed(Box::new(f))
    }

    pub fn new_boxed(f: Box<dyn ObjFn>) -> Self {
        NelderMead {
            xmin: Array1::zeros(0),
            fmin: f64::INFINITY,
            f,
            ftol: super::R_TOLERANCE,
            max_evals: MAX_EVALUATIONS,
            max_iters: None,
            checkpoint: None,
            iters: 0,
            converged: false,
        }
    }

    /// Absolute spread `|y_hi - y_lo|` below which the search stops.
    pub fn with_tolerance(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_max_evaluations(mut self, max_evals: usize) -> Self {
        self.max_evals = max_evals;
        self
    }

    /// Cap on iterations; running past it is a `MaxIterationsExceeded` error.
    pub fn with_max_iterations(mut self, max_iters: usize) -> Self {
        self.max_iters = Some(max_iters);
        self
    }

    /// Rewrite the simplex to `sink` after every iteration.
    pub fn with_checkpoint(mut self, sink: CheckpointSink) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    /// Minimize starting from an evaluated simplex.
    ///
    /// # Arguments
    /// * `simplex` - `ndim + 1` vertices with their objective values
    ///
    /// # Returns
    /// * `NelderMeadResult` with the final simplex and its best vertex.
    ///   Running out of evaluations before the spread drops below the
    ///   tolerance is an `EvaluationBudgetExhausted` error.
    pub fn minimize(&mut self, simplex: Simplex) -> Result<NelderMeadResult, MinimizerError> {
        self.minimize_after(simplex, 0)
    }

    /// Like [`minimize`](Self::minimize), with `spent` evaluations (usually
    /// those that built `simplex`) already charged to the budget. They are
    /// included in `fn_evals`.
    pub fn minimize_after(&mut self, mut simplex: Simplex, spent: usize) -> Result<NelderMeadResult, MinimizerError> {
        self.converged = false;
        if self.ftol <= 0.0 {
            return Err(MinimizerError::InvalidTolerance);
        }
        if simplex.ndim() == 0 {
            return Err(MinimizerError::InvalidDimension);
        }

        let f = self.f.as_ref();
        let mut eval = Evaluator::new(f, Some(self.max_evals)).with_spent(spent);
        self.iters = 0;

        loop {
            let ext = simplex.extremes();
            let (ilo, ihi, inhi) = (ext.ilo, ext.ihi, ext.inhi);
            let spread = (simplex.value(ihi) - simplex.value(ilo)).abs();
            if spread < self.ftol {
                break;
            }
            if eval.exhausted() {
                return Err(MinimizerError::EvaluationBudgetExhausted {
                    limit: self.max_evals,
                });
            }
            if self.max_iters == Some(self.iters) {
                return Err(MinimizerError::MaxIterationsExceeded(self.iters));
            }
            self.iters += 1;

            let centroid = centroid_excluding(simplex.vertices(), ihi);
            let worst = simplex.vertex(ihi).to_owned();

            let reflected = &centroid + &((&centroid - &worst) * ALPHA);
            let fr = eval.eval(&reflected)?;

            if fr < simplex.value(ilo) {
                let expanded = &centroid + &((&reflected - &centroid) * GAMMA);
                let fe = eval.eval(&expanded)?;
                if fe < fr {
                    simplex.set_vertex(ihi, &expanded.view(), fe);
                } else {
                    simplex.set_vertex(ihi, &reflected.view(), fr);
                }
            } else if fr < simplex.value(inhi) {
                simplex.set_vertex(ihi, &reflected.view(), fr);
            } else {
                let contracted = if fr < simplex.value(ihi) {
                    &centroid + &((&reflected - &centroid) * RHO)
                } else {
                    &centroid + &((&worst - &centroid) * RHO)
                };
                let fc = eval.eval(&contracted)?;
                if fc < simplex.value(ihi) {
                    simplex.set_vertex(ihi, &contracted.view(), fc);
                } else {
                    let anchor = simplex.vertex(ilo).to_owned();
                    for i in 0..simplex.mpar() {
                        if i == ilo {
                            continue;
                        }
                        let shrunk = &anchor + &((&simplex.vertex(i) - &anchor) * SIGMA);
                        let fs = eval.eval(&shrunk)?;
                        simplex.set_vertex(i, &shrunk.view(), fs);
                    }
                }
            }

            if let Some(sink) = &self.checkpoint {
                sink.write(&simplex)?;
            }
            debug!(
                iter = self.iters,
                evals = eval.evals(),
                best = simplex.value(ilo),
                spread,
                "simplex step"
            );
        }

        let ilo = simplex.best();
        self.xmin = simplex.vertex(ilo).to_owned();
        self.fmin = simplex.value(ilo);
        self.converged = true;

        Ok(NelderMeadResult {
            best: self.xmin.clone(),
            fmin: self.fmin,
            fn_evals: eval.evals(),
            iters: self.iters,
            simplex,
        })
    }

    /// Build the axis simplex around `origin` with step `dpos` and minimize.
    /// The evaluations of the starting simplex are charged to the budget.
    pub fn minimize_from(&mut self, origin: &Array1<f64>, dpos: f64) -> Result<NelderMeadResult, MinimizerError> {
        let (simplex, spent) = {
            let mut eval = Evaluator::new(self.f.as_ref(), Some(self.max_evals));
            let simplex = Simplex::initial(origin, dpos, &mut eval)?;
            (simplex, eval.evals())
        };
        self.minimize_after(simplex, spent)
    }

    pub fn xmin(&self) -> &Array1<f64> {
        &self.xmin
    }

    pub fn fmin(&self) -> f64 {
        self.fmin
    }

    pub fn iters(&self) -> usize {
        self.iters
    }
}

impl fmt::Debug for NelderMead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NelderMead( xmin: {:?}, fmin: {}, iters: {}, converged: {})",
            self.xmin.to_vec(),
            self.fmin,
            self.iters,
            self.converged
        )
    }
}
