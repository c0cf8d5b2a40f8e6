use crate::minimize::bracket::bracket_minimum;
use crate::minimize::brent::{self, brent_minimize};
use crate::minimize::objective::{Evaluator, LineFunction, ObjFn};
use crate::minimize::{MinimizerError, MinimizerResult};
use ndarray::prelude::*;
use std::fmt;
use tracing::debug;

/// Default cap on outer iterations
pub const MAX_ITERS: usize = 100;

/// Result of Powell's method optimization
#[derive(Debug, Clone)]
pub struct PowellResult {
    pub xmin: Array1<f64>,
    pub fmin: f64,
    pub iters: usize,
    pub fn_evals: usize,
    pub converged: bool,
    /// Direction set at exit, one direction per column
    pub final_directions: Array2<f64>,
    /// Function value at the end of every outer iteration
    pub history: Vec<f64>,
}

impl MinimizerResult for PowellResult {
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

/// Minimize along `dir` from `p`, moving `p` to the line minimum.
///
/// Returns the function value at the new `p`.
pub fn linmin(p: &mut Array1<f64>, dir: &Array1<f64>, eval: &mut Evaluator) -> Result<f64, MinimizerError> {
    let (alpha, fmin) = {
        let mut line = LineFunction::new(p, dir, eval);
        let mut f = |alpha: f64| line.call(alpha);
        let br = bracket_minimum(&mut f).map_err(|e| match e {
            MinimizerError::NoMinimumFound => {
                MinimizerError::LineSearchFailed("could not bracket a minimum".to_string())
            }
            other => other,
        })?;
        let result = brent_minimize(&br, brent::TOLERANCE, brent::MAX_ITERS, &mut f)?;
        (result.xmin, result.fmin)
    };
    p.scaled_add(alpha, dir);
    Ok(fmin)
}

#[derive(Clone)]
pub struct Powell {
    xmin: Array1<f64>,
    fmin: f64,
    f: Box<dyn ObjFn>,
    ftol: f64,
    max_iters: usize,
    max_evals: Option<usize>,
    iters: usize,
    converged: bool,
}

impl Powell {
    pub fn new<F>(f: F) -> Self
    where
        F: ObjFn + 'static,
    {
        Powell::new_boxed(Box::new(f))
    }

    pub fn new_boxed(f: Box<dyn ObjFn>) -> Self {
        Powell {
            xmin: Array1::zeros(0),
            fmin: f64::INFINITY,
            f,
            ftol: super::R_TOLERANCE,
            max_iters: MAX_ITERS,
            max_evals: None,
            iters: 0,
            converged: false,
        }
    }

    pub fn with_tolerance(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_max_iterations(mut self, max_iters: usize) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Stop quietly once this many evaluations have been spent.
    pub fn with_max_evaluations(mut self, max_evals: usize) -> Self {
        self.max_evals = Some(max_evals);
        self
    }

    /// Powell's method for multidimensional optimization
    ///
    /// Each outer iteration runs a line search along every direction of the
    /// set. When the extrapolated point `2p - p_prev` beats the value at the
    /// start of the iteration, one more line search runs along `p - p_prev`
    /// and, if it improves, that direction replaces the one that gave the
    /// largest decrease.
    ///
    /// # Arguments
    /// * `initial_point` - Starting point
    /// * `directions` - Initial direction set, one direction per column
    ///
    /// # Returns
    /// * `PowellResult` once an iteration improves by no more than `ftol / 2`
    ///   or the evaluation budget is spent (`converged == false`).
    ///   Running past `max_iters` is a `MaxIterationsExceeded` error.
    pub fn powell_method_with_directions(
        &mut self,
        initial_point: Array1<f64>,
        mut directions: Array2<f64>,
    ) -> Result<PowellResult, MinimizerError> {
        self.converged = false;
        let n = initial_point.len();
        if n == 0 || directions.dim() != (n, n) {
            return Err(MinimizerError::InvalidDimension);
        }
        if self.ftol <= 0.0 {
            return Err(MinimizerError::InvalidTolerance);
        }

        let f = self.f.as_ref();
        let mut eval = Evaluator::new(f, self.max_evals);
        let mut p = initial_point;
        let mut fret = eval.eval(&p)?;
        let mut p_prev = p.clone();
        let mut history = Vec::new();
        self.iters = 0;

        let outcome = loop {
            if self.iters == self.max_iters {
                break Err(MinimizerError::MaxIterationsExceeded(self.max_iters));
            }
            self.iters += 1;
            let f_start = fret;
            let mut biggest_drop = 0.0;
            let mut best_dir = 0;

            let mut step = || -> Result<bool, MinimizerError> {
                for i in 0..n {
                    let dir = directions.column(i).to_owned();
                    let f_before = fret;
                    fret = linmin(&mut p, &dir, &mut eval)?;
                    let drop = (f_before - fret).abs();
                    if drop > biggest_drop {
                        biggest_drop = drop;
                        best_dir = i;
                    }
                }

                if (f_start - fret).abs() <= 0.5 * self.ftol {
                    return Ok(true);
                }

                let p_extrap = &p * 2.0 - &p_prev;
                let dir = &p - &p_prev;
                p_prev.assign(&p);

                let f_extrap = eval.eval(&p_extrap)?;
                if f_extrap < f_start {
                    let f_saved = fret;
                    let mut trial = p.clone();
                    match linmin(&mut trial, &dir, &mut eval) {
                        Ok(f_new) => {
                            p = trial;
                            fret = f_new;
                            if fret < f_saved {
                                directions.column_mut(best_dir).assign(&dir);
                            }
                        }
                        Err(MinimizerError::LineSearchFailed(_)) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(false)
            };

            match step() {
                Ok(true) => {
                    history.push(fret);
                    self.converged = true;
                    break Ok(());
                }
                Ok(false) => {
                    history.push(fret);
                    debug!(iter = self.iters, fret, evals = eval.evals(), "powell iteration");
                }
                Err(e) if e.is_budget_exhausted() => {
                    debug!(iter = self.iters, fret, "powell evaluation budget spent");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        };
        outcome?;

        self.xmin = p;
        self.fmin = fret;

        Ok(PowellResult {
            xmin: self.xmin.clone(),
            fmin: self.fmin,
            iters: self.iters,
            fn_evals: eval.evals(),
            converged: self.converged,
            final_directions: directions,
            history,
        })
    }

    /// Minimize from `initial_point` with the coordinate axes as directions.
    pub fn minimize(&mut self, initial_point: Array1<f64>) -> Result<PowellResult, MinimizerError> {
        let n = initial_point.len();
        self.powell_method_with_directions(initial_point, Array2::eye(n))
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

impl fmt::Debug for Powell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Powell( xmin: {:?}, fmin: {}, iters: {}, converged: {})",
            self.xmin.to_vec(),
            self.fmin,
            self.iters,
            self.converged
        )
    }
}
