use crate::alloc::LegacyVector;
use crate::error::MinimizerError;
use dyn_clone::DynClone;
use ndarray::prelude::*;
use std::cell::RefCell;
use tracing::trace;

// Define a trait for the objective function
pub trait ObjFn: DynClone {
    fn call(&self, x: &Array1<f64>) -> f64;
}
dyn_clone::clone_trait_object!(ObjFn);

impl<F> ObjFn for F
where
    F: Fn(&Array1<f64>) -> f64 + DynClone,
{
    fn call(&self, x: &Array1<f64>) -> f64 {
        self(x)
    }
}

// Wrapper for multi-dimensional functions taking a plain slice
#[derive(Clone)]
pub struct MultiDimFn<F>(pub F)
where
    F: Fn(&[f64]) -> f64 + Clone;

impl<F> MultiDimFn<F>
where
    F: Fn(&[f64]) -> f64 + Clone,
{
    pub fn new(f: F) -> Self {
        MultiDimFn(f)
    }
}

impl<F> ObjFn for MultiDimFn<F>
where
    F: Fn(&[f64]) -> f64 + Clone,
{
    fn call(&self, x: &Array1<f64>) -> f64 {
        match x.as_slice() {
            Some(s) => (self.0)(s),
            None => (self.0)(x.to_vec().as_slice()),
        }
    }
}

/// Adapter for objectives written against 1-based parameter vectors.
///
/// The wrapped function receives a slice whose element 0 is unused and whose
/// elements `1..=ndim` hold the parameters.
pub struct LegacyFn<F>
where
    F: Fn(&[f64]) -> f64 + Clone,
{
    f: F,
    scratch: RefCell<Option<LegacyVector>>,
}

impl<F> LegacyFn<F>
where
    F: Fn(&[f64]) -> f64 + Clone,
{
    pub fn new(f: F) -> Self {
        LegacyFn {
            f,
            scratch: RefCell::new(None),
        }
    }
}

impl<F> Clone for LegacyFn<F>
where
    F: Fn(&[f64]) -> f64 + Clone,
{
    fn clone(&self) -> Self {
        LegacyFn::new(self.f.clone())
    }
}

impl<F> ObjFn for LegacyFn<F>
where
    F: Fn(&[f64]) -> f64 + Clone,
{
    fn call(&self, x: &Array1<f64>) -> f64 {
        let mut scratch = self.scratch.borrow_mut();
        if scratch.as_ref().map(|v| v.len()) != Some(x.len()) {
            *scratch = LegacyVector::zeros(x.len()).ok();
        }
        match scratch.as_mut() {
            Some(buf) => {
                buf.load(&x.view());
                (self.f)(buf.as_slice())
            }
            // Zero-length or unallocatable input: there is nothing to score.
            None => f64::NAN,
        }
    }
}

/// Counts objective evaluations and enforces an optional hard budget.
///
/// All minimizers in this crate reach the objective only through an
/// `Evaluator`, so the budget can never be overrun.
pub struct Evaluator<'a> {
    f: &'a dyn ObjFn,
    evals: usize,
    limit: Option<usize>,
}

impl<'a> Evaluator<'a> {
    pub fn new(f: &'a dyn ObjFn, limit: Option<usize>) -> Self {
        Evaluator { f, evals: 0, limit }
    }

    /// Count `spent` evaluations made elsewhere against the budget.
    pub fn with_spent(mut self, spent: usize) -> Self {
        self.evals = spent;
        self
    }

    /// Evaluate `x`, refusing once the budget is spent. A NaN score is
    /// reported as an evaluation error.
    pub fn eval(&mut self, x: &Array1<f64>) -> Result<f64, MinimizerError> {
        if let Some(limit) = self.limit {
            if self.evals >= limit {
                return Err(MinimizerError::EvaluationBudgetExhausted { limit });
            }
        }
        self.evals += 1;
        let value = self.f.call(x);
        trace!(eval = self.evals, value, "objective");
        if value.is_nan() {
            return Err(MinimizerError::FunctionEvaluationError);
        }
        Ok(value)
    }

    pub fn evals(&self) -> usize {
        self.evals
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn remaining(&self) -> Option<usize> {
        self.limit.map(|l| l.saturating_sub(self.evals))
    }

    pub fn exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }
}

/// The objective restricted to the line `base + alpha * dir`.
pub struct LineFunction<'e, 'a> {
    base: &'e Array1<f64>,
    dir: &'e Array1<f64>,
    eval: &'e mut Evaluator<'a>,
}

impl<'e, 'a> LineFunction<'e, 'a> {
    pub fn new(base: &'e Array1<f64>, dir: &'e Array1<f64>, eval: &'e mut Evaluator<'a>) -> Self {
        LineFunction { base, dir, eval }
    }

    pub fn point(&self, alpha: f64) -> Array1<f64> {
        self.base + &(self.dir * alpha)
    }

    pub fn call(&mut self, alpha: f64) -> Result<f64, MinimizerError> {
        let x = self.point(alpha);
        self.eval.eval(&x)
    }

    pub fn evals(&self) -> usize {
        self.eval.evals()
    }
}
