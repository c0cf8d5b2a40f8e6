//! Simplex search with thermal fluctuations (simulated annealing).
//!
//! Every time a vertex value is looked at it is raised by `-T ln(U)` for a
//! fresh uniform `U` in `(0, 1]`, and every trial value is lowered by the
//! same kind of term before acceptance. At high temperature the simplex
//! therefore wanders and accepts uphill moves; as `T` falls it behaves like a
//! plain Nelder–Mead simplex.

use crate::checkpoint::CheckpointSink;
use crate::minimize::objective::{Evaluator, ObjFn};
use crate::minimize::{MinimizerError, MinimizerResult, Simplex};
use crate::rng::XorShift64Star;
use ndarray::prelude::*;
use std::fmt;
use tracing::{debug, info};

pub const START_TEMPERATURE: f64 = 3.5;
/// Fraction of the temperature removed after each stage
pub const COOLING: f64 = 0.25;
/// Evaluation budget of a single temperature stage
pub const EVALS_PER_STAGE: usize = 200;

/// Lowest unperturbed value seen so far and where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct BestPoint {
    pub point: Array1<f64>,
    pub value: f64,
}

impl BestPoint {
    fn of_simplex(simplex: &Simplex) -> Self {
        let ilo = simplex.best();
        BestPoint {
            point: simplex.vertex(ilo).to_owned(),
            value: simplex.value(ilo),
        }
    }

    fn offer(&mut self, point: &Array1<f64>, value: f64) {
        if value < self.value {
            self.point.assign(point);
            self.value = value;
        }
    }
}

/// Result of one annealing run
#[derive(Debug, Clone)]
pub struct AnnealingResult {
    pub best: BestPoint,
    pub fn_evals: usize,
    pub iters: usize,
    /// True when the perturbed spread fell below the tolerance
    pub converged: bool,
}

impl MinimizerResult for AnnealingResult {
    fn xmin(&self) -> &Array1<f64> {
        &self.best.point
    }

    fn fmin(&self) -> f64 {
        self.best.value
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

#[derive(Clone)]
pub struct Annealing {
    f: Box<dyn ObjFn>,
    ftol: f64,
    temperature: f64,
    checkpoint: Option<CheckpointSink>,
}

struct Thermal<'s, 'r> {
    simplex: &'s mut Simplex,
    psum: Array1<f64>,
    tt: f64,
    rng: &'r mut XorShift64Star,
}

impl Thermal<'_, '_> {
    /// `ln(U)` for a fresh `U` in `(0, 1]`.
    fn fluct(&mut self) -> f64 {
        self.rng.uniform_open0().ln()
    }

    /// Try `psum * fac1 - p[ihi] * fac2` and keep it in place of the high
    /// vertex when its lowered value beats `yhi`. Returns the raw value.
    fn amotsa(
        &mut self,
        eval: &mut Evaluator,
        best: &mut BestPoint,
        ihi: usize,
        yhi: &mut f64,
        fac: f64,
    ) -> Result<f64, MinimizerError> {
        let ndim = self.simplex.ndim() as f64;
        let fac1 = (1.0 - fac) / ndim;
        let fac2 = fac1 - fac;
        let high = self.simplex.vertex(ihi).to_owned();
        let ptry = &self.psum * fac1 - &high * fac2;
        let ytry = eval.eval(&ptry)?;
        best.offer(&ptry, ytry);

        let yflu = ytry - self.tt * self.fluct();
        if yflu < *yhi {
            *yhi = yflu;
            self.psum += &(&ptry - &high);
            self.simplex.set_vertex(ihi, &ptry.view(), ytry);
        }
        Ok(ytry)
    }

    /// Move every vertex but `ilo` halfway towards it.
    fn shrink(&mut self, eval: &mut Evaluator, best: &mut BestPoint, ilo: usize) -> Result<(), MinimizerError> {
        let anchor = self.simplex.vertex(ilo).to_owned();
        let mut outcome = Ok(());
        for i in 0..self.simplex.mpar() {
            if i == ilo {
                continue;
            }
            let mid = (&self.simplex.vertex(i) + &anchor) * 0.5;
            match eval.eval(&mid) {
                Ok(y) => {
                    best.offer(&mid, y);
                    self.simplex.set_vertex(i, &mid.view(), y);
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        self.psum = self.simplex.vertex_sum();
        outcome
    }
}

impl Annealing {
    pub fn new<F>(f: F) -> Self
    where
        F: ObjFn + 'static,
    {
        Annealing::new_boxed(Box::new(f))
    }

    pub fn new_boxed(f: Box<dyn ObjFn>) -> Self {
        Annealing {
            f,
            ftol: super::R_TOLERANCE,
            temperature: START_TEMPERATURE,
            checkpoint: None,
        }
    }

    pub fn with_tolerance(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_checkpoint(mut self, sink: CheckpointSink) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Run the thermal simplex at the current temperature.
    ///
    /// # Arguments
    /// * `simplex` - evaluated simplex, updated in place; on return the
    ///   vertex that looked best is in slot 0
    /// * `best` - best point of earlier runs, if any
    /// * `rng` - source of the thermal fluctuations
    /// * `max_evals` - evaluation budget; running out ends the run normally
    pub fn minimize(
        &mut self,
        simplex: &mut Simplex,
        best: Option<BestPoint>,
        rng: &mut XorShift64Star,
        max_evals: usize,
    ) -> Result<AnnealingResult, MinimizerError> {
        if self.ftol <= 0.0 {
            return Err(MinimizerError::InvalidTolerance);
        }
        if !(self.temperature >= 0.0) {
            return Err(MinimizerError::InvalidParameters(format!(
                "temperature must be non-negative, got {}",
                self.temperature
            )));
        }

        let mut best = best.unwrap_or_else(|| BestPoint::of_simplex(simplex));
        let mut eval = Evaluator::new(self.f.as_ref(), Some(max_evals));
        let mpar = simplex.mpar();
        let mut th = Thermal {
            psum: simplex.vertex_sum(),
            simplex,
            tt: -self.temperature,
            rng,
        };
        let mut iters = 0;
        let mut converged = false;
        // Whether the simplex differs from what the sink last saw
        let mut unsaved = false;

        loop {
            let (mut ilo, mut ihi) = (0, 1);
            let mut ylo = th.simplex.value(0) + th.tt * th.fluct();
            let mut ynhi = ylo;
            let mut yhi = th.simplex.value(1) + th.tt * th.fluct();
            if ylo > yhi {
                ihi = 0;
                ilo = 1;
                ynhi = yhi;
                yhi = ylo;
                ylo = ynhi;
            }
            for i in 2..mpar {
                let yt = th.simplex.value(i) + th.tt * th.fluct();
                if yt <= ylo {
                    ilo = i;
                    ylo = yt;
                }
                if yt > yhi {
                    ynhi = yhi;
                    ihi = i;
                    yhi = yt;
                } else if yt > ynhi {
                    ynhi = yt;
                }
            }

            let rtol = 2.0 * (yhi - ylo).abs();
            if rtol < self.ftol || eval.exhausted() {
                converged = rtol < self.ftol;
                th.simplex.swap_vertices(0, ilo);
                unsaved |= ilo != 0;
                break;
            }
            iters += 1;

            let step = (|| -> Result<(), MinimizerError> {
                let ytry = th.amotsa(&mut eval, &mut best, ihi, &mut yhi, -1.0)?;
                if ytry <= ylo {
                    th.amotsa(&mut eval, &mut best, ihi, &mut yhi, 2.0)?;
                } else if ytry >= ynhi {
                    let ysave = yhi;
                    let ytry = th.amotsa(&mut eval, &mut best, ihi, &mut yhi, 0.5)?;
                    if ytry >= ysave {
                        th.shrink(&mut eval, &mut best, ilo)?;
                    }
                }
                Ok(())
            })();

            match step {
                Ok(()) => {}
                Err(e) if e.is_budget_exhausted() => {
                    let ilo = th.simplex.best();
                    th.simplex.swap_vertices(0, ilo);
                    unsaved = true;
                    break;
                }
                Err(e) => return Err(e),
            }

            if let Some(sink) = &self.checkpoint {
                sink.write(th.simplex)?;
            }
            unsaved = false;
        }

        if unsaved {
            if let Some(sink) = &self.checkpoint {
                sink.write(th.simplex)?;
            }
        }

        best.offer(&th.simplex.vertex(0).to_owned(), th.simplex.value(0));
        debug!(
            temperature = self.temperature,
            iters,
            evals = eval.evals(),
            best = best.value,
            "annealing stage finished"
        );

        Ok(AnnealingResult {
            best,
            fn_evals: eval.evals(),
            iters,
            converged,
        })
    }
}

impl fmt::Debug for Annealing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Annealing( temperature: {}, ftol: {}, checkpoint: {:?})",
            self.temperature, self.ftol, self.checkpoint
        )
    }
}

/// Result of a full cooling schedule
#[derive(Debug, Clone)]
pub struct ScheduleResult {
    pub best: BestPoint,
    pub fn_evals: usize,
    pub stages: usize,
    /// Legacy seed to hand to the next run
    pub seed: i64,
}

/// Geometric cooling loop around [`Annealing`].
///
/// Starting at `start_temperature`, each stage runs the thermal simplex with
/// the temperature itself as tolerance, then multiplies the temperature by
/// `1 - cooling`, until it drops to `stop_temperature`. Each stage reseeds
/// the generator from the legacy seed (its absolute value, 1 if zero) and
/// leaves `seed + evaluations + 1` behind for the next stage. With a total
/// budget, every stage draws on what is left of it and the schedule ends
/// early once it is spent.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingSchedule {
    pub start_temperature: f64,
    pub cooling: f64,
    pub stop_temperature: f64,
    pub evals_per_stage: usize,
    /// Evaluations allowed over all stages
    pub max_evals: Option<usize>,
}

impl Default for AnnealingSchedule {
    fn default() -> Self {
        AnnealingSchedule {
            start_temperature: START_TEMPERATURE,
            cooling: COOLING,
            stop_temperature: super::R_TOLERANCE,
            evals_per_stage: EVALS_PER_STAGE,
            max_evals: None,
        }
    }
}

impl AnnealingSchedule {
    pub fn with_evals_per_stage(mut self, evals: usize) -> Self {
        self.evals_per_stage = evals;
        self
    }

    pub fn with_max_evaluations(mut self, max_evals: usize) -> Self {
        self.max_evals = Some(max_evals);
        self
    }

    pub fn temperatures(&self) -> impl Iterator<Item = f64> + '_ {
        std::iter::successors(Some(self.start_temperature), move |t| Some(t * (1.0 - self.cooling)))
            .take_while(move |&t| t > self.stop_temperature)
    }

    pub fn run(
        &self,
        annealer: &mut Annealing,
        simplex: &mut Simplex,
        legacy_seed: i64,
    ) -> Result<ScheduleResult, MinimizerError> {
        if !(self.cooling > 0.0 && self.cooling < 1.0) {
            return Err(MinimizerError::InvalidParameters(format!(
                "cooling factor must lie in (0, 1), got {}",
                self.cooling
            )));
        }

        let mut seed = legacy_seed;
        let mut best = None;
        let mut fn_evals = 0;
        let mut stages = 0;
        for temperature in self.temperatures() {
            let stage_evals = match self.max_evals {
                Some(limit) => self.evals_per_stage.min(limit.saturating_sub(fn_evals)),
                None => self.evals_per_stage,
            };
            if stage_evals == 0 {
                debug!(temperature, fn_evals, "annealing budget spent");
                break;
            }
            let stage_seed = seed.unsigned_abs().max(1);
            let mut rng = XorShift64Star::new(stage_seed);

            annealer.temperature = temperature;
            annealer.ftol = temperature;
            let result = annealer.minimize(simplex, best.take(), &mut rng, stage_evals)?;

            fn_evals += result.fn_evals;
            stages += 1;
            seed = stage_seed
                .wrapping_add(result.fn_evals as u64)
                .wrapping_add(1)
                .min(i64::MAX as u64) as i64;
            debug!(temperature, best = result.best.value, "cooling");
            best = Some(result.best);
        }

        let best = best.unwrap_or_else(|| BestPoint::of_simplex(simplex));
        info!(stages, fn_evals, best = best.value, "annealing schedule finished");
        Ok(ScheduleResult {
            best,
            fn_evals,
            stages,
            seed,
        })
    }
}

#[cfg(test)]
mod annealing_tests {
    use super::*;

    fn quadratic(x: &Array1<f64>) -> f64 {
        (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2)
    }

    fn start() -> Simplex {
        let f = quadratic;
        let mut eval = Evaluator::new(&f, None);
        Simplex::initial(&array![0.0, 0.0], 1.0, &mut eval).unwrap()
    }

    #[test]
    fn test_schedule_temperatures() {
        let schedule = AnnealingSchedule::default();
        let temps: Vec<f64> = schedule.temperatures().collect();
        assert_eq!(temps[0], 3.5);
        assert!((temps[1] - 2.625).abs() < 1e-12);
        assert!(temps.iter().all(|&t| t > 5e-4));
        assert!(temps.last().unwrap() * 0.75 <= 5e-4);
    }

    #[test]
    fn test_cold_run_behaves_like_simplex() {
        let mut sa = Annealing::new(quadratic)
            .with_temperature(0.0)
            .with_tolerance(1e-8);
        let mut s = start();
        let mut rng = XorShift64Star::new(3);
        let result = sa.minimize(&mut s, None, &mut rng, 1000).unwrap();

        assert!(result.converged);
        assert!((result.best.point[0] - 1.0).abs() < 1e-2);
        assert!((result.best.point[1] + 2.0).abs() < 1e-2);
        assert_eq!(s.best(), 0);
    }

    #[test]
    fn test_schedule_converges_and_tracks_best() {
        let mut sa = Annealing::new(quadratic);
        let mut s = start();
        let result = AnnealingSchedule::default().run(&mut sa, &mut s, -1).unwrap();

        assert!(result.best.value < 1e-2);
        assert!((result.best.point[0] - 1.0).abs() < 0.1);
        assert!((result.best.point[1] + 2.0).abs() < 0.1);
        assert!(result.best.value <= s.values().iter().cloned().fold(f64::INFINITY, f64::min));
        assert!(result.fn_evals <= result.stages * EVALS_PER_STAGE);
    }

    #[test]
    fn test_reproducible_for_fixed_seed() {
        let run = || {
            let mut sa = Annealing::new(quadratic);
            let mut s = start();
            let r = AnnealingSchedule::default().run(&mut sa, &mut s, -42).unwrap();
            (r.best.value.to_bits(), r.fn_evals, r.seed, s)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_budget_respected() {
        let mut sa = Annealing::new(quadratic).with_temperature(1.0).with_tolerance(1e-12);
        let mut s = start();
        let mut rng = XorShift64Star::new(1);
        let result = sa.minimize(&mut s, None, &mut rng, 7).unwrap();
        assert!(result.fn_evals <= 7);
        assert!(!result.converged);
        assert!(result.best.value <= 5.0);
    }

    #[test]
    fn test_best_is_never_worse_than_input() {
        let mut sa = Annealing::new(quadratic).with_temperature(50.0);
        let mut s = start();
        let initial_best = s.values().iter().cloned().fold(f64::INFINITY, f64::min);
        let mut rng = XorShift64Star::new(9);
        let result = sa.minimize(&mut s, None, &mut rng, 50).unwrap();
        assert!(result.best.value <= initial_best);
    }

    #[test]
    fn test_schedule_total_budget() {
        let mut sa = Annealing::new(quadratic);
        let mut s = start();
        let schedule = AnnealingSchedule::default()
            .with_evals_per_stage(40)
            .with_max_evaluations(90);
        let result = schedule.run(&mut sa, &mut s, -5).unwrap();
        assert!(result.fn_evals <= 90);
        assert!(result.stages >= 3);
        assert!(result.best.value.is_finite());

        let mut s = start();
        let spent = AnnealingSchedule::default().with_max_evaluations(0);
        let result = spent.run(&mut sa, &mut s, -5).unwrap();
        assert_eq!(result.fn_evals, 0);
        assert_eq!(result.stages, 0);
        assert_eq!(result.seed, -5);
    }

    #[test]
    fn test_negative_temperature_rejected() {
        let mut sa = Annealing::new(quadratic).with_temperature(-1.0);
        let mut s = start();
        let mut rng = XorShift64Star::default();
        assert!(matches!(
            sa.minimize(&mut s, None, &mut rng, 10),
            Err(MinimizerError::InvalidParameters(_))
        ));
    }
}
