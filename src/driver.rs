//! Search drivers: set up the starting state of one algorithm, run it against
//! the objective, persist simplex state and append the outcome to the run log.

use crate::checkpoint::{self, format_exp, CheckpointSink};
use crate::config::Budgets;
use crate::minimize::annealing::AnnealingSchedule;
use crate::minimize::objective::Evaluator;
use crate::minimize::{
    Annealing, DifferentialEvolution, EvolutionSettings, MinimizerError, MinimizerResult, NelderMead, ObjFn,
    ParticleSwarm, Powell, Simplex, SwarmSettings, R_TOLERANCE,
};
use crate::registry::Algorithm;
use ndarray::prelude::*;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Everything a driver needs to know about one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchJob {
    pub ndim: usize,
    /// Step used to build the starting simplex, velocity cap or initial span
    pub displacement: f64,
    /// Vertex file to resume the simplex from
    pub resume_from: Option<PathBuf>,
    /// Vertex file rewritten after every simplex update
    pub checkpoint: Option<PathBuf>,
    pub project: String,
    /// Plain text run log, appended to
    pub log_path: Option<PathBuf>,
    pub budgets: Budgets,
}

impl SearchJob {
    pub fn new(ndim: usize, displacement: f64) -> Self {
        SearchJob {
            ndim,
            displacement,
            resume_from: None,
            checkpoint: None,
            project: String::new(),
            log_path: None,
            budgets: Budgets::default(),
        }
    }

    pub fn with_resume_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.resume_from = Some(path.into());
        self
    }

    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(path.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn with_budgets(mut self, budgets: Budgets) -> Self {
        self.budgets = budgets;
        self
    }

    fn sink(&self) -> Option<CheckpointSink> {
        self.checkpoint
            .as_ref()
            .map(|path| CheckpointSink::new(path.clone(), self.project.clone()))
    }

    /// Save a freshly built starting simplex, so the checkpoint exists even
    /// if the search never changes it. A simplex resumed from the checkpoint
    /// file itself is left as it is.
    fn save_start(&self, simplex: &Simplex) -> Result<(), MinimizerError> {
        match self.sink() {
            Some(sink) if self.resume_from.as_deref() != Some(sink.path()) => Ok(sink.write(simplex)?),
            _ => Ok(()),
        }
    }

    fn run_log(&self) -> RunLog<'_> {
        RunLog {
            path: self.log_path.as_deref(),
        }
    }
}

/// Outcome of a driver run.
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub algorithm: Algorithm,
    pub best: Array1<f64>,
    pub fmin: f64,
    pub fn_evals: usize,
    pub iters: usize,
    pub converged: bool,
    /// Final simplex of the simplex-based algorithms
    pub simplex: Option<Simplex>,
}

impl MinimizerResult for SearchReport {
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
        self.converged
    }
}

struct RunLog<'a> {
    path: Option<&'a Path>,
}

impl RunLog<'_> {
    fn append(&self, text: &str) -> Result<(), MinimizerError> {
        if let Some(path) = self.path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(text.as_bytes())?;
        }
        Ok(())
    }

    fn start(&self) -> Result<(), MinimizerError> {
        self.append(&format!(
            "=> Start search (abs. tolerance = {})\n",
            format_exp(R_TOLERANCE, 3)
        ))
    }

    fn best(&self, header: &str, point: &Array1<f64>, fmin: f64) -> Result<(), MinimizerError> {
        let mut text = format!("=> {}:\n", header);
        for x in point.iter() {
            let _ = write!(text, "{:.6} ", x);
        }
        let _ = write!(text, "\nrmin = {:.6}\n", fmin);
        self.append(&text)
    }
}

/// Read the starting simplex from `resume_from`, or build the axis simplex
/// around the origin with step `displacement` within `limit` evaluations.
/// Returns the simplex and the evaluations spent on it.
fn starting_simplex(
    job: &SearchJob,
    f: &dyn ObjFn,
    limit: Option<usize>,
    log: &RunLog,
) -> Result<(Simplex, usize), MinimizerError> {
    match &job.resume_from {
        Some(path) => {
            log.append(&format!("=> Read vertex from \"{}\":\n", path.display()))?;
            Ok((checkpoint::read(path, Some(job.ndim))?.simplex, 0))
        }
        None => {
            log.append("=> Set up vertex:\n")?;
            let mut eval = Evaluator::new(f, limit);
            let simplex = Simplex::initial(&Array1::zeros(job.ndim), job.displacement, &mut eval)?;
            Ok((simplex, eval.evals()))
        }
    }
}

fn simplex_table(simplex: &Simplex) -> String {
    let mut text = String::new();
    for i in 0..simplex.mpar() {
        let _ = write!(text, "{:3}{}", i + 1, if i == 0 { ':' } else { ' ' });
        for x in simplex.vertex(i).iter() {
            let _ = write!(text, "{:7.4} ", x);
        }
        let _ = writeln!(text, "{:7.4}", simplex.value(i));
    }
    let mpar = simplex.mpar() as f64;
    let _ = write!(text, "\navg:");
    for x in (simplex.vertices().sum_axis(Axis(0)) / mpar).iter() {
        let _ = write!(text, "{:7.4} ", x);
    }
    let _ = writeln!(text, "{:7.4}", simplex.values().sum() / mpar);
    text
}

/// Downhill simplex search.
#[instrument(skip_all, fields(ndim = job.ndim))]
pub fn run_simplex(job: &mut SearchJob, f: Box<dyn ObjFn>) -> Result<SearchReport, MinimizerError> {
    let log = job.run_log();
    log.append("=> SIMPLEX SEARCH:\n\n")?;
    let limit = job.budgets.simplex_eval_limit;
    let (simplex, spent) = starting_simplex(job, f.as_ref(), Some(limit), &log)?;
    job.save_start(&simplex)?;
    log.start()?;

    let mut nm = NelderMead::new_boxed(f).with_max_evaluations(limit);
    if let Some(iters) = job.budgets.simplex_iter_limit {
        nm = nm.with_max_iterations(iters);
    }
    if let Some(sink) = job.sink() {
        nm = nm.with_checkpoint(sink);
    }
    let result = nm.minimize_after(simplex, spent)?;

    log.append(&format!(
        "\n=> No. of function evaluations in simplex: {:3}\n=> Vertices and function values of final simplex:\n{}",
        result.fn_evals,
        simplex_table(&result.simplex)
    ))?;
    info!(evals = result.fn_evals, fmin = result.fmin, "simplex search finished");

    Ok(SearchReport {
        algorithm: Algorithm::Simplex,
        best: result.best,
        fmin: result.fmin,
        fn_evals: result.fn_evals,
        iters: result.iters,
        converged: true,
        simplex: Some(result.simplex),
    })
}

/// Powell's direction set search from the origin along the coordinate axes.
#[instrument(skip_all, fields(ndim = job.ndim))]
pub fn run_powell(job: &mut SearchJob, f: Box<dyn ObjFn>) -> Result<SearchReport, MinimizerError> {
    let log = job.run_log();
    log.append("=> POWELL'S METHOD\n\n=> Set up initial direction set:\n")?;
    log.start()?;

    let mut powell = Powell::new_boxed(f).with_max_iterations(job.budgets.powell_iter_limit);
    if let Some(evals) = job.budgets.powell_eval_limit {
        powell = powell.with_max_evaluations(evals);
    }
    let result = powell.minimize(Array1::zeros(job.ndim))?;

    log.append(&format!("\n=> No. of iterations in powell: {:3}\n", result.iters))?;
    let mut text = String::from("=> Optimum parameter set:\n");
    for x in result.xmin.iter() {
        let _ = write!(text, "{:.6} ", x);
    }
    let _ = write!(text, "\n=> Optimum function value:\nrmin = {:.6}\n", result.fmin);
    log.append(&text)?;
    info!(iters = result.iters, fmin = result.fmin, "powell search finished");

    Ok(SearchReport {
        algorithm: Algorithm::Powell,
        best: result.xmin,
        fmin: result.fmin,
        fn_evals: result.fn_evals,
        iters: result.iters,
        converged: result.converged,
        simplex: None,
    })
}

/// Thermal simplex under the geometric cooling schedule. The legacy seed
/// left behind by the schedule is stored back into the job's budgets.
#[instrument(skip_all, fields(ndim = job.ndim))]
pub fn run_annealing(job: &mut SearchJob, f: Box<dyn ObjFn>) -> Result<SearchReport, MinimizerError> {
    let log = job.run_log();
    log.append("=> SIMULATED ANNEALING:\n\n")?;
    let limit = job.budgets.annealing_eval_limit;
    let (mut simplex, spent) = starting_simplex(job, f.as_ref(), limit, &log)?;
    job.save_start(&simplex)?;
    log.start()?;

    let mut sa = Annealing::new_boxed(f);
    if let Some(sink) = job.sink() {
        sa = sa.with_checkpoint(sink);
    }
    let mut schedule = AnnealingSchedule::default().with_evals_per_stage(job.budgets.annealing_iter_limit);
    if let Some(limit) = limit {
        schedule = schedule.with_max_evaluations(limit.saturating_sub(spent));
    }
    let result = schedule.run(&mut sa, &mut simplex, job.budgets.legacy_seed)?;
    let fn_evals = spent + result.fn_evals;

    log.append(&format!("\n=> No. of function evaluations in annealing: {:3}\n", fn_evals))?;
    log.best("Optimum parameter set and function value", &result.best.point, result.best.value)?;
    info!(
        stages = result.stages,
        evals = fn_evals,
        fmin = result.best.value,
        "annealing search finished"
    );

    job.budgets.legacy_seed = result.seed;

    Ok(SearchReport {
        algorithm: Algorithm::Annealing,
        best: result.best.point,
        fmin: result.best.value,
        fn_evals,
        iters: result.stages,
        converged: result.best.value <= R_TOLERANCE,
        simplex: Some(simplex),
    })
}

/// Particle swarm around the origin.
#[instrument(skip_all, fields(ndim = job.ndim))]
pub fn run_swarm(job: &mut SearchJob, f: Box<dyn ObjFn>) -> Result<SearchReport, MinimizerError> {
    let b = &job.budgets;
    let settings = b
        .swarm
        .apply(SwarmSettings::for_problem(job.ndim, job.displacement))
        .with_budget(b.swarm_iter_limit, b.swarm_eval_limit)
        .with_seed(b.population_seed());

    let log = job.run_log();
    log.append(&format!(
        "=> PARTICLE SWARM OPTIMISATION:\n=> swarm={} inertia={:.3} c1={:.3} c2={:.3} vmax={:.3}\n",
        settings.swarm_size, settings.inertia, settings.c1, settings.c2, settings.v_max
    ))?;

    let result = ParticleSwarm::new_boxed(f, settings).minimize(job.ndim)?;

    log.append(&format!("\n=> No. of function evaluations in pso: {:3}\n", result.fn_evals))?;
    log.best("Best parameter set and function value", &result.xmin, result.fmin)?;
    info!(evals = result.fn_evals, fmin = result.fmin, "particle swarm finished");

    Ok(SearchReport {
        algorithm: Algorithm::ParticleSwarm,
        best: result.xmin,
        fmin: result.fmin,
        fn_evals: result.fn_evals,
        iters: result.iters,
        converged: result.converged,
        simplex: None,
    })
}

/// Differential evolution around the origin.
#[instrument(skip_all, fields(ndim = job.ndim))]
pub fn run_evolution(job: &mut SearchJob, f: Box<dyn ObjFn>) -> Result<SearchReport, MinimizerError> {
    let b = &job.budgets;
    let settings = b
        .evolution
        .apply(EvolutionSettings::for_problem(job.ndim, job.displacement))
        .with_budget(b.evolution_iter_limit, b.evolution_eval_limit)
        .with_seed(b.population_seed());

    let log = job.run_log();
    log.append(&format!(
        "=> DIFFERENTIAL EVOLUTION:\n=> pop={} weight={:.3} cr={:.3} span={:.3}\n",
        settings.population, settings.weight, settings.crossover, settings.init_span
    ))?;

    let result = DifferentialEvolution::new_boxed(f, settings).minimize(job.ndim)?;

    log.append(&format!("\n=> No. of function evaluations in de: {:3}\n", result.fn_evals))?;
    log.best("Best parameter set and function value", &result.xmin, result.fmin)?;
    info!(evals = result.fn_evals, fmin = result.fmin, "differential evolution finished");

    Ok(SearchReport {
        algorithm: Algorithm::DifferentialEvolution,
        best: result.xmin,
        fmin: result.fmin,
        fn_evals: result.fn_evals,
        iters: result.iters,
        converged: result.converged,
        simplex: None,
    })
}

pub fn run_genetic(_job: &mut SearchJob, _f: Box<dyn ObjFn>) -> Result<SearchReport, MinimizerError> {
    Err(MinimizerError::NotImplemented("genetic algorithm"))
}
