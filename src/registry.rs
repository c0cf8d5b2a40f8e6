//! Table of the available search algorithms and name-based dispatch.

use crate::config::OptimizerConfig;
use crate::driver::{self, SearchJob, SearchReport};
use crate::minimize::{MinimizerError, ObjFn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Search algorithm
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    Simplex,
    Powell,
    Annealing,
    Genetic,
    ParticleSwarm,
    DifferentialEvolution,
}

impl Algorithm {
    pub fn def(self) -> &'static OptimizerDef {
        by_kind(self).unwrap_or_else(default_optimizer)
    }
}

impl FromStr for Algorithm {
    type Err = MinimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        by_name(s)
            .map(|def| def.kind)
            .ok_or_else(|| MinimizerError::UnknownOptimizer(s.to_string()))
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.def().name)
    }
}

pub type RunFn = fn(&mut SearchJob, Box<dyn ObjFn>) -> Result<SearchReport, MinimizerError>;

/// One registry entry.
#[derive(Clone, Copy)]
pub struct OptimizerDef {
    pub name: &'static str,
    /// Short identifier shown in the help text
    pub primary: &'static str,
    pub description: &'static str,
    pub aliases_help: &'static str,
    pub kind: Algorithm,
    pub implemented: bool,
    /// Whether the initial displacement affects the starting state
    pub uses_displacement: bool,
    pub is_default: bool,
    /// Prefixes accepted by [`by_name`]
    pub aliases: &'static [&'static str],
    pub run: RunFn,
}

impl OptimizerDef {
    /// Case-insensitive: `name` must start with one of the aliases.
    pub fn matches(&self, name: &str) -> bool {
        self.aliases.iter().any(|alias| {
            !alias.is_empty()
                && name
                    .get(..alias.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(alias))
        })
    }
}

impl fmt::Debug for OptimizerDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizerDef( name: {}, kind: {:?}, implemented: {}, aliases: {:?})",
            self.name, self.kind, self.implemented, self.aliases
        )
    }
}

pub static OPTIMIZERS: [OptimizerDef; 6] = [
    OptimizerDef {
        name: "simplex",
        primary: "si",
        description: "simplex method",
        aliases_help: "sx, simplex",
        kind: Algorithm::Simplex,
        implemented: true,
        uses_displacement: true,
        is_default: true,
        aliases: &["si", "sx", "simplex"],
        run: driver::run_simplex,
    },
    OptimizerDef {
        name: "powell",
        primary: "po",
        description: "Powell's method",
        aliases_help: "powell",
        kind: Algorithm::Powell,
        implemented: true,
        uses_displacement: false,
        is_default: false,
        aliases: &["po", "powell"],
        run: driver::run_powell,
    },
    OptimizerDef {
        name: "annealing",
        primary: "sa",
        description: "simulated annealing",
        aliases_help: "anneal, annealing",
        kind: Algorithm::Annealing,
        implemented: true,
        uses_displacement: true,
        is_default: false,
        aliases: &["sa", "anneal", "annealing", "simulated", "simulated-annealing"],
        run: driver::run_annealing,
    },
    OptimizerDef {
        name: "genetic",
        primary: "ga",
        description: "genetic algorithm",
        aliases_help: "genetic",
        kind: Algorithm::Genetic,
        implemented: false,
        uses_displacement: false,
        is_default: false,
        aliases: &["ga", "genetic", "genetic-algorithm"],
        run: driver::run_genetic,
    },
    OptimizerDef {
        name: "pso",
        primary: "ps",
        description: "particle swarm optimisation",
        aliases_help: "pso, swarm",
        kind: Algorithm::ParticleSwarm,
        implemented: true,
        uses_displacement: true,
        is_default: false,
        aliases: &["ps", "pso", "swarm"],
        run: driver::run_swarm,
    },
    OptimizerDef {
        name: "de",
        primary: "de",
        description: "differential evolution",
        aliases_help: "differential, differential-evolution",
        kind: Algorithm::DifferentialEvolution,
        implemented: true,
        uses_displacement: true,
        is_default: false,
        aliases: &["de", "differential", "differential-evolution"],
        run: driver::run_evolution,
    },
];

pub fn iter() -> impl Iterator<Item = &'static OptimizerDef> {
    OPTIMIZERS.iter()
}

/// First entry with an alias that `name` starts with.
pub fn by_name(name: &str) -> Option<&'static OptimizerDef> {
    OPTIMIZERS.iter().find(|def| def.matches(name))
}

pub fn by_kind(kind: Algorithm) -> Option<&'static OptimizerDef> {
    OPTIMIZERS.iter().find(|def| def.kind == kind)
}

pub fn default_optimizer() -> &'static OptimizerDef {
    OPTIMIZERS.iter().find(|def| def.is_default).unwrap_or(&OPTIMIZERS[0])
}

/// One line per entry, for command line help.
pub fn help_text() -> String {
    let mut text = String::new();
    for def in OPTIMIZERS.iter() {
        text.push_str(&format!("                          '{}' = {}", def.primary, def.description));
        if !def.aliases_help.is_empty() {
            text.push_str(&format!(" (aliases: {})", def.aliases_help));
        }
        if !def.implemented {
            text.push_str(" (not implemented)");
        }
        if def.is_default {
            text.push_str(" (default)");
        }
        text.push('\n');
    }
    text
}

/// Apply `cfg` to the job's budgets and run the entry's driver.
pub fn run(
    def: &OptimizerDef,
    cfg: &OptimizerConfig,
    job: &mut SearchJob,
    f: Box<dyn ObjFn>,
) -> Result<SearchReport, MinimizerError> {
    if !def.implemented {
        return Err(MinimizerError::NotImplemented(def.description));
    }
    cfg.apply(&mut job.budgets);
    info!(algorithm = def.name, ndim = job.ndim, config = %cfg.summary(), "starting search");
    (def.run)(job, f)
}

#[cfg(test)]
mod registry_tests {
    use super::*;
    use ndarray::prelude::*;

    #[test]
    fn test_lookup_by_prefix() {
        assert_eq!(by_name("si").map(|d| d.kind), Some(Algorithm::Simplex));
        assert_eq!(by_name("SX").map(|d| d.kind), Some(Algorithm::Simplex));
        assert_eq!(by_name("Simplex-method").map(|d| d.kind), Some(Algorithm::Simplex));
        assert_eq!(by_name("powell").map(|d| d.kind), Some(Algorithm::Powell));
        assert_eq!(by_name("SA").map(|d| d.kind), Some(Algorithm::Annealing));
        // "si" is tried before the annealing aliases
        assert_eq!(by_name("simulated").map(|d| d.kind), Some(Algorithm::Simplex));
        assert_eq!(by_name("swarm").map(|d| d.kind), Some(Algorithm::ParticleSwarm));
        assert_eq!(by_name("de").map(|d| d.kind), Some(Algorithm::DifferentialEvolution));
        assert_eq!(by_name("GA").map(|d| d.kind), Some(Algorithm::Genetic));
        assert!(by_name("s").is_none());
        assert!(by_name("newton").is_none());
        assert!(by_name("").is_none());
    }

    #[test]
    fn test_from_str_and_display() {
        assert_eq!(Algorithm::from_str("anneal").unwrap(), Algorithm::Annealing);
        assert!(matches!(
            Algorithm::from_str("bfgs"),
            Err(MinimizerError::UnknownOptimizer(_))
        ));
        assert_eq!(Algorithm::ParticleSwarm.to_string(), "pso");
    }

    #[test]
    fn test_table_is_consistent() {
        assert_eq!(iter().filter(|d| d.is_default).count(), 1);
        assert_eq!(default_optimizer().kind, Algorithm::Simplex);
        for def in iter() {
            assert_eq!(by_kind(def.kind).map(|d| d.name), Some(def.name));
            assert!(def.matches(def.primary));
        }
    }

    #[test]
    fn test_help_text() {
        let text = help_text();
        assert!(text.contains("'si' = simplex method (aliases: sx, simplex) (default)\n"));
        assert!(text.contains("'ga' = genetic algorithm (aliases: genetic) (not implemented)\n"));
        assert_eq!(text.lines().count(), OPTIMIZERS.len());
    }

    #[test]
    fn test_run_applies_config() {
        let f = |x: &Array1<f64>| (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2);
        let cfg = OptimizerConfig::new().with_max_evaluations(40).with_seed(5);
        let mut job = SearchJob::new(2, 1.0);
        let report = run(Algorithm::ParticleSwarm.def(), &cfg, &mut job, Box::new(f)).unwrap();

        assert_eq!(report.algorithm, Algorithm::ParticleSwarm);
        assert!(report.fn_evals <= 40);
        assert_eq!(job.budgets.legacy_seed, -5);
    }

    #[test]
    fn test_run_unimplemented() {
        let f = |x: &Array1<f64>| x.sum();
        let mut job = SearchJob::new(2, 1.0);
        let result = run(Algorithm::Genetic.def(), &OptimizerConfig::new(), &mut job, Box::new(f));
        assert!(matches!(result, Err(MinimizerError::NotImplemented(_))));
    }
}
