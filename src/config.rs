//! Run configuration: evaluation/iteration budgets, the random seed, and
//! hyperparameter overrides for the population-based optimizers.
//!
//! An [`OptimizerConfig`] is assembled once (builder calls, environment
//! variables or a TOML document) and then applied to a [`Budgets`] table,
//! which is what the drivers actually read.

use crate::minimize::evolution::{self, EvolutionSettings};
use crate::minimize::swarm::{self, SwarmSettings};
use crate::minimize::{annealing, nelder_mead, powell, MinimizerError};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

pub const ENV_MAX_EVALS: &str = "CSEARCH_MAX_EVALS";
pub const ENV_MAX_ITERS: &str = "CSEARCH_MAX_ITERS";
pub const ENV_SEED: &str = "CSEARCH_SEED";
pub const ENV_PSO_SWARM: &str = "CSEARCH_PSO_SWARM";
pub const ENV_PSO_INERTIA: &str = "CSEARCH_PSO_INERTIA";
pub const ENV_PSO_C1: &str = "CSEARCH_PSO_C1";
pub const ENV_PSO_C2: &str = "CSEARCH_PSO_C2";
pub const ENV_PSO_VMAX: &str = "CSEARCH_PSO_VMAX";
pub const ENV_DE_POP: &str = "CSEARCH_DE_POP";
pub const ENV_DE_WEIGHT: &str = "CSEARCH_DE_WEIGHT";
pub const ENV_DE_CR: &str = "CSEARCH_DE_CR";
pub const ENV_DE_SPAN: &str = "CSEARCH_DE_SPAN";

/// Optional particle swarm hyperparameters. Unset or non-positive fields keep
/// the defaults of [`SwarmSettings::for_problem`].
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct SwarmOverrides {
    pub swarm_size: Option<usize>,
    pub inertia: Option<f64>,
    pub c1: Option<f64>,
    pub c2: Option<f64>,
    pub v_max: Option<f64>,
}

impl SwarmOverrides {
    pub fn apply(&self, mut settings: SwarmSettings) -> SwarmSettings {
        if let Some(n) = self.swarm_size.filter(|&n| n > 0) {
            settings.swarm_size = n;
        }
        if let Some(w) = positive(self.inertia) {
            settings.inertia = w;
        }
        if let Some(c) = positive(self.c1) {
            settings.c1 = c;
        }
        if let Some(c) = positive(self.c2) {
            settings.c2 = c;
        }
        if let Some(v) = positive(self.v_max) {
            settings.v_max = v;
        }
        settings
    }
}

/// Optional differential evolution hyperparameters. Unset or non-positive
/// fields keep the defaults of [`EvolutionSettings::for_problem`].
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct EvolutionOverrides {
    pub population: Option<usize>,
    pub weight: Option<f64>,
    pub crossover: Option<f64>,
    pub init_span: Option<f64>,
}

impl EvolutionOverrides {
    pub fn apply(&self, mut settings: EvolutionSettings) -> EvolutionSettings {
        if let Some(n) = self.population.filter(|&n| n > 0) {
            settings.population = n;
        }
        if let Some(w) = positive(self.weight) {
            settings.weight = w;
        }
        if let Some(cr) = positive(self.crossover) {
            settings.crossover = cr;
        }
        if let Some(s) = positive(self.init_span) {
            settings.init_span = s;
        }
        settings
    }
}

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|&x| x > 0.0 && x.is_finite())
}

/// Per-run limits and seed read by the search drivers.
#[derive(Debug, Clone, PartialEq)]
pub struct Budgets {
    /// Evaluation limit of the Nelder–Mead simplex, starting simplex included
    pub simplex_eval_limit: usize,
    pub simplex_iter_limit: Option<usize>,
    /// Outer iteration limit of Powell's method
    pub powell_iter_limit: usize,
    pub powell_eval_limit: Option<usize>,
    /// Evaluations per temperature stage of simulated annealing
    pub annealing_iter_limit: usize,
    /// Evaluations over the whole cooling schedule, starting simplex included
    pub annealing_eval_limit: Option<usize>,
    pub swarm_iter_limit: usize,
    pub swarm_eval_limit: usize,
    pub evolution_iter_limit: usize,
    pub evolution_eval_limit: usize,
    /// Negative means "reseed before use"; its magnitude is the seed.
    pub legacy_seed: i64,
    pub swarm: SwarmOverrides,
    pub evolution: EvolutionOverrides,
}

impl Default for Budgets {
    fn default() -> Self {
        Budgets {
            simplex_eval_limit: nelder_mead::MAX_EVALUATIONS,
            simplex_iter_limit: None,
            powell_iter_limit: powell::MAX_ITERS,
            powell_eval_limit: None,
            annealing_iter_limit: annealing::EVALS_PER_STAGE,
            annealing_eval_limit: None,
            swarm_iter_limit: swarm::DEFAULT_MAX_ITERS,
            swarm_eval_limit: swarm::DEFAULT_MAX_EVALS,
            evolution_iter_limit: evolution::DEFAULT_MAX_ITERS,
            evolution_eval_limit: evolution::DEFAULT_MAX_EVALS,
            legacy_seed: -1,
            swarm: SwarmOverrides::default(),
            evolution: EvolutionOverrides::default(),
        }
    }
}

impl Budgets {
    /// Seed handed to the population-based optimizers.
    pub fn population_seed(&self) -> u64 {
        self.legacy_seed.unsigned_abs().max(1)
    }
}

/// Caller-facing configuration. Zero means "use the algorithm default".
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct OptimizerConfig {
    #[serde(default)]
    pub max_evaluations: usize,
    #[serde(default)]
    pub max_iterations: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub pso: SwarmOverrides,
    #[serde(default)]
    pub de: EvolutionOverrides,
}

impl OptimizerConfig {
    pub fn new() -> Self {
        OptimizerConfig::default()
    }

    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = max_evaluations;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_pso(mut self, pso: SwarmOverrides) -> Self {
        self.pso = pso;
        self
    }

    pub fn with_de(mut self, de: EvolutionOverrides) -> Self {
        self.de = de;
        self
    }

    /// Read the `CSEARCH_*` environment variables.
    pub fn from_env() -> Self {
        OptimizerConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key/value source using the
    /// environment variable names. Unparsable or non-positive values are
    /// ignored with a warning.
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut cfg = OptimizerConfig::default();
        if let Some(n) = read_positive::<usize, _>(&lookup, ENV_MAX_EVALS) {
            cfg.max_evaluations = n;
        }
        if let Some(n) = read_positive::<usize, _>(&lookup, ENV_MAX_ITERS) {
            cfg.max_iterations = n;
        }
        if let Some(s) = read_positive::<u64, _>(&lookup, ENV_SEED) {
            cfg.seed = s;
        }

        cfg.pso.swarm_size = read_positive(&lookup, ENV_PSO_SWARM);
        cfg.pso.inertia = read_positive(&lookup, ENV_PSO_INERTIA);
        cfg.pso.c1 = read_positive(&lookup, ENV_PSO_C1);
        cfg.pso.c2 = read_positive(&lookup, ENV_PSO_C2);
        cfg.pso.v_max = read_positive(&lookup, ENV_PSO_VMAX);

        cfg.de.population = read_positive(&lookup, ENV_DE_POP);
        cfg.de.weight = read_positive(&lookup, ENV_DE_WEIGHT);
        cfg.de.crossover = read_positive(&lookup, ENV_DE_CR);
        cfg.de.init_span = read_positive(&lookup, ENV_DE_SPAN);

        debug!(config = %cfg.summary(), "configuration from environment");
        cfg
    }

    /// Parse a TOML document such as
    ///
    /// ```toml
    /// max-evaluations = 500
    /// seed = 42
    ///
    /// [pso]
    /// swarm-size = 30
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, MinimizerError> {
        toml::from_str(content).map_err(|e| MinimizerError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, MinimizerError> {
        debug!("Loading optimizer configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)
            .map_err(|e| MinimizerError::Config(format!("{}: {}", path.display(), e)))?;
        OptimizerConfig::from_toml(&content)
    }

    /// True when nothing deviates from the algorithm defaults.
    pub fn is_default(&self) -> bool {
        self.max_evaluations == 0 && self.max_iterations == 0 && self.seed == 0
    }

    /// Copy the configured limits into `budgets`.
    ///
    /// The evaluation limit caps the total evaluations of every algorithm.
    /// The iteration limit feeds Powell, annealing (per stage), swarm and
    /// evolution. For the simplex it is the evaluation limit when none is
    /// given, and an iteration cap otherwise. A nonzero seed is stored
    /// negated as the legacy seed.
    pub fn apply(&self, budgets: &mut Budgets) {
        if self.max_evaluations > 0 {
            budgets.simplex_eval_limit = self.max_evaluations;
            budgets.powell_eval_limit = Some(self.max_evaluations);
            budgets.annealing_eval_limit = Some(self.max_evaluations);
            budgets.swarm_eval_limit = self.max_evaluations;
            budgets.evolution_eval_limit = self.max_evaluations;
        }
        if self.max_iterations > 0 {
            budgets.powell_iter_limit = self.max_iterations;
            budgets.annealing_iter_limit = self.max_iterations;
            budgets.swarm_iter_limit = self.max_iterations;
            budgets.evolution_iter_limit = self.max_iterations;
            if self.max_evaluations == 0 {
                budgets.simplex_eval_limit = self.max_iterations;
            } else {
                budgets.simplex_iter_limit = Some(self.max_iterations);
            }
        }
        if self.seed > 0 {
            let seed = self.seed.min(i64::MAX as u64) as i64;
            budgets.legacy_seed = -seed;
        }
        budgets.swarm = self.pso.clone();
        budgets.evolution = self.de.clone();
    }

    /// One-line description for the run log.
    pub fn summary(&self) -> String {
        if self.is_default() {
            return "defaults".to_string();
        }
        let or_default = |n: u64| {
            if n > 0 {
                n.to_string()
            } else {
                "default".to_string()
            }
        };
        format!(
            "max_evals={} max_iters={} seed={}",
            or_default(self.max_evaluations as u64),
            or_default(self.max_iterations as u64),
            or_default(self.seed)
        )
    }
}

trait Positive: Sized + std::str::FromStr {
    fn is_positive(&self) -> bool;
}

impl Positive for usize {
    fn is_positive(&self) -> bool {
        *self > 0
    }
}

impl Positive for u64 {
    fn is_positive(&self) -> bool {
        *self > 0
    }
}

impl Positive for f64 {
    fn is_positive(&self) -> bool {
        *self > 0.0 && self.is_finite()
    }
}

fn read_positive<T, L>(lookup: &L, key: &str) -> Option<T>
where
    T: Positive,
    L: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) if v.is_positive() => Some(v),
        _ => {
            warn!(key, value = %raw, "ignoring invalid configuration value");
            None
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_leave_budgets_alone() {
        let mut budgets = Budgets::default();
        OptimizerConfig::new().apply(&mut budgets);
        assert_eq!(budgets, Budgets::default());
        assert_eq!(budgets.simplex_eval_limit, 2000);
        assert_eq!(budgets.legacy_seed, -1);
        assert_eq!(OptimizerConfig::new().summary(), "defaults");
    }

    #[test]
    fn test_apply_limits_and_seed() {
        let mut budgets = Budgets::default();
        OptimizerConfig::new()
            .with_max_evaluations(300)
            .with_max_iterations(40)
            .with_seed(7)
            .apply(&mut budgets);
        assert_eq!(budgets.simplex_eval_limit, 300);
        assert_eq!(budgets.simplex_iter_limit, Some(40));
        assert_eq!(budgets.powell_eval_limit, Some(300));
        assert_eq!(budgets.annealing_eval_limit, Some(300));
        assert_eq!(budgets.swarm_eval_limit, 300);
        assert_eq!(budgets.evolution_eval_limit, 300);
        assert_eq!(budgets.powell_iter_limit, 40);
        assert_eq!(budgets.annealing_iter_limit, 40);
        assert_eq!(budgets.swarm_iter_limit, 40);
        assert_eq!(budgets.legacy_seed, -7);
        assert_eq!(budgets.population_seed(), 7);
    }

    #[test]
    fn test_iterations_cap_simplex_without_evaluation_limit() {
        let mut budgets = Budgets::default();
        OptimizerConfig::new().with_max_iterations(55).apply(&mut budgets);
        assert_eq!(budgets.simplex_eval_limit, 55);
        assert_eq!(budgets.simplex_iter_limit, None);
        assert_eq!(budgets.powell_eval_limit, None);
        assert_eq!(budgets.swarm_eval_limit, swarm::DEFAULT_MAX_EVALS);
    }

    #[test]
    fn test_huge_seed_is_clamped() {
        let mut budgets = Budgets::default();
        OptimizerConfig::new().with_seed(u64::MAX).apply(&mut budgets);
        assert_eq!(budgets.legacy_seed, -i64::MAX);
    }

    #[test]
    fn test_summary() {
        let cfg = OptimizerConfig::new().with_max_iterations(12);
        assert_eq!(cfg.summary(), "max_evals=default max_iters=12 seed=default");
        let cfg = OptimizerConfig::new().with_max_evaluations(5).with_seed(9);
        assert_eq!(cfg.summary(), "max_evals=5 max_iters=default seed=9");
    }

    #[test]
    fn test_from_lookup_ignores_bad_values() {
        let cfg = OptimizerConfig::from_lookup(lookup(&[
            (ENV_MAX_EVALS, "250"),
            (ENV_MAX_ITERS, "-3"),
            (ENV_SEED, "abc"),
            (ENV_PSO_SWARM, "16"),
            (ENV_PSO_INERTIA, "0.5"),
            (ENV_DE_CR, "0"),
            (ENV_DE_WEIGHT, " 0.6 "),
        ]));
        assert_eq!(cfg.max_evaluations, 250);
        assert_eq!(cfg.max_iterations, 0);
        assert_eq!(cfg.seed, 0);
        assert_eq!(cfg.pso.swarm_size, Some(16));
        assert_eq!(cfg.pso.inertia, Some(0.5));
        assert_eq!(cfg.de.crossover, None);
        assert_eq!(cfg.de.weight, Some(0.6));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(ENV_MAX_ITERS, "17");
        std::env::set_var(ENV_SEED, "123");
        let cfg = OptimizerConfig::from_env();
        std::env::remove_var(ENV_MAX_ITERS);
        std::env::remove_var(ENV_SEED);

        assert_eq!(cfg.max_iterations, 17);
        assert_eq!(cfg.seed, 123);
    }

    #[test]
    fn test_from_toml() {
        let cfg = OptimizerConfig::from_toml(
            r#"
            max-evaluations = 500
            seed = 42

            [pso]
            swarm-size = 30
            v-max = 0.2

            [de]
            crossover = 0.7
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_evaluations, 500);
        assert_eq!(cfg.max_iterations, 0);
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.pso.swarm_size, Some(30));
        assert_eq!(cfg.pso.v_max, Some(0.2));
        assert_eq!(cfg.de.crossover, Some(0.7));

        assert!(matches!(
            OptimizerConfig::from_toml("max-evals = 3"),
            Err(MinimizerError::Config(_))
        ));
    }

    #[test]
    fn test_overrides_apply() {
        let pso = SwarmOverrides {
            swarm_size: Some(0),
            inertia: Some(0.4),
            v_max: Some(-1.0),
            ..Default::default()
        };
        let s = pso.apply(SwarmSettings::for_problem(2, 0.5));
        assert_eq!(s.swarm_size, 10);
        assert_eq!(s.inertia, 0.4);
        assert_eq!(s.v_max, 0.5);

        let de = EvolutionOverrides {
            population: Some(8),
            init_span: Some(3.0),
            ..Default::default()
        };
        let s = de.apply(EvolutionSettings::for_problem(2, 0.5));
        assert_eq!(s.population, 8);
        assert_eq!(s.init_span, 3.0);
        assert_eq!(s.weight, 0.8);
    }
}
