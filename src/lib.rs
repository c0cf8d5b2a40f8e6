//! Derivative-free minimizers for structure refinement searches.
//!
//! The objective is a black box mapping a parameter vector to a score (an
//! R-factor in practice). The crate provides the simplex, Powell, simulated
//! annealing, particle swarm and differential evolution searches, vertex file
//! checkpoints for the simplex-based ones, and a registry that dispatches a
//! search by name.
pub mod alloc;
pub mod checkpoint;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod minimize;
pub mod prelude;
pub mod registry;
pub mod rng;
pub mod stats;

pub use ndarray;

/// Create a **[`Simplex`](crate::minimize::Simplex)** from rows of
/// `[value; coordinates...]`.
///
/// ```
/// use csearch::simplex;
/// let s = simplex![[0.5; 0.0, 0.0],
///                  [0.7; 1.0, 0.0],
///                  [0.2; 0.0, 1.0]].unwrap();
///
/// assert_eq!(s.ndim(), 2);
/// assert_eq!(s.best(), 2);
/// ```
///
/// Expands to `Simplex::from_parts`, so a row count other than `ndim + 1`
/// is reported as an error rather than a panic.
#[macro_export]
macro_rules! simplex {
    ($([$y:expr; $($x:expr),* $(,)*]),+ $(,)*) => {{
        $crate::minimize::Simplex::from_parts(
            $crate::ndarray::Array2::from(vec![$([$($x as f64,)*],)*]),
            $crate::ndarray::Array1::from(vec![$($y as f64,)*]),
        )
    }};
}
