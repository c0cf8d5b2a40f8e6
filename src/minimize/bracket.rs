use crate::minimize::MinimizerError;
use tracing::trace;

/// Golden ratio used to grow the bracket
pub const GOLDEN_RATIO: f64 = 1.618033988749895;
/// Maximum number of golden expansions before giving up
pub const MAX_EXPANSIONS: usize = 64;

/// Result of minimum bracketing
#[derive(Debug, Clone, PartialEq)]
pub struct BracketResult {
    pub a: f64,  // Previous point
    pub b: f64,  // Middle point (lowest function value)
    pub c: f64,  // Far point
    pub fa: f64, // f(a)
    pub fb: f64, // f(b)
    pub fc: f64, // f(c)
    pub expansions: usize,
    pub function_evaluations: usize,
}

impl BracketResult {
    /// True when the middle point is no worse than both ends.
    pub fn is_valid(&self) -> bool {
        self.fb <= self.fa && self.fb <= self.fc
    }

    pub fn width(&self) -> f64 {
        (self.c - self.a).abs()
    }
}

/// Bracket a minimum of the 1-D function `f` starting from step 0.
///
/// The first trial step is `1`; when that goes uphill the steps `-1`,
/// `0.1` and `-0.1` are tried in turn. When all four go uphill, 0 already
/// lies below both of its `±0.1` neighbours and `(-0.1, 0, 0.1)` is
/// returned. Otherwise the far point `c = b + golden * (b - a)` is pushed
/// outwards from `(a, b)` while `f(c) < f(b)`.
///
/// # Arguments
/// * `f` - fallible 1-D function, typically an objective restricted to a line
///
/// # Returns
/// * `BracketResult` with `f(b) <= f(c)`, or `NoMinimumFound` when the
///   function keeps decreasing after `MAX_EXPANSIONS` expansions
pub fn bracket_minimum<F>(f: &mut F) -> Result<BracketResult, MinimizerError>
where
    F: FnMut(f64) -> Result<f64, MinimizerError>,
{
    let mut evals = 0;
    let mut eval = |x: f64, f: &mut F| -> Result<f64, MinimizerError> {
        evals += 1;
        f(x)
    };

    let mut a = 0.0;
    let mut fa = eval(a, f)?;
    let mut b = 1.0;
    let mut fb = eval(b, f)?;
    let mut previous = (b, fb);

    for step in [-1.0, 0.1, -0.1] {
        if fb <= fa {
            break;
        }
        previous = (b, fb);
        b = step;
        fb = eval(b, f)?;
    }

    if fb > fa {
        let (c, fc) = previous;
        trace!(fa, fb, fc, "start point is a local minimum");
        return Ok(BracketResult {
            a: b,
            b: a,
            c,
            fa: fb,
            fb: fa,
            fc,
            expansions: 0,
            function_evaluations: evals,
        });
    }

    let mut c = b + GOLDEN_RATIO * (b - a);
    let mut fc = eval(c, f)?;

    let mut expansions = 0;
    while fb > fc {
        if expansions == MAX_EXPANSIONS {
            trace!(a, b, c, "bracket expansion limit reached");
            return Err(MinimizerError::NoMinimumFound);
        }
        expansions += 1;
        a = b;
        fa = fb;
        b = c;
        fb = fc;
        c = b + GOLDEN_RATIO * (b - a);
        fc = eval(c, f)?;
    }

    Ok(BracketResult {
        a,
        b,
        c,
        fa,
        fb,
        fc,
        expansions,
        function_evaluations: evals,
    })
}
