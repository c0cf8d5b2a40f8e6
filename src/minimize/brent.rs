use crate::minimize::bracket::BracketResult;
use crate::minimize::MinimizerError;

/// Relative tolerance of the line minimum
pub const TOLERANCE: f64 = 1e-6;
pub const MAX_ITERS: usize = 100;

const CGOLD: f64 = 0.3819660112501051; // 1 - 1/phi
const ZEPS: f64 = 1e-12;

/// Result of Brent's line minimization
#[derive(Debug, Clone, PartialEq)]
pub struct BrentResult {
    pub xmin: f64,
    pub fmin: f64,
    pub iters: usize,
    pub fn_evals: usize,
    pub converged: bool,
}

/// Brent's method: parabolic interpolation with golden-section fallback.
///
/// Searches the interval spanned by `bracket.a` and `bracket.c` starting from
/// the middle point `bracket.b`, whose value is reused.
///
/// # Arguments
/// * `bracket` - bracketing triple from [`bracket_minimum`](super::bracket::bracket_minimum)
/// * `tol` - relative tolerance on the abscissa
/// * `max_iters` - iteration cap; hitting it returns the best point so far
/// * `f` - fallible 1-D function
pub fn brent_minimize<F>(
    bracket: &BracketResult,
    tol: f64,
    max_iters: usize,
    f: &mut F,
) -> Result<BrentResult, MinimizerError>
where
    F: FnMut(f64) -> Result<f64, MinimizerError>,
{
    if tol <= 0.0 {
        return Err(MinimizerError::InvalidTolerance);
    }

    let (ax, bx, cx) = (bracket.a, bracket.b, bracket.c);
    let mut a = ax.min(cx);
    let mut b = ax.max(cx);

    let (mut x, mut w, mut v) = (bx, bx, bx);
    let mut fx = bracket.fb;
    let (mut fw, mut fv) = (fx, fx);

    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;
    let mut fn_evals = 0;

    for iter in 0..max_iters {
        let m = 0.5 * (a + b);
        let tol1 = tol * x.abs() + ZEPS;
        let tol2 = 2.0 * tol1;

        if (x - m).abs() <= tol2 - 0.5 * (b - a) {
            return Ok(BrentResult {
                xmin: x,
                fmin: fx,
                iters: iter,
                fn_evals,
                converged: true,
            });
        }

        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();

            let etmp = e;
            e = d;

            if p.abs() >= (0.5 * q * etmp).abs() || p <= q * (a - x) || p >= q * (b - x) {
                e = if x >= m { a - x } else { b - x };
                d = CGOLD * e;
            } else {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = if x < m { tol1 } else { -tol1 };
                }
            }
        } else {
            e = if x >= m { a - x } else { b - x };
            d = CGOLD * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else {
            x + if d > 0.0 { tol1 } else { -tol1 }
        };
        let fu = f(u)?;
        fn_evals += 1;

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            fv = fw;
            w = x;
            fw = fx;
            x = u;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }

    Ok(BrentResult {
        xmin: x,
        fmin: fx,
        iters: max_iters,
        fn_evals,
        converged: false,
    })
}
