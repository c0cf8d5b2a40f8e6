//! Summary statistics of a simplex: how far the vertices and their values
//! still spread after (or during) a search.

use crate::minimize::Simplex;
use ndarray::prelude::*;
use std::fmt;

/// One statistic over the objective values and over every coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Spread {
    pub value: f64,
    pub coords: Array1<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexStats {
    pub min: Spread,
    pub max: Spread,
    pub avg: Spread,
    /// Population standard deviation (divides by `mpar`)
    pub dev: Spread,
}

impl VertexStats {
    pub fn of(simplex: &Simplex) -> Self {
        let y = simplex.values();
        let p = simplex.vertices();
        let mpar = simplex.mpar() as f64;

        let fold_cols = |init: f64, op: fn(f64, f64) -> f64| -> Array1<f64> {
            p.axis_iter(Axis(1)).map(|col| col.fold(init, |a, &b| op(a, b))).collect()
        };

        let min = Spread {
            value: y.fold(f64::INFINITY, |a, &b| a.min(b)),
            coords: fold_cols(f64::INFINITY, f64::min),
        };
        let max = Spread {
            value: y.fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
            coords: fold_cols(f64::NEG_INFINITY, f64::max),
        };

        let avg_value = y.sum() / mpar;
        let avg_coords = p.sum_axis(Axis(0)) / mpar;

        let dev_value = (y.mapv(|v| (v - avg_value).powi(2)).sum() / mpar).sqrt();
        let dev_coords = (p - &avg_coords)
            .mapv(|v| v * v)
            .sum_axis(Axis(0))
            .mapv(|s| (s / mpar).sqrt());

        VertexStats {
            min,
            max,
            avg: Spread {
                value: avg_value,
                coords: avg_coords,
            },
            dev: Spread {
                value: dev_value,
                coords: dev_coords,
            },
        }
    }
}

impl fmt::Display for VertexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = |f: &mut fmt::Formatter<'_>, label: &str, s: &Spread| -> fmt::Result {
            write!(f, "{}: {:7.4} :", label, s.value)?;
            for c in s.coords.iter() {
                write!(f, " {:6.3}", c)?;
            }
            writeln!(f)
        };
        line(f, "min", &self.min)?;
        line(f, "max", &self.max)?;
        writeln!(f)?;
        line(f, "avg", &self.avg)?;
        line(f, "dev", &self.dev)
    }
}

#[cfg(test)]
mod stats_tests {
    use super::*;
    use float_cmp::approx_eq;

    fn simplex() -> Simplex {
        Simplex::from_parts(
            array![[0.0, 1.0], [2.0, 1.0], [1.0, 4.0]],
            array![0.3, 0.1, 0.2],
        )
        .unwrap()
    }

    #[test]
    fn test_extents() {
        let s = VertexStats::of(&simplex());
        assert_eq!(s.min.value, 0.1);
        assert_eq!(s.max.value, 0.3);
        assert_eq!(s.min.coords, array![0.0, 1.0]);
        assert_eq!(s.max.coords, array![2.0, 4.0]);
    }

    #[test]
    fn test_average_and_deviation() {
        let s = VertexStats::of(&simplex());
        assert!(approx_eq!(f64, s.avg.value, 0.2, epsilon = 1e-12));
        assert!(approx_eq!(f64, s.avg.coords[0], 1.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, s.avg.coords[1], 2.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, s.dev.value, (0.02f64 / 3.0).sqrt(), epsilon = 1e-12));
        assert!(approx_eq!(f64, s.dev.coords[0], (2.0f64 / 3.0).sqrt(), epsilon = 1e-12));
        assert!(approx_eq!(f64, s.dev.coords[1], (6.0f64 / 3.0).sqrt(), epsilon = 1e-12));
    }

    #[test]
    fn test_display() {
        let text = VertexStats::of(&simplex()).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "min:  0.1000 :  0.000  1.000");
        assert_eq!(lines[2], "");
        assert!(lines[4].starts_with("dev:"));
    }
}
