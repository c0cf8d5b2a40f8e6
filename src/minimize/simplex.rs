use crate::alloc::{LegacyMatrix, LegacyVector};
use crate::error::MinimizerError;
use crate::minimize::objective::Evaluator;
use ndarray::prelude::*;

/// A simplex of `ndim + 1` vertices and the objective value at each vertex.
///
/// Rows of `vertices` are points. A vertex and its value are only ever
/// changed together through [`Simplex::set_vertex`].
#[derive(Debug, Clone, PartialEq)]
pub struct Simplex {
    vertices: Array2<f64>,
    values: Array1<f64>,
}

/// Positions of the lowest, highest and second-highest vertex values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extremes {
    pub ilo: usize,
    pub ihi: usize,
    pub inhi: usize,
}

impl Simplex {
    /// Assemble a simplex from already evaluated vertices.
    pub fn from_parts(vertices: Array2<f64>, values: Array1<f64>) -> Result<Self, MinimizerError> {
        let (mpar, ndim) = vertices.dim();
        if ndim == 0 || mpar != ndim + 1 || values.len() != mpar {
            return Err(MinimizerError::InvalidDimension);
        }
        Ok(Simplex { vertices, values })
    }

    /// Evaluate every row of `vertices`.
    pub fn evaluate(vertices: Array2<f64>, eval: &mut Evaluator) -> Result<Self, MinimizerError> {
        let (mpar, ndim) = vertices.dim();
        if ndim == 0 || mpar != ndim + 1 {
            return Err(MinimizerError::InvalidDimension);
        }
        let mut values = Array1::zeros(mpar);
        for (i, row) in vertices.rows().into_iter().enumerate() {
            values[i] = eval.eval(&row.to_owned())?;
        }
        Ok(Simplex { vertices, values })
    }

    /// Axis-aligned starting simplex: vertex 0 is `origin`, vertex `i` is
    /// `origin` displaced by `dpos` along coordinate `i - 1`.
    pub fn initial(origin: &Array1<f64>, dpos: f64, eval: &mut Evaluator) -> Result<Self, MinimizerError> {
        let ndim = origin.len();
        if ndim == 0 {
            return Err(MinimizerError::InvalidDimension);
        }
        if !dpos.is_finite() || dpos == 0.0 {
            return Err(MinimizerError::InvalidParameters(format!(
                "initial displacement must be finite and nonzero, got {}",
                dpos
            )));
        }
        let mut vertices = Array2::zeros((ndim + 1, ndim));
        for mut row in vertices.rows_mut() {
            row.assign(origin);
        }
        for i in 0..ndim {
            vertices[[i + 1, i]] += dpos;
        }
        Simplex::evaluate(vertices, eval)
    }

    /// Rebuild from 1-based buffers (`y[1..=mpar]`, `p[1..=mpar][1..=ndim]`).
    pub fn from_legacy(y: &LegacyVector, p: &LegacyMatrix) -> Result<Self, MinimizerError> {
        if y.len() != p.rows() {
            return Err(MinimizerError::InvalidDimension);
        }
        Simplex::from_parts(p.to_array(), y.to_array())
    }

    pub fn to_legacy(&self) -> Result<(LegacyVector, LegacyMatrix), MinimizerError> {
        Ok((
            LegacyVector::from_array(&self.values.view())?,
            LegacyMatrix::from_array(&self.vertices.view())?,
        ))
    }

    pub fn ndim(&self) -> usize {
        self.vertices.ncols()
    }

    pub fn mpar(&self) -> usize {
        self.vertices.nrows()
    }

    pub fn vertices(&self) -> &Array2<f64> {
        &self.vertices
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn vertex(&self, i: usize) -> ArrayView1<f64> {
        self.vertices.row(i)
    }

    pub fn value(&self, i: usize) -> f64 {
        self.values[i]
    }

    pub fn set_vertex(&mut self, i: usize, point: &ArrayView1<f64>, value: f64) {
        copy_point(&mut self.vertices.row_mut(i), point);
        self.values[i] = value;
    }

    pub fn swap_vertices(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        for k in 0..self.ndim() {
            self.vertices.swap([i, k], [j, k]);
        }
        self.values.swap(i, j);
    }

    /// Index of the lowest value; the first one on ties.
    pub fn best(&self) -> usize {
        let mut ilo = 0;
        for (i, &v) in self.values.iter().enumerate() {
            if v < self.values[ilo] {
                ilo = i;
            }
        }
        ilo
    }

    pub fn extremes(&self) -> Extremes {
        extremes(&self.values.view())
    }

    /// Column sums of the vertex matrix.
    pub fn vertex_sum(&self) -> Array1<f64> {
        self.vertices.sum_axis(Axis(0))
    }
}

/// Locate the lowest, highest and second-highest entries of `values`.
///
/// The first two entries seed `ihi`/`inhi` (vertex 0 is highest only if
/// strictly greater than vertex 1) and the scan then keeps the first vertex
/// found for each role. `values` must have at least two entries.
pub fn extremes(values: &ArrayView1<f64>) -> Extremes {
    let (mut ihi, mut inhi) = if values[0] > values[1] { (0, 1) } else { (1, 0) };
    let mut ilo = 0;
    for (i, &v) in values.iter().enumerate() {
        if v < values[ilo] {
            ilo = i;
        }
        if v > values[ihi] {
            inhi = ihi;
            ihi = i;
        } else if v > values[inhi] && i != ihi {
            inhi = i;
        }
    }
    Extremes { ilo, ihi, inhi }
}

/// Mean of every row of `vertices` except `exclude`.
pub fn centroid_excluding(vertices: &Array2<f64>, exclude: usize) -> Array1<f64> {
    let mpar = vertices.nrows();
    let mut c = Array1::zeros(vertices.ncols());
    for (i, row) in vertices.rows().into_iter().enumerate() {
        if i != exclude {
            c += &row;
        }
    }
    c / (mpar - 1) as f64
}

pub fn copy_point(dst: &mut ArrayViewMut1<f64>, src: &ArrayView1<f64>) {
    dst.assign(src);
}

#[cfg(test)]
mod simplex_tests {
    use super::*;
    use float_cmp::{approx_eq, F64Margin};

    const TIGHT: F64Margin = F64Margin {
        epsilon: 1e-12,
        ulps: 4,
    };

    fn sum_of_squares(x: &Array1<f64>) -> f64 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn test_extremes_first_found_wins() {
        let e = extremes(&array![1.0, 1.0, 1.0].view());
        assert_eq!(e, Extremes { ilo: 0, ihi: 1, inhi: 0 });

        let e = extremes(&array![3.0, 1.0, 5.0, 5.0, 0.5].view());
        assert_eq!(e.ilo, 4);
        assert_eq!(e.ihi, 2);
        assert_eq!(e.inhi, 3);

        let e = extremes(&array![4.0, 2.0, 3.0].view());
        assert_eq!(e, Extremes { ilo: 1, ihi: 0, inhi: 2 });
    }

    #[test]
    fn test_centroid_excluding() {
        let v = array![[0.0, 0.0], [2.0, 0.0], [0.0, 4.0]];
        assert_eq!(centroid_excluding(&v, 2), array![1.0, 0.0]);
        assert_eq!(centroid_excluding(&v, 0), array![1.0, 2.0]);
    }

    #[test]
    fn test_initial_simplex() {
        let f = sum_of_squares;
        let mut eval = Evaluator::new(&f, None);
        let s = Simplex::initial(&array![1.0, 2.0], 0.5, &mut eval).unwrap();
        assert_eq!(s.mpar(), 3);
        assert_eq!(s.vertices(), &array![[1.0, 2.0], [1.5, 2.0], [1.0, 2.5]]);
        assert!(approx_eq!(f64, s.value(0), 5.0, TIGHT));
        assert!(approx_eq!(f64, s.value(1), 6.25, TIGHT));
        assert!(approx_eq!(f64, s.value(2), 7.25, TIGHT));
        assert_eq!(eval.evals(), 3);
    }

    #[test]
    fn test_initial_rejects_bad_input() {
        let f = sum_of_squares;
        let mut eval = Evaluator::new(&f, None);
        assert!(matches!(
            Simplex::initial(&Array1::zeros(0), 1.0, &mut eval),
            Err(MinimizerError::InvalidDimension)
        ));
        assert!(matches!(
            Simplex::initial(&array![0.0], 0.0, &mut eval),
            Err(MinimizerError::InvalidParameters(_))
        ));
        assert_eq!(eval.evals(), 0);
    }

    #[test]
    fn test_set_and_swap_vertex() {
        let mut s = Simplex::from_parts(array![[0.0], [1.0]], array![0.0, 1.0]).unwrap();
        s.set_vertex(1, &array![-1.0].view(), 1.0);
        s.swap_vertices(0, 1);
        assert_eq!(s.vertex(0), array![-1.0]);
        assert_eq!(s.values(), &array![1.0, 0.0]);
        assert_eq!(s.best(), 1);
    }

    #[test]
    fn test_from_parts_checks_shape() {
        assert!(Simplex::from_parts(array![[0.0, 0.0], [1.0, 0.0]], array![0.0, 1.0]).is_err());
        assert!(Simplex::from_parts(array![[0.0], [1.0]], array![0.0]).is_err());
    }

    #[test]
    fn test_legacy_round_trip() {
        let s = Simplex::from_parts(array![[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]], array![7.0, 8.0, 9.0])
            .unwrap();
        let (y, p) = s.to_legacy().unwrap();
        assert_eq!(y[3], 9.0);
        assert_eq!(p[(2, 1)], 2.0);
        assert_eq!(Simplex::from_legacy(&y, &p).unwrap(), s);
    }
}
