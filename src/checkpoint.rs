//! Vertex files: the on-disk form of a simplex used to resume long searches.
//!
//! ```text
//! <ndim> <mpar> <project>
//! <y_1> <p_1,1> ... <p_1,ndim>
//! ...
//! <y_mpar> <p_mpar,1> ... <p_mpar,ndim>
//! <timestamp>
//! ```
//!
//! Every number is printed in C `%e` notation and followed by one space.

use crate::alloc::{LegacyMatrix, LegacyVector};
use crate::error::{CheckpointError, MinimizerError};
use crate::minimize::Simplex;
use chrono::Local;
use ndarray::prelude::*;
use regex::Regex;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

fn header_regex() -> Option<&'static Regex> {
    static HEADER: OnceLock<Option<Regex>> = OnceLock::new();
    HEADER
        .get_or_init(|| Regex::new(r"^\s*(\d+)\s+(\d+)(?:\s+(.*?))?\s*$").ok())
        .as_ref()
}

/// A simplex read back from a vertex file.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub ndim: usize,
    pub mpar: usize,
    pub project: String,
    pub simplex: Simplex,
}

/// Destination that a simplex-based minimizer rewrites after every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSink {
    path: PathBuf,
    project: String,
}

impl CheckpointSink {
    pub fn new(path: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        CheckpointSink {
            path: path.into(),
            project: project.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn write(&self, simplex: &Simplex) -> Result<(), CheckpointError> {
        write(&self.path, &self.project, simplex)
    }
}

/// Format `v` the way C's `printf("%e")` does: six fractional digits and a
/// signed exponent of at least two digits.
pub fn format_e(v: f64) -> String {
    format_exp(v, 6)
}

/// C `%.<precision>e`.
pub fn format_exp(v: f64, precision: usize) -> String {
    if v.is_nan() {
        return if v.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    let s = format!("{:.*e}", precision, v);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => s,
    }
}

/// Backup location for `path`: `name.ver` becomes `name.vbk`, anything else
/// gets `.bak` appended.
pub fn backup_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == "ver") {
        path.with_extension("vbk")
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }
}

/// Copy an existing file at `path` to its backup location. A missing file
/// is not an error.
pub fn backup(path: &Path) -> std::io::Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let target = backup_path(path);
    fs::copy(path, &target)?;
    Ok(Some(target))
}

pub fn write(path: &Path, project: &str, simplex: &Simplex) -> Result<(), CheckpointError> {
    write_raw(path, project, &simplex.values().view(), &simplex.vertices().view())
}

/// Write values `y` (length `mpar`) and vertices `p` (`mpar` x `ndim`).
pub fn write_raw(
    path: &Path,
    project: &str,
    y: &ArrayView1<f64>,
    p: &ArrayView2<f64>,
) -> Result<(), CheckpointError> {
    let io_err = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Err(e) = backup(path) {
        warn!(path = %path.display(), error = %e, "could not back up vertex file");
    }

    let (mpar, ndim) = p.dim();
    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{} {} {}", ndim, mpar, project).map_err(io_err)?;
    for (i, row) in p.rows().into_iter().enumerate() {
        write!(out, "{} ", format_e(y[i])).map_err(io_err)?;
        for &x in row.iter() {
            write!(out, "{} ", format_e(x)).map_err(io_err)?;
        }
        writeln!(out).map_err(io_err)?;
    }
    writeln!(out, "{}", Local::now().format("%c")).map_err(io_err)?;
    out.flush().map_err(io_err)?;
    debug!(path = %path.display(), ndim, mpar, "wrote vertex file");
    Ok(())
}

/// Read a vertex file.
///
/// With `Some(ndim)` the file must declare exactly `ndim` and `ndim + 1`;
/// with `None` the file's own dimensions are adopted. Lines starting with
/// `#` are ignored up to the last vertex.
pub fn read(path: &Path, ndim: Option<usize>) -> Result<Checkpoint, CheckpointError> {
    let io_err = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let mut lines = BufReader::new(file).lines().enumerate();

    let mut header = None;
    for (_, line) in lines.by_ref() {
        let line = line.map_err(io_err)?;
        if !line.starts_with('#') {
            header = Some(line);
            break;
        }
    }
    let header = header.ok_or_else(|| CheckpointError::MalformedHeader {
        path: path.to_path_buf(),
        line: String::new(),
    })?;

    let malformed_header = || CheckpointError::MalformedHeader {
        path: path.to_path_buf(),
        line: header.clone(),
    };
    let caps = header_regex()
        .and_then(|re| re.captures(&header))
        .ok_or_else(malformed_header)?;
    let file_ndim: usize = caps[1].parse().map_err(|_| malformed_header())?;
    let file_mpar: usize = caps[2].parse().map_err(|_| malformed_header())?;
    let project = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();

    match ndim {
        Some(n) if file_ndim != n || file_mpar != n + 1 => {
            return Err(CheckpointError::DimensionMismatch {
                path: path.to_path_buf(),
                file_ndim,
                file_mpar,
                ndim: n,
                mpar: n + 1,
            });
        }
        Some(_) => {}
        None => {
            warn!(path = %path.display(), "dimensions of vertex file are not checked");
            if file_ndim == 0 || file_ndim.checked_add(1) != Some(file_mpar) {
                return Err(malformed_header());
            }
        }
    }

    // Storage grows with the lines actually read, never with the header.
    let mut coords = Vec::new();
    let mut values = Vec::new();
    let mut found = 0;
    while found < file_mpar {
        let Some((idx, line)) = lines.next() else {
            return Err(CheckpointError::Truncated {
                path: path.to_path_buf(),
                found,
                expected: file_mpar,
            });
        };
        let line = line.map_err(io_err)?;
        if line.starts_with('#') {
            continue;
        }
        let malformed = || CheckpointError::MalformedVertex {
            path: path.to_path_buf(),
            line_no: idx + 1,
            line: line.clone(),
        };
        let numbers = line
            .split_whitespace()
            .map(|tok| tok.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| malformed())?;
        if numbers.len() != file_ndim + 1 {
            return Err(malformed());
        }
        values.push(numbers[0]);
        coords.extend_from_slice(&numbers[1..]);
        found += 1;
    }

    let vertices = Array2::from_shape_vec((file_mpar, file_ndim), coords).map_err(|_| malformed_header())?;

    debug!(path = %path.display(), ndim = file_ndim, "read vertex file");
    let simplex = Simplex::from_parts(vertices, Array1::from(values)).map_err(|_| malformed_header())?;
    Ok(Checkpoint {
        ndim: file_ndim,
        mpar: file_mpar,
        project,
        simplex,
    })
}

/// Read a vertex file into caller-allocated 1-based buffers and return the
/// dimension found. The buffers must hold at least `mpar` values and
/// `mpar` x `ndim` coordinates.
pub fn read_legacy(
    path: &Path,
    ndim: Option<usize>,
    y: &mut LegacyVector,
    p: &mut LegacyMatrix,
) -> Result<usize, MinimizerError> {
    let cp = read(path, ndim)?;
    if y.len() < cp.mpar || p.rows() < cp.mpar || p.cols() < cp.ndim {
        return Err(MinimizerError::InvalidDimension);
    }
    let simplex = &cp.simplex;
    for i in 0..cp.mpar {
        y[i + 1] = simplex.value(i);
        for (j, &x) in simplex.vertex(i).iter().enumerate() {
            p[(i + 1, j + 1)] = x;
        }
    }
    Ok(cp.ndim)
}

#[cfg(test)]
mod checkpoint_tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Simplex {
        Simplex::from_parts(
            array![[0.0, 0.0], [1.0, 0.0], [0.0, -1.25e-3]],
            array![5.0, 4.0, 1.2345678e-7],
        )
        .unwrap()
    }

    #[test]
    fn test_format_e_matches_c() {
        assert_eq!(format_e(1.23456), "1.234560e+00");
        assert_eq!(format_e(0.0), "0.000000e+00");
        assert_eq!(format_e(-0.00125), "-1.250000e-03");
        assert_eq!(format_e(6.02214076e123), "6.022141e+123");
        assert_eq!(format_e(f64::INFINITY), "inf");
        assert_eq!(format_e(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_e(f64::NAN), "nan");
        assert_eq!(format_exp(5.0e-4, 3), "5.000e-04");
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(backup_path(Path::new("run/job.ver")), PathBuf::from("run/job.vbk"));
        assert_eq!(backup_path(Path::new("job.vtx")), PathBuf::from("job.vtx.bak"));
        assert_eq!(backup_path(Path::new("job")), PathBuf::from("job.bak"));
    }

    #[test]
    fn test_write_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.ver");
        write(&path, "job", &sample()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "2 3 job");
        assert_eq!(lines[1], "5.000000e+00 0.000000e+00 0.000000e+00 ");
        assert_eq!(lines[3], "1.234568e-07 0.000000e+00 -1.250000e-03 ");
        assert!(!lines[4].is_empty());
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_round_trip_same_ndim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.ver");
        let s = sample();
        write(&path, "job", &s).unwrap();

        let cp = read(&path, Some(2)).unwrap();
        assert_eq!(cp.ndim, 2);
        assert_eq!(cp.mpar, 3);
        assert_eq!(cp.project, "job");
        for i in 0..3 {
            assert_eq!(format_e(cp.simplex.value(i)), format_e(s.value(i)));
            for j in 0..2 {
                assert_eq!(cp.simplex.vertex(i)[j], s.vertex(i)[j]);
            }
        }
    }

    #[test]
    fn test_rewrite_makes_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.ver");
        let sink = CheckpointSink::new(&path, "job");
        sink.write(&sample()).unwrap();
        assert!(!dir.path().join("job.vbk").exists());

        let mut s = sample();
        s.set_vertex(0, &array![9.0, 9.0].view(), 0.5);
        sink.write(&s).unwrap();

        let backup = read(&dir.path().join("job.vbk"), Some(2)).unwrap();
        assert_eq!(backup.simplex.value(0), 5.0);
        let current = read(&path, Some(2)).unwrap();
        assert_eq!(current.simplex.value(0), 0.5);
    }

    #[test]
    fn test_dimension_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("three.ver");
        fs::write(
            &path,
            "3 4 three\n1 0 0 0\n2 1 0 0\n3 0 1 0\n4 0 0 1\nsometime\n",
        )
        .unwrap();
        let result = read(&path, Some(2));
        assert!(matches!(
            result,
            Err(CheckpointError::DimensionMismatch {
                file_ndim: 3,
                file_mpar: 4,
                ndim: 2,
                mpar: 3,
                ..
            })
        ));

        let adopted = read(&path, None).unwrap();
        assert_eq!(adopted.ndim, 3);
        assert_eq!(adopted.simplex.value(3), 4.0);
    }

    #[test]
    fn test_comments_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.ver");
        fs::write(&path, "# saved\n1 2 c\n# first\n1.0 2.0\n3.0 4.0\n").unwrap();
        let cp = read(&path, Some(1)).unwrap();
        assert_eq!(cp.simplex.values(), &array![1.0, 3.0]);
        assert_eq!(cp.simplex.vertices(), &array![[2.0], [4.0]]);
    }

    #[test]
    fn test_malformed_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.ver");

        fs::write(&path, "two three\n").unwrap();
        assert!(matches!(
            read(&path, None),
            Err(CheckpointError::MalformedHeader { .. })
        ));

        fs::write(&path, "1 2 bad\n1.0 x\n2.0 3.0\n").unwrap();
        assert!(matches!(
            read(&path, Some(1)),
            Err(CheckpointError::MalformedVertex { line_no: 2, .. })
        ));

        fs::write(&path, "1 2 bad\n1.0 2.0 3.0\n2.0 3.0\n").unwrap();
        assert!(matches!(
            read(&path, Some(1)),
            Err(CheckpointError::MalformedVertex { .. })
        ));

        fs::write(&path, "1 2 bad\n1.0 2.0\n").unwrap();
        assert!(matches!(
            read(&path, Some(1)),
            Err(CheckpointError::Truncated { found: 1, expected: 2, .. })
        ));

        assert!(matches!(
            read(&dir.path().join("missing.ver"), Some(1)),
            Err(CheckpointError::Io { .. })
        ));
    }

    #[test]
    fn test_oversized_header_fails_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.ver");

        fs::write(&path, "4000000000 4000000001 x\n").unwrap();
        assert!(matches!(
            read(&path, None),
            Err(CheckpointError::Truncated { found: 0, expected: 4000000001, .. })
        ));

        fs::write(&path, "4000000000 4000000001 x\n1.0 2.0\n").unwrap();
        assert!(matches!(
            read(&path, None),
            Err(CheckpointError::MalformedVertex { line_no: 2, .. })
        ));

        fs::write(&path, format!("{} 0 x\n", usize::MAX)).unwrap();
        assert!(matches!(
            read(&path, None),
            Err(CheckpointError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_read_legacy_buffers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.ver");
        write(&path, "job", &sample()).unwrap();

        let mut y = LegacyVector::zeros(3).unwrap();
        let mut p = LegacyMatrix::zeros(3, 2).unwrap();
        let ndim = read_legacy(&path, Some(2), &mut y, &mut p).unwrap();
        assert_eq!(ndim, 2);
        assert_eq!(y[2], 4.0);
        assert_eq!(p[(2, 1)], 1.0);
        assert_eq!(p[(3, 2)], -1.25e-3);

        let mut small = LegacyVector::zeros(2).unwrap();
        assert!(matches!(
            read_legacy(&path, None, &mut small, &mut p),
            Err(MinimizerError::InvalidDimension)
        ));
    }
}
