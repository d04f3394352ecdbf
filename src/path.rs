//! Dotted-decimal paths and the bijection between them and [`Matrix`] values.
//!
//! This is Dan Hazel's rational-numbers keying of nested sets: every path
//! `"s1.s2.....sk"` folds to a single matrix by left-multiplying the *root
//! matrix* `(0,1,1,0)` by one *segment matrix* `(1,1,n,n+1)` per component,
//! and that matrix's two columns give the node's `left`/`right` rational
//! boundaries in O(1), with no recursion into the table.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::matrix::Matrix;

/// Errors raised while building or decoding paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A path segment was <= 0. Segments are 1-based child ordinals; `0` and
    /// negative numbers are programming bugs, never valid input.
    #[error("invalid path segment {0}: segments must be positive")]
    InvalidSegment(i64),

    /// A path string was empty (`""` or just dots).
    #[error("path must have at least one segment")]
    EmptyPath,

    /// A path component did not parse as an integer.
    #[error("malformed path {0:?}: components must be positive integers")]
    MalformedPath(String),
}

/// The *swap* matrix `M0 = (0,1,1,0)` — the algebraic origin of the forest.
/// Deliberately not the identity matrix; see module docs.
pub const ROOT_MATRIX: Matrix = Matrix::new(0, 1, 1, 0);

/// `S(n) = (1, 1, n, n+1)` for `n >= 1`. Left-multiplying by it descends into
/// the `n`-th child.
pub fn segment_matrix(n: i64) -> Result<Matrix, PathError> {
    if n <= 0 {
        return Err(PathError::InvalidSegment(n));
    }
    Ok(Matrix::new(1, 1, n, n + 1))
}

/// `B(k) = (1, 0, k, 1)` for any integer `k`. Shifts a node's last segment by
/// `k` without touching its ancestry.
pub const fn bump_matrix(k: i64) -> Matrix {
    Matrix::new(1, 0, k, 1)
}

/// A non-empty, dot-separated sequence of positive integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path(Vec<u32>);

impl Path {
    /// Builds a path from an explicit, already-validated segment list.
    ///
    /// Returns [`PathError::EmptyPath`] if `segments` is empty, or
    /// [`PathError::InvalidSegment`] if any segment is `0`.
    pub fn from_segments(segments: Vec<u32>) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::EmptyPath);
        }
        if let Some(&zero) = segments.iter().find(|&&s| s == 0) {
            return Err(PathError::InvalidSegment(zero as i64));
        }
        Ok(Path(segments))
    }

    /// A single-segment (root) path, e.g. `Path::root(1)` is `"1"`.
    pub fn root(segment: u32) -> Result<Self, PathError> {
        Path::from_segments(vec![segment])
    }

    /// The raw segment list, in order.
    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    /// Number of dotted components; equivalently, tree depth (`1` for roots).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0.len() as u32
    }

    /// The final dotted component, e.g. `"2.4.3".last_segment() == 3`.
    #[must_use]
    pub fn last_segment(&self) -> u32 {
        *self.0.last().expect("Path is never empty")
    }

    /// `true` for single-segment (root) paths.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Drops the last segment. `None` for root paths, which have no parent.
    #[must_use]
    pub fn base_path(&self) -> Option<Path> {
        if self.is_root() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// A new path with the last segment replaced.
    #[must_use]
    pub fn with_last_segment(&self, segment: u32) -> Path {
        let mut segments = self.0.clone();
        *segments.last_mut().expect("Path is never empty") = segment;
        Path(segments)
    }

    /// Appends a child segment, e.g. `"2.4".child(3) == "2.4.3"`.
    #[must_use]
    pub fn child(&self, segment: u32) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment);
        Path(segments)
    }

    /// `true` iff `self` is a strict dotted prefix of `other` — `self` is an
    /// ancestor of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.0.len() < other.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// `true` iff `self` equals `other` or is a dotted prefix of it — moving
    /// a node into `other` would place it inside its own subtree.
    #[must_use]
    pub fn is_self_or_ancestor_of(&self, other: &Path) -> bool {
        self == other || self.is_ancestor_of(other)
    }

    /// All strict dotted prefixes of this path, root-to-direct-parent order.
    #[must_use]
    pub fn ancestor_paths(&self) -> Vec<Path> {
        (1..self.0.len())
            .map(|len| Path(self.0[..len].to_vec()))
            .collect()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::EmptyPath);
        }
        let mut segments = Vec::new();
        for part in s.split('.') {
            let n: i64 = part
                .parse()
                .map_err(|_| PathError::MalformedPath(s.to_string()))?;
            if n <= 0 {
                return Err(PathError::InvalidSegment(n));
            }
            segments.push(n as u32);
        }
        Path::from_segments(segments)
    }
}

/// Folds `ROOT_MATRIX` by one `segment_matrix` per path component, in order.
///
/// Debug builds assert the resulting determinant is `-1`: the algebra
/// guarantees it, so a mismatch means a bug in this function, not bad input.
pub fn from_path(path: &Path) -> Result<Matrix, PathError> {
    let mut matrix = ROOT_MATRIX;
    for &segment in path.segments() {
        matrix = matrix.multiply(&segment_matrix(segment as i64)?);
    }
    debug_assert_eq!(matrix.determinant(), -1, "node matrix must have det = -1");
    Ok(matrix)
}

/// `floor(a / (b - a))`. Equal to the integer parse of a path's final
/// dotted component.
#[must_use]
pub fn last_segment(m: &Matrix) -> i64 {
    m.a.div_euclid(m.b - m.a)
}

/// `M * S(lastSegment(M))^-1`. `None` exactly for root-node matrices, where
/// the quotient would be degenerate (`c <= 0`, `d <= 0`, or `a <= 0`).
#[must_use]
pub fn parent(m: &Matrix) -> Option<Matrix> {
    let seg = last_segment(m);
    let seg_inv = segment_matrix(seg).ok()?.inverse_exact().ok()?;
    let candidate = m.multiply(&seg_inv);
    if candidate.c <= 0 || candidate.d <= 0 || candidate.a <= 0 {
        None
    } else {
        Some(candidate)
    }
}

/// Repeatedly takes `last_segment` and replaces `m` with `parent(m)` until
/// `parent` is `None`, then reverses to get the top-down path.
pub fn to_path(m: &Matrix) -> Path {
    let mut segments = Vec::new();
    let mut current = *m;
    loop {
        segments.push(last_segment(&current) as u32);
        match parent(&current) {
            Some(p) => current = p,
            None => break,
        }
    }
    segments.reverse();
    Path::from_segments(segments).expect("matrices derived from from_path never degenerate")
}

/// The `left` rational boundary, `a/c`, as a convenience float. The exact
/// numerator/denominator pair is `(m.a, m.c)`.
#[must_use]
pub fn left(m: &Matrix) -> f64 {
    m.a as f64 / m.c as f64
}

/// The `right` rational boundary, `b/d`.
#[must_use]
pub fn right(m: &Matrix) -> f64 {
    m.b as f64 / m.d as f64
}

/// Tree depth of the matrix, computed via [`to_path`].
#[must_use]
pub fn level(m: &Matrix) -> u32 {
    to_path(m).level()
}

/// Enumerates the ancestor matrices of `m`, root-to-direct-parent order,
/// without touching a path string or the database: each step is the
/// `parent()` division derived in this module, which is itself a
/// Euclidean-style quotient (`floor(a / (b-a))`) on the matrix's own cells.
/// `m` itself is not included.
#[must_use]
pub fn ancestor_matrices(m: &Matrix) -> Vec<Matrix> {
    let mut ancestors = Vec::new();
    let mut current = *m;
    while let Some(p) = parent(&current) {
        ancestors.push(p);
        current = p;
    }
    ancestors.reverse();
    ancestors
}

/// Convenience wrapper: ancestor paths of `path`, root-to-direct-parent
/// order, computed purely algebraically (`from_path` + `ancestor_matrices` +
/// `to_path`, no database access).
pub fn ancestor_paths(path: &Path) -> Result<Vec<Path>, PathError> {
    let matrix = from_path(path)?;
    Ok(ancestor_matrices(&matrix).iter().map(to_path).collect())
}

/// `true` iff `ancestor` is a strict dotted prefix of `descendant`.
#[must_use]
pub fn is_ancestor_of(ancestor: &Path, descendant: &Path) -> bool {
    ancestor.is_ancestor_of(descendant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_one_yields_conformance_matrix() {
        let path: Path = "1".parse().unwrap();
        let m = from_path(&path).unwrap();
        assert_eq!(m, Matrix::new(1, 2, 1, 1));
        assert!((left(&m) - 1.0).abs() < 1e-12);
        assert!((right(&m) - 2.0).abs() < 1e-12);
        assert_eq!(level(&m), 1);
    }

    #[test]
    fn path_two_yields_conformance_matrix() {
        let path: Path = "2".parse().unwrap();
        let m = from_path(&path).unwrap();
        assert_eq!(m, Matrix::new(2, 3, 1, 1));
    }

    #[test]
    fn paper_level_conformance_test() {
        let path: Path = "2.4.3".parse().unwrap();
        let m = from_path(&path).unwrap();
        assert_eq!(m, Matrix::new(65, 82, 23, 29));
        assert_eq!(m.determinant(), -1);
        assert!((left(&m) - 65.0 / 23.0).abs() < 1e-12);
        assert!((right(&m) - 82.0 / 29.0).abs() < 1e-12);
    }

    #[test]
    fn round_trip_path_through_matrix() {
        for raw in ["1", "2", "2.4.3", "9.1.1.1.5", "3.3.3"] {
            let path: Path = raw.parse().unwrap();
            let m = from_path(&path).unwrap();
            assert_eq!(to_path(&m), path, "round trip failed for {raw}");
        }
    }

    #[test]
    fn parent_of_root_is_none() {
        let path: Path = "7".parse().unwrap();
        let m = from_path(&path).unwrap();
        assert_eq!(parent(&m), None);
    }

    #[test]
    fn ancestor_paths_are_strict_prefixes() {
        let path: Path = "2.4.3".parse().unwrap();
        let ancestors = ancestor_paths(&path).unwrap();
        let rendered: Vec<String> = ancestors.iter().map(Path::to_string).collect();
        assert_eq!(rendered, vec!["2".to_string(), "2.4".to_string()]);
    }

    #[test]
    fn is_ancestor_of_is_strict() {
        let a: Path = "2".parse().unwrap();
        let b: Path = "2.4".parse().unwrap();
        assert!(a.is_ancestor_of(&b));
        assert!(!a.is_ancestor_of(&a));
        assert!(!b.is_ancestor_of(&a));
    }

    #[test]
    fn base_path_of_root_is_none() {
        let root: Path = "5".parse().unwrap();
        assert_eq!(root.base_path(), None);
    }

    #[test]
    fn base_path_drops_last_segment() {
        let path: Path = "2.4.3".parse().unwrap();
        assert_eq!(path.base_path().unwrap().to_string(), "2.4");
    }

    #[test]
    fn zero_segment_is_rejected() {
        assert_eq!("0".parse::<Path>(), Err(PathError::InvalidSegment(0)));
        assert_eq!("2.0.1".parse::<Path>(), Err(PathError::InvalidSegment(0)));
    }

    #[test]
    fn malformed_segment_is_rejected() {
        assert!(matches!(
            "2.x".parse::<Path>(),
            Err(PathError::MalformedPath(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trip(segments in proptest::collection::vec(1u32..50, 1..6)) {
            let path = Path::from_segments(segments).unwrap();
            let m = from_path(&path).unwrap();
            proptest::prop_assert_eq!(to_path(&m), path);
        }

        #[test]
        fn prop_determinant_always_negative_one(segments in proptest::collection::vec(1u32..50, 1..6)) {
            let path = Path::from_segments(segments).unwrap();
            let m = from_path(&path).unwrap();
            proptest::prop_assert_eq!(m.determinant(), -1);
        }

        #[test]
        fn prop_ancestor_paths_are_prefixes(segments in proptest::collection::vec(1u32..50, 1..6)) {
            let path = Path::from_segments(segments.clone()).unwrap();
            let ancestors = ancestor_paths(&path).unwrap();
            for (i, ancestor) in ancestors.iter().enumerate() {
                proptest::prop_assert_eq!(ancestor.segments(), &segments[..i + 1]);
            }
        }
    }
}
