//! 2x2 integer matrices and the algebra the rest of the crate builds on.
//!
//! Every node of the indexed forest is identified by a 2x2 integer matrix of
//! determinant `-1`. Multiplying two such matrices, inverting one, or taking
//! its adjugate are the only primitive operations [`path`](crate::path) and
//! [`move_matrix`](crate::move_matrix) need; everything else in the crate is
//! built out of these four.

use thiserror::Error;

/// Errors raised by the matrix algebra.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixError {
    /// `inverse_exact` was asked to invert a matrix whose determinant is not
    /// `+1` or `-1`. This never happens for a matrix built by
    /// [`crate::path::PathCodec`] from a valid path; it is reserved for
    /// defensive callers that hand the algebra an arbitrary matrix.
    #[error("matrix has determinant {0}, not +-1; exact integer inverse does not exist")]
    NonUnitDeterminant(i64),
}

/// An immutable 2x2 integer matrix `(a b; c d)`.
///
/// Every operation returns a fresh value; there is no mutable state to share
/// or alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Matrix {
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
}

/// The floating-point counterpart used only by the defensive, non-unit-determinant
/// inverse fallback (see [`Matrix::inverse_lossy`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatMatrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Matrix {
    /// Builds a matrix from its four cells.
    pub const fn new(a: i64, b: i64, c: i64, d: i64) -> Self {
        Matrix { a, b, c, d }
    }

    /// Standard 2x2 matrix product `self * other`. Not commutative.
    #[must_use]
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
        }
    }

    /// Component-wise scalar multiplication. Used only by the defensive
    /// floating-point inverse fallback.
    #[must_use]
    pub fn multiply_scalar(&self, k: f64) -> FloatMatrix {
        FloatMatrix {
            a: self.a as f64 * k,
            b: self.b as f64 * k,
            c: self.c as f64 * k,
            d: self.d as f64 * k,
        }
    }

    /// `(d, -b, -c, a)`.
    #[must_use]
    pub fn adjugate(&self) -> Matrix {
        Matrix::new(self.d, -self.b, -self.c, self.a)
    }

    /// `a*d - b*c`.
    #[must_use]
    pub fn determinant(&self) -> i64 {
        self.a * self.d - self.b * self.c
    }

    /// Exact integer inverse, valid only when `determinant() ∈ {+1, -1}`.
    ///
    /// This is the hot path used throughout [`path`](crate::path) and
    /// [`move_matrix`](crate::move_matrix); it must never touch floating
    /// arithmetic, since every node matrix the mutation engine constructs is
    /// guaranteed to have determinant `-1`.
    pub fn inverse_exact(&self) -> Result<Matrix, MatrixError> {
        let det = self.determinant();
        if det != 1 && det != -1 {
            return Err(MatrixError::NonUnitDeterminant(det));
        }
        let adj = self.adjugate();
        Ok(Matrix::new(adj.a / det, adj.b / det, adj.c / det, adj.d / det))
    }

    /// Defensive floating-point inverse: `adjugate() * (1/det)`. Always
    /// succeeds (short of division by zero, which can only happen for a
    /// singular matrix no path ever produces), but loses exactness. Reserved
    /// for diagnostic code paths outside the core algebra — the mutation and
    /// query engines never call this.
    #[must_use]
    pub fn inverse_lossy(&self) -> FloatMatrix {
        let det = self.determinant() as f64;
        self.adjugate().multiply_scalar(1.0 / det)
    }

    /// `(a, c, b, d)`.
    #[must_use]
    pub fn transpose(&self) -> Matrix {
        Matrix::new(self.a, self.c, self.b, self.d)
    }
}
