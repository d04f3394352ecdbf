//! Builds the single matrix that relocates a subtree from one parent to
//! another, optionally bumping past siblings inserted ahead of it.
//!
//! Left-multiplying every node matrix in a subtree by the matrix this module
//! produces moves the whole subtree in one pass: no per-node path surgery,
//! just one integer matrix applied to each row's cached `nodeMatrix`.

use crate::matrix::Matrix;
use crate::path::{bump_matrix, ROOT_MATRIX};

/// `T = to_parent . bump_matrix(k) . from_parent^-1`.
///
/// * `from_parent` — matrix of the subtree's current parent, or
///   [`ROOT_MATRIX`] if the subtree is rooted at the forest top.
/// * `to_parent` — matrix of the destination parent (same root fallback),
///   or, when `inside` is set, the *target's own* matrix — used for "move
///   into, becoming last child" where the destination is the target itself
///   rather than the target's parent.
/// * `k` — `new_last_segment - old_last_segment`.
///
/// `det(T) == 1` always: left-multiplying any determinant-`-1` node matrix
/// by `T` preserves determinant `-1`, and applying `T` commutes with
/// parent/child relations, so the whole subtree shifts consistently.
#[must_use]
pub fn build(from_parent: &Matrix, to_parent: &Matrix, k: i64) -> Matrix {
    let from_inverse = from_parent
        .inverse_exact()
        .expect("parent matrices always have determinant -1 or +1 by construction");
    to_parent.multiply(&bump_matrix(k)).multiply(&from_inverse)
}

/// Convenience for subtrees currently or newly rooted at the top of the
/// forest, where the "parent" is conceptually [`ROOT_MATRIX`].
#[must_use]
pub fn build_from_root(to_parent: &Matrix, k: i64) -> Matrix {
    build(&ROOT_MATRIX, to_parent, k)
}
