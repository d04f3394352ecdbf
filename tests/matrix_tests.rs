//! Matrix algebra laws from the testable-properties list.

use hazeltree::Matrix;

#[test]
fn inverse_exact_recovers_identity() {
    let m = Matrix::new(1, 1, 0, 1);
    let inv = m.inverse_exact().unwrap();
    let identity = m.multiply(&inv);
    assert_eq!(identity, Matrix::new(1, 0, 0, 1));
}

#[test]
fn double_transpose_is_identity() {
    let m = Matrix::new(65, 82, 23, 29);
    assert_eq!(m.transpose().transpose(), m);
}

#[test]
fn double_adjugate_is_identity() {
    let m = Matrix::new(65, 82, 23, 29);
    assert_eq!(m.adjugate().adjugate(), m);
}

#[test]
fn non_unit_determinant_rejects_exact_inverse() {
    let m = Matrix::new(2, 0, 0, 2);
    let err = m.inverse_exact().unwrap_err();
    assert_eq!(err, hazeltree::MatrixError::NonUnitDeterminant(4));
}

#[test]
fn multiply_is_not_commutative_in_general() {
    let a = Matrix::new(1, 1, 0, 1);
    let b = Matrix::new(1, 0, 1, 1);
    assert_ne!(a.multiply(&b), b.multiply(&a));
}
