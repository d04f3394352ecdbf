//! The crate-wide error aggregate. Each subsystem defines its own error
//! enum (`MatrixError`, `PathError`, `RecordError`, `StoreError`,
//! `MutationError`); this type lets a caller working across subsystem
//! boundaries use a single `?`-friendly return type instead of matching on
//! each one individually.

use thiserror::Error;

use crate::matrix::MatrixError;
use crate::mutation::MutationError;
use crate::path::PathError;
use crate::record::RecordError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum HazelError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

pub type HazelResult<T> = Result<T, HazelError>;
