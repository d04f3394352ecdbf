//! # hazeltree
//!
//! A hierarchical-tree indexing layer over a relational database table,
//! using Dan Hazel's rational-numbers keying of nested sets: every node's
//! position is encoded as a 2x2 integer matrix of determinant -1, and its
//! materialized path (e.g. `"2.4.3"`) is a deterministic encoding of that
//! matrix. Moving a subtree is one integer matrix multiplication applied to
//! every descendant's matrix, rather than a cascade of per-row path
//! rewrites.
//!
//! ## Pipeline
//!
//! ```text
//! Path string ("2.4.3")
//!     |
//! [Path codec]                -> Matrix
//!     |
//! [Move-matrix builder]       -> relocation matrix for a save/move
//!     |
//! [Mutation engine]           -> applies it across a subtree, one txn
//!     |                          (via QueryBuilder-compiled predicates)
//! [Store]                     -> the embedding application's own table
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hazeltree::mutation::MutationEngine;
//! use hazeltree::record::NodeRecord;
//! use hazeltree::store::memory::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let engine = MutationEngine::new(&store);
//!
//! let mut root = NodeRecord::new("nodes");
//! engine.save(&mut root)?;
//!
//! let mut child = NodeRecord::new("nodes");
//! engine.save_into(&mut child, &root)?;
//! # Ok::<(), hazeltree::mutation::MutationError>(())
//! ```

pub mod matrix; // matrix algebra over determinant-(-1) 2x2 integers
pub mod path; // path string <-> matrix codec
pub mod move_matrix; // relocation-matrix construction
pub mod record; // per-row tree-column state and read-only guard
pub mod store; // the Store/StoreTxn boundary (+ MemoryStore reference impl)
pub mod query; // fluent navigation query compiler
pub mod mutation; // transactional save/move/delete engine

pub mod config; // Ambient configuration (TreeConfig)
pub mod error; // Crate-wide error aggregate

pub use config::TreeConfig;
pub use error::{HazelError, HazelResult};
pub use matrix::{Matrix, MatrixError};
pub use mutation::{MutationEngine, MutationError, Target};
pub use path::{Path, PathError};
pub use query::{PreparedQuery, QueryBuilder};
pub use record::{Boundary, ColumnNames, NodeRecord, RecordError};
pub use store::{ColumnValue, Condition, Store, StoreError, StoreRow, StoreTxn};
