//! Per-row state: the four tree columns plus the caller's own payload, with
//! a read-only guard on the tree columns and a lazily-computed matrix cache.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use thiserror::Error;

use crate::matrix::Matrix;
use crate::path::{from_path, Path};
use crate::query::QueryBuilder;
use crate::store::{ColumnValue, StoreRow};

/// Errors raised by the read-only discipline on tree columns.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// A caller tried to write `left`, `right`, `path`, or `level` through
    /// the public record surface while protection is on.
    #[error("{0} is a read-only tree column; use the mutation engine or call protect_readonly(false) first")]
    ReadOnlyTreeField(&'static str),
}

/// The database column names for the four tree columns, configurable per
/// table. All query construction in [`crate::query`] and
/// [`crate::mutation`] goes through these hooks rather than hard-coded
/// names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub path: String,
    pub left: String,
    pub right: String,
    pub level: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            path: "path".to_string(),
            left: "left".to_string(),
            right: "right".to_string(),
            level: "level".to_string(),
        }
    }
}

/// An exact rational boundary, `numerator / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub numerator: i64,
    pub denominator: i64,
}

impl Boundary {
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

/// Per-row state for one node of the indexed forest.
///
/// Owns its own tree-column state exclusively; the [`crate::store::Store`]
/// owns the authoritative persistent copy, and [`crate::query::QueryBuilder`]
/// / [`crate::mutation`] only ever hold a transient, non-owning reference to
/// either during a single call.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub(crate) table: String,
    pub(crate) columns: ColumnNames,
    pub(crate) primary_key: Option<ColumnValue>,
    pub(crate) path: Option<Path>,
    pub(crate) left: Option<Boundary>,
    pub(crate) right: Option<Boundary>,
    pub(crate) level: Option<u32>,
    payload: BTreeMap<String, ColumnValue>,
    node_matrix: RefCell<Option<Matrix>>,
    protect_readonly: Cell<bool>,
}

impl NodeRecord {
    /// A brand-new, unsaved record with no assigned path yet.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        NodeRecord::with_columns(table, ColumnNames::default())
    }

    #[must_use]
    pub fn with_columns(table: impl Into<String>, columns: ColumnNames) -> Self {
        NodeRecord {
            table: table.into(),
            columns,
            primary_key: None,
            path: None,
            left: None,
            right: None,
            level: None,
            payload: BTreeMap::new(),
            node_matrix: RefCell::new(None),
            protect_readonly: Cell::new(true),
        }
    }

    /// Builds a record from a persisted row. Used by the row-loader; the
    /// read-only guard is irrelevant here since this bypasses the public
    /// setters entirely.
    pub fn from_row(
        table: impl Into<String>,
        columns: ColumnNames,
        row: &StoreRow,
    ) -> Self {
        let mut record = NodeRecord::with_columns(table, columns);
        record.populate(row);
        record
    }

    /// Out-of-band refresh from a freshly-read row: clears and re-arms the
    /// read-only guard around the load, per the policy-object design below.
    pub fn populate(&mut self, row: &StoreRow) {
        self.primary_key = Some(row.primary_key.clone());
        self.path = row
            .get(&self.columns.path)
            .and_then(ColumnValue::as_text)
            .and_then(|s| s.parse().ok());
        self.left = row.get(&self.columns.left).and_then(ColumnValue::as_decimal).map(|(n, d)| Boundary { numerator: n, denominator: d });
        self.right = row.get(&self.columns.right).and_then(ColumnValue::as_decimal).map(|(n, d)| Boundary { numerator: n, denominator: d });
        self.level = row.get(&self.columns.level).and_then(ColumnValue::as_i64).map(|l| l as u32);
        self.payload = row
            .columns
            .iter()
            .filter(|(k, _)| {
                k.as_str() != self.columns.path
                    && k.as_str() != self.columns.left
                    && k.as_str() != self.columns.right
                    && k.as_str() != self.columns.level
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        *self.node_matrix.borrow_mut() = None;
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<&ColumnValue> {
        self.primary_key.as_ref()
    }

    #[must_use]
    pub fn path_column(&self) -> &str {
        &self.columns.path
    }

    #[must_use]
    pub fn left_column(&self) -> &str {
        &self.columns.left
    }

    #[must_use]
    pub fn right_column(&self) -> &str {
        &self.columns.right
    }

    #[must_use]
    pub fn level_column(&self) -> &str {
        &self.columns.level
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    #[must_use]
    pub fn left(&self) -> Option<Boundary> {
        self.left
    }

    #[must_use]
    pub fn right(&self) -> Option<Boundary> {
        self.right
    }

    #[must_use]
    pub fn level(&self) -> Option<u32> {
        self.level
    }

    /// `true` iff `level == 1`.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.level == Some(1)
    }

    /// `false` iff `target_path` equals this record's path or has it as a
    /// strict prefix — i.e. moving there would place this node inside its
    /// own subtree.
    #[must_use]
    pub fn can_move(&self, target_path: &Path) -> bool {
        match &self.path {
            None => true,
            Some(path) => !path.is_self_or_ancestor_of(target_path),
        }
    }

    /// Lazily-computed matrix for this record's current path, cached until
    /// the path changes.
    pub fn node_matrix(&self) -> Option<Matrix> {
        let path = self.path.as_ref()?;
        if self.node_matrix.borrow().is_none() {
            let computed = from_path(path).ok()?;
            *self.node_matrix.borrow_mut() = Some(computed);
        }
        *self.node_matrix.borrow()
    }

    /// Opts out of the read-only guard on tree columns. Diagnostic use only.
    pub fn protect_readonly(&self, protect: bool) {
        self.protect_readonly.set(protect);
    }

    #[must_use]
    pub fn is_readonly_protected(&self) -> bool {
        self.protect_readonly.get()
    }

    /// Public attempt to write `path`. Fails unless protection is off.
    pub fn set_path(&mut self, path: Path) -> Result<(), RecordError> {
        if self.protect_readonly.get() {
            return Err(RecordError::ReadOnlyTreeField("path"));
        }
        self.set_path_internal(path);
        Ok(())
    }

    /// Internal setter: bypasses the guard entirely. Used by the mutation
    /// engine and the row loader, which are explicitly out-of-band from the guard.
    pub(crate) fn set_path_internal(&mut self, path: Path) {
        self.level = Some(path.level());
        self.path = Some(path);
        *self.node_matrix.borrow_mut() = None;
    }

    pub(crate) fn set_boundaries_internal(&mut self, left: Boundary, right: Boundary) {
        self.left = Some(left);
        self.right = Some(right);
    }

    pub(crate) fn set_node_matrix_internal(&mut self, matrix: Matrix) {
        *self.node_matrix.borrow_mut() = Some(matrix);
        self.left = Some(Boundary { numerator: matrix.a, denominator: matrix.c });
        self.right = Some(Boundary { numerator: matrix.b, denominator: matrix.d });
        self.path = Some(crate::path::to_path(&matrix));
        self.level = Some(self.path.as_ref().expect("just set").level());
    }

    pub(crate) fn set_primary_key_internal(&mut self, pk: ColumnValue) {
        self.primary_key = Some(pk);
    }

    /// User payload: arbitrary domain attributes, freely mutable.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ColumnValue> {
        self.payload.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: ColumnValue) {
        self.payload.insert(name.into(), value);
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, ColumnValue> {
        &self.payload
    }

    /// The four tree-column assignments, for a bulk update or insert.
    #[must_use]
    pub fn tree_column_assignments(&self) -> Vec<(String, ColumnValue)> {
        let path = self.path.as_ref().expect("tree columns require an assigned path");
        let left = self.left.expect("tree columns require computed boundaries");
        let right = self.right.expect("tree columns require computed boundaries");
        vec![
            (self.columns.path.clone(), ColumnValue::Text(path.to_string())),
            (self.columns.left.clone(), ColumnValue::Decimal { numerator: left.numerator, denominator: left.denominator }),
            (self.columns.right.clone(), ColumnValue::Decimal { numerator: right.numerator, denominator: right.denominator }),
            (self.columns.level.clone(), ColumnValue::Int(self.level.expect("tree columns require a level") as i64)),
        ]
    }

    /// A fresh [`QueryBuilder`] bound to this row. Single-use: each
    /// navigation call needs its own builder.
    #[must_use]
    pub fn relative_query(&self) -> QueryBuilder {
        QueryBuilder::for_node(self)
    }
}
