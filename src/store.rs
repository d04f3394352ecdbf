//! The thin, typed façade the core demands from the underlying SQL
//! connection. The crate never talks to a database directly; it only
//! ever talks to a [`Store`] implementation the embedding application
//! provides, translating paths and query predicates into calls against it.

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors surfaced by a [`Store`] implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Opaque wrapper around whatever the underlying connector's own error
    /// type reports. The core never interprets this; it only rolls back and
    /// re-raises.
    #[error("database failure: {0}")]
    Database(String),

    /// A point query on `path_column == target` found no row.
    #[error("no row found for the given lookup")]
    RowNotFound,
}

/// A column value as seen at the storage boundary. `Decimal` carries an
/// exact numerator/denominator pair for `left`/`right`, since these columns need a
/// "high-precision decimal or wide float" column and test assertions
/// compare against exact fractions an `f64` cannot always represent.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Int(i64),
    Decimal { numerator: i64, denominator: i64 },
    Text(String),
    Json(serde_json::Value),
    Null,
}

impl ColumnValue {
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<(i64, i64)> {
        match self {
            ColumnValue::Decimal { numerator, denominator } => Some((*numerator, *denominator)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Decimal { numerator, denominator } => {
                Some(*numerator as f64 / *denominator as f64)
            }
            ColumnValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

/// One row as returned by a [`Store`] select. The primary key and tree
/// columns are addressed by configurable name (the `*_column()` hooks);
/// everything else is the caller's own payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRow {
    pub primary_key: ColumnValue,
    pub columns: BTreeMap<String, ColumnValue>,
}

impl StoreRow {
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns.get(column)
    }
}

/// Comparison operator for a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A small, connector-agnostic predicate tree. [`crate::query::QueryBuilder`]
/// compiles its fluent token chain down to one of these; a real SQL connector
/// renders it to a `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: String,
        op: CompareOp,
        value: ColumnValue,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    /// Always true — the empty scope, e.g. "all rows of the table".
    All,
}

impl Condition {
    #[must_use]
    pub fn and(self, other: Condition) -> Condition {
        match self {
            Condition::And(mut clauses) => {
                clauses.push(other);
                Condition::And(clauses)
            }
            first => Condition::And(vec![first, other]),
        }
    }
}

/// Sort direction for an [`OrderBy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

impl OrderBy {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        OrderBy { column: column.into(), direction: SortDirection::Asc }
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        OrderBy { column: column.into(), direction: SortDirection::Desc }
    }
}

/// A connection to a relational table, scoped to one node table.
///
/// The core owns transaction boundaries: every mutation opens exactly
/// one [`StoreTxn`] and either commits it or rolls it back before returning.
pub trait Store {
    /// The transaction type this store hands out. Borrows `self` for its
    /// lifetime, mirroring how a real connection pool would check out a
    /// connection for the duration of the transaction.
    type Txn<'a>: StoreTxn
    where
        Self: 'a;

    fn begin_txn(&self) -> Result<Self::Txn<'_>, StoreError>;
}

/// The operations available inside one transaction.
pub trait StoreTxn {
    /// Streamed row cursor type returned by [`StoreTxn::select`].
    type Rows<'a>: Iterator<Item = Result<StoreRow, StoreError>>
    where
        Self: 'a;

    /// Selects rows from `table` matching `condition` (`None` = all rows),
    /// in `order_by` order.
    fn select<'a>(
        &'a mut self,
        table: &str,
        condition: Option<&Condition>,
        order_by: &[OrderBy],
    ) -> Result<Self::Rows<'a>, StoreError>;

    /// Updates exactly the named columns of the row identified by
    /// `primary_key`.
    fn update_row(
        &mut self,
        table: &str,
        primary_key: &ColumnValue,
        assignments: &[(String, ColumnValue)],
    ) -> Result<(), StoreError>;

    /// Deletes every row matching `condition`; returns the count removed.
    fn delete_where(&mut self, table: &str, condition: &Condition) -> Result<u64, StoreError>;

    /// Inserts a new row, returning its generated primary key.
    fn insert(&mut self, table: &str, values: &[(String, ColumnValue)]) -> Result<ColumnValue, StoreError>;

    /// The row with the highest `level_column = 1` segment in `path_column`,
    /// used by root allocation. `None` if the forest has no roots.
    fn last_root(
        &mut self,
        table: &str,
        path_column: &str,
        level_column: &str,
    ) -> Result<Option<StoreRow>, StoreError>;

    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}

#[cfg(any(test, feature = "memory-store"))]
pub mod memory;
