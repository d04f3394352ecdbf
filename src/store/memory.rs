//! An in-memory, transactional reference [`Store`] implementation.
//!
//! Built for this crate's own test suite and benches, and shipped to
//! downstream users behind the `memory-store` feature so they can exercise
//! [`crate::mutation`]/[`crate::query`] without standing up a real database.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::store::{
    ColumnValue, CompareOp, Condition, OrderBy, SortDirection, Store, StoreError, StoreRow, StoreTxn,
};

#[derive(Default)]
struct Table {
    rows: HashMap<i64, StoreRow>,
    next_id: i64,
}

/// Shared, `RefCell`-guarded set of tables. Cheap to clone (it's a single
/// `Rc`); every clone sees the same underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Rc<RefCell<HashMap<String, Table>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Reads the current committed rows of `table`, for test assertions.
    #[must_use]
    pub fn snapshot(&self, table: &str) -> Vec<StoreRow> {
        let tables = self.tables.borrow();
        let mut rows: Vec<StoreRow> = tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| a.primary_key.as_i64().cmp(&b.primary_key.as_i64()));
        rows
    }
}

impl Store for MemoryStore {
    type Txn<'a> = MemoryTxn;

    fn begin_txn(&self) -> Result<Self::Txn<'_>, StoreError> {
        let working_copy: HashMap<String, Table> = self
            .tables
            .borrow()
            .iter()
            .map(|(name, table)| {
                (
                    name.clone(),
                    Table { rows: table.rows.clone(), next_id: table.next_id },
                )
            })
            .collect();
        Ok(MemoryTxn { store: self.clone(), working_copy })
    }
}

/// A snapshot-isolated transaction: all reads and writes happen against a
/// private clone of the tables; `commit` publishes it back, `rollback`
/// drops it untouched.
pub struct MemoryTxn {
    store: MemoryStore,
    working_copy: HashMap<String, Table>,
}

fn matches(row: &StoreRow, condition: &Condition) -> bool {
    match condition {
        Condition::All => true,
        Condition::Not(inner) => !matches(row, inner),
        Condition::And(clauses) => clauses.iter().all(|c| matches(row, c)),
        Condition::Or(clauses) => clauses.iter().any(|c| matches(row, c)),
        Condition::Compare { column, op, value } => {
            let actual = row.get(column);
            compare(actual, op, value)
        }
    }
}

fn decimal_value(v: &ColumnValue) -> Option<f64> {
    v.as_f64()
}

fn compare(actual: Option<&ColumnValue>, op: &CompareOp, expected: &ColumnValue) -> bool {
    let Some(actual) = actual else { return false };
    if let (Some(a), Some(b)) = (decimal_value(actual), decimal_value(expected)) {
        return match op {
            CompareOp::Eq => (a - b).abs() < f64::EPSILON,
            CompareOp::Ne => (a - b).abs() >= f64::EPSILON,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
        };
    }
    match (actual, expected) {
        (ColumnValue::Text(a), ColumnValue::Text(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Le => a <= b,
            CompareOp::Gt => a > b,
            CompareOp::Ge => a >= b,
        },
        _ => false,
    }
}

impl StoreTxn for MemoryTxn {
    type Rows<'a> = std::vec::IntoIter<Result<StoreRow, StoreError>>;

    fn select<'a>(
        &'a mut self,
        table: &str,
        condition: Option<&Condition>,
        order_by: &[OrderBy],
    ) -> Result<Self::Rows<'a>, StoreError> {
        let mut rows: Vec<StoreRow> = self
            .working_copy
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default();

        if let Some(condition) = condition {
            rows.retain(|row| matches(row, condition));
        }

        for order in order_by.iter().rev() {
            rows.sort_by(|a, b| {
                let av = a.get(&order.column).and_then(decimal_value).unwrap_or(0.0);
                let bv = b.get(&order.column).and_then(decimal_value).unwrap_or(0.0);
                let ord = av.partial_cmp(&bv).unwrap_or(std::cmp::Ordering::Equal);
                match order.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        Ok(rows.into_iter().map(Ok).collect::<Vec<_>>().into_iter())
    }

    fn update_row(
        &mut self,
        table: &str,
        primary_key: &ColumnValue,
        assignments: &[(String, ColumnValue)],
    ) -> Result<(), StoreError> {
        let id = primary_key
            .as_i64()
            .ok_or_else(|| StoreError::Database("primary key must be an integer".into()))?;
        let table = self.working_copy.entry(table.to_string()).or_default();
        let row = table.rows.get_mut(&id).ok_or(StoreError::RowNotFound)?;
        for (column, value) in assignments {
            row.columns.insert(column.clone(), value.clone());
        }
        Ok(())
    }

    fn delete_where(&mut self, table: &str, condition: &Condition) -> Result<u64, StoreError> {
        let table = self.working_copy.entry(table.to_string()).or_default();
        let before = table.rows.len();
        table.rows.retain(|_, row| !matches(row, condition));
        Ok((before - table.rows.len()) as u64)
    }

    fn insert(&mut self, table: &str, values: &[(String, ColumnValue)]) -> Result<ColumnValue, StoreError> {
        let table = self.working_copy.entry(table.to_string()).or_default();
        table.next_id += 1;
        let id = table.next_id;
        let row = StoreRow {
            primary_key: ColumnValue::Int(id),
            columns: values.iter().cloned().collect(),
        };
        table.rows.insert(id, row);
        Ok(ColumnValue::Int(id))
    }

    fn last_root(
        &mut self,
        table: &str,
        path_column: &str,
        level_column: &str,
    ) -> Result<Option<StoreRow>, StoreError> {
        let rows = self
            .working_copy
            .get(table)
            .map(|t| t.rows.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter(|row| matches!(row.get(level_column).and_then(ColumnValue::as_i64), Some(1)))
            .max_by_key(|row| {
                row.get(path_column)
                    .and_then(ColumnValue::as_text)
                    .and_then(|p| p.parse::<u32>().ok())
                    .unwrap_or(0)
            }))
    }

    fn commit(self) -> Result<(), StoreError> {
        let mut tables = self.store.tables.borrow_mut();
        *tables = self.working_copy;
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
