//! A fluent, order-independent query builder that compiles scope + modifier
//! tokens into a single relational predicate over `left`, `right`, `level`.
//!
//! `QueryBuilder` is a value type: every token consumes
//! `self` and returns a new builder, so chaining never mutates shared state,
//! and `prepare()` is a pure function of the final flag set plus the
//! reference node — order-independence is then just "the flags form a set",
//! not something that has to be tested into existence.

use crate::path;
use crate::record::{Boundary, ColumnNames, NodeRecord};
use crate::store::{
    ColumnValue, CompareOp, Condition, OrderBy, SortDirection, Store, StoreError, StoreRow,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Scope {
    #[default]
    None,
    Roots,
    Children,
    Parent,
    Siblings,
    Excluding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Direction {
    #[default]
    None,
    Next,
    Previous,
}

#[derive(Debug, Clone)]
struct ReferenceNode {
    table: String,
    columns: ColumnNames,
    left: Boundary,
    right: Boundary,
    level: u32,
    is_root: bool,
    parent_interval: Option<(Boundary, Boundary)>,
}

/// A single-use, fluent query over one node's relatives.
///
/// Tokens are idempotent and, short of the `natural`/`reverse` pair noted on
/// [`QueryBuilder::natural`], order-independent: only the final flag set
/// compiled by [`QueryBuilder::prepare`] affects the resulting query.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    reference: ReferenceNode,
    scope: Scope,
    direction: Direction,
    include_self: bool,
    include_descendants: bool,
    include_ancestors: bool,
    exclude_self: bool,
    exclude_descendants: bool,
    reverse: bool,
    natural: bool,
}

/// The compiled, pure result of [`QueryBuilder::prepare`]: a table name, a
/// predicate, and an ordering — ready for a [`Store`] connector to render
/// into SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub table: String,
    pub condition: Condition,
    pub order_by: Vec<OrderBy>,
}

fn cmp(column: &str, op: CompareOp, boundary: Boundary) -> Condition {
    Condition::Compare {
        column: column.to_string(),
        op,
        value: ColumnValue::Decimal { numerator: boundary.numerator, denominator: boundary.denominator },
    }
}

fn level_eq(column: &str, level: i64) -> Condition {
    Condition::Compare { column: column.to_string(), op: CompareOp::Eq, value: ColumnValue::Int(level) }
}

impl QueryBuilder {
    /// Binds a fresh builder to `node`. Panics if `node` has no persisted
    /// path/boundaries yet — navigation only makes sense for a saved row.
    #[must_use]
    pub fn for_node(node: &NodeRecord) -> Self {
        let left = node.left().expect("relative_query requires a persisted node");
        let right = node.right().expect("relative_query requires a persisted node");
        let level = node.level().expect("relative_query requires a persisted node");
        let is_root = level == 1;

        let parent_interval = node.node_matrix().and_then(|m| path::parent(&m)).map(|p| {
            (
                Boundary { numerator: p.a, denominator: p.c },
                Boundary { numerator: p.b, denominator: p.d },
            )
        });

        QueryBuilder {
            reference: ReferenceNode {
                table: node.table().to_string(),
                columns: ColumnNames {
                    path: node.path_column().to_string(),
                    left: node.left_column().to_string(),
                    right: node.right_column().to_string(),
                    level: node.level_column().to_string(),
                },
                left,
                right,
                level,
                is_root,
                parent_interval,
            },
            scope: Scope::None,
            direction: Direction::None,
            include_self: false,
            include_descendants: false,
            include_ancestors: false,
            exclude_self: false,
            exclude_descendants: false,
            reverse: false,
            natural: false,
        }
    }

    #[must_use]
    pub fn roots(mut self) -> Self {
        self.scope = Scope::Roots;
        self
    }

    #[must_use]
    pub fn children(mut self) -> Self {
        self.scope = Scope::Children;
        self
    }

    #[must_use]
    pub fn parent(mut self) -> Self {
        self.scope = Scope::Parent;
        self
    }

    #[must_use]
    pub fn siblings(mut self) -> Self {
        self.scope = Scope::Siblings;
        self
    }

    #[must_use]
    pub fn excluding_self(mut self) -> Self {
        self.scope = Scope::Excluding;
        self.exclude_self = true;
        self
    }

    #[must_use]
    pub fn excluding_descendants(mut self) -> Self {
        self.scope = Scope::Excluding;
        self.exclude_descendants = true;
        self
    }

    #[must_use]
    pub fn next(mut self) -> Self {
        self.direction = Direction::Next;
        self
    }

    #[must_use]
    pub fn previous(mut self) -> Self {
        self.direction = Direction::Previous;
        self
    }

    #[must_use]
    pub fn include_self(mut self) -> Self {
        self.include_self = true;
        self
    }

    #[must_use]
    pub fn include_descendants(mut self) -> Self {
        self.include_descendants = true;
        self
    }

    #[must_use]
    pub fn include_ancestors(mut self) -> Self {
        self.include_ancestors = true;
        self
    }

    /// Restores ascending (or direction-native) order, overriding any
    /// `reverse()` in the same chain regardless of call order.
    #[must_use]
    pub fn natural(mut self) -> Self {
        self.natural = true;
        self
    }

    #[must_use]
    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Compiles the current flag set into a [`PreparedQuery`]. Pure: no
    /// database access.
    #[must_use]
    pub fn prepare(&self) -> PreparedQuery {
        let r = &self.reference;
        let condition = match self.scope {
            Scope::None => Condition::And(vec![
                cmp(&r.columns.left, CompareOp::Eq, r.left),
                cmp(&r.columns.right, CompareOp::Eq, r.right),
            ]),
            Scope::Roots => level_eq(&r.columns.level, 1),
            Scope::Children => {
                let interval = if self.include_self {
                    Condition::And(vec![
                        cmp(&r.columns.left, CompareOp::Ge, r.left),
                        cmp(&r.columns.right, CompareOp::Le, r.right),
                    ])
                } else {
                    Condition::And(vec![
                        cmp(&r.columns.left, CompareOp::Gt, r.left),
                        cmp(&r.columns.right, CompareOp::Lt, r.right),
                    ])
                };
                if self.include_descendants {
                    interval
                } else {
                    interval.and(level_eq(&r.columns.level, r.level as i64 + 1))
                }
            }
            Scope::Parent => {
                let interval = if self.include_self {
                    Condition::And(vec![
                        cmp(&r.columns.left, CompareOp::Le, r.left),
                        cmp(&r.columns.right, CompareOp::Ge, r.right),
                    ])
                } else {
                    Condition::And(vec![
                        cmp(&r.columns.left, CompareOp::Lt, r.left),
                        cmp(&r.columns.right, CompareOp::Gt, r.right),
                    ])
                };
                if self.include_ancestors {
                    interval
                } else {
                    interval.and(level_eq(&r.columns.level, r.level as i64 - 1))
                }
            }
            Scope::Siblings => self.compile_siblings(),
            Scope::Excluding => self.compile_excluding(),
        };

        PreparedQuery { table: r.table.clone(), condition, order_by: vec![self.order_by()] }
    }

    fn compile_siblings(&self) -> Condition {
        let r = &self.reference;
        let mut clauses = Vec::new();

        if r.is_root {
            if !self.include_descendants {
                clauses.push(level_eq(&r.columns.level, 1));
            }
        } else if let Some((pl, pr)) = r.parent_interval {
            clauses.push(cmp(&r.columns.left, CompareOp::Gt, pl));
            clauses.push(cmp(&r.columns.right, CompareOp::Lt, pr));
            if !self.include_descendants {
                clauses.push(level_eq(&r.columns.level, r.level as i64));
            }
        }

        match self.direction {
            Direction::Next => {
                let bound = if self.include_self { r.left } else { r.right };
                clauses.push(cmp(&r.columns.left, CompareOp::Ge, bound));
            }
            Direction::Previous => {
                let bound = if self.include_self { r.right } else { r.left };
                clauses.push(cmp(&r.columns.right, CompareOp::Le, bound));
            }
            Direction::None => {
                if !self.include_self {
                    clauses.push(cmp(&r.columns.left, CompareOp::Ne, r.left));
                }
            }
        }

        if clauses.is_empty() {
            Condition::All
        } else {
            Condition::And(clauses)
        }
    }

    fn compile_excluding(&self) -> Condition {
        let r = &self.reference;
        let subtree = Condition::And(vec![
            cmp(&r.columns.left, CompareOp::Ge, r.left),
            cmp(&r.columns.right, CompareOp::Le, r.right),
        ]);
        if self.exclude_self && self.exclude_descendants {
            Condition::Not(Box::new(subtree))
        } else if self.exclude_self {
            Condition::Compare {
                column: r.columns.left.clone(),
                op: CompareOp::Ne,
                value: ColumnValue::Decimal { numerator: r.left.numerator, denominator: r.left.denominator },
            }
        } else {
            let strict_descendants = Condition::And(vec![
                cmp(&r.columns.left, CompareOp::Gt, r.left),
                cmp(&r.columns.right, CompareOp::Lt, r.right),
            ]);
            Condition::Not(Box::new(strict_descendants))
        }
    }

    fn order_by(&self) -> OrderBy {
        let column = self.reference.columns.left.clone();
        let direction_native = if self.direction == Direction::Previous {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        let direction = if self.natural {
            direction_native
        } else if self.reverse {
            match direction_native {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            }
        } else {
            direction_native
        };
        OrderBy { column, direction }
    }

    /// Executes the query and returns every matching row.
    pub fn all<S: Store>(&self, store: &S) -> Result<Vec<StoreRow>, StoreError> {
        let prepared = self.prepare();
        let mut txn = store.begin_txn()?;
        let rows: Result<Vec<StoreRow>, StoreError> = txn
            .select(&prepared.table, Some(&prepared.condition), &prepared.order_by)?
            .collect();
        txn.rollback()?;
        rows
    }

    /// Executes the query and returns the first matching row, in the
    /// builder's resolved order — the nearest sibling, for example, when
    /// `previous()` is in play.
    pub fn one<S: Store>(&self, store: &S) -> Result<Option<StoreRow>, StoreError> {
        Ok(self.all(store)?.into_iter().next())
    }

    /// Executes the query and returns the number of matching rows.
    pub fn count<S: Store>(&self, store: &S) -> Result<u64, StoreError> {
        Ok(self.all(store)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NodeRecord;
    use crate::store::memory::MemoryStore;
    use crate::store::{ColumnValue, Store};

    fn insert_node(store: &MemoryStore, path: &str) {
        let p: crate::path::Path = path.parse().unwrap();
        let m = crate::path::from_path(&p).unwrap();
        let mut txn = store.begin_txn().unwrap();
        txn.insert(
            "nodes",
            &[
                ("path".to_string(), ColumnValue::Text(path.to_string())),
                ("left".to_string(), ColumnValue::Decimal { numerator: m.a, denominator: m.c }),
                ("right".to_string(), ColumnValue::Decimal { numerator: m.b, denominator: m.d }),
                ("level".to_string(), ColumnValue::Int(p.level() as i64)),
            ],
        )
        .unwrap();
        txn.commit().unwrap();
    }

    fn node_for(path: &str) -> NodeRecord {
        let mut record = NodeRecord::new("nodes");
        record.set_path_internal(path.parse().unwrap());
        let m = record.node_matrix().unwrap();
        record.set_boundaries_internal(
            Boundary { numerator: m.a, denominator: m.c },
            Boundary { numerator: m.b, denominator: m.d },
        );
        record
    }

    #[test]
    fn children_scope_excludes_grandchildren() {
        let store = MemoryStore::new();
        for path in ["1", "1.1", "1.2", "1.1.1"] {
            insert_node(&store, path);
        }
        let a = node_for("1");
        let rows = a.relative_query().children().all(&store).unwrap();
        let paths: Vec<&str> = rows.iter().map(|r| r.get("path").unwrap().as_text().unwrap()).collect();
        assert_eq!(paths, vec!["1.1", "1.2"]);
    }

    #[test]
    fn children_include_descendants_drops_level_filter() {
        let store = MemoryStore::new();
        for path in ["1", "1.1", "1.2", "1.1.1"] {
            insert_node(&store, path);
        }
        let a = node_for("1");
        let count = a.relative_query().children().include_descendants().count(&store).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn previous_sibling_yields_nearest_via_ordering() {
        let store = MemoryStore::new();
        for path in ["1.1", "1.2", "1.3"] {
            insert_node(&store, path);
        }
        let middle = node_for("1.2");
        let row = middle.relative_query().siblings().previous().one(&store).unwrap().unwrap();
        assert_eq!(row.get("path").unwrap().as_text(), Some("1.1"));
    }

    #[test]
    fn reverse_inverts_default_order() {
        let store = MemoryStore::new();
        for path in ["1.1", "1.2", "1.3"] {
            insert_node(&store, path);
        }
        let parent = node_for("1");
        let rows = parent.relative_query().children().reverse().all(&store).unwrap();
        let paths: Vec<&str> = rows.iter().map(|r| r.get("path").unwrap().as_text().unwrap()).collect();
        assert_eq!(paths, vec!["1.3", "1.2", "1.1"]);
    }

    #[test]
    fn order_independent_token_permutations_agree() {
        let store = MemoryStore::new();
        for path in ["1", "1.1", "1.2", "1.3"] {
            insert_node(&store, path);
        }
        let parent = node_for("1");
        let a = parent.relative_query().children().include_self().all(&store).unwrap();
        let b = parent.relative_query().include_self().children().all(&store).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn roots_scope_matches_top_level_only() {
        let store = MemoryStore::new();
        for path in ["1", "2", "1.1"] {
            insert_node(&store, path);
        }
        let any_node = node_for("1.1");
        let rows = any_node.relative_query().roots().all(&store).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn excluding_self_and_descendants_drops_whole_subtree() {
        let store = MemoryStore::new();
        for path in ["1", "1.1", "2"] {
            insert_node(&store, path);
        }
        let a = node_for("1");
        let rows = a
            .relative_query()
            .excluding_self()
            .excluding_descendants()
            .all(&store)
            .unwrap();
        let paths: Vec<&str> = rows.iter().map(|r| r.get("path").unwrap().as_text().unwrap()).collect();
        assert_eq!(paths, vec!["2"]);
    }
}
