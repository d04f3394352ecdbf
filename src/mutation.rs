//! Implements `saveInto` / `saveBefore` / `saveAfter` / `delete` as
//! transactional sequences of subtree bulk-moves and gap shifts.
//!
//! Every public entry point opens exactly one [`Store`] transaction and
//! either commits it or rolls it back before returning — callers never see a
//! half-applied structural change.

use thiserror::Error;
use tracing::{instrument, trace, warn};

use crate::config::TreeConfig;
use crate::matrix::Matrix;
use crate::move_matrix;
use crate::path::{self, Path, PathError, ROOT_MATRIX};
use crate::query::PreparedQuery;
use crate::record::{ColumnNames, NodeRecord};
use crate::store::{ColumnValue, Store, StoreError, StoreRow, StoreTxn};

/// Errors raised by the mutation engine.
#[derive(Error, Debug)]
pub enum MutationError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A path-string target didn't resolve to an existing row, or a new
    /// record already carried a path when one of the positional save
    /// methods was asked to assign one.
    #[error("invalid item configuration: {0}")]
    InvalidItemConfiguration(String),
}

/// Either an already-loaded row or a `path` string to resolve against the
/// store — every save/move/delete operation accepts both.
#[derive(Debug)]
pub enum Target<'a> {
    Record(&'a NodeRecord),
    Path(&'a str),
}

impl<'a> From<&'a NodeRecord> for Target<'a> {
    fn from(record: &'a NodeRecord) -> Self {
        Target::Record(record)
    }
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(path: &'a str) -> Self {
        Target::Path(path)
    }
}

/// Binds the transactional save/move/delete protocol to one [`Store`].
pub struct MutationEngine<'s, S: Store> {
    store: &'s S,
    config: TreeConfig,
}

impl<'s, S: Store> MutationEngine<'s, S> {
    /// Binds to `store` with [`TreeConfig::default`].
    #[must_use]
    pub fn new(store: &'s S) -> Self {
        MutationEngine::with_config(store, TreeConfig::default())
    }

    /// Binds to `store` with an explicit [`TreeConfig`] — e.g. one loaded
    /// via `TreeConfig::load()` from the embedding application's own
    /// `hazeltree.toml`/environment.
    #[must_use]
    pub fn with_config(store: &'s S, config: TreeConfig) -> Self {
        MutationEngine { store, config }
    }

    /// The projected depth a move into/before/after `target` would reach,
    /// checked against this engine's configured [`TreeConfig::max_level`].
    /// `true` (nothing to check) when no cap is configured.
    #[must_use]
    pub fn within_configured_max_level(&self, projected_max_level: u32) -> bool {
        match self.config.max_level {
            Some(cap) => !self.would_exceed_max_level(projected_max_level, cap),
            None => true,
        }
    }

    fn run<T>(&self, f: impl FnOnce(&mut S::Txn<'_>) -> Result<T, MutationError>) -> Result<T, MutationError> {
        let mut txn = self.store.begin_txn()?;
        match f(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                txn.rollback()?;
                Err(err)
            }
        }
    }

    /// Persists `record`. Allocates the next root path if it's new
    /// and has none yet.
    #[instrument(level = "debug", skip(self, record))]
    pub fn save(&self, record: &mut NodeRecord) -> Result<bool, MutationError> {
        self.run(|txn| {
            if record.primary_key().is_some() {
                persist_scalar_fields(txn, record)?;
                return Ok(true);
            }
            if record.path().is_none() {
                allocate_root(txn, record)?;
            }
            insert_new(txn, record)?;
            Ok(true)
        })
    }

    /// Places `record` as the last child of `target`.
    #[instrument(level = "debug", skip(self, record, target))]
    pub fn save_into<'t>(&self, record: &mut NodeRecord, target: impl Into<Target<'t>>) -> Result<bool, MutationError> {
        let target = target.into();
        self.run(|txn| {
            let table = record.table().to_string();
            let columns = record.columns.clone();
            let target_record = resolve_target(txn, &table, &columns, target)?;

            if record.path().is_none() {
                let target_path = target_record
                    .path()
                    .cloned()
                    .ok_or_else(|| MutationError::InvalidItemConfiguration("target has no path".into()))?;
                let last_segment = last_child_segment(txn, &columns, &target_record, None)?;
                assign_path(record, target_path.child(last_segment + 1))?;
                insert_new(txn, record)?;
                return Ok(true);
            }

            persist_scalar_fields(txn, record)?;
            let target_path = target_record
                .path()
                .cloned()
                .ok_or_else(|| MutationError::InvalidItemConfiguration("target has no path".into()))?;
            if !record.can_move(&target_path) {
                warn!("saveInto rejected: target is self or a descendant of self");
                return Ok(false);
            }

            let next_sibling = capture_next_sibling(txn, &columns, record)?;

            let self_last_segment = record.path().expect("checked above").last_segment();
            let self_path_string = self_last_segment_path(record);
            let last_segment = last_child_segment(txn, &columns, &target_record, Some(self_path_string.as_str()))?;
            let k = (last_segment + 1) as i64 - self_last_segment as i64;

            let from_parent = parent_matrix(record)?;
            let to_parent = target_record
                .node_matrix()
                .ok_or_else(|| MutationError::InvalidItemConfiguration("target has no matrix".into()))?;
            let t = move_matrix::build(&from_parent, &to_parent, k);
            move_subtree(txn, &columns, record, t, k >= 0, self.config.stream_batch_size)?;

            if let Some(sibling) = next_sibling {
                close_old_gap(txn, &columns, &sibling, Some(record), self.config.stream_batch_size)?;
            }

            Ok(true)
        })
    }

    /// Places `record` immediately before `target` among its siblings.
    #[instrument(level = "debug", skip(self, record, target))]
    pub fn save_before<'t>(&self, record: &mut NodeRecord, target: impl Into<Target<'t>>) -> Result<bool, MutationError> {
        let target = target.into();
        self.run(|txn| {
            let table = record.table().to_string();
            let columns = record.columns.clone();
            let target_record = resolve_target(txn, &table, &columns, target)?;
            save_before_impl(txn, &columns, record, target_record, self.config.stream_batch_size)
        })
    }

    /// Places `record` immediately after `target` among its siblings.
    #[instrument(level = "debug", skip(self, record, target))]
    pub fn save_after<'t>(&self, record: &mut NodeRecord, target: impl Into<Target<'t>>) -> Result<bool, MutationError> {
        let target = target.into();
        self.run(|txn| {
            let table = record.table().to_string();
            let columns = record.columns.clone();
            let target_record = resolve_target(txn, &table, &columns, target)?;

            let next_of_target_prepared = target_record.relative_query().siblings().next().prepare();
            let next_of_target = select_rows(txn, &next_of_target_prepared)?
                .into_iter()
                .next()
                .map(|row| NodeRecord::from_row(table.clone(), columns.clone(), &row));

            if let Some(next_target_sibling) = next_of_target {
                return save_before_impl(txn, &columns, record, next_target_sibling, self.config.stream_batch_size);
            }

            // target is the last sibling: append directly, no gap to open.
            let target_path = target_record
                .path()
                .cloned()
                .ok_or_else(|| MutationError::InvalidItemConfiguration("target has no path".into()))?;

            if record.path().is_none() {
                let new_path = append_path(&target_path, target_path.last_segment() + 1);
                assign_path(record, new_path)?;
                insert_new(txn, record)?;
                return Ok(true);
            }

            persist_scalar_fields(txn, record)?;
            if !record.can_move(&target_path) {
                warn!("saveAfter rejected: target is self or a descendant of self");
                return Ok(false);
            }

            let next_sibling = capture_next_sibling(txn, &columns, record)?;

            let self_last_segment = record.path().expect("checked above").last_segment();
            let target_last_segment = target_path.last_segment();
            let k = target_last_segment as i64 - self_last_segment as i64 + 1;

            let from_parent = parent_matrix(record)?;
            let to_parent = parent_matrix(&target_record)?;
            let t = move_matrix::build(&from_parent, &to_parent, k);
            move_subtree(txn, &columns, record, t, k >= 0, self.config.stream_batch_size)?;

            if let Some(sibling) = next_sibling {
                close_old_gap(txn, &columns, &sibling, Some(record), self.config.stream_batch_size)?;
            }

            Ok(true)
        })
    }

    /// Deletes `record` and its entire subtree, closing the gap left behind
    /// among its former siblings. Returns the removed row count.
    #[instrument(level = "debug", skip(self, record))]
    pub fn delete(&self, record: &NodeRecord) -> Result<u64, MutationError> {
        self.run(|txn| {
            let columns = record.columns.clone();
            let next_sibling = capture_next_sibling(txn, &columns, record)?;
            let subtree_prepared = record.relative_query().children().include_self().include_descendants().prepare();
            let removed = txn.delete_where(&subtree_prepared.table, &subtree_prepared.condition)?;
            if let Some(sibling) = next_sibling {
                close_old_gap(txn, &columns, &sibling, None, self.config.stream_batch_size)?;
            }
            Ok(removed)
        })
    }

    /// Maximum `level` reached by any descendant, measured relative to
    /// `record`'s own level (`0` for a leaf).
    pub fn get_subtree_depth(&self, record: &NodeRecord) -> Result<u32, MutationError> {
        self.run(|txn| {
            let own_level = record
                .level()
                .ok_or_else(|| MutationError::InvalidItemConfiguration("record has no persisted level".into()))?;
            let prepared = record.relative_query().children().include_descendants().prepare();
            let rows = select_rows(txn, &prepared)?;
            let max_level = rows
                .iter()
                .filter_map(|row| row.get(&record.columns.level).and_then(ColumnValue::as_i64))
                .max()
                .map(|l| l as u32)
                .unwrap_or(own_level);
            Ok(max_level.saturating_sub(own_level))
        })
    }

    /// The deepest level `record`'s subtree would reach if moved into
    /// `target`, for pre-validation against a depth cap.
    pub fn get_max_level_if_move_into(&self, record: &NodeRecord, target: &NodeRecord) -> Result<u32, MutationError> {
        let depth = self.get_subtree_depth(record)?;
        Ok(target.level().unwrap_or(0) + 1 + depth)
    }

    /// As [`Self::get_max_level_if_move_into`], for `saveBefore`/`saveAfter`
    /// against `target` (both land `record` at `target`'s own level).
    pub fn get_max_level_if_move_before_or_after(
        &self,
        record: &NodeRecord,
        target: &NodeRecord,
    ) -> Result<u32, MutationError> {
        let depth = self.get_subtree_depth(record)?;
        Ok(target.level().unwrap_or(1) + depth)
    }

    #[must_use]
    pub fn would_exceed_max_level(&self, projected_max_level: u32, max_level: u32) -> bool {
        projected_max_level > max_level
    }
}

fn save_before_impl(
    txn: &mut impl StoreTxn,
    columns: &ColumnNames,
    record: &mut NodeRecord,
    mut target_record: NodeRecord,
    batch_size: usize,
) -> Result<bool, MutationError> {
    if record.path().is_none() {
        let original_target_path = target_record
            .path()
            .cloned()
            .ok_or_else(|| MutationError::InvalidItemConfiguration("target has no path".into()))?;
        open_gap_at_destination(txn, columns, &mut target_record, None, batch_size)?;
        assign_path(record, original_target_path)?;
        insert_new(txn, record)?;
        return Ok(true);
    }

    persist_scalar_fields(txn, record)?;
    let target_path = target_record
        .path()
        .cloned()
        .ok_or_else(|| MutationError::InvalidItemConfiguration("target has no path".into()))?;
    if !record.can_move(&target_path) {
        warn!("saveBefore rejected: target is self or a descendant of self");
        return Ok(false);
    }

    let next_sibling = capture_next_sibling(txn, columns, record)?;

    // `target.siblings().next().include_self().include_descendants()` (the
    // gap-open sweep below) also matches `record`'s own row whenever record
    // sits at or after target in the same parent scope — refresh both, not
    // just target, or `self_last_segment`/`move_subtree` below would read a
    // stale interval and act on the wrong row.
    open_gap_at_destination(txn, columns, &mut target_record, Some(&mut *record), batch_size)?;

    let self_last_segment = record.path().expect("checked above").last_segment();
    let target_last_segment = target_record.path().expect("just synced").last_segment();
    let k = target_last_segment as i64 - self_last_segment as i64 - 1;

    let from_parent = parent_matrix(record)?;
    let to_parent = parent_matrix(&target_record)?;
    let t = move_matrix::build(&from_parent, &to_parent, k);
    move_subtree(txn, columns, record, t, k >= 0, batch_size)?;

    // The gap-close below, symmetrically, may re-match `record`'s own
    // just-relocated row (when record's new position lands at or past the
    // captured next-sibling's old slot) — that re-match is required to keep
    // numbering contiguous, not a stray side effect, so refresh `record`
    // from it too rather than leaving the in-memory copy one step behind
    // the row actually persisted.
    if let Some(sibling) = next_sibling {
        close_old_gap(txn, columns, &sibling, Some(record), batch_size)?;
    }

    Ok(true)
}

fn append_path(path: &Path, segment: u32) -> Path {
    match path.base_path() {
        Some(parent) => parent.child(segment),
        None => Path::root(segment).expect("segment derived from +1 of an existing last segment is always positive"),
    }
}

fn resolve_target(
    txn: &mut impl StoreTxn,
    table: &str,
    columns: &ColumnNames,
    target: Target<'_>,
) -> Result<NodeRecord, MutationError> {
    match target {
        Target::Record(r) => Ok(r.clone()),
        Target::Path(s) => {
            let path: Path = s.parse()?;
            let condition = crate::store::Condition::Compare {
                column: columns.path.clone(),
                op: crate::store::CompareOp::Eq,
                value: ColumnValue::Text(path.to_string()),
            };
            let rows: Vec<StoreRow> = txn.select(table, Some(&condition), &[])?.collect::<Result<_, _>>()?;
            rows.into_iter()
                .next()
                .map(|row| NodeRecord::from_row(table.to_string(), columns.clone(), &row))
                .ok_or_else(|| MutationError::InvalidItemConfiguration(s.to_string()))
        }
    }
}

fn parent_matrix(record: &NodeRecord) -> Result<Matrix, MutationError> {
    let m = record
        .node_matrix()
        .ok_or_else(|| MutationError::InvalidItemConfiguration("record has no persisted path".into()))?;
    Ok(path::parent(&m).unwrap_or(ROOT_MATRIX))
}

fn assign_path(record: &mut NodeRecord, path: Path) -> Result<(), MutationError> {
    let matrix = path::from_path(&path)?;
    record.set_node_matrix_internal(matrix);
    Ok(())
}

fn allocate_root(txn: &mut impl StoreTxn, record: &mut NodeRecord) -> Result<(), MutationError> {
    let table = record.table().to_string();
    let last = txn.last_root(&table, &record.columns.path, &record.columns.level)?;
    let next_segment = match last {
        Some(row) => {
            let path_str = row.get(&record.columns.path).and_then(ColumnValue::as_text).unwrap_or("0");
            let last_path: Path = path_str
                .parse()
                .map_err(|_| MutationError::InvalidItemConfiguration(path_str.to_string()))?;
            last_path.last_segment() + 1
        }
        None => 1,
    };
    assign_path(record, Path::root(next_segment)?)
}

fn insert_new(txn: &mut impl StoreTxn, record: &mut NodeRecord) -> Result<(), MutationError> {
    let table = record.table().to_string();
    let mut values = record.tree_column_assignments();
    values.extend(record.fields().iter().map(|(k, v)| (k.clone(), v.clone())));
    let pk = txn.insert(&table, &values)?;
    record.set_primary_key_internal(pk);
    Ok(())
}

fn persist_scalar_fields(txn: &mut impl StoreTxn, record: &NodeRecord) -> Result<(), MutationError> {
    let Some(pk) = record.primary_key().cloned() else {
        return Ok(());
    };
    let assignments: Vec<(String, ColumnValue)> = record.fields().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    if assignments.is_empty() {
        return Ok(());
    }
    txn.update_row(record.table(), &pk, &assignments)?;
    Ok(())
}

fn select_rows(txn: &mut impl StoreTxn, prepared: &PreparedQuery) -> Result<Vec<StoreRow>, MutationError> {
    Ok(txn
        .select(&prepared.table, Some(&prepared.condition), &prepared.order_by)?
        .collect::<Result<_, _>>()?)
}

fn capture_next_sibling(
    txn: &mut impl StoreTxn,
    columns: &ColumnNames,
    record: &NodeRecord,
) -> Result<Option<NodeRecord>, MutationError> {
    let prepared = record.relative_query().siblings().next().prepare();
    let table = prepared.table.clone();
    let rows = select_rows(txn, &prepared)?;
    Ok(rows.into_iter().next().map(|row| NodeRecord::from_row(table, columns.clone(), &row)))
}

/// Helper purely so `last_child_segment` can build a "same path as self"
/// exclusion without needing a second mutable borrow of `record`.
fn self_last_segment_path(record: &NodeRecord) -> String {
    record.path().map(Path::to_string).unwrap_or_default()
}

fn last_child_segment(
    txn: &mut impl StoreTxn,
    columns: &ColumnNames,
    target: &NodeRecord,
    exclude_path: Option<&str>,
) -> Result<u32, MutationError> {
    let prepared = target.relative_query().children().prepare();
    let rows = select_rows(txn, &prepared)?;
    Ok(rows
        .iter()
        .filter(|row| exclude_path.map_or(true, |excluded| row.get(&columns.path).and_then(ColumnValue::as_text) != Some(excluded)))
        .filter_map(|row| row.get(&columns.path).and_then(ColumnValue::as_text))
        .filter_map(|p| p.parse::<Path>().ok())
        .map(|p| p.last_segment())
        .max()
        .unwrap_or(0))
}

/// `true` iff `candidate`'s `left` boundary (`a/c`) is at or beyond
/// `reference`'s, compared as exact rationals. Every node matrix has `c > 0`
/// (built up from positive path segments), so cross-multiplication preserves
/// the inequality without ever going through `f64`.
fn left_at_or_after(candidate: &Matrix, reference: &Matrix) -> bool {
    candidate.a as i128 * reference.c as i128 >= reference.a as i128 * candidate.c as i128
}

/// `true` iff `candidate` falls strictly inside `parent`'s `(left, right)`
/// interval — the same `left > pl && right < pr` pair a non-root
/// `Siblings`/`include_descendants` query compiles to.
fn within_parent_interval(candidate: &Matrix, parent: &Matrix) -> bool {
    let left_gt = candidate.a as i128 * parent.c as i128 > parent.a as i128 * candidate.c as i128;
    let right_lt = candidate.b as i128 * parent.d as i128 < parent.b as i128 * candidate.d as i128;
    left_gt && right_lt
}

/// `true` iff a row sitting at `candidate_before` would have matched
/// `reference.relative_query().siblings().next().include_self().include_descendants()`
/// evaluated at `reference_before` — the predicate both `open_gap_at_destination`
/// and `close_old_gap` compile to. Lets a caller holding another record's
/// cached matrix decide whether that record's store row was swept up too,
/// without a second read of the store.
fn swept_alongside(reference_before: &Matrix, candidate_before: &Matrix) -> bool {
    match path::parent(reference_before) {
        None => left_at_or_after(candidate_before, reference_before),
        Some(parent) => within_parent_interval(candidate_before, &parent) && left_at_or_after(candidate_before, reference_before),
    }
}

/// Bumps `target` and every later sibling (with descendants) by `+1` to free
/// `target`'s own slot for an incoming node. Always refreshes `target`'s
/// in-memory matrix since `include_self()` guarantees its row was touched;
/// `self_record`, if given, is refreshed too exactly when its own pre-sweep
/// position falls inside the same swept range (see [`swept_alongside`]) —
/// this happens whenever `self_record` is a later sibling of `target`.
fn open_gap_at_destination(
    txn: &mut impl StoreTxn,
    columns: &ColumnNames,
    target: &mut NodeRecord,
    self_record: Option<&mut NodeRecord>,
    batch_size: usize,
) -> Result<Matrix, MutationError> {
    let target_before = target
        .node_matrix()
        .ok_or_else(|| MutationError::InvalidItemConfiguration("target has no matrix".into()))?;
    let parent = parent_matrix(target)?;
    let t = move_matrix::build(&parent, &parent, 1);
    let prepared = target
        .relative_query()
        .siblings()
        .next()
        .include_self()
        .include_descendants()
        .reverse()
        .prepare();
    bulk_apply(txn, columns, &prepared, batch_size, |m| t.multiply(m))?;

    target.set_node_matrix_internal(t.multiply(&target_before));
    if let Some(self_record) = self_record {
        if let Some(self_before) = self_record.node_matrix() {
            if swept_alongside(&target_before, &self_before) {
                self_record.set_node_matrix_internal(t.multiply(&self_before));
            }
        }
    }
    Ok(t)
}

/// Shifts the captured next-sibling (with descendants) and everyone after it
/// back by `-1`, closing the gap a departed node left behind. When a move's
/// new resting place lands at or past that captured sibling's old slot, this
/// sweep legitimately re-matches the mover's own row too — that is how its
/// position gets renumbered down to the correct contiguous value, not an
/// accidental double-shift — so `self_record`, if given, is refreshed
/// whenever [`swept_alongside`] says its row was included.
fn close_old_gap(
    txn: &mut impl StoreTxn,
    columns: &ColumnNames,
    sibling: &NodeRecord,
    self_record: Option<&mut NodeRecord>,
    batch_size: usize,
) -> Result<(), MutationError> {
    let sibling_before = sibling
        .node_matrix()
        .ok_or_else(|| MutationError::InvalidItemConfiguration("sibling has no matrix".into()))?;
    let parent = parent_matrix(sibling)?;
    let t = move_matrix::build(&parent, &parent, -1);
    let prepared = sibling
        .relative_query()
        .siblings()
        .next()
        .include_self()
        .include_descendants()
        .prepare();
    bulk_apply(txn, columns, &prepared, batch_size, |m| t.multiply(m))?;

    if let Some(self_record) = self_record {
        if let Some(self_before) = self_record.node_matrix() {
            if swept_alongside(&sibling_before, &self_before) {
                self_record.set_node_matrix_internal(t.multiply(&self_before));
            }
        }
    }
    Ok(())
}

fn move_subtree(
    txn: &mut impl StoreTxn,
    columns: &ColumnNames,
    record: &mut NodeRecord,
    t: Matrix,
    growing: bool,
    batch_size: usize,
) -> Result<(), MutationError> {
    let builder = record.relative_query().children().include_self().include_descendants();
    let builder = if growing { builder.reverse() } else { builder };
    let prepared = builder.prepare();
    bulk_apply(txn, columns, &prepared, batch_size, |m| t.multiply(m))?;
    if let Some(old) = record.node_matrix() {
        record.set_node_matrix_internal(t.multiply(&old));
    }
    Ok(())
}

/// Applies `transform` to every node matrix matched by `prepared`, writing
/// back exactly the four tree columns of each. Collects the full
/// row set before mutating so iteration order never collides with rows a
/// live backend might still be scanning, then writes it back in
/// `batch_size`-row pages (`TreeConfig::stream_batch_size`) so a large
/// subtree relocation shows up as discrete progress rather than one
/// monolithic pass.
fn bulk_apply(
    txn: &mut impl StoreTxn,
    columns: &ColumnNames,
    prepared: &PreparedQuery,
    batch_size: usize,
    transform: impl Fn(&Matrix) -> Matrix,
) -> Result<usize, MutationError> {
    let rows: Vec<StoreRow> = txn
        .select(&prepared.table, Some(&prepared.condition), &prepared.order_by)?
        .collect::<Result<_, _>>()?;
    let count = rows.len();
    let batch_size = batch_size.max(1);
    for (batch_index, batch) in rows.chunks(batch_size).enumerate() {
        for row in batch {
            let mut node = NodeRecord::from_row(prepared.table.clone(), columns.clone(), row);
            let old_matrix = node
                .node_matrix()
                .ok_or_else(|| MutationError::InvalidItemConfiguration("row has no valid path".into()))?;
            node.set_node_matrix_internal(transform(&old_matrix));
            let pk = node.primary_key().cloned().expect("row loaded from the store always has a primary key");
            txn.update_row(&prepared.table, &pk, &node.tree_column_assignments())?;
        }
        trace!(batch_index, batch_len = batch.len(), table = %prepared.table, "applied bulk update batch");
    }
    Ok(count)
}
