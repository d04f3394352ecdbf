//! Integration coverage for the fluent navigation query compiler, exercised
//! against the in-memory reference store rather than the inline unit tests
//! colocated in `src/query.rs`.

use hazeltree::path::from_path;
use hazeltree::record::NodeRecord;
use hazeltree::store::memory::MemoryStore;
use hazeltree::store::{ColumnValue, Store, StoreRow};
use hazeltree::Path;

fn insert(store: &MemoryStore, path: &str) {
    let p: Path = path.parse().unwrap();
    let m = from_path(&p).unwrap();
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

/// Builds a bound [`NodeRecord`] the way a row-loader would: by reading the
/// row back out of the store and going through the public `from_row`
/// constructor, rather than poking at crate-private setters.
fn node_for(store: &MemoryStore, path: &str) -> NodeRecord {
    let row: StoreRow = store
        .snapshot("nodes")
        .into_iter()
        .find(|r| r.get("path").and_then(ColumnValue::as_text) == Some(path))
        .expect("path was inserted");
    NodeRecord::from_row("nodes", Default::default(), &row)
}

#[test]
fn parent_scope_finds_the_direct_parent_only() {
    let store = MemoryStore::new();
    for path in ["1", "1.1", "1.1.1"] {
        insert(&store, path);
    }
    let grandchild = node_for(&store, "1.1.1");
    let rows = grandchild.relative_query().parent().all(&store).unwrap();
    let paths: Vec<&str> = rows.iter().map(|r| r.get("path").unwrap().as_text().unwrap()).collect();
    assert_eq!(paths, vec!["1.1"]);
}

#[test]
fn parent_include_ancestors_returns_the_whole_lineage() {
    let store = MemoryStore::new();
    for path in ["1", "1.1", "1.1.1"] {
        insert(&store, path);
    }
    let grandchild = node_for(&store, "1.1.1");
    let rows = grandchild.relative_query().parent().include_ancestors().all(&store).unwrap();
    let mut paths: Vec<&str> = rows.iter().map(|r| r.get("path").unwrap().as_text().unwrap()).collect();
    paths.sort();
    assert_eq!(paths, vec!["1", "1.1"]);
}

#[test]
fn siblings_of_a_root_are_the_other_roots() {
    let store = MemoryStore::new();
    for path in ["1", "2", "3", "1.1"] {
        insert(&store, path);
    }
    let a = node_for(&store, "1");
    let rows = a.relative_query().siblings().all(&store).unwrap();
    let paths: Vec<&str> = rows.iter().map(|r| r.get("path").unwrap().as_text().unwrap()).collect();
    assert_eq!(paths, vec!["2", "3"]);
}

#[test]
fn siblings_include_descendants_pulls_in_their_subtrees() {
    let store = MemoryStore::new();
    for path in ["1.1", "1.2", "1.2.1", "1.3"] {
        insert(&store, path);
    }
    let middle = node_for(&store, "1.2");
    let count = middle.relative_query().siblings().include_self().include_descendants().count(&store).unwrap();
    // self (1.2), its child (1.2.1), and the two plain siblings (1.1, 1.3).
    assert_eq!(count, 4);
}

#[test]
fn next_sibling_with_include_self_includes_the_reference_node() {
    let store = MemoryStore::new();
    for path in ["1.1", "1.2", "1.3"] {
        insert(&store, path);
    }
    let middle = node_for(&store, "1.2");
    let rows = middle.relative_query().siblings().next().include_self().all(&store).unwrap();
    let paths: Vec<&str> = rows.iter().map(|r| r.get("path").unwrap().as_text().unwrap()).collect();
    assert_eq!(paths, vec!["1.2", "1.3"]);
}

#[test]
fn excluding_self_keeps_descendants() {
    let store = MemoryStore::new();
    for path in ["1", "1.1", "2"] {
        insert(&store, path);
    }
    let a = node_for(&store, "1");
    let rows = a.relative_query().excluding_self().all(&store).unwrap();
    let mut paths: Vec<&str> = rows.iter().map(|r| r.get("path").unwrap().as_text().unwrap()).collect();
    paths.sort();
    assert_eq!(paths, vec!["1.1", "2"]);
}

#[test]
fn default_scope_matches_exactly_the_reference_node() {
    let store = MemoryStore::new();
    for path in ["1", "1.1", "2"] {
        insert(&store, path);
    }
    let a = node_for(&store, "1.1");
    let rows = a.relative_query().all(&store).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("path").unwrap().as_text(), Some("1.1"));
}
