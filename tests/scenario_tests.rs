//! The six concrete seed scenarios enumerated in the testable-properties
//! section, each as its own integration test against the in-memory store.

use hazeltree::mutation::MutationEngine;
use hazeltree::path::from_path;
use hazeltree::record::NodeRecord;
use hazeltree::store::memory::MemoryStore;
use hazeltree::Path;

fn child_paths(store: &MemoryStore, parent: &NodeRecord) -> Vec<String> {
    parent
        .relative_query()
        .children()
        .all(store)
        .unwrap()
        .iter()
        .map(|r| r.get("path").unwrap().as_text().unwrap().to_string())
        .collect()
}

/// 1. Build roots A, B; add A/c1, A/c2, A/c3; query A.children() -> [A.1, A.2, A.3].
#[test]
fn scenario_1_children_arrive_in_append_order() {
    let store = MemoryStore::new();
    let eng = MutationEngine::new(&store);

    let mut a = NodeRecord::new("nodes");
    eng.save(&mut a).unwrap();
    let mut b = NodeRecord::new("nodes");
    eng.save(&mut b).unwrap();

    let mut c1 = NodeRecord::new("nodes");
    eng.save_into(&mut c1, &a).unwrap();
    let mut c2 = NodeRecord::new("nodes");
    eng.save_into(&mut c2, &a).unwrap();
    let mut c3 = NodeRecord::new("nodes");
    eng.save_into(&mut c3, &a).unwrap();

    assert_eq!(child_paths(&store, &a), vec!["1.1", "1.2", "1.3"]);
}

/// 2. After scenario 1, move A.3 before A.1. Resulting order: A.3 takes A.1's
/// old slot, A.1 and A.2 shift down one each.
#[test]
fn scenario_2_moving_the_last_child_before_the_first_reorders_in_place() {
    let store = MemoryStore::new();
    let eng = MutationEngine::new(&store);

    let mut a = NodeRecord::new("nodes");
    eng.save(&mut a).unwrap();
    let mut c1 = NodeRecord::new("nodes");
    eng.save_into(&mut c1, &a).unwrap();
    let mut c2 = NodeRecord::new("nodes");
    eng.save_into(&mut c2, &a).unwrap();
    let mut c3 = NodeRecord::new("nodes");
    eng.save_into(&mut c3, &a).unwrap();

    eng.save_before(&mut c3, &c1).unwrap();

    assert_eq!(child_paths(&store, &a), vec!["1.1", "1.2", "1.3"]);
    assert_eq!(c3.path().unwrap().to_string(), "1.1");
}

/// 3. Insert new node X via saveBefore(B). X.path becomes the old B.path
/// ("2"), B shifts to "3", all invariants hold.
#[test]
fn scenario_3_insert_before_a_root_shifts_it_and_everything_after() {
    let store = MemoryStore::new();
    let eng = MutationEngine::new(&store);

    let mut a = NodeRecord::new("nodes");
    eng.save(&mut a).unwrap();
    let mut b = NodeRecord::new("nodes");
    eng.save(&mut b).unwrap();
    assert_eq!(b.path().unwrap().to_string(), "2");

    let mut x = NodeRecord::new("nodes");
    eng.save_before(&mut x, &b).unwrap();

    assert_eq!(x.path().unwrap().to_string(), "2");

    let roots = x.relative_query().roots().all(&store).unwrap();
    let mut paths: Vec<String> = roots.iter().map(|r| r.get("path").unwrap().as_text().unwrap().to_string()).collect();
    paths.sort();
    assert_eq!(paths, vec!["1".to_string(), "2".to_string(), "3".to_string()]);

    for row in &roots {
        let m = from_path(&row.get("path").unwrap().as_text().unwrap().parse::<Path>().unwrap()).unwrap();
        assert_eq!(m.determinant(), -1);
    }
}

/// 4. Delete the middle of three siblings; the third's path becomes the
/// deleted one's old path; total row count drops by 1.
#[test]
fn scenario_4_deleting_the_middle_sibling_closes_the_gap() {
    let store = MemoryStore::new();
    let eng = MutationEngine::new(&store);

    let mut a = NodeRecord::new("nodes");
    eng.save(&mut a).unwrap();
    let mut c1 = NodeRecord::new("nodes");
    eng.save_into(&mut c1, &a).unwrap();
    let mut c2 = NodeRecord::new("nodes");
    eng.save_into(&mut c2, &a).unwrap();
    let mut c3 = NodeRecord::new("nodes");
    eng.save_into(&mut c3, &a).unwrap();

    let before_count = a.relative_query().children().include_descendants().count(&store).unwrap();

    let removed = eng.delete(&c2).unwrap();
    assert_eq!(removed, 1);

    assert_eq!(child_paths(&store, &a), vec!["1.1", "1.2"]);

    let after_count = a.relative_query().children().include_descendants().count(&store).unwrap();
    assert_eq!(after_count, before_count - 1);
}

/// 5. Build a 10-deep chain L1..L10. Move L5 under a second root (as second
/// child). Depth of L10 becomes 7. ancestors(L10) enumerates 6 rows.
#[test]
fn scenario_5_moving_a_mid_chain_node_shortens_its_whole_subtree() {
    let store = MemoryStore::new();
    let eng = MutationEngine::new(&store);

    let mut root_a = NodeRecord::new("nodes");
    eng.save(&mut root_a).unwrap(); // L1
    let mut root_b = NodeRecord::new("nodes");
    eng.save(&mut root_b).unwrap();
    let mut filler = NodeRecord::new("nodes");
    eng.save_into(&mut filler, &root_b).unwrap(); // root_b's existing first child

    let mut chain = vec![root_a.clone()];
    let mut parent = root_a.clone();
    for _ in 0..9 {
        let mut child = NodeRecord::new("nodes");
        eng.save_into(&mut child, &parent).unwrap();
        parent = child.clone();
        chain.push(child);
    }
    // chain[0] == L1 .. chain[9] == L10.
    let mut l5 = chain[4].clone();
    let l10 = chain[9].clone();
    assert_eq!(l5.level().unwrap(), 5);
    assert_eq!(l10.level().unwrap(), 10);

    eng.save_into(&mut l5, &root_b).unwrap();
    assert_eq!(l5.level().unwrap(), 2);

    let descendants = l5.relative_query().children().include_descendants().all(&store).unwrap();
    let deepest_level = descendants.iter().map(|r| r.get("level").unwrap().as_i64().unwrap()).max().unwrap();
    assert_eq!(deepest_level, 7);

    // L10's own ancestor chain (root_b, l5, L6..L9) is 6 rows deep.
    let moved_l10_row = descendants
        .iter()
        .max_by_key(|r| r.get("level").unwrap().as_i64().unwrap())
        .unwrap();
    let moved_l10_path: Path = moved_l10_row.get("path").unwrap().as_text().unwrap().parse().unwrap();
    let ancestors = hazeltree::path::ancestor_paths(&moved_l10_path).unwrap();
    assert_eq!(ancestors.len(), 6);
}

/// 6. PathCodec.fromPath("2.4.3") == (65, 82, 23, 29); left == 65/23,
/// right == 82/29, det == -1.
#[test]
fn scenario_6_conformance_vector_for_2_4_3() {
    let path: Path = "2.4.3".parse().unwrap();
    let m = from_path(&path).unwrap();
    assert_eq!((m.a, m.b, m.c, m.d), (65, 82, 23, 29));
    assert_eq!(hazeltree::path::left(&m), 65.0 / 23.0);
    assert_eq!(hazeltree::path::right(&m), 82.0 / 29.0);
    assert_eq!(m.determinant(), -1);
}
