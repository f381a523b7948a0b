//! End-to-end tests of node creation, conversion, LP reconstruction and
//! destruction.

use solver_bnb::lp::{BasisStatus, Lp, LpState, Row, RowId};
use solver_bnb::search::{LpChange, NodeType, Tree};
use solver_bnb::{BnbError, TreeSettings};

fn make_row(lp: &mut Lp, name: &str, col: usize) -> RowId {
    lp.create_row(Row::new(name, 4, vec![(col, 1.0)], 0.0, 1.0).unwrap())
}

#[test]
fn test_fork_rows_replayed_for_grandchild() {
    let mut lp = Lp::new();
    let mut tree = Tree::new(TreeSettings::default());
    let state = lp.capture_state();

    // Root with one base row, solved and branched on
    let root = tree.create_root(state, &mut lp).unwrap();
    tree.focus(root, &mut lp).unwrap();
    let base = make_row(&mut lp, "base", 0);
    tree.add_row(root, base, &mut lp).unwrap();
    assert_eq!(tree.promote_solved(root, &mut lp).unwrap(), NodeType::Fork);

    let root_node = tree.node(root).unwrap();
    assert_eq!(root_node.depth(), 0);
    assert_eq!(root_node.lower_bound(), f64::NEG_INFINITY);

    // Child A adds two rows while being solved
    let a = tree.create_leaf(root, state, &mut lp).unwrap();
    let sibling = tree.create_leaf(root, state, &mut lp).unwrap();
    tree.focus(a, &mut lp).unwrap();
    let c1 = make_row(&mut lp, "c1", 1);
    let c2 = make_row(&mut lp, "c2", 2);
    tree.add_row(a, c1, &mut lp).unwrap();
    tree.add_row(a, c2, &mut lp).unwrap();
    lp.install_solution(vec![0.0; 4], vec![], 2.5);
    tree.update_lower_bound(a, 2.5).unwrap();
    assert_eq!(tree.promote_solved(a, &mut lp).unwrap(), NodeType::Fork);
    assert_eq!(tree.node(a).unwrap().added_rows(), &[c1, c2]);

    // Grandchild B starts with no deltas of its own
    let b = tree.create_leaf(a, state, &mut lp).unwrap();
    let b_node = tree.node(b).unwrap();
    assert_eq!(b_node.depth(), 2);
    assert!(b_node.lower_bound() >= tree.node(a).unwrap().lower_bound());
    assert!(b_node.added_rows().is_empty());
    assert_eq!(tree.lp_rows(b).unwrap(), vec![base, c1, c2]);

    // Switching to the sibling keeps the shared base row
    let changes = tree.focus(sibling, &mut lp).unwrap();
    assert_eq!(changes, vec![LpChange::Shrink { new_len: 1 }]);
    assert_eq!(lp.row_ids(), &[base]);

    let changes = tree.focus(b, &mut lp).unwrap();
    assert_eq!(changes, vec![LpChange::Add(c1), LpChange::Add(c2)]);
    assert_eq!(lp.row_ids(), &[base, c1, c2]);
    assert_eq!(tree.active_path(), &[root, a, b]);
}

#[test]
fn test_destroy_rules_and_refcounts() {
    let mut lp = Lp::new();
    let mut tree = Tree::new(TreeSettings::default());
    let state = lp.capture_state();

    let root = tree.create_root(state, &mut lp).unwrap();
    tree.focus(root, &mut lp).unwrap();
    tree.promote_solved(root, &mut lp).unwrap();

    let a = tree.create_leaf(root, state, &mut lp).unwrap();
    let keep = tree.create_leaf(root, state, &mut lp).unwrap();
    tree.focus(a, &mut lp).unwrap();
    let cut = make_row(&mut lp, "cut", 3);
    tree.add_row(a, cut, &mut lp).unwrap();
    tree.promote_solved(a, &mut lp).unwrap();
    let b = tree.create_leaf(a, state, &mut lp).unwrap();

    // Parents with live children cannot be destroyed
    assert!(matches!(
        tree.free_node(a, &mut lp),
        Err(BnbError::NodeHasChildren { children: 1, .. })
    ));
    assert!(matches!(
        tree.free_node(root, &mut lp),
        Err(BnbError::NodeHasChildren { children: 2, .. })
    ));

    // Move the LP away so only the tree and the caller hold `cut`
    tree.focus(keep, &mut lp).unwrap();
    assert_eq!(lp.rows().nuses(cut).unwrap(), 2);

    let state_uses = lp.states().nuses(state).unwrap();
    tree.free_node(b, &mut lp).unwrap();
    assert_eq!(lp.states().nuses(state).unwrap(), state_uses - 1);

    // A lost its only child and went with it, releasing its row
    assert!(!tree.contains(a));
    assert_eq!(lp.rows().nuses(cut).unwrap(), 1);
    assert!(tree.contains(root));
    assert_eq!(tree.node(root).unwrap().n_children(), 1);

    assert!(matches!(
        tree.free_node(b, &mut lp),
        Err(BnbError::StaleHandle { .. })
    ));
}

#[test]
fn test_subroot_cuts_replay_chain() {
    let mut lp = Lp::new();
    let mut tree = Tree::new(TreeSettings::default());
    let state = lp.capture_state();

    let root = tree.create_root(state, &mut lp).unwrap();
    tree.focus(root, &mut lp).unwrap();
    let r0 = make_row(&mut lp, "r0", 0);
    tree.add_row(root, r0, &mut lp).unwrap();
    tree.promote_solved(root, &mut lp).unwrap();

    let a = tree.create_leaf(root, state, &mut lp).unwrap();
    tree.focus(a, &mut lp).unwrap();
    let r1 = make_row(&mut lp, "r1", 1);
    tree.add_row(a, r1, &mut lp).unwrap();
    // The LP dropped the root row while solving A
    lp.remove_row(r0).unwrap();
    assert_eq!(tree.promote_solved(a, &mut lp).unwrap(), NodeType::Subroot);

    let b = tree.create_leaf(a, state, &mut lp).unwrap();
    assert_eq!(tree.lp_rows(b).unwrap(), vec![r1]);
    assert_eq!(tree.delta_chain(b).unwrap(), (1, 0));
    assert_eq!(tree.stats().subroots_created, 1);
    assert_eq!(tree.stats().forks_created, 2);
}

#[test]
fn test_leaves_keep_warm_start_basis() {
    let mut lp = Lp::new();
    let mut tree = Tree::new(TreeSettings::default());
    let root_state = lp.capture_state();
    let root = tree.create_root(root_state, &mut lp).unwrap();
    lp.release_state(root_state).unwrap();

    tree.focus(root, &mut lp).unwrap();
    lp.set_basis(LpState::new(
        vec![BasisStatus::Basic, BasisStatus::Upper],
        vec![BasisStatus::Lower],
    ));
    tree.promote_solved(root, &mut lp).unwrap();
    // The root leaf held the last use of its basis
    assert!(!lp.states().contains(root_state));

    let state = lp.capture_state();
    let child = tree.create_leaf(root, state, &mut lp).unwrap();
    lp.release_state(state).unwrap();

    let warm = tree.node(child).unwrap().lp_state().unwrap();
    assert_eq!(lp.states().get(warm).unwrap().num_basic(), 1);
    assert_eq!(lp.states().nuses(warm).unwrap(), 1);

    tree.free_node(child, &mut lp).unwrap();
    assert!(lp.states().is_empty());
}
