use orgchart_core::{
    CascadePolicy, CycleGuard, EditError, EmployeeRecord, Forest, HierarchyBuilder, MoveRequest,
    NewNodeAssignment, NodeAttributes, PendingChangeTracker, RelationshipChange, TreeMutator,
    VisibilityState,
};
use uuid::Uuid;

/// A -> B -> C plus a second root D.
struct Chart {
    a: Uuid,
    b: Uuid,
    c: Uuid,
    d: Uuid,
    forest: Forest,
}

fn chart() -> Chart {
    let a = EmployeeRecord::new(None).named("Ada", "Lovelace");
    let b = EmployeeRecord::new(Some(a.id)).named("Bob", "Kahn");
    let c = EmployeeRecord::new(Some(b.id)).named("Cleo", "Moss");
    let d = EmployeeRecord::new(None).named("Dan", "Ingalls");
    let forest = HierarchyBuilder::build(&[a.clone(), b.clone(), c.clone(), d.clone()]).forest;
    Chart {
        a: a.id,
        b: b.id,
        c: c.id,
        d: d.id,
        forest,
    }
}

#[test]
fn guard_rejects_moving_ancestor_under_descendant() {
    let chart = chart();

    assert!(CycleGuard::would_create_cycle(&chart.forest, chart.a, chart.c));
    assert!(!CycleGuard::would_create_cycle(&chart.forest, chart.c, chart.a));
}

#[test]
fn rejected_move_leaves_no_trace() {
    let mut chart = chart();
    let before = chart.forest.relationships();
    let mut pending = PendingChangeTracker::new();

    let err = TreeMutator::new(&mut chart.forest, &mut pending)
        .move_node(chart.a, Some(chart.c))
        .unwrap_err();

    assert_eq!(
        err,
        EditError::CycleDetected {
            node_id: chart.a,
            parent_id: chart.c
        }
    );
    assert_eq!(chart.forest.relationships(), before);
    assert!(!pending.has_changes());
}

#[test]
fn self_move_is_rejected() {
    let mut chart = chart();
    let mut pending = PendingChangeTracker::new();

    let err = TreeMutator::new(&mut chart.forest, &mut pending)
        .move_node(chart.b, Some(chart.b))
        .unwrap_err();
    assert_eq!(err, EditError::SelfManagement(chart.b));
}

#[test]
fn forest_stays_acyclic_across_guarded_moves() {
    let mut chart = chart();
    let mut pending = PendingChangeTracker::new();
    let ids = [chart.a, chart.b, chart.c, chart.d];

    // Try every ordered pair; the guard must keep the forest well formed.
    for moving in ids {
        for target in ids {
            let _ = TreeMutator::new(&mut chart.forest, &mut pending)
                .apply(MoveRequest::new(moving, Some(target)));
            assert!(CycleGuard::is_acyclic(&chart.forest));
            assert_eq!(chart.forest.len(), 4);
        }
    }
}

#[test]
fn last_recorded_manager_wins() {
    let mut tracker = PendingChangeTracker::new();
    let x = Uuid::new_v4();
    let m1 = Uuid::new_v4();
    let m2 = Uuid::new_v4();

    tracker.record_change(x, Some(m1));
    tracker.record_change(x, Some(m2));

    assert_eq!(tracker.diff(), vec![RelationshipChange::new(x, Some(m2))]);
}

#[test]
fn moving_back_to_original_manager_empties_diff() {
    let mut chart = chart();
    let mut pending = PendingChangeTracker::new();
    let mut mutator = TreeMutator::new(&mut chart.forest, &mut pending);

    mutator.move_node(chart.c, Some(chart.d)).unwrap();
    mutator.move_node(chart.c, None).unwrap();
    mutator.move_node(chart.c, Some(chart.b)).unwrap();

    assert!(!pending.has_changes());
    assert_eq!(chart.forest.children_of(chart.b), &[chart.c]);
}

#[test]
fn promote_children_reattaches_reports_to_grandparent() {
    let mut chart = chart();
    let mut pending = PendingChangeTracker::new();

    TreeMutator::new(&mut chart.forest, &mut pending)
        .remove_node(chart.b, CascadePolicy::PromoteChildren)
        .unwrap();

    assert!(!chart.forest.contains(chart.b));
    assert_eq!(chart.forest.get(chart.c).unwrap().manager_id, Some(chart.a));
    assert_eq!(chart.forest.children_of(chart.a), &[chart.c]);
    assert_eq!(
        pending.diff(),
        vec![RelationshipChange::new(chart.c, Some(chart.a))]
    );
}

#[test]
fn promoting_reports_of_a_root_makes_them_roots() {
    let mut chart = chart();
    let mut pending = PendingChangeTracker::new();

    TreeMutator::new(&mut chart.forest, &mut pending)
        .remove_node(chart.a, CascadePolicy::PromoteChildren)
        .unwrap();

    assert!(chart.forest.is_root(chart.b));
    assert_eq!(pending.diff(), vec![RelationshipChange::new(chart.b, None)]);
}

#[test]
fn remove_subtree_drops_descendants_and_their_pending_changes() {
    let mut chart = chart();
    let mut pending = PendingChangeTracker::new();
    let mut mutator = TreeMutator::new(&mut chart.forest, &mut pending);

    mutator.move_node(chart.c, Some(chart.d)).unwrap();
    mutator.move_node(chart.c, Some(chart.b)).unwrap();
    mutator.move_node(chart.d, Some(chart.c)).unwrap();
    mutator
        .remove_node(chart.b, CascadePolicy::RemoveSubtree)
        .unwrap();

    assert_eq!(chart.forest.len(), 1);
    assert_eq!(chart.forest.roots(), &[chart.a]);
    assert!(!pending.has_changes());
}

#[test]
fn added_node_is_local_unless_recorded() {
    let mut chart = chart();
    let mut pending = PendingChangeTracker::new();
    let mut mutator = TreeMutator::new(&mut chart.forest, &mut pending);

    let local = mutator
        .add_node(chart.a, NodeAttributes::default(), NewNodeAssignment::LocalOnly)
        .unwrap();
    let hired = mutator
        .add_node(
            chart.a,
            NodeAttributes::new("New Hire", "Engineer", "R&D"),
            NewNodeAssignment::RecordPending,
        )
        .unwrap();

    assert_eq!(chart.forest.get(local.id).unwrap().manager_id, Some(chart.a));
    assert_eq!(
        pending.diff(),
        vec![RelationshipChange::new(hired.id, Some(chart.a))]
    );
    assert_eq!(
        pending.manager_for(hired.id),
        Some(Some(chart.a))
    );
}

#[test]
fn add_under_unknown_parent_fails() {
    let mut chart = chart();
    let mut pending = PendingChangeTracker::new();
    let missing = Uuid::new_v4();

    let err = TreeMutator::new(&mut chart.forest, &mut pending)
        .add_node(missing, NodeAttributes::default(), NewNodeAssignment::LocalOnly)
        .unwrap_err();
    assert_eq!(err, EditError::ParentNotFound(missing));
    assert_eq!(chart.forest.len(), 4);
}

#[test]
fn collapse_state_is_independent_per_node() {
    let chart = chart();
    let mut visibility = VisibilityState::new();

    visibility.toggle_collapse(chart.b);
    visibility.toggle_collapse(chart.a);
    visibility.toggle_collapse(chart.a);

    assert!(!visibility.is_collapsed(chart.a));
    assert!(visibility.is_collapsed(chart.b));

    let rows: Vec<_> = visibility
        .visible_rows(&chart.forest)
        .into_iter()
        .map(|row| row.id)
        .collect();
    assert!(rows.contains(&chart.b));
    assert!(!rows.contains(&chart.c));
}

#[test]
fn promoting_reports_of_a_dangling_node_makes_them_roots() {
    let missing = Uuid::new_v4();
    let orphan = EmployeeRecord::new(Some(missing));
    let report = EmployeeRecord::new(Some(orphan.id));
    let mut forest = HierarchyBuilder::build(&[orphan.clone(), report.clone()]).forest;
    let mut pending = PendingChangeTracker::new();

    TreeMutator::new(&mut forest, &mut pending)
        .remove_node(orphan.id, CascadePolicy::PromoteChildren)
        .unwrap();

    assert!(forest.is_root(report.id));
    assert_eq!(forest.get(report.id).unwrap().manager_id, None);
    assert_eq!(pending.diff(), vec![RelationshipChange::new(report.id, None)]);
}
