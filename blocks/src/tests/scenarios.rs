//! End-to-end scenarios driving the workspace through whole gestures, plus
//! the structural invariants that must hold after any sequence of mutations.

use glam::Vec2;

use crate::checker::CheckReason;
use crate::drag::DragSession;
use crate::tests::support;
use crate::workspace::Workspace;

/// Reciprocity and kind-opposition over the whole arena.
fn assert_connection_invariants(ws: &Workspace) {
    for conn in ws.connections() {
        if let Some(target) = conn.target {
            let other = ws.conn(target);
            assert_eq!(other.target, Some(conn.id), "reciprocity broken at {}", conn.id);
            assert_eq!(other.kind, conn.kind.opposite());
            assert!(!conn.disposed && !other.disposed);
        }
    }
}

#[test]
fn statement_drop_within_radius() {
    let mut ws = support::workspace();
    let a = ws.create_block("statement_noop").unwrap();
    let b = ws.create_block("statement_noop").unwrap();
    ws.position_block(a, Vec2::new(0.0, 100.0));
    ws.position_block(b, Vec2::new(0.0, 104.0));

    let a_next = ws.blk(a).next.unwrap();
    let b_prev = ws.blk(b).previous.unwrap();

    let drag = DragSession::begin(&ws, b);
    assert_eq!(
        ws.can_connect_with_reason(b_prev, a_next, Some((&drag, 10.0))),
        CheckReason::CanConnect
    );

    assert!(ws.connect(a_next, b_prev));
    assert_eq!(ws.conn(a_next).target, Some(b_prev));
    assert_eq!(ws.conn(b_prev).target, Some(a_next));
    assert_eq!(ws.blk(b).parent, Some(a));
    assert_connection_invariants(&ws);
}

#[test]
fn displaced_value_with_no_home_ends_up_free() {
    let mut ws = support::workspace();
    let holder = ws.create_block("value_passthrough").unwrap();
    let old_child = ws.create_block("number").unwrap();
    let new_child = ws.create_block("number").unwrap();

    let input = ws.blk(holder).input("CHILD").unwrap().connection;
    let old_output = ws.blk(old_child).output.unwrap();
    assert!(ws.connect(input, old_output));

    // The replacement has no inputs of its own, so the orphan has nowhere
    // to go and is left detached. No panic, no stale links.
    assert!(ws.connect(input, ws.blk(new_child).output.unwrap()));
    assert_eq!(ws.conn(old_output).target, None);
    assert_eq!(ws.blk(old_child).parent, None);
    assert_eq!(ws.input_target_block(holder, "CHILD"), Some(new_child));
    assert_connection_invariants(&ws);
}

#[test]
fn disconnect_reconnect_round_trip() {
    let mut ws = support::workspace();
    let holder = ws.create_block("value_passthrough").unwrap();
    let child = ws.create_block("number").unwrap();
    let input = ws.blk(holder).input("CHILD").unwrap().connection;
    let output = ws.blk(child).output.unwrap();

    assert!(ws.connect(input, output));
    let parent_before = ws.blk(child).parent;

    ws.disconnect(input).unwrap();
    assert_eq!(ws.conn(input).target, None);
    assert_eq!(ws.blk(child).parent, None);

    assert!(ws.connect(input, output));
    assert_eq!(ws.conn(input).target, Some(output));
    assert_eq!(ws.conn(output).target, Some(input));
    assert_eq!(ws.blk(child).parent, parent_before);
    assert_connection_invariants(&ws);
}

#[test]
fn terminal_block_cannot_splice_into_stack() {
    let mut ws = support::workspace();
    let top = ws.create_block("statement_noop").unwrap();
    let bottom = ws.create_block("statement_noop").unwrap();
    support::stack(&mut ws, top, bottom);
    ws.position_block(top, Vec2::ZERO);

    let terminal = ws.create_block("statement_terminal").unwrap();
    ws.position_block(terminal, Vec2::new(1.0, 1.0));
    let term_prev = ws.blk(terminal).previous.unwrap();
    let top_next = ws.blk(top).next.unwrap();

    // Without a next connection of its own, the terminal block has nowhere
    // to put the displaced tail, so a filled slot refuses it.
    let drag = DragSession::begin(&ws, terminal);
    assert_eq!(
        ws.can_connect_with_reason(term_prev, top_next, Some((&drag, 100.0))),
        CheckReason::DragChecksFailed
    );

    // The open end of the stack takes it fine.
    let bottom_next = ws.blk(bottom).next.unwrap();
    assert_eq!(
        ws.can_connect_with_reason(term_prev, bottom_next, Some((&drag, 100.0))),
        CheckReason::CanConnect
    );

    // A regular statement block may splice into the same filled slot.
    let regular = ws.create_block("statement_noop").unwrap();
    ws.position_block(regular, Vec2::new(1.0, 1.0));
    let drag = DragSession::begin(&ws, regular);
    assert_eq!(
        ws.can_connect_with_reason(
            ws.blk(regular).previous.unwrap(),
            top_next,
            Some((&drag, 100.0))
        ),
        CheckReason::CanConnect
    );
}

#[test]
fn insertion_marker_at_stack_top_is_displaceable() {
    let mut ws = support::workspace();
    let marker = ws.create_block("statement_noop").unwrap();
    ws.blk_mut(marker).insertion_marker = true;
    let below = ws.create_block("statement_noop").unwrap();
    support::stack(&mut ws, marker, below);
    ws.position_block(marker, Vec2::ZERO);

    let dragged = ws.create_block("statement_noop").unwrap();
    ws.position_block(dragged, Vec2::new(1.0, 1.0));
    let drag = DragSession::begin(&ws, dragged);

    // The marker sits at the top of the stack, so the dragged block may
    // take over the previous connection it currently holds.
    assert_eq!(
        ws.can_connect_with_reason(
            ws.blk(dragged).next.unwrap(),
            ws.blk(below).previous.unwrap(),
            Some((&drag, 100.0))
        ),
        CheckReason::CanConnect
    );

    // With a real block in the marker's place the same drop is refused.
    ws.blk_mut(marker).insertion_marker = false;
    assert_eq!(
        ws.can_connect_with_reason(
            ws.blk(dragged).next.unwrap(),
            ws.blk(below).previous.unwrap(),
            Some((&drag, 100.0))
        ),
        CheckReason::DragChecksFailed
    );
}

#[test]
fn full_drag_gesture_displaces_and_rehomes() {
    let mut ws = support::workspace();
    let holder = ws.create_block("value_passthrough").unwrap();
    let old_child = ws.create_block("value_passthrough").unwrap();
    let dragged = ws.create_block("value_passthrough").unwrap();

    // Spread the dragged block's own socket away from its output plug so
    // the drop target is unambiguous.
    let dragged_input = ws.blk(dragged).input("CHILD").unwrap().connection;
    ws.conn_mut(dragged_input).offset_in_block = Vec2::new(0.0, 50.0);

    ws.position_block(holder, Vec2::ZERO);
    ws.position_block(old_child, Vec2::new(40.0, 40.0));
    ws.position_block(dragged, Vec2::new(300.0, 0.0));

    let input = ws.blk(holder).input("CHILD").unwrap().connection;
    assert!(ws.connect(input, ws.blk(old_child).output.unwrap()));

    let mut drag = DragSession::begin(&ws, dragged);
    drag.update(&ws, Vec2::new(-295.0, 0.0));
    let candidate = drag.candidate().unwrap();
    assert_eq!(candidate.closest, input);

    assert!(drag.finish(&mut ws));
    // The dragged block took the slot and the old occupant slid into its
    // free input.
    assert_eq!(ws.input_target_block(holder, "CHILD"), Some(dragged));
    assert_eq!(ws.input_target_block(dragged, "CHILD"), Some(old_child));
    assert_connection_invariants(&ws);
}

#[test]
fn invariants_hold_after_mixed_mutations() {
    let mut ws = support::workspace();
    let s1 = ws.create_block("statement_noop").unwrap();
    let s2 = ws.create_block("statement_noop").unwrap();
    let s3 = ws.create_block("statement_noop").unwrap();
    let holder = ws.create_block("value_passthrough").unwrap();
    let number = ws.create_block("number").unwrap();

    support::stack(&mut ws, s1, s2);
    support::stack(&mut ws, s2, s3);
    let input = ws.blk(holder).input("CHILD").unwrap().connection;
    assert!(ws.connect(input, ws.blk(number).output.unwrap()));
    assert_connection_invariants(&ws);

    ws.unplug(s2, true);
    assert_connection_invariants(&ws);

    ws.dispose_block(s3, false);
    assert_connection_invariants(&ws);

    ws.set_check(input, Some(vec!["String".to_string()]));
    assert_connection_invariants(&ws);

    ws.dispose_block(holder, false);
    assert_connection_invariants(&ws);
}
