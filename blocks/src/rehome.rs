//! Orphan re-homing.
//!
//! When `connect` reuses an occupied superior connection, the displaced
//! subtree becomes an orphan and these functions look for a new legal home
//! for it. Absence of a home is an expected, silent outcome, never an error;
//! the caller leaves the orphan fully detached in that case.

use crate::block::BlockId;
use crate::connection::{ConnectionId, ConnectionKind};
use crate::workspace::Workspace;

/// Finds the connection (starting at `start_block`, the freshly connected
/// child) that will accept the orphaned connection, or `None`.
pub fn connection_for_orphaned_connection(
    ws: &Workspace,
    start_block: BlockId,
    orphan: ConnectionId,
) -> Option<ConnectionId> {
    let orphan_conn = ws.connection(orphan)?;
    if orphan_conn.kind == ConnectionKind::ValueOutput {
        return connection_for_orphaned_output(ws, start_block, orphan_conn.block);
    }

    // A displaced statement chain goes after the last block in the new
    // block's own stack, if the kinds' checks agree. Only the compatibility
    // tags are consulted here; the slot at the end of a stack is free by
    // construction.
    let last = ws.last_connection_in_stack(start_block, true)?;
    let last_conn = ws.connection(last)?;
    if orphan_conn.checks_intersect(last_conn) {
        Some(last)
    } else {
        None
    }
}

/// The single value input on `block` that accepts the orphan's output, if
/// there is exactly one. Zero or multiple compatible inputs (filled or not)
/// yield `None`.
fn single_accepting_input(
    ws: &Workspace,
    block: BlockId,
    orphan_block: BlockId,
) -> Option<ConnectionId> {
    let output = ws.block(orphan_block)?.output?;

    let mut found = None;
    for slot in &ws.block(block)?.inputs {
        if ws.can_connect(output, slot.connection) {
            if found.is_some() {
                return None; // More than one compatible input.
            }
            found = Some(slot.connection);
        }
    }
    found
}

/// Walks down a chain of value blocks looking for a slot for a displaced
/// expression. At each link there must be exactly one compatible input; a
/// slot occupied by a real block continues the walk into that block, a free
/// or shadow-filled slot is the home.
fn connection_for_orphaned_output(
    ws: &Workspace,
    start_block: BlockId,
    orphan_block: BlockId,
) -> Option<ConnectionId> {
    let mut block = start_block;
    loop {
        let connection = single_accepting_input(ws, block, orphan_block)?;
        match ws.target_block_of(connection) {
            Some(occupant) if !ws.blk(occupant).shadow => block = occupant,
            _ => return Some(connection),
        }
    }
}
