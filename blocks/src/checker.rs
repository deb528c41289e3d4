use strum_macros::Display;

use crate::connection::{Connection, ConnectionKind};
use crate::drag::DragSession;
use crate::workspace::Workspace;

/// Outcome of a compatibility check. Everything except `CanConnect` is a
/// specific rejection reason; rejections are ordinary results, not errors.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum CheckReason {
    CanConnect,
    SelfConnection,
    WrongKind,
    TargetNull,
    ChecksFailed,
    DifferentWorkspaces,
    ShadowParent,
    DragChecksFailed,
    PreviousAndOutput,
}

impl CheckReason {
    pub fn is_ok(self) -> bool {
        self == CheckReason::CanConnect
    }

    /// Developer-facing diagnostic, intended for logs rather than UI text.
    pub fn error_message(self) -> &'static str {
        match self {
            CheckReason::CanConnect => "Connection is allowed.",
            CheckReason::SelfConnection => "Attempted to connect a block to itself.",
            CheckReason::WrongKind => "Attempt to connect incompatible types.",
            CheckReason::TargetNull => "Target connection is null.",
            CheckReason::ChecksFailed => "Connection checks failed.",
            CheckReason::DifferentWorkspaces => "Blocks not on same workspace.",
            CheckReason::ShadowParent => "Connecting non-shadow to shadow block.",
            CheckReason::DragChecksFailed => "Drag checks failed.",
            CheckReason::PreviousAndOutput => {
                "Block would have an output and a previous connection."
            }
        }
    }
}

/// Decides whether two connections may legally join. Implementations must be
/// pure functions of their arguments; per-workspace state belongs on the
/// workspace, per-gesture state in the `DragSession`.
///
/// The three layers are composed by `can_connect_with_reason`:
/// safety → kind → (while dragging) drag policy, short-circuiting on the
/// first failure.
pub trait ConnectionChecker: Send + Sync {
    /// Non-negotiable structural invariants.
    fn safety_checks(
        &self,
        ws: &Workspace,
        a: Option<&Connection>,
        b: Option<&Connection>,
    ) -> CheckReason;

    /// Compatibility-tag intersection.
    fn kind_checks(&self, a: &Connection, b: &Connection) -> bool;

    /// Policy applied only while the user is actively dragging; `b` is the
    /// stationary candidate, `a` the dragged connection.
    fn drag_checks(
        &self,
        ws: &Workspace,
        a: &Connection,
        b: &Connection,
        drag: &DragSession,
        max_radius: f32,
    ) -> bool;

    fn can_connect_with_reason(
        &self,
        ws: &Workspace,
        a: Option<&Connection>,
        b: Option<&Connection>,
        drag: Option<(&DragSession, f32)>,
    ) -> CheckReason {
        let safety = self.safety_checks(ws, a, b);
        if !safety.is_ok() {
            return safety;
        }
        let (Some(a), Some(b)) = (a, b) else {
            return CheckReason::TargetNull;
        };
        if !self.kind_checks(a, b) {
            return CheckReason::ChecksFailed;
        }
        if let Some((session, max_radius)) = drag {
            if !self.drag_checks(ws, a, b, session, max_radius) {
                return CheckReason::DragChecksFailed;
            }
        }
        CheckReason::CanConnect
    }

    fn can_connect(
        &self,
        ws: &Workspace,
        a: Option<&Connection>,
        b: Option<&Connection>,
        drag: Option<(&DragSession, f32)>,
    ) -> bool {
        self.can_connect_with_reason(ws, a, b, drag).is_ok()
    }
}

/// The stock rule set.
#[derive(Clone, Copy, Default, Debug)]
pub struct StandardChecker;

impl StandardChecker {
    fn is_shadow(ws: &Workspace, connection: &Connection) -> bool {
        ws.block(connection.block).map_or(false, |b| b.shadow)
    }

    /// An inferior block may not end up with both its output and its
    /// previous connection attached.
    fn previous_and_output_conflict(ws: &Workspace, inferior: &Connection) -> bool {
        let Some(block) = ws.block(inferior.block) else {
            return false;
        };
        match inferior.kind {
            ConnectionKind::PreviousStatement => block
                .output
                .map_or(false, |output| ws.conn(output).is_connected()),
            ConnectionKind::ValueOutput => block
                .previous
                .map_or(false, |previous| ws.conn(previous).is_connected()),
            _ => false,
        }
    }

    /// Whether the dragged connection `a` may take over the previous
    /// connection `b`. Only an insertion marker sitting at the very top of a
    /// stack may be displaced; a real block above the candidate never is.
    fn can_connect_to_previous(
        ws: &Workspace,
        a: &Connection,
        b: &Connection,
        drag: &DragSession,
    ) -> bool {
        if a.is_connected() {
            // A next connection never auto-disconnects mid-drag to make room.
            return false;
        }
        if drag.contains(b.id) {
            return false;
        }
        let Some(above) = ws.target_block_of(b.id) else {
            return true;
        };
        let above = ws.blk(above);
        if above.insertion_marker {
            above
                .previous
                .map_or(true, |previous| !ws.conn(previous).is_connected())
        } else {
            false
        }
    }
}

impl ConnectionChecker for StandardChecker {
    fn safety_checks(
        &self,
        ws: &Workspace,
        a: Option<&Connection>,
        b: Option<&Connection>,
    ) -> CheckReason {
        let (Some(a), Some(b)) = (a, b) else {
            return CheckReason::TargetNull;
        };
        let (superior, inferior) = if a.is_superior() { (a, b) } else { (b, a) };

        if a.block == b.block {
            CheckReason::SelfConnection
        } else if b.kind != a.kind.opposite() {
            CheckReason::WrongKind
        } else if a.workspace != b.workspace {
            CheckReason::DifferentWorkspaces
        } else if Self::is_shadow(ws, superior) && !Self::is_shadow(ws, inferior) {
            // Shadows may not parent real content.
            CheckReason::ShadowParent
        } else if Self::previous_and_output_conflict(ws, inferior) {
            CheckReason::PreviousAndOutput
        } else {
            CheckReason::CanConnect
        }
    }

    fn kind_checks(&self, a: &Connection, b: &Connection) -> bool {
        a.checks_intersect(b)
    }

    fn drag_checks(
        &self,
        ws: &Workspace,
        a: &Connection,
        b: &Connection,
        drag: &DragSession,
        max_radius: f32,
    ) -> bool {
        if (a.position + drag.delta).distance(b.position) > max_radius {
            return false;
        }
        let Some(candidate_block) = ws.block(b.block) else {
            return false;
        };
        if candidate_block.insertion_marker {
            return false;
        }

        match b.kind {
            ConnectionKind::PreviousStatement => {
                if !Self::can_connect_to_previous(ws, a, b, drag) {
                    return false;
                }
            }
            ConnectionKind::ValueOutput => {
                // An output plug does not steal an already-filled socket.
                let replacing_marker = ws
                    .target_block_of(b.id)
                    .map_or(false, |t| ws.blk(t).insertion_marker);
                if (b.is_connected() && !replacing_marker) || a.is_connected() {
                    return false;
                }
            }
            ConnectionKind::ValueInput => {
                // Splicing into an occupied input is fine unless the occupant
                // is pinned in place.
                if let Some(occupant) = ws.target_block_of(b.id) {
                    let occupant = ws.blk(occupant);
                    if !occupant.movable && !occupant.shadow {
                        return false;
                    }
                }
            }
            ConnectionKind::NextStatement => {
                if let Some(occupant_id) = ws.target_block_of(b.id) {
                    let occupant = ws.blk(occupant_id);
                    let dragged_has_next =
                        ws.block(a.block).map_or(false, |blk| blk.next.is_some());
                    // A block with no next connection of its own cannot bump
                    // a continuing stack out of the way: it has nowhere to
                    // put the occupant. Covering up a shadow is fine, and so
                    // is displacing a terminal occupant.
                    if !dragged_has_next && !occupant.shadow && occupant.next.is_some() {
                        return false;
                    }
                    if !occupant.movable && !occupant.shadow {
                        return false;
                    }
                }
            }
        }

        // A multi-block drag must not connect to itself.
        !drag.contains(b.id)
    }
}
