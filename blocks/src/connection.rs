use glam::Vec2;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::block::BlockId;
use crate::state::BlockState;
use crate::workspace::WorkspaceId;
use common::id_type;

id_type!(ConnectionId);

/// The four kinds of attachment points a block can carry.
///
/// `ValueInput` and `NextStatement` sit on the parent side of a joined pair,
/// `ValueOutput` and `PreviousStatement` on the child side.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, Serialize, Deserialize)]
pub enum ConnectionKind {
    ValueInput,
    ValueOutput,
    NextStatement,
    PreviousStatement,
}

impl ConnectionKind {
    pub const ALL: [ConnectionKind; 4] = [
        ConnectionKind::ValueInput,
        ConnectionKind::ValueOutput,
        ConnectionKind::NextStatement,
        ConnectionKind::PreviousStatement,
    ];

    /// The only kind this kind may connect to.
    pub fn opposite(self) -> ConnectionKind {
        match self {
            ConnectionKind::ValueInput => ConnectionKind::ValueOutput,
            ConnectionKind::ValueOutput => ConnectionKind::ValueInput,
            ConnectionKind::NextStatement => ConnectionKind::PreviousStatement,
            ConnectionKind::PreviousStatement => ConnectionKind::NextStatement,
        }
    }

    /// True for connections that sit on the parent block of a joined pair.
    pub fn is_superior(self) -> bool {
        matches!(
            self,
            ConnectionKind::ValueInput | ConnectionKind::NextStatement
        )
    }

    pub fn index(self) -> usize {
        match self {
            ConnectionKind::ValueInput => 0,
            ConnectionKind::ValueOutput => 1,
            ConnectionKind::NextStatement => 2,
            ConnectionKind::PreviousStatement => 3,
        }
    }
}

/// Whether a connection participates in the spatial index.
///
/// `WillTrack` means the connection enters the database on its first
/// `move_to`. `Untracked` means it stays out until tracking is explicitly
/// re-enabled (hidden or collapsed blocks). `Tracked` means it currently has
/// exactly one database entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TrackedState {
    #[default]
    WillTrack,
    Untracked,
    Tracked,
}

/// A typed attachment point owned by exactly one block.
///
/// Reciprocity invariant: if `a.target == Some(b.id)` then
/// `b.target == Some(a.id)`. All mutations that touch `target` go through
/// `Workspace` methods, which keep the invariant and the spatial index in
/// sync.
#[derive(Clone, Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub block: BlockId,
    pub workspace: WorkspaceId,
    pub kind: ConnectionKind,

    /// Absolute position in workspace units.
    pub position: Vec2,
    /// Position relative to the owning block's top-left corner.
    pub offset_in_block: Vec2,

    /// Compatibility tags. `None` accepts anything.
    pub check: Option<Vec<String>>,
    pub target: Option<ConnectionId>,
    /// Serialized placeholder block spawned when this connection is vacated.
    pub shadow: Option<BlockState>,

    pub disposed: bool,
    pub tracked: TrackedState,
}

impl Connection {
    pub fn new(workspace: WorkspaceId, block: BlockId, kind: ConnectionKind) -> Connection {
        Connection {
            id: ConnectionId::unique(),
            block,
            workspace,
            kind,
            position: Vec2::ZERO,
            offset_in_block: Vec2::ZERO,
            check: None,
            target: None,
            shadow: None,
            disposed: false,
            tracked: TrackedState::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_superior(&self) -> bool {
        self.kind.is_superior()
    }

    pub fn distance_from(&self, other: &Connection) -> f32 {
        self.position.distance(other.position)
    }

    /// True if the two check lists share at least one tag, or either side
    /// accepts anything.
    pub fn checks_intersect(&self, other: &Connection) -> bool {
        let (Some(own), Some(theirs)) = (&self.check, &other.check) else {
            return true;
        };
        own.iter().any(|tag| theirs.contains(tag))
    }
}
