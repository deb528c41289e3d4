use glam::Vec2;

use crate::connection::ConnectionId;
use crate::library::InputKind;
use common::id_type;

id_type!(BlockId);

/// A named input socket on a block. Value inputs carry a `ValueInput`
/// connection, statement inputs a `NextStatement` connection.
#[derive(Clone, Debug)]
pub struct InputSlot {
    pub name: String,
    pub kind: InputKind,
    pub connection: ConnectionId,
}

/// A block instance in the workspace arena.
///
/// The connection core only relies on the handful of flags and links below;
/// fields, rendering data and everything else a full editor hangs off a
/// block stay out of scope.
#[derive(Clone, Debug)]
pub struct Block {
    pub id: BlockId,
    /// Name of the `BlockDef` this block was instantiated from.
    pub def: String,

    pub parent: Option<BlockId>,
    /// Top-left corner, in workspace units.
    pub position: Vec2,

    /// Auto-generated placeholder filling an otherwise-empty slot.
    pub shadow: bool,
    pub movable: bool,
    /// Transient preview block shown during a drag; never user content.
    pub insertion_marker: bool,
    /// Blocks in a flyout palette are excluded from spatial tracking.
    pub in_flyout: bool,

    pub disposing: bool,
    pub disposed: bool,

    pub output: Option<ConnectionId>,
    pub previous: Option<ConnectionId>,
    pub next: Option<ConnectionId>,
    pub inputs: Vec<InputSlot>,

    /// Editable field values, keyed by field name.
    pub fields: hashbrown::HashMap<String, String>,
}

impl Block {
    pub fn input(&self, name: &str) -> Option<&InputSlot> {
        self.inputs.iter().find(|slot| slot.name == name)
    }

    pub fn is_dead_or_dying(&self) -> bool {
        self.disposed || self.disposing
    }

    /// Every connection this block owns, superior and inferior alike.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids = vec![];
        if let Some(c) = self.output {
            ids.push(c);
        }
        if let Some(c) = self.previous {
            ids.push(c);
        }
        if let Some(c) = self.next {
            ids.push(c);
        }
        ids.extend(self.inputs.iter().map(|slot| slot.connection));
        ids
    }

    /// The connections that hang child blocks off this one.
    pub fn superior_connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.inputs.iter().map(|slot| slot.connection).collect();
        if let Some(c) = self.next {
            ids.push(c);
        }
        ids
    }
}
