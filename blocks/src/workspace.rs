//! The block arena.
//!
//! Blocks and connections live in per-workspace maps and refer to each other
//! by id, so the parent/child web of a block program never holds direct
//! references. Every mutation of the connection graph goes through the
//! workspace, which is what keeps the reciprocity invariant, the spatial
//! index and the event log in agreement.

use glam::Vec2;
use hashbrown::HashMap;
use log::warn;

use crate::block::{Block, BlockId, InputSlot};
use crate::checker::{CheckReason, ConnectionChecker};
use crate::connection::{Connection, ConnectionId, ConnectionKind, TrackedState};
use crate::db::{Closest, ConnectionDbSet};
use crate::drag::DragSession;
use crate::events::{EventKind, EventLog};
use crate::library::{BlockLibrary, InputKind};
use crate::registry;
use crate::rehome;
use crate::state::{self, BlockState, MaterializeOptions};
use common::id_type;

id_type!(WorkspaceId);

pub struct Workspace {
    pub id: WorkspaceId,
    pub library: BlockLibrary,
    pub events: EventLog,

    blocks: HashMap<BlockId, Block>,
    connections: HashMap<ConnectionId, Connection>,
    dbs: ConnectionDbSet,
    checker: Box<dyn ConnectionChecker>,
}

impl Default for Workspace {
    fn default() -> Workspace {
        Workspace::new(BlockLibrary::default())
    }
}

impl Workspace {
    pub fn new(library: BlockLibrary) -> Workspace {
        Workspace {
            id: WorkspaceId::unique(),
            library,
            events: EventLog::new(),
            blocks: HashMap::new(),
            connections: HashMap::new(),
            dbs: ConnectionDbSet::new(),
            checker: registry::default_checker(),
        }
    }

    /// Swaps in the named checker from the registry. Returns false and keeps
    /// the current checker if the name is unknown.
    pub fn set_checker(&mut self, name: &str) -> bool {
        match registry::create_checker(name) {
            Some(checker) => {
                self.checker = checker;
                true
            }
            None => false,
        }
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn blk(&self, id: BlockId) -> &Block {
        self.blocks
            .get(&id)
            .unwrap_or_else(|| panic!("Block not found: {}", id))
    }
    pub fn blk_mut(&mut self, id: BlockId) -> &mut Block {
        self.blocks
            .get_mut(&id)
            .unwrap_or_else(|| panic!("Block not found: {}", id))
    }
    pub fn conn(&self, id: ConnectionId) -> &Connection {
        self.connections
            .get(&id)
            .unwrap_or_else(|| panic!("Connection not found: {}", id))
    }
    pub fn conn_mut(&mut self, id: ConnectionId) -> &mut Connection {
        self.connections
            .get_mut(&id)
            .unwrap_or_else(|| panic!("Connection not found: {}", id))
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Instantiates a block definition and fires a create event.
    pub fn create_block(&mut self, def_name: &str) -> anyhow::Result<BlockId> {
        let id = self.spawn_block(def_name, false)?;
        self.events.fire(EventKind::BlockCreate, id);
        Ok(id)
    }

    /// Instantiates a block definition without firing events; used for
    /// shadows and internal rebuilds.
    pub fn spawn_block(&mut self, def_name: &str, is_shadow: bool) -> anyhow::Result<BlockId> {
        let def = self
            .library
            .def_by_name(def_name)
            .ok_or_else(|| anyhow::anyhow!("Unknown block definition: {}", def_name))?
            .clone();

        let id = BlockId::unique();
        let mut block = Block {
            id,
            def: def.name.clone(),
            parent: None,
            position: Vec2::ZERO,
            shadow: is_shadow,
            movable: true,
            insertion_marker: false,
            in_flyout: false,
            disposing: false,
            disposed: false,
            output: None,
            previous: None,
            next: None,
            inputs: vec![],
            fields: hashbrown::HashMap::new(),
        };
        for field in &def.fields {
            block
                .fields
                .insert(field.name.clone(), field.default_value.clone());
        }

        if let Some(spec) = &def.output {
            block.output =
                Some(self.make_connection(id, ConnectionKind::ValueOutput, spec.check.clone()));
        }
        if let Some(spec) = &def.previous {
            block.previous = Some(self.make_connection(
                id,
                ConnectionKind::PreviousStatement,
                spec.check.clone(),
            ));
        }
        if let Some(spec) = &def.next {
            block.next =
                Some(self.make_connection(id, ConnectionKind::NextStatement, spec.check.clone()));
        }
        for input in &def.inputs {
            let kind = match input.kind {
                InputKind::Value => ConnectionKind::ValueInput,
                InputKind::Statement => ConnectionKind::NextStatement,
            };
            block.inputs.push(InputSlot {
                name: input.name.clone(),
                kind: input.kind,
                connection: self.make_connection(id, kind, input.check.clone()),
            });
        }

        self.blocks.insert(id, block);
        Ok(id)
    }

    fn make_connection(
        &mut self,
        block: BlockId,
        kind: ConnectionKind,
        check: Option<Vec<String>>,
    ) -> ConnectionId {
        let mut connection = Connection::new(self.id, block, kind);
        connection.check = check;
        let id = connection.id;
        self.connections.insert(id, connection);
        id
    }

    //
    // Queries.
    //

    /// The block attached on the far side of a connection, if any.
    pub fn target_block_of(&self, connection: ConnectionId) -> Option<BlockId> {
        let target = self.connection(connection)?.target?;
        Some(self.conn(target).block)
    }

    pub fn input_target_block(&self, block: BlockId, input_name: &str) -> Option<BlockId> {
        let slot = self.blk(block).input(input_name)?;
        self.target_block_of(slot.connection)
    }

    /// `block` and every block attached below it, depth first.
    pub fn descendants(&self, block: BlockId) -> Vec<BlockId> {
        let mut result = vec![block];
        for connection in self.blk(block).superior_connection_ids() {
            if let Some(child) = self.target_block_of(connection) {
                result.extend(self.descendants(child));
            }
        }
        result
    }

    pub fn root_block(&self, block: BlockId) -> BlockId {
        let mut current = block;
        while let Some(parent) = self.blk(current).parent {
            current = parent;
        }
        current
    }

    /// The open next connection at the bottom of the stack starting at
    /// `block`, or `None` if the stack ends in a block without one. With
    /// `ignore_shadows` a trailing shadow does not count as occupying the
    /// slot.
    pub fn last_connection_in_stack(
        &self,
        block: BlockId,
        ignore_shadows: bool,
    ) -> Option<ConnectionId> {
        let mut next = self.blk(block).next;
        while let Some(connection) = next {
            match self.target_block_of(connection) {
                None => return Some(connection),
                Some(child) if ignore_shadows && self.blk(child).shadow => {
                    return Some(connection);
                }
                Some(child) => next = self.blk(child).next,
            }
        }
        None
    }

    //
    // Compatibility checks.
    //

    pub fn can_connect(&self, a: ConnectionId, b: ConnectionId) -> bool {
        self.can_connect_with_reason(a, b, None).is_ok()
    }

    pub fn can_connect_with_reason(
        &self,
        a: ConnectionId,
        b: ConnectionId,
        drag: Option<(&DragSession, f32)>,
    ) -> CheckReason {
        let a = self.live_connection(a);
        let b = self.live_connection(b);
        self.checker.can_connect_with_reason(self, a, b, drag)
    }

    /// Resolves an id to a usable connection; nil, unknown and disposed ids
    /// all count as absent.
    fn live_connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id).filter(|c| !c.disposed)
    }

    //
    // Spatial queries.
    //

    /// Closest legal stationary counterpart for a dragged connection, probed
    /// at its current drag position.
    pub fn search_for_closest(
        &self,
        connection: ConnectionId,
        max_radius: f32,
        drag: &DragSession,
    ) -> Closest {
        let conn = self.conn(connection);
        let db = self.dbs.get(conn.kind.opposite());
        db.search_for_closest(conn.position + drag.delta, max_radius, |candidate, radius| {
            self.checker.can_connect(
                self,
                Some(conn),
                self.live_connection(candidate),
                Some((drag, radius)),
            )
        })
    }

    /// All opposite-kind connections within `max_radius`, legal or not.
    pub fn neighbours(&self, connection: ConnectionId, max_radius: f32) -> Vec<ConnectionId> {
        let conn = self.conn(connection);
        self.dbs
            .get(conn.kind.opposite())
            .get_neighbours(conn.position, max_radius)
    }

    //
    // Geometry and tracking.
    //

    /// Moves a connection, keeping its database entry in step. The first
    /// move of a `WillTrack` connection is what inserts it into the index;
    /// connections on flyout palette blocks never enter it.
    pub fn move_to(&mut self, connection: ConnectionId, position: Vec2) {
        let conn = self.conn(connection);
        let (block, kind, old_y, tracked) = (conn.block, conn.kind, conn.position.y, conn.tracked);

        match tracked {
            TrackedState::WillTrack => {
                if self.blk(block).in_flyout {
                    self.conn_mut(connection).tracked = TrackedState::Untracked;
                } else {
                    self.dbs.get_mut(kind).add_connection(connection, position);
                    self.conn_mut(connection).tracked = TrackedState::Tracked;
                }
            }
            TrackedState::Tracked => {
                let db = self.dbs.get_mut(kind);
                db.remove_connection(connection, old_y);
                db.add_connection(connection, position);
            }
            TrackedState::Untracked => {}
        }
        self.conn_mut(connection).position = position;
    }

    pub fn move_by(&mut self, connection: ConnectionId, delta: Vec2) {
        let position = self.conn(connection).position + delta;
        self.move_to(connection, position);
    }

    pub fn set_tracking(&mut self, connection: ConnectionId, track: bool) {
        let conn = self.conn(connection);
        let (block, kind, y, pos, tracked) =
            (conn.block, conn.kind, conn.position.y, conn.position, conn.tracked);

        if track {
            if self.blk(block).in_flyout {
                return;
            }
            if tracked != TrackedState::Tracked {
                self.dbs.get_mut(kind).add_connection(connection, pos);
                self.conn_mut(connection).tracked = TrackedState::Tracked;
            }
        } else {
            if tracked == TrackedState::Tracked {
                self.dbs.get_mut(kind).remove_connection(connection, y);
            }
            self.conn_mut(connection).tracked = TrackedState::Untracked;
        }
    }

    /// Pulls a whole subtree out of the spatial index, e.g. when its root is
    /// collapsed or hidden.
    pub fn stop_tracking_all(&mut self, block: BlockId) {
        for descendant in self.descendants(block) {
            for connection in self.blk(descendant).connection_ids() {
                self.set_tracking(connection, false);
            }
        }
    }

    pub fn start_tracking_all(&mut self, block: BlockId) {
        for descendant in self.descendants(block) {
            for connection in self.blk(descendant).connection_ids() {
                self.set_tracking(connection, true);
            }
        }
    }

    pub fn position_block(&mut self, block: BlockId, position: Vec2) {
        let delta = position - self.blk(block).position;
        self.move_block_by(block, delta);
    }

    /// Translates a block and its whole subtree, connections included.
    pub fn move_block_by(&mut self, block: BlockId, delta: Vec2) {
        for descendant in self.descendants(block) {
            self.blk_mut(descendant).position += delta;
            let block_position = self.blk(descendant).position;
            for connection in self.blk(descendant).connection_ids() {
                let offset = self.conn(connection).offset_in_block;
                self.move_to(connection, block_position + offset);
            }
        }
    }

    //
    // Connecting and disconnecting.
    //

    /// Joins two connections. Connecting an already-joined pair is a no-op
    /// returning true; an illegal pair is refused with a log entry and
    /// returns false.
    pub fn connect(&mut self, a: ConnectionId, b: ConnectionId) -> bool {
        if let Some(conn) = self.connection(a) {
            if conn.target == Some(b) {
                return true;
            }
        }
        let reason = self.can_connect_with_reason(a, b, None);
        if !reason.is_ok() {
            warn!("Refused to connect {} to {}: {}", a, b, reason.error_message());
            return false;
        }

        let (superior, inferior) = if self.conn(a).is_superior() {
            (a, b)
        } else {
            (b, a)
        };

        let opened = self.events.begin_group();
        self.connect_internal(superior, inferior);
        if opened {
            self.events.end_group();
        }
        true
    }

    fn connect_internal(&mut self, superior: ConnectionId, inferior: ConnectionId) {
        // Free the child side.
        if self.conn(inferior).is_connected() {
            self.disconnect(inferior)
                .expect("Connected inferior must disconnect cleanly");
        }

        // Free the parent side. A shadow occupant is simply disposed; a real
        // block becomes an orphan to re-home below. The shadow template is
        // stashed so the disconnect does not respawn it into the slot we are
        // about to fill.
        let mut orphan = None;
        if self.conn(superior).is_connected() {
            let stashed = self.stash_shadow(superior);
            let target = self
                .target_block_of(superior)
                .expect("Connected superior must have a target block");
            if self.blk(target).shadow {
                self.dispose_block(target, false);
            } else {
                self.disconnect(superior)
                    .expect("Connected superior must disconnect cleanly");
                orphan = Some(target);
            }
            self.conn_mut(superior).shadow = stashed;
        }

        let parent = self.conn(superior).block;
        let child = self.conn(inferior).block;
        let old_parent = self.blk(child).parent;
        self.conn_mut(superior).target = Some(inferior);
        self.conn_mut(inferior).target = Some(superior);
        self.set_parent(child, Some(parent));
        self.events.fire(
            EventKind::BlockMove {
                old_parent,
                new_parent: Some(parent),
            },
            child,
        );

        if let Some(orphan_block) = orphan {
            let orphan_connection = match self.conn(superior).kind {
                ConnectionKind::ValueInput => self.blk(orphan_block).output,
                _ => self.blk(orphan_block).previous,
            }
            .expect("Orphan was attached through a connection it no longer has");

            match rehome::connection_for_orphaned_connection(self, child, orphan_connection) {
                Some(home) => {
                    self.connect(home, orphan_connection);
                }
                None => self.on_failed_connect(orphan_connection, superior),
            }
        }
    }

    /// A displaced block that found no new home is nudged aside so it does
    /// not visually overlap its former parent.
    fn on_failed_connect(&mut self, orphan: ConnectionId, former_parent: ConnectionId) {
        warn!("No home for displaced block; bumping {} away", orphan);
        crate::drag::bump_away_from(self, orphan, former_parent);
    }

    /// Severs a joined pair. Errors on a connection that is not connected,
    /// or whose partner does not point back; either means the caller's
    /// bookkeeping is out of date.
    pub fn disconnect(&mut self, connection: ConnectionId) -> anyhow::Result<()> {
        let target = self
            .conn(connection)
            .target
            .ok_or_else(|| anyhow::Error::msg("Source connection not connected."))?;
        if self.conn(target).target != Some(connection) {
            return Err(anyhow::Error::msg(
                "Target connection not connected to source connection.",
            ));
        }

        let (superior, inferior) = if self.conn(connection).is_superior() {
            (connection, target)
        } else {
            (target, connection)
        };

        let opened = self.events.begin_group();
        let child = self.conn(inferior).block;
        let old_parent = self.blk(child).parent;

        self.conn_mut(superior).target = None;
        self.conn_mut(inferior).target = None;
        self.set_parent(child, None);
        self.events.fire(
            EventKind::BlockMove {
                old_parent,
                new_parent: None,
            },
            child,
        );

        // A vacated slot gets its shadow back, unless the departing block
        // was itself that shadow.
        if !self.blk(child).shadow {
            self.respawn_shadow(superior);
        }

        if opened {
            self.events.end_group();
        }
        Ok(())
    }

    fn set_parent(&mut self, child: BlockId, parent: Option<BlockId>) {
        self.blk_mut(child).parent = parent;
    }

    /// Detaches a block from its surroundings. With `heal_stack`, a block
    /// pulled out of the middle of a statement stack reconnects its former
    /// neighbours to each other.
    pub fn unplug(&mut self, block: BlockId, heal_stack: bool) {
        if let Some(output) = self.blk(block).output {
            if self.conn(output).is_connected() {
                self.disconnect(output)
                    .expect("Connected output must disconnect cleanly");
            }
            return;
        }

        let mut prev_target = None;
        if let Some(previous) = self.blk(block).previous {
            prev_target = self.conn(previous).target;
            if prev_target.is_some() {
                self.disconnect(previous)
                    .expect("Connected previous must disconnect cleanly");
            }
        }

        if heal_stack {
            if let Some(next) = self.blk(block).next {
                if let Some(next_target) = self.conn(next).target {
                    self.disconnect(next)
                        .expect("Connected next must disconnect cleanly");
                    if let Some(prev_target) = prev_target {
                        self.connect(prev_target, next_target);
                    }
                }
            }
        }
    }

    /// Finds the named input on `block` and connects `child` to it,
    /// displacing whatever was there. Refuses if the child is attached to a
    /// different parent, or the input does not exist.
    pub fn reconnect(&mut self, child: ConnectionId, block: BlockId, input_name: &str) -> bool {
        if self.blk(self.conn(child).block).is_dead_or_dying() {
            return false;
        }
        let Some(parent_connection) = self.blk(block).input(input_name).map(|s| s.connection)
        else {
            return false;
        };
        let current_parent = self.target_block_of(child);
        if current_parent.is_some() && current_parent != Some(block) {
            return false;
        }
        if self.conn(parent_connection).target == Some(child) {
            return false;
        }
        if self.conn(parent_connection).is_connected() {
            self.disconnect(parent_connection)
                .expect("Connected input must disconnect cleanly");
        }
        self.connect(parent_connection, child)
    }

    //
    // Check lists.
    //

    /// Replaces a connection's compatibility tags. If the new tags rule out
    /// the currently attached pair, the inferior block is unplugged.
    pub fn set_check(&mut self, connection: ConnectionId, check: Option<Vec<String>>) {
        self.conn_mut(connection).check = check;

        if let Some(target) = self.conn(connection).target {
            let still_compatible = self
                .checker
                .kind_checks(self.conn(connection), self.conn(target));
            if !still_compatible {
                let inferior = if self.conn(connection).is_superior() {
                    target
                } else {
                    connection
                };
                let child = self.conn(inferior).block;
                self.unplug(child, false);
            }
        }
    }

    //
    // Shadows.
    //

    /// Installs (or clears) the shadow template of a connection. An attached
    /// shadow block is rebuilt from the new template immediately; a real
    /// attached block leaves the template dormant until the slot is vacated.
    pub fn set_shadow(&mut self, connection: ConnectionId, state: Option<BlockState>) {
        if let Some(target) = self.target_block_of(connection) {
            if self.blk(target).shadow {
                self.dispose_block(target, false);
            }
        }
        self.conn_mut(connection).shadow = state;
        self.respawn_shadow(connection);
    }

    /// The shadow template, or with `return_current` a fresh serialization
    /// of the attached shadow block so field edits survive.
    pub fn shadow_template(
        &self,
        connection: ConnectionId,
        return_current: bool,
    ) -> Option<BlockState> {
        if return_current {
            if let Some(target) = self.target_block_of(connection) {
                if self.blk(target).shadow {
                    return Some(state::save_block(self, target));
                }
            }
        }
        self.conn(connection).shadow.clone()
    }

    /// Takes the shadow template out of the connection, capturing the live
    /// shadow's current state if one is attached.
    fn stash_shadow(&mut self, connection: ConnectionId) -> Option<BlockState> {
        let state = self.shadow_template(connection, true);
        self.conn_mut(connection).shadow = None;
        state
    }

    /// Materializes the shadow template into the slot, if the slot is free
    /// and the owning block is still alive.
    pub fn respawn_shadow(&mut self, connection: ConnectionId) {
        let conn = self.conn(connection);
        if conn.is_connected() || !conn.is_superior() {
            return;
        }
        let Some(template) = conn.shadow.clone() else {
            return;
        };
        if self.blk(conn.block).is_dead_or_dying() {
            return;
        }

        let result = state::materialize(
            self,
            &template,
            MaterializeOptions {
                parent_connection: Some(connection),
                is_shadow: true,
                record_undo: false,
            },
        );
        if let Err(err) = result {
            warn!("Failed to respawn shadow on {}: {}", connection, err);
        }
    }

    //
    // Disposal.
    //

    /// Permanently removes a block and everything attached below it. The
    /// entry stays in the arena as a tombstone so stale ids keep resolving.
    pub fn dispose_block(&mut self, block: BlockId, heal_stack: bool) {
        let Some(blk) = self.block(block) else {
            return;
        };
        if blk.is_dead_or_dying() {
            return;
        }

        let opened = self.events.begin_group();
        self.unplug(block, heal_stack);
        self.blk_mut(block).disposing = true;
        self.events.fire(EventKind::BlockDelete, block);

        let children: Vec<BlockId> = self
            .blk(block)
            .superior_connection_ids()
            .into_iter()
            .filter_map(|c| self.target_block_of(c))
            .collect();
        for child in children {
            self.dispose_block(child, false);
        }

        for connection in self.blk(block).connection_ids() {
            self.dispose_connection(connection);
        }

        let blk = self.blk_mut(block);
        blk.disposing = false;
        blk.disposed = true;
        if opened {
            self.events.end_group();
        }
    }

    /// Disconnects, untracks and tombstones a connection. Idempotent.
    pub fn dispose_connection(&mut self, connection: ConnectionId) {
        let Some(conn) = self.connection(connection) else {
            return;
        };
        if conn.disposed {
            return;
        }

        if conn.is_connected() {
            // Clear the template first so the disconnect cannot respawn a
            // shadow into a slot that is being destroyed.
            self.conn_mut(connection).shadow = None;
            let target = self
                .target_block_of(connection)
                .expect("Connected connection must have a target block");
            if self.blk(target).shadow {
                self.dispose_block(target, false);
            } else {
                self.disconnect(connection)
                    .expect("Connected connection must disconnect cleanly");
            }
        }

        let conn = self.conn(connection);
        if conn.tracked == TrackedState::Tracked {
            let (kind, y) = (conn.kind, conn.position.y);
            self.dbs.get_mut(kind).remove_connection(connection, y);
        }

        let conn = self.conn_mut(connection);
        conn.disposed = true;
        conn.tracked = TrackedState::Untracked;
    }

    #[cfg(test)]
    pub fn adopt_connection_for_test(&mut self, connection: Connection) {
        self.connections.insert(connection.id, connection);
    }
}
