//! Event collaborator: records block mutations so an undo layer can batch
//! and replay them. The core only needs "fire an event" and "group related
//! mutations"; undo execution itself lives outside this crate.

use crate::block::BlockId;

pub type GroupId = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    BlockCreate,
    BlockDelete,
    BlockMove {
        old_parent: Option<BlockId>,
        new_parent: Option<BlockId>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub block: BlockId,
    pub group: Option<GroupId>,
    pub record_undo: bool,
}

/// Append-only log of fired events with undo-group bookkeeping.
#[derive(Debug)]
pub struct EventLog {
    events: Vec<Event>,
    enabled: bool,
    record_undo: bool,
    current_group: Option<GroupId>,
    next_group: GroupId,
}

impl Default for EventLog {
    fn default() -> EventLog {
        EventLog {
            events: vec![],
            enabled: true,
            record_undo: true,
            current_group: None,
            next_group: 1,
        }
    }
}

impl EventLog {
    pub fn new() -> EventLog {
        EventLog::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn record_undo(&self) -> bool {
        self.record_undo
    }
    pub fn set_record_undo(&mut self, record: bool) {
        self.record_undo = record;
    }

    pub fn group(&self) -> Option<GroupId> {
        self.current_group
    }

    /// Opens a fresh group unless one is already open. Returns true if this
    /// call opened the group; the matching `end_group` is then the caller's
    /// responsibility.
    pub fn begin_group(&mut self) -> bool {
        if self.current_group.is_some() {
            return false;
        }
        self.current_group = Some(self.next_group);
        self.next_group += 1;
        true
    }

    pub fn end_group(&mut self) {
        self.current_group = None;
    }

    pub fn fire(&mut self, kind: EventKind, block: BlockId) {
        if !self.enabled {
            return;
        }
        self.events.push(Event {
            kind,
            block,
            group: self.current_group,
            record_undo: self.record_undo,
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
