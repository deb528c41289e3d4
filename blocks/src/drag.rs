//! Drag gesture state and candidate tracking.
//!
//! A `DragSession` is created when the user picks up a block stack, fed the
//! cumulative pointer delta on every move, and consumed on drop. It owns the
//! per-gesture state the connection checker's drag policy needs: which
//! connections travel with the drag and which candidate is currently
//! previewed.

use glam::Vec2;
use hashbrown::HashSet;
use log::info;
use rand::Rng;

use crate::block::BlockId;
use crate::config::{
    BUMP_RANDOMNESS, CONNECTING_SNAP_RADIUS, CURRENT_CONNECTION_PREFERENCE, SNAP_RADIUS,
};
use crate::connection::ConnectionId;
use crate::workspace::Workspace;

/// A matched pair found during a drag: the dragged-side connection, the
/// stationary connection it would join, and the distance between them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub local: ConnectionId,
    pub closest: ConnectionId,
    pub radius: f32,
}

/// Live state of one drag gesture.
pub struct DragSession {
    /// Topmost block of the dragged stack.
    pub root: BlockId,
    /// Cumulative pointer offset since the drag started. Block and
    /// connection positions stay untouched until the drop is committed.
    pub delta: Vec2,

    /// Every connection on the dragged subtree. Candidates found inside this
    /// set are rejected: a stack may not connect to itself mid-air.
    dragged: HashSet<ConnectionId>,
    /// Connections that may initiate a join: the root block's own plus the
    /// open end of its stack.
    available: Vec<ConnectionId>,

    current: Option<Candidate>,
}

impl DragSession {
    pub fn begin(ws: &Workspace, root: BlockId) -> DragSession {
        let mut dragged = HashSet::new();
        for block in ws.descendants(root) {
            dragged.extend(ws.blk(block).connection_ids());
        }

        let mut available = ws.blk(root).connection_ids();
        if let Some(last) = ws.last_connection_in_stack(root, true) {
            if Some(last) != ws.blk(root).next {
                available.push(last);
            }
        }

        DragSession {
            root,
            delta: Vec2::ZERO,
            dragged,
            available,
            current: None,
        }
    }

    /// Whether `connection` travels with the dragged stack.
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.dragged.contains(&connection)
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        self.current.as_ref()
    }

    /// Recomputes the best candidate for the given pointer offset.
    ///
    /// While a preview is showing the search widens to
    /// `CONNECTING_SNAP_RADIUS`, and a different candidate only takes over
    /// when it is decisively closer than the current one.
    pub fn update(&mut self, ws: &Workspace, delta: Vec2) {
        self.delta = delta;

        match self.search(ws) {
            Some(candidate) => {
                if self.should_update_preview(ws, &candidate) {
                    self.current = Some(candidate);
                } else if let Some(current) = &mut self.current {
                    if current.local == candidate.local && current.closest == candidate.closest {
                        current.radius = candidate.radius;
                    }
                }
            }
            None => self.current = None,
        }
    }

    /// Commits the drop. Returns true if the previewed candidate was
    /// connected.
    pub fn finish(self, ws: &mut Workspace) -> bool {
        match self.current {
            Some(candidate) => {
                let connected = ws.connect(candidate.local, candidate.closest);
                if !connected {
                    info!(
                        "Drop rejected for {} -> {}",
                        candidate.local, candidate.closest
                    );
                }
                connected
            }
            None => false,
        }
    }

    /// Best legal pairing over all available connections. Each hit shrinks
    /// the radius handed to the remaining searches, so the final winner is
    /// the globally closest pair.
    fn search(&self, ws: &Workspace) -> Option<Candidate> {
        let mut radius = if self.current.is_some() {
            CONNECTING_SNAP_RADIUS
        } else {
            SNAP_RADIUS
        };

        let mut best = None;
        for &local in &self.available {
            let closest = ws.search_for_closest(local, radius, self);
            if let Some(connection) = closest.connection {
                best = Some(Candidate {
                    local,
                    closest: connection,
                    radius: closest.radius,
                });
                radius = closest.radius;
            }
        }
        best
    }

    fn should_update_preview(&self, ws: &Workspace, candidate: &Candidate) -> bool {
        let Some(current) = &self.current else {
            return true;
        };
        if current.local == candidate.local && current.closest == candidate.closest {
            return false;
        }

        // Slightly prefer the existing preview over a new one, so the
        // preview does not flicker between near-equidistant candidates.
        let current_distance = (ws.conn(current.local).position + self.delta)
            .distance(ws.conn(current.closest).position);
        candidate.radius <= current_distance - CURRENT_CONNECTION_PREFERENCE
    }
}

/// Nudges the root block of `moving` down and to the side of `fixed`, with a
/// little randomness so repeated failed drops do not stack blocks exactly on
/// top of each other.
pub fn bump_away_from(ws: &mut Workspace, moving: ConnectionId, fixed: ConnectionId) {
    let mut root = ws.root_block(ws.conn(moving).block);
    if !ws.blk(root).movable {
        // If the loser is pinned, shove the other side instead.
        root = ws.root_block(ws.conn(fixed).block);
        if !ws.blk(root).movable {
            return;
        }
    }

    let mut rng = rand::rng();
    let target = ws.conn(fixed).position
        + Vec2::new(
            SNAP_RADIUS + rng.random_range(0.0..BUMP_RANDOMNESS),
            SNAP_RADIUS + rng.random_range(0.0..BUMP_RANDOMNESS),
        );
    let delta = target - ws.conn(moving).position;
    ws.move_block_by(root, delta);
}
