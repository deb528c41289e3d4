use glam::Vec2;

use crate::connection::{ConnectionId, ConnectionKind};

#[derive(Clone, Copy, Debug)]
struct DbEntry {
    id: ConnectionId,
    pos: Vec2,
}

/// Spatial index over all trackable connections of one kind, kept sorted
/// non-decreasingly by the y coordinate. Dragging produces a stream of
/// nearest-neighbor queries; sorting by y plus a bounded outward walk keeps
/// each one at O(log n + k) instead of a full scan.
///
/// The index is purely geometric: legality of a candidate pair is supplied
/// by the caller as a closure, so queries stay read-only and side-effect
/// free.
#[derive(Default, Debug)]
pub struct ConnectionDb {
    entries: Vec<DbEntry>,
}

/// Result of a closest-candidate search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Closest {
    pub connection: Option<ConnectionId>,
    pub radius: f32,
}

impl ConnectionDb {
    pub fn new() -> ConnectionDb {
        ConnectionDb::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// First index whose entry is not below `y`.
    fn position_for_y(&self, y: f32) -> usize {
        self.entries.partition_point(|e| e.pos.y < y)
    }

    /// Locates an entry by identity, starting from the y neighborhood and
    /// scanning outward among equal-y entries.
    fn find_index(&self, id: ConnectionId, y: f32) -> Option<usize> {
        let start = self.position_for_y(y);

        let mut idx = start;
        while idx < self.entries.len() && self.entries[idx].pos.y == y {
            if self.entries[idx].id == id {
                return Some(idx);
            }
            idx += 1;
        }
        let mut idx = start;
        while idx > 0 && self.entries[idx - 1].pos.y == y {
            idx -= 1;
            if self.entries[idx].id == id {
                return Some(idx);
            }
        }
        None
    }

    /// Inserts a connection at the position maintaining sort order by y.
    /// Adding a connection that is already present is a bookkeeping bug.
    pub fn add_connection(&mut self, id: ConnectionId, pos: Vec2) {
        debug_assert!(
            self.find_index(id, pos.y).is_none(),
            "Connection already in database: {}",
            id
        );
        let index = self.position_for_y(pos.y);
        self.entries.insert(index, DbEntry { id, pos });
    }

    /// Removes a connection. Panics if it is not present: a stale or missing
    /// entry means the tracking bookkeeping is broken, which cannot be
    /// recovered from safely.
    pub fn remove_connection(&mut self, id: ConnectionId, y: f32) {
        let index = self
            .find_index(id, y)
            .unwrap_or_else(|| panic!("Unable to find connection in connection database: {}", id));
        self.entries.remove(index);
    }

    /// Every connection within `max_radius` of `pos`. The y distance alone
    /// bounds the outward walk; the full euclidean distance is only computed
    /// for entries that pass that filter.
    pub fn get_neighbours(&self, pos: Vec2, max_radius: f32) -> Vec<ConnectionId> {
        let mut neighbours = vec![];
        let start = self.position_for_y(pos.y);

        let mut idx = start;
        while idx > 0 && (pos.y - self.entries[idx - 1].pos.y) <= max_radius {
            let entry = self.entries[idx - 1];
            if pos.distance(entry.pos) <= max_radius {
                neighbours.push(entry.id);
            }
            idx -= 1;
        }
        let mut idx = start;
        while idx < self.entries.len() && (self.entries[idx].pos.y - pos.y) <= max_radius {
            let entry = self.entries[idx];
            if pos.distance(entry.pos) <= max_radius {
                neighbours.push(entry.id);
            }
            idx += 1;
        }
        neighbours
    }

    /// Finds the closest entry to `pos` for which `legal` returns true.
    ///
    /// `legal` receives the candidate and the current best radius; every
    /// accepted candidate shrinks the search radius, narrowing both the
    /// outward walk and the distance budget handed to subsequent legality
    /// checks. Returns `Closest { None, max_radius }` when nothing
    /// qualifies.
    pub fn search_for_closest(
        &self,
        pos: Vec2,
        max_radius: f32,
        mut legal: impl FnMut(ConnectionId, f32) -> bool,
    ) -> Closest {
        if self.entries.is_empty() {
            return Closest {
                connection: None,
                radius: max_radius,
            };
        }

        let mut best: Option<ConnectionId> = None;
        let mut best_radius = max_radius;
        let start = self.position_for_y(pos.y);

        let mut idx = start;
        while idx > 0 && (pos.y - self.entries[idx - 1].pos.y) <= best_radius {
            let entry = self.entries[idx - 1];
            if legal(entry.id, best_radius) {
                best = Some(entry.id);
                best_radius = pos.distance(entry.pos);
            }
            idx -= 1;
        }
        let mut idx = start;
        while idx < self.entries.len() && (self.entries[idx].pos.y - pos.y) <= best_radius {
            let entry = self.entries[idx];
            if legal(entry.id, best_radius) {
                best = Some(entry.id);
                best_radius = pos.distance(entry.pos);
            }
            idx += 1;
        }

        Closest {
            connection: best,
            radius: best_radius,
        }
    }
}

/// One database per connection kind; "the opposite-kind database for
/// connection X" is a constant-time lookup.
#[derive(Default, Debug)]
pub struct ConnectionDbSet {
    dbs: [ConnectionDb; 4],
}

impl ConnectionDbSet {
    pub fn new() -> ConnectionDbSet {
        ConnectionDbSet::default()
    }

    pub fn get(&self, kind: ConnectionKind) -> &ConnectionDb {
        &self.dbs[kind.index()]
    }
    pub fn get_mut(&mut self, kind: ConnectionKind) -> &mut ConnectionDb {
        &mut self.dbs[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_ys(ys: &[f32]) -> (ConnectionDb, Vec<ConnectionId>) {
        let mut db = ConnectionDb::new();
        let mut ids = vec![];
        for &y in ys {
            let id = ConnectionId::unique();
            db.add_connection(id, Vec2::new(0.0, y));
            ids.push(id);
        }
        (db, ids)
    }

    fn ys_of(db: &ConnectionDb) -> Vec<f32> {
        db.entries.iter().map(|e| e.pos.y).collect()
    }

    #[test]
    fn insert_keeps_sort_order() {
        let (db, _) = db_with_ys(&[30.0, 10.0, 20.0, 10.0, 30.0, 15.0]);
        let ys = ys_of(&db);
        let mut sorted = ys.clone();
        sorted.sort_by(f32::total_cmp);
        assert_eq!(ys, sorted);
        assert_eq!(db.len(), 6);
    }

    #[test]
    fn remove_by_identity_among_equal_ys() {
        // Three identity-distinct entries share y=30; removing the middle one
        // must leave the other two and the sort order intact.
        let (mut db, ids) = db_with_ys(&[10.0, 10.0, 20.0, 30.0, 30.0, 30.0]);
        db.remove_connection(ids[4], 30.0);

        assert_eq!(db.len(), 5);
        assert_eq!(ys_of(&db), vec![10.0, 10.0, 20.0, 30.0, 30.0]);
        assert!(db.ids().any(|id| id == ids[3]));
        assert!(db.ids().any(|id| id == ids[5]));
        assert!(!db.ids().any(|id| id == ids[4]));
    }

    #[test]
    #[should_panic(expected = "Unable to find connection in connection database")]
    fn remove_missing_panics() {
        let (mut db, _) = db_with_ys(&[10.0, 20.0]);
        db.remove_connection(ConnectionId::unique(), 10.0);
    }

    #[test]
    fn neighbours_within_radius() {
        let mut db = ConnectionDb::new();
        let near = ConnectionId::unique();
        let far_y = ConnectionId::unique();
        let far_x = ConnectionId::unique();
        db.add_connection(near, Vec2::new(3.0, 4.0));
        db.add_connection(far_y, Vec2::new(0.0, 50.0));
        db.add_connection(far_x, Vec2::new(50.0, 0.0));

        let found = db.get_neighbours(Vec2::ZERO, 10.0);
        assert_eq!(found, vec![near]);
    }

    #[test]
    fn closest_on_empty_db() {
        let db = ConnectionDb::new();
        let result = db.search_for_closest(Vec2::new(5.0, 5.0), 100.0, |_, _| true);
        assert_eq!(result.connection, None);
        assert_eq!(result.radius, 100.0);
    }

    #[test]
    fn closest_picks_nearest_legal() {
        let mut db = ConnectionDb::new();
        let nearest = ConnectionId::unique();
        let second = ConnectionId::unique();
        db.add_connection(nearest, Vec2::new(0.0, 2.0));
        db.add_connection(second, Vec2::new(0.0, 6.0));

        let result = db.search_for_closest(Vec2::ZERO, 100.0, |_, _| true);
        assert_eq!(result.connection, Some(nearest));
        assert_eq!(result.radius, 2.0);

        // With the nearest vetoed, the search falls back to the other entry.
        let result = db.search_for_closest(Vec2::ZERO, 100.0, |id, _| id != nearest);
        assert_eq!(result.connection, Some(second));
        assert_eq!(result.radius, 6.0);
    }

    #[test]
    fn closest_radius_shrinks_walk() {
        let mut db = ConnectionDb::new();
        let first = ConnectionId::unique();
        let closer = ConnectionId::unique();
        db.add_connection(first, Vec2::new(5.0, 0.0));
        db.add_connection(closer, Vec2::new(0.0, 3.0));

        let mut probed = vec![];
        let result = db.search_for_closest(Vec2::ZERO, 100.0, |id, radius| {
            probed.push((id, radius));
            true
        });
        // Accepting the first candidate shrinks the radius handed to the
        // second probe, and the closer candidate wins.
        assert_eq!(probed, vec![(first, 100.0), (closer, 5.0)]);
        assert_eq!(result.connection, Some(closer));
        assert_eq!(result.radius, 3.0);
    }

    #[test]
    fn closest_walk_stops_outside_radius() {
        let mut db = ConnectionDb::new();
        let close = ConnectionId::unique();
        db.add_connection(close, Vec2::new(0.0, 1.0));
        db.add_connection(ConnectionId::unique(), Vec2::new(0.0, 40.0));

        let mut probed = 0;
        let result = db.search_for_closest(Vec2::ZERO, 100.0, |_, _| {
            probed += 1;
            true
        });
        assert_eq!(result.connection, Some(close));
        // The far entry is outside the shrunken radius and is never probed.
        assert_eq!(probed, 1);
    }
}
