//! Drag-interaction tuning constants, in workspace units.

/// Radius within which a dragged connection snaps to a candidate.
pub const SNAP_RADIUS: f32 = 28.0;

/// Wider radius used while a preview is already showing, so that blocks
/// shifting to make room for the preview cannot push the candidate out of
/// range.
pub const CONNECTING_SNAP_RADIUS: f32 = 68.0;

/// How much closer a new candidate must be before it replaces the one
/// currently previewed.
pub const CURRENT_CONNECTION_PREFERENCE: f32 = 8.0;

/// Maximum random jitter applied when bumping overlapping blocks apart.
pub const BUMP_RANDOMNESS: f32 = 10.0;
