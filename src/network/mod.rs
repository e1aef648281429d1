mod grid;
mod lane;

pub use grid::*;
pub use lane::*;

use crate::shared::geo::{Coordinate, Distance};

/// Geometric query surface of the network graph.
///
/// The real graph lives outside this crate; the binder only needs radius
/// queries and id lookups, so anything implementing this trait can back a
/// binding pass. [`LaneGrid`] is the bundled in-memory implementation.
pub trait LaneLookup: Sync {
    /// All lanes whose representative position lies within `radius` of the
    /// given coordinate.
    fn lanes_within(&self, coordinate: &Coordinate, radius: Distance) -> Vec<&Lane>;

    fn lane_by_id(&self, id: &str) -> Option<&Lane>;
}
