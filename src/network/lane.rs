use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::shared::geo::{Coordinate, Distance, Heading, LATITUDE_DISTANCE, LONGITUDE_DISTANCE};

/// The vehicle classes a lane can be opened to. Mirrors the traversability
/// classes of the simulation network this crate binds against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Passenger,
    Bus,
    Tram,
    RailUrban,
    RailElectric,
    Rail,
    RailFast,
    Ship,
    Custom1,
    Custom2,
}

/// A directed, traversable lane of the network graph. The shape is reduced
/// to its two endpoints, which is enough for heading comparison and offset
/// projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lane {
    /// The global internal index used for O(1) array lookups in the grid.
    pub index: u32,
    /// Unique lane identifier.
    pub id: Arc<str>,
    /// Identifier of the edge this lane belongs to.
    pub edge_id: Arc<str>,
    /// First shape point of the lane.
    pub from: Coordinate,
    /// Last shape point of the lane.
    pub to: Coordinate,
    /// Lane length along its shape.
    pub length: Distance,
    /// Vehicle classes permitted on this lane.
    pub allows: Box<[VehicleClass]>,
    /// Whether the owning edge has both incoming and outgoing connections.
    /// Dead-end lanes break routing and are only bound to as a last resort.
    pub connected: bool,
}

impl Lane {
    pub fn permits(&self, class: VehicleClass) -> bool {
        self.allows.contains(&class)
    }

    /// Representative point of the lane, used for radius queries.
    pub fn position(&self) -> Coordinate {
        Coordinate {
            latitude: (self.from.latitude + self.to.latitude) / 2.0,
            longitude: (self.from.longitude + self.to.longitude) / 2.0,
        }
    }

    /// Travel direction of the lane. None for degenerate shapes.
    pub fn heading(&self) -> Option<Heading> {
        self.from.heading_to(&self.to)
    }

    /// Offset along the lane of the point closest to the given coordinate,
    /// clamped into `[0, length]`.
    pub fn closest_offset(&self, coordinate: &Coordinate) -> Distance {
        let ax = self.from.longitude * LONGITUDE_DISTANCE.as_meters();
        let ay = self.from.latitude * LATITUDE_DISTANCE.as_meters();
        let bx = self.to.longitude * LONGITUDE_DISTANCE.as_meters();
        let by = self.to.latitude * LATITUDE_DISTANCE.as_meters();
        let px = coordinate.longitude * LONGITUDE_DISTANCE.as_meters();
        let py = coordinate.latitude * LATITUDE_DISTANCE.as_meters();

        let dx = bx - ax;
        let dy = by - ay;
        let len_sq = dx * dx + dy * dy;
        if len_sq < 1e-9 {
            return Distance::from_meters(0.0);
        }
        let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
        Distance::from_meters(self.length.as_meters() * t)
    }

    /// Point on the lane at the given offset, interpolated between the
    /// shape endpoints.
    pub fn point_at(&self, offset: Distance) -> Coordinate {
        if self.length.as_meters() < 1e-9 {
            return self.from;
        }
        let t = (offset.as_meters() / self.length.as_meters()).clamp(0.0, 1.0);
        Coordinate {
            latitude: self.from.latitude + (self.to.latitude - self.from.latitude) * t,
            longitude: self.from.longitude + (self.to.longitude - self.from.longitude) * t,
        }
    }
}
