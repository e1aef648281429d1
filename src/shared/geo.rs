use std::{
    cmp,
    f64::consts::PI,
    fmt::Display,
    ops::{Add, Div, Mul, Sub},
};

use serde::{Deserialize, Serialize};

pub(crate) const GRID_CELL_SIZE: Distance = Distance::from_meters(500.0);
pub(crate) const LONGITUDE_DISTANCE: Distance = Distance::from_meters(111_320.0);
pub(crate) const LATITUDE_DISTANCE: Distance = Distance::from_meters(110_540.0);

/// Detour factor applied to straight-line distances to approximate
/// distance along the street network.
pub(crate) const CIRCUITY_FACTOR: f64 = 1.3;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Distance(f64);

impl PartialEq for Distance {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl Add for Distance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Distance {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<f64> for Distance {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div for Distance {
    type Output = Self;
    fn div(self, rhs: Self) -> Self::Output {
        Self(self.0 / rhs.0)
    }
}

impl Distance {
    pub const fn from_meters(distance: f64) -> Self {
        Self(distance)
    }

    pub const fn from_kilometers(distance: f64) -> Self {
        Self(distance * 1000.0)
    }

    pub const fn as_meters(&self) -> f64 {
        self.0
    }

    pub const fn as_kilometers(&self) -> f64 {
        self.0 / 1000.0
    }

    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self(self.0.clamp(min.0, max.0))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}, {}", self.latitude, self.longitude))
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from(value: (f64, f64)) -> Self {
        Self {
            latitude: value.0,
            longitude: value.1,
        }
    }
}

impl Coordinate {
    pub fn euclidean_distance(&self, coord: &Self) -> Distance {
        const R: f64 = 6371.0;
        let dist_lat = f64::to_radians(coord.latitude - self.latitude);
        let dist_lon = f64::to_radians(coord.longitude - self.longitude);
        let a = f64::powi(f64::sin(dist_lat / 2.0), 2)
            + f64::cos(f64::to_radians(self.latitude))
                * f64::cos(f64::to_radians(coord.latitude))
                * f64::sin(dist_lon / 2.0)
                * f64::sin(dist_lon / 2.0);
        let c = 2.0 * f64::atan2(f64::sqrt(a), f64::sqrt(1.0 - a));
        Distance::from_kilometers(R * c)
    }

    /// Straight-line distance scaled by the circuity factor, the estimate
    /// used for every walking distance in this crate.
    pub fn network_distance(&self, coord: &Self) -> Distance {
        Distance::from_meters(self.euclidean_distance(coord).as_meters() * CIRCUITY_FACTOR)
    }

    /// Direction from this coordinate toward another, in planar
    /// approximation. None when the two coordinates coincide.
    pub fn heading_to(&self, coord: &Self) -> Option<Heading> {
        let dx = (coord.longitude - self.longitude) * LONGITUDE_DISTANCE.as_meters();
        let dy = (coord.latitude - self.latitude) * LATITUDE_DISTANCE.as_meters();
        if dx.abs() + dy.abs() < 1e-9 {
            return None;
        }
        Some(Heading::from_radians(f64::atan2(dy, dx)))
    }

    pub fn to_grid(&self) -> (i32, i32) {
        let x =
            (self.longitude * LONGITUDE_DISTANCE.as_meters() / GRID_CELL_SIZE.as_meters()) as i32;
        let y =
            (self.latitude * LATITUDE_DISTANCE.as_meters() / GRID_CELL_SIZE.as_meters()) as i32;
        (x, y)
    }
}

/// A travel direction in the horizontal plane, stored as radians
/// counter-clockwise from east.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heading(f64);

impl Heading {
    pub const fn from_radians(radians: f64) -> Self {
        Self(radians)
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self(degrees.to_radians())
    }

    pub const fn as_radians(&self) -> f64 {
        self.0
    }

    pub fn unit_vector(&self) -> (f64, f64) {
        (self.0.cos(), self.0.sin())
    }

    /// Absolute angular deviation from another heading, wrapped into
    /// `[0, pi]`.
    pub fn deviation(&self, other: &Self) -> f64 {
        let d = (self.0 - other.0 + PI).rem_euclid(2.0 * PI) - PI;
        d.abs()
    }
}

/// Accumulates unit vectors and yields their mean direction. Used to infer a
/// stop's dominant travel direction from the calling orders it appears in.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadingAccumulator {
    x: f64,
    y: f64,
    count: u32,
}

impl HeadingAccumulator {
    pub fn push(&mut self, heading: Heading) {
        let (x, y) = heading.unit_vector();
        self.x += x;
        self.y += y;
        self.count += 1;
    }

    /// Mean resultant length in `[0, 1]`. Near zero when the accumulated
    /// headings cancel out.
    pub fn resultant_length(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        f64::hypot(self.x, self.y) / self.count as f64
    }

    pub fn mean(&self) -> Option<Heading> {
        if self.count == 0 {
            return None;
        }
        Some(Heading::from_radians(f64::atan2(self.y, self.x)))
    }
}

#[test]
fn distance_eq_test() {
    let dist_a = Distance::from_meters(1000.0);
    let dist_b = Distance::from_kilometers(1.0);
    assert_eq!(dist_a, dist_b)
}

#[test]
fn distance_cmp_test() {
    let dist_a = Distance::from_meters(1000.0);
    let dist_b = Distance::from_kilometers(0.5);
    assert!(dist_a > dist_b)
}

#[test]
fn heading_deviation_test() {
    let east = Heading::from_degrees(0.0);
    let north = Heading::from_degrees(90.0);
    let west = Heading::from_degrees(180.0);
    assert!((east.deviation(&north).to_degrees() - 90.0).abs() < 1e-9);
    assert!((east.deviation(&west).to_degrees() - 180.0).abs() < 1e-9);
    assert!(east.deviation(&east) < 1e-9);
}

#[test]
fn heading_deviation_wraps_test() {
    let a = Heading::from_degrees(170.0);
    let b = Heading::from_degrees(-170.0);
    assert!((a.deviation(&b).to_degrees() - 20.0).abs() < 1e-9);
}

#[test]
fn heading_to_test() {
    let origin = Coordinate::from((0.0, 0.0));
    let east = Coordinate::from((0.0, 0.01));
    let heading = origin.heading_to(&east).unwrap();
    assert!(heading.deviation(&Heading::from_degrees(0.0)).to_degrees() < 1.0);
    assert!(origin.heading_to(&origin).is_none());
}

#[test]
fn heading_accumulator_cancels_test() {
    let mut acc = HeadingAccumulator::default();
    acc.push(Heading::from_degrees(0.0));
    acc.push(Heading::from_degrees(180.0));
    assert!(acc.resultant_length() < 0.01);

    let mut acc = HeadingAccumulator::default();
    acc.push(Heading::from_degrees(10.0));
    acc.push(Heading::from_degrees(-10.0));
    assert!(acc.resultant_length() > 0.9);
}
