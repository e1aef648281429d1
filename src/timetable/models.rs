use std::{str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    network::VehicleClass,
    shared::{geo::Coordinate, time::Time},
};

/// Transit mode of a stop or line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Bus,
    Subway,
    Rail,
    Ferry,
}

impl Mode {
    /// The vehicle class a vehicle of this mode needs its lanes to permit.
    pub const fn vehicle_class(&self) -> VehicleClass {
        match self {
            Mode::Bus => VehicleClass::Bus,
            Mode::Subway => VehicleClass::RailUrban,
            Mode::Rail => VehicleClass::Rail,
            Mode::Ferry => VehicleClass::Ship,
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bus" => Ok(Mode::Bus),
            "subway" => Ok(Mode::Subway),
            "rail" => Ok(Mode::Rail),
            "ferry" => Ok(Mode::Ferry),
            other => Err(other.to_string()),
        }
    }
}

/// A physical point where passengers board or alight. Immutable after load.
#[derive(Debug, Default, Clone)]
pub struct Stop {
    /// The global internal index used for O(1) array lookups in the index.
    pub index: u32,
    /// Unique external identifier.
    pub id: Arc<str>,
    /// Human-readable name.
    pub name: Arc<str>,
    pub mode: Mode,
    pub coordinate: Coordinate,
    /// Declared platform or lane, when the source data carries one.
    pub platform_hint: Option<Arc<str>>,
}

/// A named transit line with its canonical calling order.
#[derive(Debug, Default, Clone)]
pub struct Line {
    pub index: u32,
    pub id: Arc<str>,
    pub mode: Mode,
    /// Stop indices in calling order. At least two entries, no
    /// adjacent-identical repeats.
    pub stops: Box<[u32]>,
}

/// One scheduled vehicle call at a stop.
#[derive(Debug, Default, Clone, Copy)]
pub struct Call {
    /// Internal index of the [`Stop`] this call is at.
    pub stop_idx: u32,
    pub arrival: Time,
    pub departure: Time,
}

/// One scheduled trip of a [`Line`], with concrete times at every stop of
/// the line's calling order.
#[derive(Debug, Default, Clone)]
pub struct Run {
    pub index: u32,
    pub id: Arc<str>,
    /// Pointer to the owning [`Line`].
    pub line_idx: u32,
    /// Calls in the line's stop order, same length as the line's stops.
    pub calls: Box<[Call]>,
}

/// Raw stop record, as produced by a feed or the surrounding loader.
#[derive(Debug, Clone)]
pub struct StopRecord {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub mode: Mode,
    pub coordinate: Coordinate,
    pub platform_hint: Option<Arc<str>>,
}

/// Raw line record with its calling order as stop ids.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub id: Arc<str>,
    pub mode: Mode,
    pub stop_ids: Vec<Arc<str>>,
}

/// Raw per-run stop time record.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: Arc<str>,
    pub line_id: Arc<str>,
    pub calls: Vec<CallRecord>,
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub stop_id: Arc<str>,
    pub arrival: Time,
    pub departure: Time,
}
