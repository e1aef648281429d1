use std::{collections::HashMap, f64::consts::FRAC_PI_2, sync::Arc};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    network::{Lane, LaneLookup, VehicleClass},
    shared::geo::{Coordinate, Distance, Heading},
    timetable::{Stop, TimetableIndex},
};

/// Search radii tried in order before a stop is declared unbindable.
pub const RADIUS_STEPS: [Distance; 5] = [
    Distance::from_meters(100.0),
    Distance::from_meters(500.0),
    Distance::from_meters(1000.0),
    Distance::from_meters(2000.0),
    Distance::from_meters(4000.0),
];

#[derive(Error, Debug, Clone, Serialize)]
pub enum Error {
    #[error("no lane permitting {class:?} within {radius}m of stop {stop}")]
    NoBindableLocation {
        stop: Arc<str>,
        class: VehicleClass,
        radius: f64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Hard cap on the search radius. Steps beyond it are never tried.
    pub max_radius: Distance,
    /// Largest accepted angle between a stop's preferred heading and a
    /// candidate lane's travel direction, in radians.
    pub max_heading_deviation: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_radius: Distance::from_meters(4000.0),
            max_heading_deviation: FRAC_PI_2,
        }
    }
}

/// A stop fixed onto a concrete lane of the network.
#[derive(Debug, Clone, Serialize)]
pub struct Binding {
    pub stop_id: Arc<str>,
    pub stop_idx: u32,
    pub lane_id: Arc<str>,
    pub edge_id: Arc<str>,
    /// Offset along the lane of the bound position.
    pub offset: Distance,
    /// Straight-line distance between the stop and the bound position.
    pub distance: Distance,
    /// Deviation from the stop's preferred heading, when one was used.
    pub heading_deviation: Option<f64>,
    /// True when the binding only succeeded after dropping the
    /// connectivity or heading constraint.
    pub relaxed: bool,
    /// The bound position itself, on the lane at `offset`.
    pub position: Coordinate,
}

/// Result of a whole binding pass: one binding per bindable stop, plus the
/// stops that could not be bound at all.
#[derive(Debug, Default, Clone)]
pub struct BindingTable {
    bindings: HashMap<u32, Binding>,
    id_lookup: HashMap<Arc<str>, u32>,
    failures: Vec<Error>,
}

impl BindingTable {
    pub fn get(&self, stop_idx: u32) -> Option<&Binding> {
        self.bindings.get(&stop_idx)
    }

    pub fn by_id(&self, stop_id: &str) -> Option<&Binding> {
        self.get(*self.id_lookup.get(stop_id)?)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Stops the pass could not bind, in stop order.
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }
}

/// Each fallback stage widens what counts as an acceptable lane. A
/// connected, heading-conforming lane far away still beats a dead-end lane
/// next door.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Connected,
    AnyConnectivity,
    IgnoreHeading,
}

const STAGES: [Stage; 3] = [Stage::Connected, Stage::AnyConnectivity, Stage::IgnoreHeading];

/// Binds stops onto the lanes of a network.
pub struct Binder<'a, N: LaneLookup> {
    network: &'a N,
    options: Options,
}

impl<'a, N: LaneLookup> Binder<'a, N> {
    pub fn new(network: &'a N) -> Self {
        Self {
            network,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Binds one stop. The search widens through [`RADIUS_STEPS`] and only
    /// then relaxes constraints, so repeated calls with the same inputs
    /// always produce the same binding.
    pub fn bind(
        &self,
        stop: &Stop,
        class: VehicleClass,
        heading_hint: Option<Heading>,
    ) -> Result<Binding, Error> {
        for stage in STAGES {
            for radius in RADIUS_STEPS {
                if radius > self.options.max_radius {
                    break;
                }
                let candidates = self.network.lanes_within(&stop.coordinate, radius);
                let best = candidates
                    .into_iter()
                    .filter(|lane| lane.permits(class))
                    .map(|lane| self.evaluate(lane, stop, heading_hint))
                    .filter(|candidate| self.acceptable(candidate, stage))
                    .min_by(|a, b| match stage {
                        // The last stage no longer trusts headings at all.
                        Stage::IgnoreHeading => {
                            a.distance.as_meters().total_cmp(&b.distance.as_meters())
                        }
                        _ => a
                            .deviation
                            .unwrap_or(0.0)
                            .total_cmp(&b.deviation.unwrap_or(0.0))
                            .then(a.distance.as_meters().total_cmp(&b.distance.as_meters())),
                    });
                if let Some(candidate) = best {
                    debug!(
                        stop = %stop.id,
                        lane = %candidate.lane.id,
                        ?stage,
                        "bound stop at {:.1}m",
                        candidate.distance.as_meters()
                    );
                    return Ok(Binding {
                        stop_id: stop.id.clone(),
                        stop_idx: stop.index,
                        lane_id: candidate.lane.id.clone(),
                        edge_id: candidate.lane.edge_id.clone(),
                        offset: candidate.offset,
                        distance: candidate.distance,
                        heading_deviation: candidate.deviation,
                        relaxed: stage != Stage::Connected,
                        position: candidate.position,
                    });
                }
            }
        }
        Err(Error::NoBindableLocation {
            stop: stop.id.clone(),
            class,
            radius: self.options.max_radius.as_meters(),
        })
    }

    /// Binds every stop of a timetable in parallel. Stops without a
    /// bindable lane are recorded as failures without affecting the rest of
    /// the pass.
    pub fn bind_all(&self, timetable: &TimetableIndex) -> BindingTable {
        let headings = timetable.preferred_headings();
        let results: Vec<Result<Binding, Error>> = timetable
            .stops
            .par_iter()
            .map(|stop| {
                self.bind(
                    stop,
                    stop.mode.vehicle_class(),
                    headings.get(&stop.index).copied(),
                )
            })
            .collect();

        let mut table = BindingTable::default();
        for result in results {
            match result {
                Ok(binding) => {
                    if binding.relaxed {
                        warn!(stop = %binding.stop_id, lane = %binding.lane_id, "relaxed binding");
                    }
                    table.id_lookup.insert(binding.stop_id.clone(), binding.stop_idx);
                    table.bindings.insert(binding.stop_idx, binding);
                }
                Err(error) => {
                    warn!("{error}");
                    table.failures.push(error);
                }
            }
        }
        table
    }

    fn evaluate(
        &self,
        lane: &'a Lane,
        stop: &Stop,
        heading_hint: Option<Heading>,
    ) -> Candidate<'a> {
        let offset = lane.closest_offset(&stop.coordinate);
        let position = lane.point_at(offset);
        let deviation = match (heading_hint, lane.heading()) {
            (Some(hint), Some(heading)) => Some(hint.deviation(&heading)),
            _ => None,
        };
        Candidate {
            lane,
            offset,
            position,
            distance: position.euclidean_distance(&stop.coordinate),
            deviation,
        }
    }

    fn acceptable(&self, candidate: &Candidate, stage: Stage) -> bool {
        let heading_ok = candidate
            .deviation
            .map(|d| d <= self.options.max_heading_deviation)
            .unwrap_or(true);
        match stage {
            Stage::Connected => candidate.lane.connected && heading_ok,
            Stage::AnyConnectivity => heading_ok,
            Stage::IgnoreHeading => true,
        }
    }
}

struct Candidate<'a> {
    lane: &'a Lane,
    offset: Distance,
    position: Coordinate,
    distance: Distance,
    deviation: Option<f64>,
}
