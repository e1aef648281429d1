use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::{
    geo::{Coordinate, Distance},
    time::{Duration, Time},
};

/// An endpoint of a leg: either a stop known to the timetable or a literal
/// coordinate, for trip ends that are not at a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Place {
    Stop(Arc<str>),
    Point(Coordinate),
}

/// One origin-destination request to be turned into an explicit chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdRequest {
    pub id: Arc<str>,
    pub depart: Time,
    pub origin: Place,
    pub destination: Place,
}

/// A request together with its planned abstract legs, in travel order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub request: OdRequest,
    pub legs: Vec<AbstractLeg>,
}

/// A planned leg before certification: no run, no concrete times.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbstractLeg {
    Walk {
        from: Place,
        to: Place,
    },
    Ride {
        line: Arc<str>,
        board: Arc<str>,
        alight: Arc<str>,
        /// Earliest acceptable boarding time of this leg.
        depart_not_before: Time,
    },
}

/// A leg endpoint after resolution, pinned to a map position.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPlace {
    /// Set when the endpoint is a bound stop.
    pub stop_id: Option<Arc<str>>,
    pub position: Coordinate,
}

/// A certified leg with concrete times, and for rides the scheduled run
/// that covers it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExplicitLeg {
    Walk {
        from: ResolvedPlace,
        to: ResolvedPlace,
        distance: Distance,
        duration: Duration,
        depart: Time,
        arrival: Time,
    },
    Ride {
        run: Arc<str>,
        line: Arc<str>,
        board: ResolvedPlace,
        board_time: Time,
        alight: ResolvedPlace,
        alight_time: Time,
    },
}

impl ExplicitLeg {
    pub fn start_time(&self) -> Time {
        match self {
            ExplicitLeg::Walk { depart, .. } => *depart,
            ExplicitLeg::Ride { board_time, .. } => *board_time,
        }
    }

    pub fn end_time(&self) -> Time {
        match self {
            ExplicitLeg::Walk { arrival, .. } => *arrival,
            ExplicitLeg::Ride { alight_time, .. } => *alight_time,
        }
    }

    pub fn start_place(&self) -> &ResolvedPlace {
        match self {
            ExplicitLeg::Walk { from, .. } => from,
            ExplicitLeg::Ride { board, .. } => board,
        }
    }

    pub fn end_place(&self) -> &ResolvedPlace {
        match self {
            ExplicitLeg::Walk { to, .. } => to,
            ExplicitLeg::Ride { alight, .. } => alight,
        }
    }
}

/// The stitched, continuity-checked result for one request.
#[derive(Debug, Clone, Serialize)]
pub struct Chain {
    pub request_id: Arc<str>,
    pub legs: Vec<ExplicitLeg>,
    pub depart: Time,
    pub arrival: Time,
}

/// Why a single leg could not be certified. Always attributed to a leg
/// index through [`LegReport`].
#[derive(Error, Debug, Clone, Serialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum LegFailure {
    #[error("stop {stop} has no network binding")]
    UnboundStop { stop: Arc<str> },
    #[error("no run of line {line} serves {board} -> {alight} in the departure window")]
    NoServingRun {
        line: Arc<str>,
        board: Arc<str>,
        alight: Arc<str>,
    },
    #[error("line {line} never calls at {board} before {alight}")]
    InfeasibleRideOrder {
        line: Arc<str>,
        board: Arc<str>,
        alight: Arc<str>,
    },
    #[error(
        "leg breaks continuity: starts {gap_meters:.0}m away, {time_regression}s before the previous leg ends"
    )]
    ContinuityBroken {
        gap_meters: f64,
        time_regression: u32,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LegStatus {
    Ok,
    /// The leg is degraded or skipped but the chain survives.
    Warning { failure: LegFailure },
    /// The leg rejects the whole chain.
    Failed { failure: LegFailure },
}

#[derive(Debug, Clone, Serialize)]
pub struct LegReport {
    pub index: usize,
    pub status: LegStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ChainVerdict {
    Valid,
    ValidWithWarnings,
    Rejected { leg: usize },
}

/// Per-leg outcomes and the chain-level verdict for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub request_id: Arc<str>,
    pub legs: Vec<LegReport>,
    pub verdict: ChainVerdict,
}

/// The full outcome for one request. `chain` is None when the chain was
/// rejected or no leg survived.
#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub chain: Option<Chain>,
    pub report: ValidationReport,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(
            self.report.verdict,
            ChainVerdict::Valid | ChainVerdict::ValidWithWarnings
        )
    }
}
