use std::sync::Arc;

mod models;
pub use models::*;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    binder::BindingTable,
    shared::{
        geo::Distance,
        time::{Duration, Time},
    },
    timetable::{ServingRun, TimetableIndex},
};

/// Walking speed before the configurable factor, in meters per second.
pub const BASE_WALK_SPEED: f64 = 1.5;

#[derive(Error, Debug)]
pub enum Error {
    #[error("plan {0} has no legs")]
    EmptyPlan(Arc<str>),
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// How far before a leg's `depart_not_before` a boarding may be pulled.
    pub pt_window_before: Duration,
    /// How far after a leg's `depart_not_before` a boarding may be pushed.
    pub pt_window_after: Duration,
    /// Scales [`BASE_WALK_SPEED`].
    pub walk_speed_factor: f64,
    /// When true, any per-leg failure or continuity violation rejects the
    /// whole chain. Otherwise failures degrade to warnings.
    pub strict_continuity: bool,
    /// Largest location mismatch between adjacent legs tolerated in
    /// non-strict mode.
    pub transfer_tolerance: Distance,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pt_window_before: Duration::from_hours(1),
            pt_window_after: Duration::from_hours(2),
            walk_speed_factor: 1.0,
            strict_continuity: false,
            transfer_tolerance: Distance::from_meters(50.0),
        }
    }
}

/// Where and when the traveller is between legs.
struct Cursor {
    place: Option<ResolvedPlace>,
    time: Time,
}

/// Certifies planned legs against the timetable and stitches them into
/// explicit chains. Holds only shared references; cheap to construct per
/// batch.
pub struct Validator<'a> {
    timetable: &'a TimetableIndex,
    bindings: &'a BindingTable,
    options: Options,
}

impl<'a> Validator<'a> {
    pub fn new(timetable: &'a TimetableIndex, bindings: &'a BindingTable) -> Self {
        Self {
            timetable,
            bindings,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Resolves every leg of the plan in travel order, checking continuity
    /// against a moving cursor seeded at the request's origin and departure
    /// time.
    pub fn validate(&self, plan: &Plan) -> Result<Validation, Error> {
        if plan.legs.is_empty() {
            return Err(Error::EmptyPlan(plan.request.id.clone()));
        }

        let mut cursor = Cursor {
            place: self.resolve_place(&plan.request.origin).ok(),
            time: plan.request.depart,
        };
        let mut legs: Vec<ExplicitLeg> = Vec::with_capacity(plan.legs.len());
        let mut reports: Vec<LegReport> = Vec::with_capacity(plan.legs.len());
        let mut rejected = None;

        for (index, leg) in plan.legs.iter().enumerate() {
            match self.resolve_leg(leg, &cursor) {
                Ok(explicit) => {
                    if let Some(failure) = self.continuity_failure(&cursor, &explicit) {
                        if self.options.strict_continuity {
                            reports.push(LegReport {
                                index,
                                status: LegStatus::Failed { failure },
                            });
                            rejected = Some(index);
                            break;
                        }
                        warn!(request = %plan.request.id, index, "degraded leg: {failure}");
                        reports.push(LegReport {
                            index,
                            status: LegStatus::Warning { failure },
                        });
                    } else {
                        reports.push(LegReport {
                            index,
                            status: LegStatus::Ok,
                        });
                    }
                    cursor.place = Some(explicit.end_place().clone());
                    cursor.time = explicit.end_time();
                    legs.push(explicit);
                }
                Err(failure) => {
                    if self.options.strict_continuity {
                        reports.push(LegReport {
                            index,
                            status: LegStatus::Failed { failure },
                        });
                        rejected = Some(index);
                        break;
                    }
                    warn!(request = %plan.request.id, index, "skipped leg: {failure}");
                    reports.push(LegReport {
                        index,
                        status: LegStatus::Warning { failure },
                    });
                    // Skip the leg but move the cursor to where it would
                    // have ended, so later legs are judged from there.
                    if let Some(end) = self.intended_end(leg) {
                        cursor.place = Some(end);
                    }
                }
            }
        }

        let verdict = match rejected {
            Some(leg) => ChainVerdict::Rejected { leg },
            None if reports
                .iter()
                .any(|report| matches!(report.status, LegStatus::Warning { .. })) =>
            {
                ChainVerdict::ValidWithWarnings
            }
            None => ChainVerdict::Valid,
        };
        let chain = match (&verdict, legs.first(), legs.last()) {
            (ChainVerdict::Rejected { .. }, _, _) | (_, None, _) | (_, _, None) => None,
            (_, Some(first), Some(last)) => Some(Chain {
                request_id: plan.request.id.clone(),
                depart: first.start_time(),
                arrival: last.end_time(),
                legs: legs.clone(),
            }),
        };
        debug!(request = %plan.request.id, ?verdict, "validated plan");

        Ok(Validation {
            chain,
            report: ValidationReport {
                request_id: plan.request.id.clone(),
                legs: reports,
                verdict,
            },
        })
    }

    /// Validates a batch of plans in parallel. Requests are independent; one
    /// request's failure never affects another.
    pub fn validate_all(&self, plans: &[Plan]) -> Vec<Result<Validation, Error>> {
        plans.par_iter().map(|plan| self.validate(plan)).collect()
    }

    fn resolve_leg(&self, leg: &AbstractLeg, cursor: &Cursor) -> Result<ExplicitLeg, LegFailure> {
        match leg {
            AbstractLeg::Walk { from, to } => self.resolve_walk(from, to, cursor.time),
            AbstractLeg::Ride {
                line,
                board,
                alight,
                depart_not_before,
            } => self.resolve_ride(line, board, alight, *depart_not_before),
        }
    }

    fn resolve_place(&self, place: &Place) -> Result<ResolvedPlace, LegFailure> {
        match place {
            Place::Stop(id) => {
                let binding = self
                    .bindings
                    .by_id(id)
                    .ok_or_else(|| LegFailure::UnboundStop { stop: id.clone() })?;
                Ok(ResolvedPlace {
                    stop_id: Some(id.clone()),
                    position: binding.position,
                })
            }
            Place::Point(coordinate) => Ok(ResolvedPlace {
                stop_id: None,
                position: *coordinate,
            }),
        }
    }

    fn resolve_walk(&self, from: &Place, to: &Place, at: Time) -> Result<ExplicitLeg, LegFailure> {
        let from = self.resolve_place(from)?;
        let to = self.resolve_place(to)?;
        let distance = from.position.network_distance(&to.position);
        let speed = BASE_WALK_SPEED * self.options.walk_speed_factor;
        let duration = Duration::from_seconds((distance.as_meters() / speed).ceil() as u32);
        Ok(ExplicitLeg::Walk {
            from,
            to,
            distance,
            duration,
            depart: at,
            arrival: at + duration,
        })
    }

    fn resolve_ride(
        &self,
        line: &Arc<str>,
        board: &Arc<str>,
        alight: &Arc<str>,
        depart_not_before: Time,
    ) -> Result<ExplicitLeg, LegFailure> {
        let board_place = self.resolve_place(&Place::Stop(board.clone()))?;
        let alight_place = self.resolve_place(&Place::Stop(alight.clone()))?;

        let infeasible = || LegFailure::InfeasibleRideOrder {
            line: line.clone(),
            board: board.clone(),
            alight: alight.clone(),
        };
        let Some(serving) = self.timetable.runs_serving(line, board, alight) else {
            return Err(infeasible());
        };

        // Both window edges are inclusive. Prefer the earliest boarding at
        // or after the requested time, otherwise the latest one before it.
        let lower = depart_not_before - self.options.pt_window_before;
        let upper = depart_not_before + self.options.pt_window_after;
        let mut any_ordered = false;
        let mut at_or_after: Option<ServingRun> = None;
        let mut closest_miss: Option<ServingRun> = None;
        for candidate in serving {
            any_ordered = true;
            let departure = candidate.board().departure;
            if departure < lower || departure > upper {
                continue;
            }
            if departure >= depart_not_before {
                if at_or_after.is_none_or(|best| departure < best.board().departure) {
                    at_or_after = Some(candidate);
                }
            } else if closest_miss.is_none_or(|best| departure > best.board().departure) {
                closest_miss = Some(candidate);
            }
        }
        if !any_ordered {
            return Err(infeasible());
        }
        let chosen = at_or_after
            .or(closest_miss)
            .ok_or_else(|| LegFailure::NoServingRun {
                line: line.clone(),
                board: board.clone(),
                alight: alight.clone(),
            })?;

        Ok(ExplicitLeg::Ride {
            run: chosen.run.id.clone(),
            line: line.clone(),
            board: board_place,
            board_time: chosen.board().departure,
            alight: alight_place,
            alight_time: chosen.alight().arrival,
        })
    }

    fn continuity_failure(&self, cursor: &Cursor, leg: &ExplicitLeg) -> Option<LegFailure> {
        let place = cursor.place.as_ref()?;
        let start = leg.start_place();
        let gap = if place.stop_id.is_some() && place.stop_id == start.stop_id {
            Distance::from_meters(0.0)
        } else {
            place.position.euclidean_distance(&start.position)
        };
        let regression = cursor
            .time
            .as_seconds()
            .saturating_sub(leg.start_time().as_seconds());
        let tolerance = if self.options.strict_continuity {
            Distance::from_meters(1e-6)
        } else {
            self.options.transfer_tolerance
        };
        if gap > tolerance || regression > 0 {
            return Some(LegFailure::ContinuityBroken {
                gap_meters: gap.as_meters(),
                time_regression: regression,
            });
        }
        None
    }

    /// Where a leg would have ended, for carrying the cursor past a leg
    /// that could not be certified.
    fn intended_end(&self, leg: &AbstractLeg) -> Option<ResolvedPlace> {
        let place = match leg {
            AbstractLeg::Walk { to, .. } => to.clone(),
            AbstractLeg::Ride { alight, .. } => Place::Stop(alight.clone()),
        };
        self.resolve_place(&place).ok()
    }
}
