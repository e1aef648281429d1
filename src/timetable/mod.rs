use std::{collections::HashMap, sync::Arc};

mod models;
pub use models::*;

use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::{
    feed::{self, Feed},
    shared::{
        geo::{Heading, HeadingAccumulator},
        time::Time,
    },
};

type IdToIndex = HashMap<Arc<str>, usize>;
type IdToIndexes = HashMap<Arc<str>, Box<[usize]>>;

/// Stops whose successor headings mostly cancel out (used by lines running
/// in both directions) get no preferred heading at all.
const MIN_HEADING_RESULTANT: f64 = 0.25;

/// Build-time timetable validation failures. Any of these aborts index
/// construction; a timetable that builds is internally consistent.
#[derive(Error, Debug)]
pub enum Error {
    #[error("line {0} must call at two or more stops")]
    ShortLine(Arc<str>),
    #[error("line {line} calls at stop {stop} twice in a row")]
    AdjacentRepeat { line: Arc<str>, stop: Arc<str> },
    #[error("line {line} references unknown stop {stop}")]
    UnknownStop { line: Arc<str>, stop: Arc<str> },
    #[error("run {run} references unknown line {line}")]
    UnknownLine { run: Arc<str>, line: Arc<str> },
    #[error("run {run} has {got} calls but line {line} declares {want} stops")]
    CallCountMismatch {
        run: Arc<str>,
        line: Arc<str>,
        got: usize,
        want: usize,
    },
    #[error("run {run} call #{index} is at stop {got} but the line order says {want}")]
    CallOrderMismatch {
        run: Arc<str>,
        index: usize,
        got: Arc<str>,
        want: Arc<str>,
    },
    #[error("run {run} times go backwards at call #{index}")]
    NonMonotonicTimes { run: Arc<str>, index: usize },
    #[error("run {run} departs before it arrives at call #{index}")]
    DepartureBeforeArrival { run: Arc<str>, index: usize },
    #[error("duplicate id {0}")]
    DuplicateId(Arc<str>),
    #[error("record {id} has unknown mode {value:?}")]
    BadMode { id: Arc<str>, value: String },
    #[error("run {run} has malformed time {value:?}")]
    BadTime { run: Arc<str>, value: String },
    #[error(transparent)]
    Feed(#[from] feed::Error),
}

/// Immutable index of transit lines, their calling orders and their
/// scheduled runs. Built once, then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct TimetableIndex {
    pub stops: Box<[Stop]>,
    pub lines: Box<[Line]>,
    pub runs: Box<[Run]>,

    stop_lookup: Arc<IdToIndex>,
    line_lookup: Arc<IdToIndex>,
    run_lookup: Arc<IdToIndex>,
    line_to_runs: Arc<IdToIndexes>,
}

impl TimetableIndex {
    /// Builds the index from raw records, validating every line and run
    /// against the invariants the queries rely on.
    pub fn build(
        stop_records: Vec<StopRecord>,
        line_records: Vec<LineRecord>,
        run_records: Vec<RunRecord>,
    ) -> Result<Self, Error> {
        let mut stop_lookup: IdToIndex = HashMap::new();
        let mut stops: Vec<Stop> = Vec::with_capacity(stop_records.len());
        for (i, record) in stop_records.into_iter().enumerate() {
            if stop_lookup.insert(record.id.clone(), i).is_some() {
                return Err(Error::DuplicateId(record.id));
            }
            stops.push(Stop {
                index: i as u32,
                id: record.id,
                name: record.name,
                mode: record.mode,
                coordinate: record.coordinate,
                platform_hint: record.platform_hint,
            });
        }
        debug!("indexed {} stops", stops.len());

        let mut line_lookup: IdToIndex = HashMap::new();
        let mut lines: Vec<Line> = Vec::with_capacity(line_records.len());
        for (i, record) in line_records.into_iter().enumerate() {
            if record.stop_ids.len() < 2 {
                return Err(Error::ShortLine(record.id));
            }
            let mut stop_idxs: Vec<u32> = Vec::with_capacity(record.stop_ids.len());
            for stop_id in &record.stop_ids {
                let idx = *stop_lookup
                    .get(stop_id)
                    .ok_or_else(|| Error::UnknownStop {
                        line: record.id.clone(),
                        stop: stop_id.clone(),
                    })?;
                if stop_idxs.last() == Some(&(idx as u32)) {
                    return Err(Error::AdjacentRepeat {
                        line: record.id.clone(),
                        stop: stop_id.clone(),
                    });
                }
                stop_idxs.push(idx as u32);
            }
            if line_lookup.insert(record.id.clone(), i).is_some() {
                return Err(Error::DuplicateId(record.id));
            }
            lines.push(Line {
                index: i as u32,
                id: record.id,
                mode: record.mode,
                stops: stop_idxs.into(),
            });
        }
        debug!("indexed {} lines", lines.len());

        let mut run_lookup: IdToIndex = HashMap::new();
        let mut line_to_runs: HashMap<Arc<str>, Vec<usize>> = HashMap::new();
        let mut runs: Vec<Run> = Vec::with_capacity(run_records.len());
        for (i, record) in run_records.into_iter().enumerate() {
            let line_idx = *line_lookup
                .get(&record.line_id)
                .ok_or_else(|| Error::UnknownLine {
                    run: record.id.clone(),
                    line: record.line_id.clone(),
                })?;
            let line = &lines[line_idx];
            if record.calls.len() != line.stops.len() {
                return Err(Error::CallCountMismatch {
                    run: record.id.clone(),
                    line: line.id.clone(),
                    got: record.calls.len(),
                    want: line.stops.len(),
                });
            }

            let mut calls: Vec<Call> = Vec::with_capacity(record.calls.len());
            for (index, call) in record.calls.iter().enumerate() {
                let stop_idx = *stop_lookup
                    .get(&call.stop_id)
                    .ok_or_else(|| Error::UnknownStop {
                        line: line.id.clone(),
                        stop: call.stop_id.clone(),
                    })?;
                if stop_idx as u32 != line.stops[index] {
                    return Err(Error::CallOrderMismatch {
                        run: record.id.clone(),
                        index,
                        got: call.stop_id.clone(),
                        want: stops[line.stops[index] as usize].id.clone(),
                    });
                }
                if call.departure < call.arrival {
                    return Err(Error::DepartureBeforeArrival {
                        run: record.id.clone(),
                        index,
                    });
                }
                if let Some(prev) = calls.last()
                    && call.arrival < prev.departure
                {
                    return Err(Error::NonMonotonicTimes {
                        run: record.id.clone(),
                        index,
                    });
                }
                calls.push(Call {
                    stop_idx: stop_idx as u32,
                    arrival: call.arrival,
                    departure: call.departure,
                });
            }

            if run_lookup.insert(record.id.clone(), i).is_some() {
                return Err(Error::DuplicateId(record.id));
            }
            line_to_runs
                .entry(line.id.clone())
                .or_default()
                .push(i);
            runs.push(Run {
                index: i as u32,
                id: record.id,
                line_idx: line_idx as u32,
                calls: calls.into(),
            });
        }
        debug!("indexed {} runs", runs.len());

        let line_to_runs: IdToIndexes = line_to_runs
            .into_iter()
            .map(|(key, value)| (key, value.into()))
            .collect();

        Ok(Self {
            stops: stops.into(),
            lines: lines.into(),
            runs: runs.into(),
            stop_lookup: stop_lookup.into(),
            line_lookup: line_lookup.into(),
            run_lookup: run_lookup.into(),
            line_to_runs: line_to_runs.into(),
        })
    }

    /// Streams a zip feed into raw records and builds the index from them.
    /// Depending on the size of the feed this can be a long blocking call.
    pub fn from_feed(feed: &Feed) -> Result<Self, Error> {
        let mut raw_stops = Vec::new();
        feed.stream_stops(|(_, stop)| raw_stops.push(stop))?;
        let stop_records = raw_stops
            .into_iter()
            .map(|stop| {
                let id: Arc<str> = stop.stop_id.into();
                let mode = stop
                    .mode
                    .parse()
                    .map_err(|value| Error::BadMode {
                        id: id.clone(),
                        value,
                    })?;
                Ok(StopRecord {
                    id,
                    name: stop.stop_name.into(),
                    mode,
                    coordinate: (stop.stop_lat, stop.stop_lon).into(),
                    platform_hint: stop.platform.map(Into::into),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let mut raw_lines = Vec::new();
        feed.stream_lines(|(_, line)| raw_lines.push(line))?;
        let line_records = raw_lines
            .into_iter()
            .map(|line| {
                let id: Arc<str> = line.line_id.into();
                let mode = line
                    .mode
                    .parse()
                    .map_err(|value| Error::BadMode {
                        id: id.clone(),
                        value,
                    })?;
                Ok(LineRecord {
                    id,
                    mode,
                    stop_ids: line.stops.split_whitespace().map(Into::into).collect(),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        // Calls are grouped per run in feed order, then sorted by their
        // sequence column inside each run.
        let mut run_order: Vec<Arc<str>> = Vec::new();
        let mut run_calls: HashMap<Arc<str>, (Arc<str>, Vec<feed::FeedCall>)> = HashMap::new();
        feed.stream_calls(|(_, call)| {
            let run_id: Arc<str> = call.run_id.as_str().into();
            let entry = run_calls.entry(run_id.clone()).or_insert_with(|| {
                run_order.push(run_id);
                (call.line_id.as_str().into(), Vec::new())
            });
            entry.1.push(call);
        })?;

        let mut run_records: Vec<RunRecord> = Vec::with_capacity(run_order.len());
        for run_id in run_order {
            let Some((line_id, mut calls)) = run_calls.remove(&run_id) else {
                continue;
            };
            calls.par_sort_by_key(|call| call.sequence);
            let calls = calls
                .into_iter()
                .map(|call| {
                    let arrival = Time::from_hms(&call.arrival).ok_or_else(|| Error::BadTime {
                        run: run_id.clone(),
                        value: call.arrival.clone(),
                    })?;
                    let departure =
                        Time::from_hms(&call.departure).ok_or_else(|| Error::BadTime {
                            run: run_id.clone(),
                            value: call.departure.clone(),
                        })?;
                    Ok(CallRecord {
                        stop_id: call.stop_id.into(),
                        arrival,
                        departure,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?;
            run_records.push(RunRecord {
                id: run_id,
                line_id,
                calls,
            });
        }

        Self::build(stop_records, line_records, run_records)
    }

    pub fn stop_by_id(&self, id: &str) -> Option<&Stop> {
        let index = self.stop_lookup.get(id)?;
        Some(&self.stops[*index])
    }

    pub fn line_by_id(&self, id: &str) -> Option<&Line> {
        let index = self.line_lookup.get(id)?;
        Some(&self.lines[*index])
    }

    pub fn run_by_id(&self, id: &str) -> Option<&Run> {
        let index = self.run_lookup.get(id)?;
        Some(&self.runs[*index])
    }

    /// Ordered stop indices of a line's calling order.
    pub fn stops_of(&self, line_id: &str) -> Option<&[u32]> {
        Some(&self.line_by_id(line_id)?.stops)
    }

    pub fn runs_by_line_id(&self, line_id: &str) -> Option<Vec<&Run>> {
        let runs = self.line_to_runs.get(line_id)?;
        Some(runs.iter().map(|i| &self.runs[*i]).collect())
    }

    /// Lazy iterator over the runs of a line that call at `board` strictly
    /// before `alight`. On loop lines the earliest board occurrence with a
    /// subsequent alight occurrence wins. The iterator is `Clone`, so a
    /// caller can restart the scan cheaply.
    ///
    /// Returns None when the line or either stop id is unknown.
    pub fn runs_serving(
        &self,
        line_id: &str,
        board: &str,
        alight: &str,
    ) -> Option<RunsServing<'_>> {
        let board_idx = self.stop_by_id(board)?.index;
        let alight_idx = self.stop_by_id(alight)?.index;
        self.line_by_id(line_id)?;
        let run_idxs = self
            .line_to_runs
            .get(line_id)
            .map(|idxs| &idxs[..])
            .unwrap_or(&[]);
        Some(RunsServing {
            index: self,
            run_idxs,
            pos: 0,
            board_idx,
            alight_idx,
        })
    }

    /// Earliest scheduled departure of `run` at `stop` at or after `time`.
    pub fn next_departure_at_or_after(
        &self,
        run_id: &str,
        stop_id: &str,
        time: Time,
    ) -> Option<Time> {
        let run = self.run_by_id(run_id)?;
        let stop_idx = self.stop_by_id(stop_id)?.index;
        run.calls
            .iter()
            .filter(|call| call.stop_idx == stop_idx && call.departure >= time)
            .map(|call| call.departure)
            .min()
    }

    /// Dominant travel direction per stop, averaged over every
    /// stop-to-successor pair in all calling orders. Stops served in
    /// opposing directions cancel out and are omitted, as are stops that
    /// only ever appear as a terminal call.
    pub fn preferred_headings(&self) -> HashMap<u32, Heading> {
        let mut accumulators: HashMap<u32, HeadingAccumulator> = HashMap::new();
        for line in &self.lines {
            for pair in line.stops.windows(2) {
                let from = &self.stops[pair[0] as usize];
                let to = &self.stops[pair[1] as usize];
                if let Some(heading) = from.coordinate.heading_to(&to.coordinate) {
                    accumulators.entry(pair[0]).or_default().push(heading);
                }
            }
        }
        accumulators
            .into_iter()
            .filter(|(_, acc)| acc.resultant_length() >= MIN_HEADING_RESULTANT)
            .filter_map(|(stop_idx, acc)| acc.mean().map(|heading| (stop_idx, heading)))
            .collect()
    }
}

/// A run serving a board/alight pair, with the call positions that matched.
#[derive(Debug, Clone, Copy)]
pub struct ServingRun<'a> {
    pub run: &'a Run,
    pub board_pos: usize,
    pub alight_pos: usize,
}

impl ServingRun<'_> {
    pub fn board(&self) -> &Call {
        &self.run.calls[self.board_pos]
    }

    pub fn alight(&self) -> &Call {
        &self.run.calls[self.alight_pos]
    }
}

/// See [`TimetableIndex::runs_serving`].
#[derive(Debug, Clone)]
pub struct RunsServing<'a> {
    index: &'a TimetableIndex,
    run_idxs: &'a [usize],
    pos: usize,
    board_idx: u32,
    alight_idx: u32,
}

impl<'a> Iterator for RunsServing<'a> {
    type Item = ServingRun<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.run_idxs.len() {
            let run = &self.index.runs[self.run_idxs[self.pos]];
            self.pos += 1;
            if let Some((board_pos, alight_pos)) =
                serving_positions(run, self.board_idx, self.alight_idx)
            {
                return Some(ServingRun {
                    run,
                    board_pos,
                    alight_pos,
                });
            }
        }
        None
    }
}

fn serving_positions(run: &Run, board_idx: u32, alight_idx: u32) -> Option<(usize, usize)> {
    for (i, call) in run.calls.iter().enumerate() {
        if call.stop_idx != board_idx {
            continue;
        }
        if let Some(j) = run.calls[i + 1..]
            .iter()
            .position(|c| c.stop_idx == alight_idx)
        {
            return Some((i, i + 1 + j));
        }
    }
    None
}
