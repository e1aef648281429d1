use legwork::binder::{Binder, BindingTable};
use legwork::network::{Lane, LaneGrid, VehicleClass};
use legwork::shared::{
    geo::Coordinate,
    time::{Duration, Time},
};
use legwork::timetable::{
    CallRecord, LineRecord, Mode, RunRecord, StopRecord, TimetableIndex,
};
use legwork::validator::{
    AbstractLeg, ChainVerdict, Error, ExplicitLeg, LegFailure, LegStatus, OdRequest, Options,
    Place, Plan, Validator,
};

fn stop(id: &str, lat: f64, lon: f64) -> StopRecord {
    StopRecord {
        id: id.into(),
        name: id.into(),
        mode: Mode::Bus,
        coordinate: (lat, lon).into(),
        platform_hint: None,
    }
}

fn run(id: &str, times: &[u32]) -> RunRecord {
    RunRecord {
        id: id.into(),
        line_id: "B42".into(),
        calls: ["s1", "s2", "s3"]
            .iter()
            .zip(times)
            .map(|(stop_id, t)| CallRecord {
                stop_id: (*stop_id).into(),
                arrival: Time::from_seconds(*t),
                departure: Time::from_seconds(*t),
            })
            .collect(),
    }
}

fn bus_lane(id: &str, lat: f64, lon: f64) -> Lane {
    let from = Coordinate::from((lat, lon - 0.001));
    let to = Coordinate::from((lat, lon + 0.001));
    Lane {
        index: 0,
        id: id.into(),
        edge_id: format!("{id}_edge").into(),
        from,
        to,
        length: from.euclidean_distance(&to),
        allows: Box::new([VehicleClass::Bus, VehicleClass::Passenger]),
        connected: true,
    }
}

/// Line B42 over s1 -> s2 -> s3, runs r0 at 50/60/70 and r1 at 100/130/160,
/// one eastbound bus lane next to each stop. "s9" has no lane anywhere near
/// it and stays unbound.
fn fixture() -> (TimetableIndex, BindingTable, LaneGrid) {
    let timetable = TimetableIndex::build(
        vec![
            stop("s1", 0.0, 0.0),
            stop("s2", 0.0, 0.01),
            stop("s3", 0.0, 0.02),
            stop("s9", 0.0, 0.2),
        ],
        vec![LineRecord {
            id: "B42".into(),
            mode: Mode::Bus,
            stop_ids: vec!["s1".into(), "s2".into(), "s3".into()],
        }],
        vec![run("r0", &[50, 60, 70]), run("r1", &[100, 130, 160])],
    )
    .unwrap();
    let grid = LaneGrid::new(vec![
        bus_lane("lane_s1", -0.00005, 0.0),
        bus_lane("lane_s2", -0.00005, 0.01),
        bus_lane("lane_s3", -0.00005, 0.02),
    ]);
    let table = Binder::new(&grid).bind_all(&timetable);
    (timetable, table, grid)
}

fn ride(line: &str, board: &str, alight: &str, not_before: u32) -> AbstractLeg {
    AbstractLeg::Ride {
        line: line.into(),
        board: board.into(),
        alight: alight.into(),
        depart_not_before: Time::from_seconds(not_before),
    }
}

fn plan(id: &str, depart: u32, origin: Place, destination: Place, legs: Vec<AbstractLeg>) -> Plan {
    Plan {
        request: OdRequest {
            id: id.into(),
            depart: Time::from_seconds(depart),
            origin,
            destination,
        },
        legs,
    }
}

#[test]
fn single_ride_certified_test() {
    let (timetable, table, _grid) = fixture();
    let validator = Validator::new(&timetable, &table).with_options(Options {
        pt_window_before: Duration::from_seconds(0),
        pt_window_after: Duration::from_seconds(60),
        ..Options::default()
    });

    let plan = plan(
        "odA",
        90,
        Place::Stop("s1".into()),
        Place::Stop("s3".into()),
        vec![ride("B42", "s1", "s3", 90)],
    );
    let validation = validator.validate(&plan).unwrap();

    assert_eq!(validation.report.verdict, ChainVerdict::Valid);
    let chain = validation.chain.unwrap();
    assert_eq!(chain.legs.len(), 1);
    assert_eq!(chain.depart, Time::from_seconds(100));
    assert_eq!(chain.arrival, Time::from_seconds(160));
    match &chain.legs[0] {
        ExplicitLeg::Ride {
            run,
            board_time,
            alight_time,
            ..
        } => {
            assert_eq!(&**run, "r1");
            assert_eq!(*board_time, Time::from_seconds(100));
            assert_eq!(*alight_time, Time::from_seconds(160));
        }
        other => panic!("expected a ride leg, got {other:?}"),
    }
}

#[test]
fn infeasible_ride_order_rejected_test() {
    let (timetable, table, _grid) = fixture();
    let validator = Validator::new(&timetable, &table).with_options(Options {
        strict_continuity: true,
        ..Options::default()
    });

    let plan = plan(
        "odB",
        90,
        Place::Stop("s3".into()),
        Place::Stop("s1".into()),
        vec![ride("B42", "s3", "s1", 90)],
    );
    let validation = validator.validate(&plan).unwrap();

    assert_eq!(validation.report.verdict, ChainVerdict::Rejected { leg: 0 });
    assert!(validation.chain.is_none());
    assert!(matches!(
        validation.report.legs[0].status,
        LegStatus::Failed {
            failure: LegFailure::InfeasibleRideOrder { .. }
        }
    ));
}

#[test]
fn no_serving_run_degrades_to_warning_test() {
    let (timetable, table, _grid) = fixture();
    let validator = Validator::new(&timetable, &table);

    // No run departs s1 anywhere near 20000s; the walk after it survives.
    let plan = plan(
        "odC",
        20000,
        Place::Stop("s1".into()),
        Place::Point(Coordinate::from((0.0, 0.021))),
        vec![
            ride("B42", "s1", "s3", 20000),
            AbstractLeg::Walk {
                from: Place::Stop("s3".into()),
                to: Place::Point(Coordinate::from((0.0, 0.021))),
            },
        ],
    );
    let validation = validator.validate(&plan).unwrap();

    assert_eq!(
        validation.report.verdict,
        ChainVerdict::ValidWithWarnings
    );
    assert!(matches!(
        validation.report.legs[0].status,
        LegStatus::Warning {
            failure: LegFailure::NoServingRun { .. }
        }
    ));
    assert!(matches!(validation.report.legs[1].status, LegStatus::Ok));
    let chain = validation.chain.unwrap();
    assert_eq!(chain.legs.len(), 1);
    assert!(matches!(chain.legs[0], ExplicitLeg::Walk { .. }));
}

#[test]
fn window_upper_edge_is_inclusive_test() {
    let (timetable, table, _grid) = fixture();
    let options = Options {
        pt_window_before: Duration::from_seconds(0),
        pt_window_after: Duration::from_seconds(10),
        ..Options::default()
    };
    let validator = Validator::new(&timetable, &table).with_options(options);

    // r1 boards s1 at 100. At t=90 the window closes exactly at 100.
    let included = plan(
        "odW1",
        90,
        Place::Stop("s1".into()),
        Place::Stop("s3".into()),
        vec![ride("B42", "s1", "s3", 90)],
    );
    let validation = validator.validate(&included).unwrap();
    assert_eq!(validation.report.verdict, ChainVerdict::Valid);

    // One second earlier the window closes at 99 and no run fits.
    let excluded = plan(
        "odW2",
        89,
        Place::Stop("s1".into()),
        Place::Stop("s3".into()),
        vec![ride("B42", "s1", "s3", 89)],
    );
    let validation = validator.validate(&excluded).unwrap();
    assert!(matches!(
        validation.report.legs[0].status,
        LegStatus::Warning {
            failure: LegFailure::NoServingRun { .. }
        }
    ));
}

#[test]
fn closest_miss_prefers_latest_earlier_boarding_test() {
    let (timetable, table, _grid) = fixture();
    let validator = Validator::new(&timetable, &table);

    // Nothing departs at or after 120; r1 (100) misses by less than r0 (50).
    let plan = plan(
        "odM",
        120,
        Place::Stop("s1".into()),
        Place::Stop("s3".into()),
        vec![ride("B42", "s1", "s3", 120)],
    );
    let validation = validator.validate(&plan).unwrap();
    let chain = validation.chain.unwrap();
    match &chain.legs[0] {
        ExplicitLeg::Ride { run, board_time, .. } => {
            assert_eq!(&**run, "r1");
            assert_eq!(*board_time, Time::from_seconds(100));
        }
        other => panic!("expected a ride leg, got {other:?}"),
    }
}

#[test]
fn strict_chain_continuity_round_trip_test() {
    let (timetable, table, _grid) = fixture();
    let validator = Validator::new(&timetable, &table).with_options(Options {
        pt_window_before: Duration::from_seconds(0),
        pt_window_after: Duration::from_seconds(60),
        strict_continuity: true,
        ..Options::default()
    });

    let origin = Place::Point(Coordinate::from((0.0, -0.001)));
    let destination = Place::Point(Coordinate::from((0.0, 0.021)));
    let plan = plan(
        "odR",
        0,
        origin.clone(),
        destination.clone(),
        vec![
            AbstractLeg::Walk {
                from: origin,
                to: Place::Stop("s1".into()),
            },
            ride("B42", "s1", "s3", 90),
            AbstractLeg::Walk {
                from: Place::Stop("s3".into()),
                to: destination,
            },
        ],
    );
    let validation = validator.validate(&plan).unwrap();

    assert_eq!(validation.report.verdict, ChainVerdict::Valid);
    let chain = validation.chain.unwrap();
    assert_eq!(chain.legs.len(), 3);
    for pair in chain.legs.windows(2) {
        let end = pair[0].end_place();
        let start = pair[1].start_place();
        assert!(pair[0].end_time() <= pair[1].start_time());
        match (&end.stop_id, &start.stop_id) {
            (Some(a), Some(b)) => assert_eq!(a, b),
            _ => assert_eq!(end.position, start.position),
        }
    }
}

#[test]
fn broken_continuity_rejects_strict_chain_test() {
    let (timetable, table, _grid) = fixture();
    let validator = Validator::new(&timetable, &table).with_options(Options {
        pt_window_before: Duration::from_seconds(0),
        pt_window_after: Duration::from_seconds(60),
        strict_continuity: true,
        ..Options::default()
    });

    // The second ride restarts at s1 while the traveller stands at s3.
    let plan = plan(
        "odX",
        90,
        Place::Stop("s1".into()),
        Place::Stop("s3".into()),
        vec![ride("B42", "s1", "s3", 90), ride("B42", "s1", "s3", 90)],
    );
    let validation = validator.validate(&plan).unwrap();

    assert_eq!(validation.report.verdict, ChainVerdict::Rejected { leg: 1 });
    assert!(validation.chain.is_none());
    assert!(matches!(
        validation.report.legs[1].status,
        LegStatus::Failed {
            failure: LegFailure::ContinuityBroken { .. }
        }
    ));
}

#[test]
fn broken_continuity_warns_when_lenient_test() {
    let (timetable, table, _grid) = fixture();
    let validator = Validator::new(&timetable, &table).with_options(Options {
        pt_window_before: Duration::from_seconds(0),
        pt_window_after: Duration::from_seconds(60),
        ..Options::default()
    });

    let plan = plan(
        "odY",
        90,
        Place::Stop("s1".into()),
        Place::Stop("s3".into()),
        vec![ride("B42", "s1", "s3", 90), ride("B42", "s1", "s3", 90)],
    );
    let validation = validator.validate(&plan).unwrap();

    assert_eq!(
        validation.report.verdict,
        ChainVerdict::ValidWithWarnings
    );
    let chain = validation.chain.unwrap();
    assert_eq!(chain.legs.len(), 2);
}

#[test]
fn unbound_stop_reported_test() {
    let (timetable, table, _grid) = fixture();
    assert!(table.by_id("s9").is_none());
    let validator = Validator::new(&timetable, &table);

    let plan = plan(
        "odU",
        0,
        Place::Stop("s9".into()),
        Place::Point(Coordinate::from((0.0, 0.0))),
        vec![AbstractLeg::Walk {
            from: Place::Stop("s9".into()),
            to: Place::Point(Coordinate::from((0.0, 0.0))),
        }],
    );
    let validation = validator.validate(&plan).unwrap();

    assert!(matches!(
        validation.report.legs[0].status,
        LegStatus::Warning {
            failure: LegFailure::UnboundStop { .. }
        }
    ));
    assert!(validation.chain.is_none());
}

#[test]
fn walk_speed_factor_scales_duration_test() {
    let (timetable, table, _grid) = fixture();
    let legs = vec![AbstractLeg::Walk {
        from: Place::Stop("s1".into()),
        to: Place::Stop("s2".into()),
    }];
    let base_plan = plan(
        "odS",
        0,
        Place::Stop("s1".into()),
        Place::Stop("s2".into()),
        legs,
    );

    let slow = Validator::new(&timetable, &table)
        .validate(&base_plan)
        .unwrap();
    let fast = Validator::new(&timetable, &table)
        .with_options(Options {
            walk_speed_factor: 2.0,
            ..Options::default()
        })
        .validate(&base_plan)
        .unwrap();

    let duration_of = |validation: &legwork::validator::Validation| match validation
        .chain
        .as_ref()
        .unwrap()
        .legs[0]
    {
        ExplicitLeg::Walk { duration, .. } => duration,
        _ => panic!("expected a walk leg"),
    };
    assert!(duration_of(&fast) < duration_of(&slow));
}

#[test]
fn empty_plan_is_an_error_test() {
    let (timetable, table, _grid) = fixture();
    let validator = Validator::new(&timetable, &table);
    let empty = plan(
        "odE",
        0,
        Place::Stop("s1".into()),
        Place::Stop("s3".into()),
        Vec::new(),
    );
    assert!(matches!(
        validator.validate(&empty),
        Err(Error::EmptyPlan(_))
    ));
}

#[test]
fn validate_all_isolates_requests_test() {
    let (timetable, table, _grid) = fixture();
    let validator = Validator::new(&timetable, &table).with_options(Options {
        pt_window_before: Duration::from_seconds(0),
        pt_window_after: Duration::from_seconds(60),
        strict_continuity: true,
        ..Options::default()
    });

    let plans = vec![
        plan(
            "ok",
            90,
            Place::Stop("s1".into()),
            Place::Stop("s3".into()),
            vec![ride("B42", "s1", "s3", 90)],
        ),
        plan(
            "bad",
            90,
            Place::Stop("s3".into()),
            Place::Stop("s1".into()),
            vec![ride("B42", "s3", "s1", 90)],
        ),
    ];
    let results = validator.validate_all(&plans);
    assert_eq!(results.len(), 2);
    assert!(results[0].as_ref().unwrap().is_valid());
    assert!(!results[1].as_ref().unwrap().is_valid());
}
