//! Cross-crate property tests: random, individually-valid targets run
//! through the full `mission_planner::plan` pipeline must never produce a
//! schedule that violates the chronological, singleton, or attitude-limit
//! invariants (spec §8 properties 6, 7, 9), no matter what combination of
//! latitude/longitude/priority/quality-model the generators hand us.

use chrono::{Duration, NaiveDate};
use mission_planner::{plan, PlanningParams, PlanningRequest};
use opportunities::{QualityModel, ValueModel};
use planner_proptest::{ground_target, quality_model, spacecraft_limits};
use planner_support::{Budget, CancellationToken};
use propagation::{OrbitalElements, RawElements, Sgp4Propagator, SubsolarSunModel};
use proptest::prelude::*;
use scheduler::{SingletonPolicy, Strategy};
use visibility::VisibilityParams;

fn epoch() -> chrono::DateTime<chrono::Utc> {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

fn fixed_propagator() -> Sgp4Propagator {
    let mut propagator = Sgp4Propagator::new();
    propagator.insert(OrbitalElements::from_raw(
        "sat-1",
        RawElements {
            epoch: epoch().naive_utc(),
            norad_id: 90700,
            inclination_deg: 97.6,
            right_ascension_deg: 40.0,
            eccentricity: 0.0006,
            argument_of_perigee_deg: 0.0,
            mean_anomaly_deg: 0.0,
            mean_motion_orbits_day: 14.99,
        },
    ));
    propagator
}

fn params_for(limits: feasibility::SpacecraftLimits, quality_model: QualityModel) -> PlanningParams {
    PlanningParams {
        imaging_time_s: 5.0,
        max_spacecraft_roll_deg: 45.0,
        max_roll_rate_dps: limits.max_roll_rate_dps,
        max_roll_accel_dps2: limits.max_roll_accel_dps2,
        max_spacecraft_pitch_deg: 30.0,
        max_pitch_rate_dps: limits.max_pitch_rate_dps,
        max_pitch_accel_dps2: limits.max_pitch_accel_dps2,
        quality_model,
        quality_weight: 0.5,
        settling_time_s: 0.0,
        value_model: ValueModel::Standard,
        allowable_window_slip_s: 0.0,
        singleton_policy: SingletonPolicy::BestGeometry,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// For any three individually-valid, randomly-generated targets and
    /// spacecraft limits, the full pipeline's invariant checks (spec §8
    /// properties 6, 7, 9) must all report `passed`. This is the
    /// cross-crate counterpart to the narrow single-function properties
    /// `geometry` and `feasibility` already check locally.
    #[test]
    fn full_pipeline_never_violates_core_invariants(
        target_a in ground_target("rand-a"),
        target_b in ground_target("rand-b"),
        target_c in ground_target("rand-c"),
        limits in spacecraft_limits(),
        quality_model in quality_model(),
    ) {
        let propagator = fixed_propagator();
        let sun_model = SubsolarSunModel;

        let request = PlanningRequest {
            satellite_ids: vec!["sat-1".into()],
            targets: vec![target_a, target_b, target_c],
            horizon: (epoch(), epoch() + Duration::hours(18)),
            params: params_for(limits, quality_model),
            strategies: vec![Strategy::FirstFit, Strategy::BestFit, Strategy::ValueDensity],
            visibility_params: VisibilityParams::default(),
        };

        let response = plan(
            &propagator,
            &sun_model,
            &request,
            &CancellationToken::new(),
            &Budget::unbounded(),
        );

        // Every generated target satisfies GroundTarget::new's own
        // validation, so the only acceptable outcome is Ok with all
        // invariants passing — never InvalidInput, never a violated check.
        let response = response.expect("randomly generated, individually-valid inputs must plan successfully");
        for result in &response.results {
            for invariant in &result.invariants {
                prop_assert!(invariant.passed, "{} failed: {}", invariant.name, invariant.detail);
            }
        }
    }
}
