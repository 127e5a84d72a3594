//! Mission planner CLI
//!
//! Runs the full visibility -> opportunity -> scheduling pipeline against
//! a JSON planning request and prints a JSON planning response. This is
//! the thin external surface spec.md treats as out of scope for the
//! core; it exists only to exercise the library end to end, the way
//! `candidate-selector/src/main.rs` sits outside `orbital-mechanics`.
//!
//! Usage:
//!   mission-planner-cli --request scenario.json
//!   mission-planner-cli --demo   # runs a small built-in two-target scenario

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use mission_planner::{plan, PlanningParams, PlanningRequest};
use planner_support::{Budget, CancellationToken};
use propagation::{OrbitalElements, Sgp4Propagator, SubsolarSunModel};
use scheduler::Strategy;
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use visibility::{GroundTarget, VisibilityParams};

#[derive(Parser, Debug)]
#[command(
    name = "mission-planner-cli",
    about = "Plan a conflict-free imaging schedule for an agile-satellite constellation"
)]
struct Args {
    /// Path to a JSON planning request. Omit with --demo for a built-in scenario.
    #[arg(short, long)]
    request: Option<PathBuf>,

    /// Run the built-in two-satellite demo scenario instead of reading a request file.
    #[arg(long)]
    demo: bool,

    /// Wall-clock budget for the whole request, in seconds. 0 means unbounded.
    #[arg(long, default_value_t = 0.0)]
    budget_s: f64,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct TleSatellite {
    id: String,
    line1: String,
    line2: String,
}

#[derive(Debug, Deserialize)]
struct CliHorizon {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CliRequest {
    satellites: Vec<TleSatellite>,
    targets: Vec<GroundTarget>,
    horizon: CliHorizon,
    params: PlanningParams,
    strategies: Vec<Strategy>,
    #[serde(default)]
    visibility_params: Option<VisibilityParams>,
}

#[derive(Debug, Serialize)]
struct ScheduledOpportunityOutput {
    id: String,
    satellite_id: String,
    target_id: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    value: f64,
    incidence_angle_deg: f64,
    roll_angle_deg: f64,
    pitch_angle_deg: f64,
    delta_roll_deg: f64,
    delta_pitch_deg: f64,
    maneuver_time_s: f64,
    slack_time_s: f64,
}

#[derive(Debug, Serialize)]
struct DisplacedOutput {
    opportunity_id: String,
    target_id: String,
    satellite_id: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct StrategyOutput {
    strategy: Strategy,
    schedule: Vec<ScheduledOpportunityOutput>,
    displaced: Vec<DisplacedOutput>,
    swaps: Vec<scheduler::SwapRecord>,
    per_satellite_metrics: Vec<scheduler::SchedulerMetrics>,
    invariants: Vec<mission_planner::InvariantCheck>,
}

#[derive(Debug, Serialize)]
struct CliResponse {
    results: Vec<StrategyOutput>,
}

fn demo_request() -> CliRequest {
    let epoch = NaiveDate::from_ymd_opt(2026, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    CliRequest {
        satellites: vec![],
        targets: vec![
            GroundTarget::new(
                "gulf-a",
                25.2,
                55.3,
                0.0,
                5,
                visibility::MissionMode::Sar,
                45.0,
                45.0,
                5.0,
            )
            .unwrap(),
            GroundTarget::new(
                "gulf-b",
                24.5,
                54.4,
                0.0,
                3,
                visibility::MissionMode::Sar,
                45.0,
                45.0,
                5.0,
            )
            .unwrap(),
        ],
        horizon: CliHorizon {
            start: epoch,
            end: epoch + chrono::Duration::hours(12),
        },
        params: PlanningParams {
            imaging_time_s: 5.0,
            max_spacecraft_roll_deg: 45.0,
            max_roll_rate_dps: 2.0,
            max_roll_accel_dps2: 1.0,
            max_spacecraft_pitch_deg: 30.0,
            max_pitch_rate_dps: 2.0,
            max_pitch_accel_dps2: 1.0,
            quality_model: opportunities::QualityModel::banded_default(),
            quality_weight: 0.5,
            settling_time_s: 0.0,
            value_model: opportunities::ValueModel::Standard,
            allowable_window_slip_s: 0.0,
            singleton_policy: scheduler::SingletonPolicy::BestGeometry,
        },
        strategies: vec![Strategy::FirstFit, Strategy::BestFit],
        visibility_params: None,
    }
}

fn demo_propagator() -> Sgp4Propagator {
    let mut propagator = Sgp4Propagator::new();
    let elements = OrbitalElements::from_raw(
        "iceye-demo",
        propagation::RawElements {
            epoch: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            norad_id: 90500,
            inclination_deg: 97.6,
            right_ascension_deg: 55.0,
            eccentricity: 0.0006,
            argument_of_perigee_deg: 0.0,
            mean_anomaly_deg: 0.0,
            mean_motion_orbits_day: 14.99,
        },
    );
    propagator.insert(elements);
    propagator
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let (cli_request, propagator) = if args.demo {
        info!("running built-in demo scenario");
        (demo_request(), demo_propagator())
    } else {
        let path = args
            .request
            .context("--request <file> is required unless --demo is set")?;
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading planning request from {path:?}"))?;
        let cli_request: CliRequest =
            serde_json::from_str(&raw).context("parsing planning request JSON")?;

        let mut propagator = Sgp4Propagator::new();
        for satellite in &cli_request.satellites {
            let elements = OrbitalElements::from_tle(&satellite.id, &satellite.line1, &satellite.line2)
                .with_context(|| format!("parsing TLE for satellite {}", satellite.id))?;
            propagator.insert(elements);
        }
        (cli_request, propagator)
    };

    let satellite_ids: Vec<String> = if cli_request.satellites.is_empty() {
        vec!["iceye-demo".to_string()]
    } else {
        cli_request.satellites.iter().map(|s| s.id.clone()).collect()
    };

    let request = PlanningRequest {
        satellite_ids,
        targets: cli_request.targets,
        horizon: (cli_request.horizon.start, cli_request.horizon.end),
        params: cli_request.params,
        strategies: cli_request.strategies,
        visibility_params: cli_request.visibility_params.unwrap_or_default(),
    };

    let sun_model = SubsolarSunModel;
    let cancellation = CancellationToken::new();
    let budget = if args.budget_s > 0.0 {
        Budget::from_duration(std::time::Duration::from_secs_f64(args.budget_s))
    } else {
        Budget::unbounded()
    };

    let response = plan(&propagator, &sun_model, &request, &cancellation, &budget)
        .map_err(|e| anyhow::anyhow!("planning failed: {e}"))?;

    let cli_response = CliResponse {
        results: response
            .results
            .into_iter()
            .map(|result| StrategyOutput {
                strategy: result.strategy,
                schedule: result
                    .schedule
                    .iter()
                    .map(|s| ScheduledOpportunityOutput {
                        id: s.opportunity.id.clone(),
                        satellite_id: s.opportunity.satellite_id.clone(),
                        target_id: s.opportunity.target_id.clone(),
                        start: s.opportunity.start,
                        end: s.opportunity.end,
                        value: s.opportunity.value,
                        incidence_angle_deg: s.opportunity.incidence_angle_deg,
                        roll_angle_deg: s.opportunity.roll_angle_deg,
                        pitch_angle_deg: s.opportunity.pitch_angle_deg,
                        delta_roll_deg: s.delta_roll_deg,
                        delta_pitch_deg: s.delta_pitch_deg,
                        maneuver_time_s: s.maneuver_time_s,
                        slack_time_s: s.slack_time_s,
                    })
                    .collect(),
                displaced: result
                    .displaced
                    .iter()
                    .map(|d| DisplacedOutput {
                        opportunity_id: d.scheduled.opportunity.id.clone(),
                        target_id: d.scheduled.opportunity.target_id.clone(),
                        satellite_id: d.scheduled.opportunity.satellite_id.clone(),
                        reason: format!("{:?}", d.reason),
                    })
                    .collect(),
                swaps: result.swaps,
                per_satellite_metrics: result.per_satellite_metrics,
                invariants: result.invariants,
            })
            .collect(),
    };

    println!("{}", serde_json::to_string_pretty(&cli_response)?);
    Ok(())
}
