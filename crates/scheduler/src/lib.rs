//! Per-satellite task scheduling strategies, constellation singleton
//! resolution, and coverage-improvement swap repair.
//!
//! Every strategy shares the same feasibility kernel ([`feasibility`])
//! and differs only in the order candidates are considered. Constellation
//! resolution and swap repair run once, after every satellite has an
//! independent schedule.

use chrono::{DateTime, Utc};
use feasibility::SpacecraftLimits;
use opportunities::Opportunity;
use planner_support::CancellationToken;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod constellation;
mod strategies;

pub use constellation::{
    resolve_constellation, ConstellationResult, DisplacedOpportunity, DisplacedReason,
    SingletonPolicy, SwapRecord,
};
pub use feasibility::{AttitudeReference, RejectionReason, ScheduledOpportunity};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("planning cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Which per-satellite ordering strategy to run. Roll-only variants
/// assume each opportunity already carries `pitch_angle_deg == 0`
/// (true of [`opportunities::GenerationMode::RollOnly`] output) but do
/// not themselves enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    FirstFit,
    BestFit,
    ValueDensity,
    RollPitchFirstFit,
    RollPitchBestFit,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::FirstFit => "first_fit",
            Strategy::BestFit => "best_fit",
            Strategy::ValueDensity => "value_density",
            Strategy::RollPitchFirstFit => "roll_pitch_first_fit",
            Strategy::RollPitchBestFit => "roll_pitch_best_fit",
        }
    }

    /// The underlying ordering algorithm, ignoring the roll/pitch tag
    /// (which only documents what the upstream opportunity generator
    /// produced, not a separate scheduling algorithm).
    fn base(&self) -> BaseAlgorithm {
        match self {
            Strategy::FirstFit | Strategy::RollPitchFirstFit => BaseAlgorithm::FirstFit,
            Strategy::BestFit | Strategy::RollPitchBestFit => BaseAlgorithm::BestFit,
            Strategy::ValueDensity => BaseAlgorithm::ValueDensity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseAlgorithm {
    FirstFit,
    BestFit,
    ValueDensity,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_spacecraft_roll_deg: f64,
    pub max_spacecraft_pitch_deg: f64,
    pub limits: SpacecraftLimits,
    /// Passed to [`feasibility::evaluate`]; 0 unless the strategy
    /// explicitly permits shifting a candidate's start later.
    pub allowable_window_slip_s: f64,
}

/// A candidate rejected during per-satellite scheduling, kept for
/// reporting (spec §4.5.6: "per-strategy metrics").
#[derive(Debug, Clone)]
pub struct RejectedOpportunity {
    pub opportunity: Opportunity,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    pub algorithm: &'static str,
    pub opportunities_evaluated: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub mean_incidence_deg: f64,
    pub max_incidence_deg: f64,
    pub total_value: f64,
    pub total_maneuver_time_s: f64,
    pub total_slack_s: f64,
    pub wall_clock_s: f64,
    pub coverage_pct: f64,
}

impl SchedulerMetrics {
    fn from_run(
        algorithm: &'static str,
        evaluated: usize,
        accepted: &[ScheduledOpportunity],
        wall_clock_s: f64,
        target_universe: usize,
    ) -> Self {
        let n = accepted.len();
        let total_value: f64 = accepted.iter().map(|s| s.opportunity.value).sum();
        let total_maneuver_time_s: f64 = accepted.iter().map(|s| s.maneuver_time_s).sum();
        let total_slack_s: f64 = accepted.iter().map(|s| s.slack_time_s).sum();
        let incidences: Vec<f64> = accepted
            .iter()
            .map(|s| s.opportunity.incidence_angle_deg)
            .collect();
        let mean_incidence_deg = if n > 0 {
            incidences.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };
        let max_incidence_deg = incidences.iter().cloned().fold(0.0_f64, f64::max);
        let coverage_pct = if target_universe > 0 {
            100.0 * n as f64 / target_universe as f64
        } else {
            0.0
        };
        Self {
            algorithm,
            opportunities_evaluated: evaluated,
            accepted: n,
            rejected: evaluated.saturating_sub(n),
            mean_incidence_deg,
            max_incidence_deg,
            total_value,
            total_maneuver_time_s,
            total_slack_s,
            wall_clock_s,
            coverage_pct,
        }
    }
}

/// Per-satellite scheduling result: the accepted schedule (strictly
/// non-decreasing `start`, spec §5 ordering guarantee), the rejected
/// candidates with reasons, and run metrics.
#[derive(Debug, Clone)]
pub struct SatelliteSchedule {
    pub satellite_id: String,
    pub schedule: Vec<ScheduledOpportunity>,
    pub rejected: Vec<RejectedOpportunity>,
    pub metrics: SchedulerMetrics,
}

/// Runs one strategy over one satellite's candidate opportunities.
///
/// `horizon_start` seeds the initial attitude reference (nadir-pointing
/// at the start of the planning horizon); `target_universe` is the
/// number of distinct targets this satellite has at least one candidate
/// for, used for `coverage_pct`.
pub fn schedule_satellite(
    satellite_id: &str,
    opportunities: &[Opportunity],
    horizon_start: DateTime<Utc>,
    strategy: Strategy,
    config: &SchedulerConfig,
    token: &CancellationToken,
    target_universe: usize,
) -> Result<SatelliteSchedule> {
    if config.max_spacecraft_roll_deg <= 0.0 || config.max_spacecraft_pitch_deg <= 0.0 {
        return Err(SchedulerError::InvalidInput(
            "max_spacecraft_roll_deg and max_spacecraft_pitch_deg must be > 0".into(),
        ));
    }

    let started = std::time::Instant::now();
    let evaluated = opportunities.len();

    let (schedule, rejected) = match strategy.base() {
        BaseAlgorithm::FirstFit => {
            strategies::first_fit(opportunities, horizon_start, config, token)?
        }
        BaseAlgorithm::BestFit => {
            strategies::best_fit(opportunities, horizon_start, config, token)?
        }
        BaseAlgorithm::ValueDensity => {
            strategies::value_density(opportunities, horizon_start, config, token)?
        }
    };

    tracing::info!(
        satellite_id,
        algorithm = strategy.label(),
        evaluated,
        accepted = schedule.len(),
        rejected = rejected.len(),
        "per-satellite scheduling complete"
    );

    let metrics = SchedulerMetrics::from_run(
        strategy.label(),
        evaluated,
        &schedule,
        started.elapsed().as_secs_f64(),
        target_universe,
    );

    Ok(SatelliteSchedule {
        satellite_id: satellite_id.to_string(),
        schedule,
        rejected,
        metrics,
    })
}
