//! Top-level orchestration for the imaging mission planner.
//!
//! Owns none of the subsystem logic, only sequencing: geometry is used
//! transitively by every stage below it, [`visibility::VisibilityEngine`]
//! finds access windows, [`opportunities`] turns them into scheduler-ready
//! candidates, [`scheduler`] places them per satellite and resolves the
//! constellation-wide singleton rule, and this crate checks the resulting
//! schedule against the invariants a caller can rely on.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use feasibility::SpacecraftLimits;
use opportunities::{GenerationMode, OpportunityParams, QualityModel, ValueModel};
use planner_support::{Budget, CancellationToken};
use propagation::{Propagator, SunModel};
use scheduler::{
    resolve_constellation, ScheduledOpportunity, SchedulerConfig, SchedulerMetrics,
    SingletonPolicy, Strategy, SwapRecord,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use visibility::{GroundTarget, Pass, VisibilityEngine, VisibilityParams};

pub use feasibility::MIN_GAP_SECONDS;
pub use opportunities::Opportunity;
pub use scheduler::{DisplacedOpportunity, DisplacedReason, RejectedOpportunity};

/// The planner's error taxonomy (spec §7), composed from every
/// subsystem's own error enum. `InfeasibleOpportunity` deliberately has
/// no variant here: per spec it "is not an error," and is recorded as a
/// [`scheduler::RejectedOpportunity`] instead. `BudgetExceeded` manifests
/// as [`PlannerError::Cancelled`].
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    GeometryInvalidInput(#[from] geometry::GeometryError),
    #[error("propagator unavailable for satellite {satellite_id} / target {target_id}: {reason}")]
    PropagatorUnavailable {
        satellite_id: String,
        target_id: String,
        reason: String,
    },
    #[error("planning cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PlannerError>;

impl From<visibility::VisibilityError> for PlannerError {
    fn from(err: visibility::VisibilityError) -> Self {
        match err {
            visibility::VisibilityError::InvalidInput(msg) => PlannerError::InvalidInput(msg),
            visibility::VisibilityError::GeometryInvalidInput(e) => e.into(),
            visibility::VisibilityError::PropagatorUnavailable {
                satellite_id,
                target_id,
                reason,
            } => PlannerError::PropagatorUnavailable {
                satellite_id,
                target_id,
                reason,
            },
            visibility::VisibilityError::Cancelled => PlannerError::Cancelled,
        }
    }
}

impl From<opportunities::OpportunityError> for PlannerError {
    fn from(err: opportunities::OpportunityError) -> Self {
        match err {
            opportunities::OpportunityError::InvalidInput(msg) => PlannerError::InvalidInput(msg),
            opportunities::OpportunityError::GeometryInvalidInput(e) => e.into(),
            opportunities::OpportunityError::PropagatorFailed(reason) => {
                PlannerError::PropagatorUnavailable {
                    satellite_id: String::new(),
                    target_id: String::new(),
                    reason,
                }
            }
        }
    }
}

impl From<scheduler::SchedulerError> for PlannerError {
    fn from(err: scheduler::SchedulerError) -> Self {
        match err {
            scheduler::SchedulerError::InvalidInput(msg) => PlannerError::InvalidInput(msg),
            scheduler::SchedulerError::Cancelled => PlannerError::Cancelled,
        }
    }
}

impl From<feasibility::FeasibilityError> for PlannerError {
    fn from(err: feasibility::FeasibilityError) -> Self {
        match err {
            feasibility::FeasibilityError::InvalidConfiguration(msg) => {
                PlannerError::InvalidInput(msg)
            }
        }
    }
}

/// Per-request tuning knobs that correspond to spec §6's inbound
/// `params` object. Quality model, quality weight, and spacecraft limits
/// apply identically to every requested strategy; the opportunity
/// generation mode (roll-only vs roll+pitch) is instead derived per
/// strategy (see [`Strategy`]'s roll/pitch tag).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningParams {
    pub imaging_time_s: f64,
    pub max_spacecraft_roll_deg: f64,
    pub max_roll_rate_dps: f64,
    pub max_roll_accel_dps2: f64,
    pub max_spacecraft_pitch_deg: f64,
    pub max_pitch_rate_dps: f64,
    pub max_pitch_accel_dps2: f64,
    pub quality_model: QualityModel,
    pub quality_weight: f64,
    /// Optional additive maneuver settling time (spec §4.4, §9 Open
    /// Questions); defaults to 0 when unset, matching the spec's
    /// resolution of the source's inconsistent default.
    #[serde(default)]
    pub settling_time_s: f64,
    /// `priority + quality_weight` legacy value formula vs. the spec's
    /// canonical blend. Defaults to the canonical formula.
    #[serde(default)]
    pub value_model: ValueModel,
    /// Allows a scheduler strategy to shift a candidate's start later by
    /// up to this many seconds to absorb maneuver time (spec §4.4 step
    /// 4). Zero (the default) means no shifting is permitted.
    #[serde(default)]
    pub allowable_window_slip_s: f64,
    #[serde(default = "default_singleton_policy")]
    pub singleton_policy: SingletonPolicy,
}

fn default_singleton_policy() -> SingletonPolicy {
    SingletonPolicy::BestGeometry
}

impl PlanningParams {
    fn spacecraft_limits(&self) -> Result<SpacecraftLimits> {
        Ok(SpacecraftLimits::new(
            self.max_roll_rate_dps,
            self.max_roll_accel_dps2,
            self.max_pitch_rate_dps,
            self.max_pitch_accel_dps2,
        )?
        .with_settling_time(self.settling_time_s))
    }

    fn opportunity_params(&self, mode: GenerationMode) -> Result<OpportunityParams> {
        Ok(OpportunityParams::new(
            mode,
            self.imaging_time_s,
            self.max_spacecraft_roll_deg,
            self.max_spacecraft_pitch_deg,
            self.quality_model,
        )?
        .with_quality_weight(self.quality_weight)
        .with_value_model(self.value_model))
    }
}

/// A planning request: the constellation (named by id — orbital-element
/// parsing is external, spec §1), the targets, the horizon, tuning
/// parameters, and the strategies to evaluate.
#[derive(Debug, Clone)]
pub struct PlanningRequest {
    pub satellite_ids: Vec<String>,
    pub targets: Vec<GroundTarget>,
    pub horizon: (DateTime<Utc>, DateTime<Utc>),
    pub params: PlanningParams,
    pub strategies: Vec<Strategy>,
    pub visibility_params: VisibilityParams,
}

impl PlanningRequest {
    fn validate(&self) -> Result<()> {
        if self.satellite_ids.is_empty() {
            return Err(PlannerError::InvalidInput(
                "satellites list must not be empty".into(),
            ));
        }
        if self.horizon.1 <= self.horizon.0 {
            return Err(PlannerError::InvalidInput(
                "horizon end must be after start".into(),
            ));
        }
        if self.strategies.is_empty() {
            return Err(PlannerError::InvalidInput(
                "strategies list must not be empty".into(),
            ));
        }
        self.params.spacecraft_limits()?;
        Ok(())
    }
}

/// One [spec §8] invariant check, run against the realized schedule
/// rather than merely asserted in tests — a caller gets the same
/// guarantees at runtime that the test suite checks at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheck {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// The result of running one strategy end to end.
#[derive(Debug, Clone)]
pub struct StrategyResult {
    pub strategy: Strategy,
    pub schedule: Vec<ScheduledOpportunity>,
    pub displaced: Vec<DisplacedOpportunity>,
    pub swaps: Vec<SwapRecord>,
    pub per_satellite_metrics: Vec<SchedulerMetrics>,
    pub invariants: Vec<InvariantCheck>,
}

#[derive(Debug, Clone)]
pub struct PlanningResponse {
    pub results: Vec<StrategyResult>,
}

fn generation_mode_for(strategy: Strategy) -> GenerationMode {
    match strategy {
        Strategy::RollPitchFirstFit | Strategy::RollPitchBestFit => GenerationMode::RollPitch,
        Strategy::FirstFit | Strategy::BestFit | Strategy::ValueDensity => GenerationMode::RollOnly,
    }
}

fn check_budget(cancellation: &CancellationToken, budget: &Budget) -> Result<()> {
    if cancellation.is_cancelled() || budget.is_expired() {
        return Err(PlannerError::Cancelled);
    }
    Ok(())
}

/// Checks the chronological invariant (spec §8 property 6): per
/// satellite, consecutive starts are non-decreasing and each task
/// respects the minimum gap plus its own maneuver time.
fn check_chronological(schedule: &[ScheduledOpportunity]) -> InvariantCheck {
    let mut by_satellite: HashMap<&str, Vec<&ScheduledOpportunity>> = HashMap::new();
    for scheduled in schedule {
        by_satellite
            .entry(scheduled.opportunity.satellite_id.as_str())
            .or_default()
            .push(scheduled);
    }

    for tasks in by_satellite.values_mut() {
        tasks.sort_by_key(|s| s.opportunity.start);
        for window in tasks.windows(2) {
            let (prev, next) = (window[0], window[1]);
            if next.opportunity.start < prev.opportunity.start {
                return InvariantCheck {
                    name: "chronological_order",
                    passed: false,
                    detail: format!(
                        "satellite {} has out-of-order starts: {} then {}",
                        prev.opportunity.satellite_id, prev.opportunity.start, next.opportunity.start
                    ),
                };
            }
            let min_gap = chrono::Duration::seconds(MIN_GAP_SECONDS as i64)
                + chrono::Duration::milliseconds((next.maneuver_time_s * 1000.0) as i64);
            if next.opportunity.start < prev.opportunity.end + min_gap {
                return InvariantCheck {
                    name: "chronological_order",
                    passed: false,
                    detail: format!(
                        "satellite {} task {} starts before predecessor's gap+maneuver window closes",
                        prev.opportunity.satellite_id, next.opportunity.id
                    ),
                };
            }
        }
    }

    InvariantCheck {
        name: "chronological_order",
        passed: true,
        detail: "all per-satellite starts are non-decreasing and gap/maneuver-respecting".into(),
    }
}

/// Checks the singleton invariant (spec §8 property 7): every target
/// appears in at most one scheduled opportunity across the whole
/// constellation.
fn check_singleton(schedule: &[ScheduledOpportunity]) -> InvariantCheck {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for scheduled in schedule {
        let target_id = scheduled.opportunity.target_id.as_str();
        if let Some(existing_sat) = seen.get(target_id) {
            if *existing_sat != scheduled.opportunity.satellite_id {
                return InvariantCheck {
                    name: "singleton_per_target",
                    passed: false,
                    detail: format!(
                        "target {target_id} scheduled on both {existing_sat} and {}",
                        scheduled.opportunity.satellite_id
                    ),
                };
            }
        } else {
            seen.insert(target_id, &scheduled.opportunity.satellite_id);
        }
    }
    InvariantCheck {
        name: "singleton_per_target",
        passed: true,
        detail: format!("{} distinct targets, no duplicates", seen.len()),
    }
}

/// Checks the attitude-limit invariant (spec §8 property 9).
fn check_attitude_limits(schedule: &[ScheduledOpportunity], params: &PlanningParams) -> InvariantCheck {
    for scheduled in schedule {
        if scheduled.opportunity.roll_angle_deg.abs() > params.max_spacecraft_roll_deg {
            return InvariantCheck {
                name: "attitude_limits",
                passed: false,
                detail: format!(
                    "opportunity {} roll {:.3} exceeds limit {:.3}",
                    scheduled.opportunity.id,
                    scheduled.opportunity.roll_angle_deg,
                    params.max_spacecraft_roll_deg
                ),
            };
        }
        if scheduled.opportunity.pitch_angle_deg.abs() > params.max_spacecraft_pitch_deg {
            return InvariantCheck {
                name: "attitude_limits",
                passed: false,
                detail: format!(
                    "opportunity {} pitch {:.3} exceeds limit {:.3}",
                    scheduled.opportunity.id,
                    scheduled.opportunity.pitch_angle_deg,
                    params.max_spacecraft_pitch_deg
                ),
            };
        }
    }
    InvariantCheck {
        name: "attitude_limits",
        passed: true,
        detail: format!("{} scheduled tasks, all within limits", schedule.len()),
    }
}

/// Runs one requested strategy end to end: per-satellite scheduling over
/// `candidates_by_satellite`, then constellation-wide singleton
/// resolution and coverage-improvement swap repair.
#[allow(clippy::too_many_arguments)]
fn run_strategy(
    strategy: Strategy,
    satellite_ids: &[String],
    candidates_by_satellite: &HashMap<String, Vec<Opportunity>>,
    horizon_start: DateTime<Utc>,
    params: &PlanningParams,
    cancellation: &CancellationToken,
    budget: &Budget,
) -> Result<StrategyResult> {
    check_budget(cancellation, budget)?;

    let limits = params.spacecraft_limits()?;
    let scheduler_config = SchedulerConfig {
        max_spacecraft_roll_deg: params.max_spacecraft_roll_deg,
        max_spacecraft_pitch_deg: params.max_spacecraft_pitch_deg,
        limits,
        allowable_window_slip_s: params.allowable_window_slip_s,
    };

    let target_universe = |satellite_id: &str| -> usize {
        candidates_by_satellite
            .get(satellite_id)
            .map(|opps| {
                opps.iter()
                    .map(|o| o.target_id.as_str())
                    .collect::<std::collections::HashSet<_>>()
                    .len()
            })
            .unwrap_or(0)
    };

    let mut per_satellite_schedules = HashMap::new();
    let mut per_satellite_metrics = Vec::new();

    for satellite_id in satellite_ids {
        check_budget(cancellation, budget)?;
        let empty = Vec::new();
        let opportunities = candidates_by_satellite.get(satellite_id).unwrap_or(&empty);
        let result = scheduler::schedule_satellite(
            satellite_id,
            opportunities,
            horizon_start,
            strategy,
            &scheduler_config,
            cancellation,
            target_universe(satellite_id),
        )?;
        per_satellite_metrics.push(result.metrics.clone());
        per_satellite_schedules.insert(satellite_id.clone(), result.schedule);
    }

    let constellation = resolve_constellation(
        per_satellite_schedules,
        candidates_by_satellite,
        horizon_start,
        &scheduler_config,
        params.singleton_policy,
        cancellation,
    )?;

    let invariants = vec![
        check_chronological(&constellation.schedule),
        check_singleton(&constellation.schedule),
        check_attitude_limits(&constellation.schedule, params),
    ];

    Ok(StrategyResult {
        strategy,
        schedule: constellation.schedule,
        displaced: constellation.displaced,
        swaps: constellation.swaps,
        per_satellite_metrics,
        invariants,
    })
}

/// Runs the full pipeline — visibility search, opportunity generation,
/// per-satellite scheduling, constellation resolution — for every
/// strategy named in `request.strategies`, and checks the resulting
/// schedule's invariants.
///
/// Empty targets yields an empty schedule with zeroed metrics and no
/// error (spec §8 scenario S5); an empty satellite list is
/// [`PlannerError::InvalidInput`].
pub fn plan(
    propagator: &dyn Propagator,
    sun_model: &dyn SunModel,
    request: &PlanningRequest,
    cancellation: &CancellationToken,
    budget: &Budget,
) -> Result<PlanningResponse> {
    request.validate()?;
    check_budget(cancellation, budget)?;

    if request.targets.is_empty() {
        let results = request
            .strategies
            .iter()
            .map(|&strategy| StrategyResult {
                strategy,
                schedule: Vec::new(),
                displaced: Vec::new(),
                swaps: Vec::new(),
                per_satellite_metrics: Vec::new(),
                invariants: vec![
                    InvariantCheck {
                        name: "chronological_order",
                        passed: true,
                        detail: "no targets, nothing to schedule".into(),
                    },
                    InvariantCheck {
                        name: "singleton_per_target",
                        passed: true,
                        detail: "no targets, nothing to schedule".into(),
                    },
                    InvariantCheck {
                        name: "attitude_limits",
                        passed: true,
                        detail: "no targets, nothing to schedule".into(),
                    },
                ],
            })
            .collect();
        return Ok(PlanningResponse { results });
    }

    let engine = VisibilityEngine::new();
    let passes_by_target: HashMap<String, Vec<Pass>> = engine.search_all(
        propagator,
        sun_model,
        &request.satellite_ids,
        &request.targets,
        request.horizon,
        &request.visibility_params,
        cancellation,
    )?;

    check_budget(cancellation, budget)?;

    let needed_modes: std::collections::HashSet<GenerationMode> = request
        .strategies
        .iter()
        .map(|&s| generation_mode_for(s))
        .collect();

    let mut candidates_by_mode: HashMap<GenerationMode, HashMap<String, Vec<Opportunity>>> =
        HashMap::new();

    for mode in needed_modes {
        let opp_params = request.params.opportunity_params(mode)?;
        let mut candidates_by_satellite: HashMap<String, Vec<Opportunity>> = HashMap::new();
        for target in &request.targets {
            let empty = Vec::new();
            let passes = passes_by_target.get(&target.id).unwrap_or(&empty);
            let opportunities = opportunities::generate_all(propagator, passes, target, &opp_params)?;
            for opportunity in opportunities {
                candidates_by_satellite
                    .entry(opportunity.satellite_id.clone())
                    .or_default()
                    .push(opportunity);
            }
        }
        candidates_by_mode.insert(mode, candidates_by_satellite);
    }

    check_budget(cancellation, budget)?;

    let mut results = Vec::with_capacity(request.strategies.len());
    for &strategy in &request.strategies {
        let mode = generation_mode_for(strategy);
        let candidates = &candidates_by_mode[&mode];
        let result = run_strategy(
            strategy,
            &request.satellite_ids,
            candidates,
            request.horizon.0,
            &request.params,
            cancellation,
            budget,
        )?;
        results.push(result);
    }

    Ok(PlanningResponse { results })
}
