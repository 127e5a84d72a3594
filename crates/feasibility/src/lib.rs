//! Given a prospective placement (previous attitude, candidate
//! opportunity, time gap), decides feasibility and computes realized
//! timings. Shared by every scheduler strategy so they differ only in
//! iteration order, never in what "feasible" means.

use chrono::{DateTime, Duration, Utc};
use opportunities::Opportunity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum gap enforced between the end of one task and the start of the
/// maneuver into the next, regardless of how fast the maneuver itself is.
pub const MIN_GAP_SECONDS: f64 = 10.0;

#[derive(Error, Debug)]
pub enum FeasibilityError {
    #[error("spacecraft rate/accel limits must be > 0: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, FeasibilityError>;

/// Trapezoidal-profile rate/accel limits for one axis pair (roll, pitch),
/// plus an optional settling time applied once per maneuver.
#[derive(Debug, Clone, Copy)]
pub struct SpacecraftLimits {
    pub max_roll_rate_dps: f64,
    pub max_roll_accel_dps2: f64,
    pub max_pitch_rate_dps: f64,
    pub max_pitch_accel_dps2: f64,
    pub settling_time_s: f64,
}

impl SpacecraftLimits {
    /// `settling_time_s` defaults to 0 (the spec's resolution of the
    /// source's inconsistent default); call [`with_settling_time`] to
    /// opt into the 5 s the original mission-config default used.
    ///
    /// [`with_settling_time`]: SpacecraftLimits::with_settling_time
    pub fn new(
        max_roll_rate_dps: f64,
        max_roll_accel_dps2: f64,
        max_pitch_rate_dps: f64,
        max_pitch_accel_dps2: f64,
    ) -> Result<Self> {
        if max_roll_rate_dps <= 0.0 || max_roll_accel_dps2 <= 0.0 {
            return Err(FeasibilityError::InvalidConfiguration(
                "roll rate/accel must be > 0".into(),
            ));
        }
        if max_pitch_rate_dps <= 0.0 || max_pitch_accel_dps2 <= 0.0 {
            return Err(FeasibilityError::InvalidConfiguration(
                "pitch rate/accel must be > 0".into(),
            ));
        }
        Ok(Self {
            max_roll_rate_dps,
            max_roll_accel_dps2,
            max_pitch_rate_dps,
            max_pitch_accel_dps2,
            settling_time_s: 0.0,
        })
    }

    pub fn with_settling_time(mut self, settling_time_s: f64) -> Self {
        self.settling_time_s = settling_time_s;
        self
    }
}

/// Maneuver time for one axis under a trapezoidal rate/accel profile:
/// triangular (never reaches `v_max`) below `v_max² / a_max`, trapezoidal
/// above it.
pub fn maneuver_time_single_axis(delta_theta_deg: f64, v_max: f64, a_max: f64) -> f64 {
    let delta = delta_theta_deg.abs();
    let triangular_threshold = v_max * v_max / a_max;
    if delta <= triangular_threshold {
        2.0 * (delta / a_max).sqrt()
    } else {
        v_max / a_max + delta / v_max
    }
}

/// Combined roll+pitch maneuver time: axes slew simultaneously, so the
/// combined time is the slower of the two, plus settling time.
pub fn combined_maneuver_time_s(
    delta_roll_deg: f64,
    delta_pitch_deg: f64,
    limits: &SpacecraftLimits,
) -> f64 {
    let t_roll = maneuver_time_single_axis(
        delta_roll_deg,
        limits.max_roll_rate_dps,
        limits.max_roll_accel_dps2,
    );
    let t_pitch = maneuver_time_single_axis(
        delta_pitch_deg,
        limits.max_pitch_rate_dps,
        limits.max_pitch_accel_dps2,
    );
    t_roll.max(t_pitch) + limits.settling_time_s
}

/// The attitude the spacecraft holds at some instant: either the
/// nadir-pointing reference (before the first task) or the realized
/// attitude of a previously scheduled opportunity.
#[derive(Debug, Clone, Copy)]
pub struct AttitudeReference {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub end: DateTime<Utc>,
}

impl AttitudeReference {
    pub fn nadir(at: DateTime<Utc>) -> Self {
        Self {
            roll_deg: 0.0,
            pitch_deg: 0.0,
            end: at,
        }
    }

    pub fn from_scheduled(scheduled: &ScheduledOpportunity) -> Self {
        Self {
            roll_deg: scheduled.abs_roll_deg,
            pitch_deg: scheduled.abs_pitch_deg,
            end: scheduled.opportunity.end,
        }
    }
}

/// An [`Opportunity`] plus the realized attitude transition from its
/// predecessor on the same satellite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledOpportunity {
    pub opportunity: Opportunity,
    pub delta_roll_deg: f64,
    pub delta_pitch_deg: f64,
    pub maneuver_time_s: f64,
    pub slack_time_s: f64,
    pub abs_roll_deg: f64,
    pub abs_pitch_deg: f64,
}

impl std::ops::Deref for ScheduledOpportunity {
    type Target = Opportunity;

    fn deref(&self) -> &Opportunity {
        &self.opportunity
    }
}

/// Why a candidate opportunity was rejected. Not an error — per spec §7,
/// `InfeasibleOpportunity` is recorded as a rejection with reason, not
/// surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    ManeuverExceedsGap { maneuver_s: f64, gap_s: f64 },
    RollLimitExceeded { roll_deg: f64, limit_deg: f64 },
    PitchLimitExceeded { pitch_deg: f64, limit_deg: f64 },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::ManeuverExceedsGap { maneuver_s, gap_s } => write!(
                f,
                "maneuver time {maneuver_s:.1}s exceeds available gap {gap_s:.1}s"
            ),
            RejectionReason::RollLimitExceeded { roll_deg, limit_deg } => {
                write!(f, "roll {roll_deg:.2}deg exceeds limit {limit_deg:.2}deg")
            }
            RejectionReason::PitchLimitExceeded { pitch_deg, limit_deg } => {
                write!(f, "pitch {pitch_deg:.2}deg exceeds limit {limit_deg:.2}deg")
            }
        }
    }
}

/// Evaluates whether `candidate` can follow `reference` on the same
/// satellite. `allowable_window_slip_s` is 0 unless the calling scheduler
/// strategy explicitly permits shifting the opportunity's start later
/// (spec §4.4 step 4).
pub fn evaluate(
    reference: &AttitudeReference,
    candidate: &Opportunity,
    limits: &SpacecraftLimits,
    max_spacecraft_roll_deg: f64,
    max_spacecraft_pitch_deg: f64,
    allowable_window_slip_s: f64,
) -> std::result::Result<ScheduledOpportunity, RejectionReason> {
    if candidate.roll_angle_deg.abs() > max_spacecraft_roll_deg {
        return Err(RejectionReason::RollLimitExceeded {
            roll_deg: candidate.roll_angle_deg,
            limit_deg: max_spacecraft_roll_deg,
        });
    }
    if candidate.pitch_angle_deg.abs() > max_spacecraft_pitch_deg {
        return Err(RejectionReason::PitchLimitExceeded {
            pitch_deg: candidate.pitch_angle_deg,
            limit_deg: max_spacecraft_pitch_deg,
        });
    }

    let delta_roll_deg = (candidate.roll_angle_deg - reference.roll_deg).abs();
    let delta_pitch_deg = (candidate.pitch_angle_deg - reference.pitch_deg).abs();
    let maneuver_time_s = combined_maneuver_time_s(delta_roll_deg, delta_pitch_deg, limits);

    let earliest_start = reference.end
        + Duration::seconds(MIN_GAP_SECONDS as i64)
        + Duration::milliseconds((maneuver_time_s * 1000.0) as i64);
    let allowable_start =
        candidate.start + Duration::milliseconds((allowable_window_slip_s * 1000.0) as i64);

    if earliest_start > allowable_start {
        let gap_s = (candidate.start - reference.end).num_milliseconds() as f64 / 1000.0;
        return Err(RejectionReason::ManeuverExceedsGap {
            maneuver_s: maneuver_time_s,
            gap_s,
        });
    }

    let slack_time_s = ((candidate.start - earliest_start).num_milliseconds() as f64 / 1000.0)
        .max(0.0);

    Ok(ScheduledOpportunity {
        opportunity: candidate.clone(),
        delta_roll_deg,
        delta_pitch_deg,
        maneuver_time_s,
        slack_time_s,
        abs_roll_deg: candidate.roll_angle_deg,
        abs_pitch_deg: candidate.pitch_angle_deg,
    })
}
