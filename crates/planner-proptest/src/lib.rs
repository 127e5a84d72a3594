//! Reusable domain generators for property-based testing across the
//! planner's crates: plausible latitudes/longitudes, spacecraft limits,
//! quality models, and fully-built `GroundTarget`s. Crates that already
//! own a narrow property (geometry's round-trip, feasibility's maneuver
//! monotonicity) keep their `proptest!` blocks local; this crate is for
//! properties that span more than one crate, where a shared generator
//! saves every caller from re-deriving "what counts as a valid target".

use feasibility::SpacecraftLimits;
use opportunities::QualityModel;
use proptest::prelude::*;
use visibility::{GroundTarget, MissionMode};

/// Latitudes away from the poles, where the spherical-Earth
/// approximation and ENU basis stay well-conditioned.
pub fn latitude_deg() -> impl Strategy<Value = f64> {
    -80.0f64..80.0
}

pub fn longitude_deg() -> impl Strategy<Value = f64> {
    -179.9f64..179.9
}

pub fn altitude_m() -> impl Strategy<Value = f64> {
    0.0f64..500.0
}

pub fn priority() -> impl Strategy<Value = u32> {
    1u32..10
}

pub fn mission_mode() -> impl Strategy<Value = MissionMode> {
    prop_oneof![Just(MissionMode::Optical), Just(MissionMode::Sar)]
}

/// A plausible sensor field of regard: wide enough for a pass to exist,
/// narrow enough to exercise roll rejection.
pub fn fov_half_angle_deg() -> impl Strategy<Value = f64> {
    10.0f64..60.0
}

pub fn quality_model() -> impl Strategy<Value = QualityModel> {
    prop_oneof![
        Just(QualityModel::Off),
        Just(QualityModel::Monotonic),
        (10.0f64..60.0, 3.0f64..20.0).prop_map(|(ideal_incidence_deg, band_width_deg)| {
            QualityModel::Banded {
                ideal_incidence_deg,
                band_width_deg,
            }
        }),
    ]
}

/// Slew rate/accel pairs that are always strictly positive, the only
/// constraint `SpacecraftLimits::new` enforces.
pub fn spacecraft_limits() -> impl Strategy<Value = SpacecraftLimits> {
    (0.1f64..5.0, 0.05f64..3.0, 0.1f64..5.0, 0.05f64..3.0).prop_map(
        |(roll_rate, roll_accel, pitch_rate, pitch_accel)| {
            SpacecraftLimits::new(roll_rate, roll_accel, pitch_rate, pitch_accel).unwrap()
        },
    )
}

prop_compose! {
    /// A fully valid, randomly-parameterized imaging target. Every field
    /// is drawn from a range `GroundTarget::new` is guaranteed to accept,
    /// so callers never need to handle the `Err` branch.
    pub fn ground_target(id: &'static str)(
        latitude_deg in latitude_deg(),
        longitude_deg in longitude_deg(),
        altitude_m in altitude_m(),
        priority in priority(),
        mission_mode in mission_mode(),
        fov_half_angle_deg in fov_half_angle_deg(),
        max_roll_deg in 20.0f64..60.0,
        elevation_mask_deg in 0.0f64..30.0,
    ) -> GroundTarget {
        GroundTarget::new(
            id,
            latitude_deg,
            longitude_deg,
            altitude_m,
            priority,
            mission_mode,
            fov_half_angle_deg,
            max_roll_deg,
            elevation_mask_deg,
        )
        .unwrap()
    }
}
