//! External-collaborator contracts for the planner: a `Propagator` that
//! turns orbital elements + a timestamp into a subpoint, and a `SunModel`
//! that locates the subsolar point. Ships one concrete `Propagator`,
//! `Sgp4Propagator`, backed by the `sgp4` crate.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Timelike, Utc};
use geometry::{Ecef, Geodetic, SatelliteState};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PropagationError {
    #[error("invalid orbital elements: {0}")]
    InvalidElements(String),
    #[error("propagation failed for {satellite_id}: {reason}")]
    PropagationFailed { satellite_id: String, reason: String },
    #[error("unknown satellite id: {0}")]
    UnknownSatellite(String),
    #[error("propagated position is not a valid geodetic point: {0}")]
    InvalidGeometry(String),
}

pub type Result<T> = std::result::Result<T, PropagationError>;

/// Raw orbital elements for direct `sgp4::Elements` construction, bypassing
/// TLE string formatting. Angles in degrees, mean motion in orbits/day
/// (Kozai convention).
#[derive(Debug, Clone, Copy)]
pub struct RawElements {
    pub epoch: NaiveDateTime,
    pub norad_id: u64,
    pub inclination_deg: f64,
    pub right_ascension_deg: f64,
    pub eccentricity: f64,
    pub argument_of_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    pub mean_motion_orbits_day: f64,
}

/// Orbital elements for one satellite. Opaque to the rest of the core:
/// callers construct it once (from a TLE pair or raw elements) and pass it
/// to a `Propagator`; nothing outside this crate inspects its contents.
/// Immutable after construction.
#[derive(Debug)]
pub struct OrbitalElements {
    satellite_id: String,
    elements: sgp4::Elements,
}

impl OrbitalElements {
    pub fn from_tle(
        satellite_id: impl Into<String>,
        line1: &str,
        line2: &str,
    ) -> Result<Self> {
        let elements = sgp4::Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
            .map_err(|e| PropagationError::InvalidElements(format!("{e:?}")))?;
        Ok(Self {
            satellite_id: satellite_id.into(),
            elements,
        })
    }

    pub fn from_raw(satellite_id: impl Into<String>, raw: RawElements) -> Self {
        let elements = sgp4::Elements {
            object_name: None,
            international_designator: None,
            norad_id: raw.norad_id,
            classification: sgp4::Classification::Unclassified,
            datetime: raw.epoch,
            mean_motion_dot: 0.0,
            mean_motion_ddot: 0.0,
            drag_term: 0.0,
            element_set_number: 1,
            inclination: raw.inclination_deg,
            right_ascension: raw.right_ascension_deg,
            eccentricity: raw.eccentricity,
            argument_of_perigee: raw.argument_of_perigee_deg,
            mean_anomaly: raw.mean_anomaly_deg,
            mean_motion: raw.mean_motion_orbits_day,
            revolution_number: 1,
            ephemeris_type: 0,
        };
        Self {
            satellite_id: satellite_id.into(),
            elements,
        }
    }

    pub fn satellite_id(&self) -> &str {
        &self.satellite_id
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_naive_utc_and_offset(self.elements.datetime, Utc)
    }

    pub fn mean_motion_orbits_day(&self) -> f64 {
        self.elements.mean_motion
    }

    /// Orbital period implied by the mean motion, used by adaptive-step
    /// visibility search to bound how far it can safely skip ahead.
    pub fn orbital_period(&self) -> Duration {
        let minutes = 1440.0 / self.elements.mean_motion;
        Duration::milliseconds((minutes * 60_000.0).round() as i64)
    }
}

/// Consumed by the visibility engine: given a satellite id and a UTC
/// instant, yields the subpoint (latitude, longitude, altitude). Must be
/// pure and synchronous — a network-backed implementation must provide its
/// own concurrency discipline.
pub trait Propagator: Send + Sync {
    fn propagate(&self, satellite_id: &str, t: DateTime<Utc>) -> Result<Geodetic>;

    /// Used by adaptive stepping to bound how far it can skip ahead.
    /// `None` disables the optimization for that satellite (fixed-step
    /// search is still correct).
    fn orbital_period(&self, satellite_id: &str) -> Option<Duration> {
        let _ = satellite_id;
        None
    }
}

/// Consumed by the visibility engine for OPTICAL sun-illumination gating.
pub trait SunModel: Send + Sync {
    /// Subsolar point at `t`: `(latitude_deg, longitude_deg)`.
    fn sun_subpoint(&self, t: DateTime<Utc>) -> (f64, f64);
}

/// SGP4-backed `Propagator` over a fixed set of orbital elements.
pub struct Sgp4Propagator {
    elements: HashMap<String, OrbitalElements>,
}

impl Sgp4Propagator {
    pub fn new() -> Self {
        Self {
            elements: HashMap::new(),
        }
    }

    pub fn with_elements(elements: impl IntoIterator<Item = OrbitalElements>) -> Self {
        let mut propagator = Self::new();
        for element in elements {
            propagator.insert(element);
        }
        propagator
    }

    pub fn insert(&mut self, elements: OrbitalElements) {
        self.elements
            .insert(elements.satellite_id().to_string(), elements);
    }
}

impl Default for Sgp4Propagator {
    fn default() -> Self {
        Self::new()
    }
}

impl Propagator for Sgp4Propagator {
    fn propagate(&self, satellite_id: &str, t: DateTime<Utc>) -> Result<Geodetic> {
        let elements = self
            .elements
            .get(satellite_id)
            .ok_or_else(|| PropagationError::UnknownSatellite(satellite_id.to_string()))?;

        let constants = sgp4::Constants::from_elements(&elements.elements).map_err(|e| {
            PropagationError::PropagationFailed {
                satellite_id: satellite_id.to_string(),
                reason: format!("{e:?}"),
            }
        })?;

        let minutes_since_epoch =
            t.signed_duration_since(elements.epoch()).num_milliseconds() as f64 / 60_000.0;

        let prediction = constants.propagate(minutes_since_epoch).map_err(|e| {
            PropagationError::PropagationFailed {
                satellite_id: satellite_id.to_string(),
                reason: format!("{e:?}"),
            }
        })?;

        // Position comes out of SGP4 in a quasi-inertial frame; treated as
        // ECEF directly (Earth-rotation-to-ECEF correction is out of scope,
        // matching the spherical-Earth, non-rotating-frame approximation
        // the rest of the geometry kernel already makes).
        let position = Ecef {
            x: prediction.position[0],
            y: prediction.position[1],
            z: prediction.position[2],
        };

        geometry::ecef_to_geodetic(position)
            .map_err(|e| PropagationError::InvalidGeometry(e.to_string()))
    }

    fn orbital_period(&self, satellite_id: &str) -> Option<Duration> {
        self.elements.get(satellite_id).map(|e| e.orbital_period())
    }
}

/// Analytic subsolar-point approximation: declination from day-of-year via
/// a single sine term, subsolar longitude from the UTC time of day. Good
/// enough for sun-elevation gating; not an ephemeris-grade sun model.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsolarSunModel;

impl SunModel for SubsolarSunModel {
    fn sun_subpoint(&self, t: DateTime<Utc>) -> (f64, f64) {
        let day_of_year = t.ordinal() as f64;
        let declination_deg =
            23.44 * ((360.0 / 365.0) * (day_of_year - 81.0)).to_radians().sin();

        let decimal_hour = t.hour() as f64 + t.minute() as f64 / 60.0 + t.second() as f64 / 3600.0;
        let mut longitude_deg = (12.0 - decimal_hour) * 15.0;
        while longitude_deg > 180.0 {
            longitude_deg -= 360.0;
        }
        while longitude_deg < -180.0 {
            longitude_deg += 360.0;
        }

        (declination_deg, longitude_deg)
    }
}

/// Half-width, in seconds, of the central-difference window used to
/// estimate satellite velocity from subpoint propagation (the `Propagator`
/// trait exposes only position, per spec §6).
const VELOCITY_HALF_STEP_S: f64 = 0.5;

/// Estimates the satellite's ECEF position and velocity at `t` from two
/// nearby `Propagator` calls via central difference. `signed_roll_angle`
/// needs a velocity vector that the position-only `Propagator` contract
/// doesn't carry; this reconstructs one without widening that contract.
pub fn satellite_state_at(
    propagator: &dyn Propagator,
    satellite_id: &str,
    t: DateTime<Utc>,
) -> Result<SatelliteState> {
    let half_step = Duration::milliseconds((VELOCITY_HALF_STEP_S * 1000.0) as i64);

    let before = propagator.propagate(satellite_id, t - half_step)?;
    let after = propagator.propagate(satellite_id, t + half_step)?;
    let now = propagator.propagate(satellite_id, t)?;

    let before_ecef = geometry::geodetic_to_ecef(before);
    let after_ecef = geometry::geodetic_to_ecef(after);
    let now_ecef = geometry::geodetic_to_ecef(now);

    let dt = 2.0 * VELOCITY_HALF_STEP_S;
    let velocity = Ecef {
        x: (after_ecef.x - before_ecef.x) / dt,
        y: (after_ecef.y - before_ecef.y) / dt,
        z: (after_ecef.z - before_ecef.z) / dt,
    };

    Ok(SatelliteState {
        position: now_ecef,
        velocity,
    })
}
