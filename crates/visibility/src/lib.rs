//! Per-(satellite,target) access-window search.
//!
//! Produces [`Pass`] records: continuous intervals during which a target
//! lies inside the spacecraft-pointable cone, optionally gated by
//! sun-illumination for OPTICAL targets. Supports a fixed-step mode (the
//! baseline, always correct) and an adaptive mode that skips ahead when the
//! target is far outside reach, refining AOS/LOS the same way either mode.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;

use chrono::{DateTime, Duration, Utc};
use geometry::Geodetic;
use planner_support::CancellationToken;
use propagation::{Propagator, SunModel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisibilityError {
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

pub type Result<T> = std::result::Result<T, VisibilityError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissionMode {
    Optical,
    Sar,
}

/// A geolocated imaging target. Created once per planning request, never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundTarget {
    pub id: String,
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
    pub priority: u32,
    pub mission_mode: MissionMode,
    pub sensor_fov_half_angle_deg: f64,
    pub max_spacecraft_roll_deg: f64,
    pub elevation_mask_deg: f64,
    /// 0.0 disables sun-illumination gating (the spec's "unset" default).
    pub min_sun_elevation_deg: f64,
}

impl GroundTarget {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f64,
        priority: u32,
        mission_mode: MissionMode,
        sensor_fov_half_angle_deg: f64,
        max_spacecraft_roll_deg: f64,
        elevation_mask_deg: f64,
    ) -> Result<Self> {
        if priority < 1 {
            return Err(VisibilityError::InvalidInput(
                "priority must be >= 1".into(),
            ));
        }
        if !(0.0..=90.0).contains(&elevation_mask_deg) {
            return Err(VisibilityError::InvalidInput(format!(
                "elevation_mask_deg {elevation_mask_deg} must be in [0, 90)"
            )));
        }
        if !(sensor_fov_half_angle_deg > 0.0 && sensor_fov_half_angle_deg <= 90.0) {
            return Err(VisibilityError::InvalidInput(format!(
                "sensor_fov_half_angle_deg {sensor_fov_half_angle_deg} must be in (0, 90]"
            )));
        }
        if !(max_spacecraft_roll_deg > 0.0 && max_spacecraft_roll_deg <= 90.0) {
            return Err(VisibilityError::InvalidInput(format!(
                "max_spacecraft_roll_deg {max_spacecraft_roll_deg} must be in (0, 90]"
            )));
        }
        Ok(Self {
            id: id.into(),
            latitude_deg,
            longitude_deg,
            altitude_m,
            priority,
            mission_mode,
            sensor_fov_half_angle_deg,
            max_spacecraft_roll_deg,
            elevation_mask_deg,
            min_sun_elevation_deg: 0.0,
        })
    }

    pub fn with_min_sun_elevation_deg(mut self, min_sun_elevation_deg: f64) -> Self {
        self.min_sun_elevation_deg = min_sun_elevation_deg;
        self
    }

    pub fn geodetic(&self) -> std::result::Result<Geodetic, geometry::GeometryError> {
        Geodetic::new(self.latitude_deg, self.longitude_deg, self.altitude_m / 1000.0)
    }
}

/// A continuous access window for one (satellite, target) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pass {
    pub target_id: String,
    pub satellite_id: String,
    pub start: DateTime<Utc>,
    pub peak: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub max_elevation_deg: f64,
    pub peak_azimuth_deg: f64,
    pub peak_incidence_deg: f64,
    pub peak_signed_roll_deg: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisibilityParams {
    pub step_s: f64,
    pub time_edge_epsilon_s: f64,
    pub min_pass_duration_s: f64,
    pub tolerance_eps_deg: f64,
    pub adaptive: bool,
    pub propagator_failure_abort_s: f64,
}

impl Default for VisibilityParams {
    fn default() -> Self {
        Self {
            step_s: 1.0,
            time_edge_epsilon_s: 0.5,
            min_pass_duration_s: 1.0,
            tolerance_eps_deg: 1e-6,
            adaptive: false,
            propagator_failure_abort_s: 120.0,
        }
    }
}

/// Instantaneous accessibility geometry at one timestamp.
#[derive(Debug, Clone, Copy)]
pub struct AccessibilitySample {
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
    pub off_nadir_deg: f64,
    pub sun_elevation_deg: Option<f64>,
    pub accessible: bool,
}

/// Standalone accessibility predicate: a timestamp is accessible iff the
/// elevation clears the mask and the off-nadir angle clears the pointable
/// cone, and (for OPTICAL targets with gating enabled) the sun is high
/// enough above the target.
pub fn is_accessible(
    sat: Geodetic,
    target: &GroundTarget,
    sun_subpoint: Option<(f64, f64)>,
    tolerance_eps_deg: f64,
) -> std::result::Result<AccessibilitySample, geometry::GeometryError> {
    let target_geo = target.geodetic()?;
    let (elevation_deg, azimuth_deg) = geometry::elevation_azimuth(sat, target_geo)?;
    let off_nadir_deg = geometry::off_nadir_angle(sat, target_geo)?;

    let pointable_limit_deg = target
        .sensor_fov_half_angle_deg
        .min(target.max_spacecraft_roll_deg)
        + tolerance_eps_deg;

    let mut accessible = elevation_deg >= target.elevation_mask_deg && off_nadir_deg <= pointable_limit_deg;

    let sun_elevation_deg = if target.mission_mode == MissionMode::Optical
        && target.min_sun_elevation_deg > 0.0
    {
        let (sun_lat, sun_lon) = sun_subpoint.unwrap_or((0.0, 0.0));
        let elevation =
            geometry::solar_elevation_deg(target.latitude_deg, target.longitude_deg, sun_lat, sun_lon);
        accessible &= elevation >= target.min_sun_elevation_deg;
        Some(elevation)
    } else {
        None
    };

    Ok(AccessibilitySample {
        elevation_deg,
        azimuth_deg,
        off_nadir_deg,
        sun_elevation_deg,
        accessible,
    })
}

enum SampleFailure {
    Propagator(propagation::PropagationError),
    Geometry(geometry::GeometryError),
}

impl From<SampleFailure> for String {
    fn from(failure: SampleFailure) -> Self {
        match failure {
            SampleFailure::Propagator(e) => e.to_string(),
            SampleFailure::Geometry(e) => e.to_string(),
        }
    }
}

/// Searches access windows for one or many (satellite, target) pairs,
/// memoizing propagator evaluations for the lifetime of the engine (one
/// planning request).
pub struct VisibilityEngine {
    cache: Mutex<HashMap<(String, i64), Geodetic>>,
}

impl Default for VisibilityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityEngine {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn propagate_cached(
        &self,
        propagator: &dyn Propagator,
        satellite_id: &str,
        t: DateTime<Utc>,
    ) -> std::result::Result<Geodetic, propagation::PropagationError> {
        let key = (satellite_id.to_string(), t.timestamp());
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return Ok(*cached);
        }
        let geodetic = propagator.propagate(satellite_id, t)?;
        self.cache.lock().unwrap().insert(key, geodetic);
        Ok(geodetic)
    }

    fn sample_at(
        &self,
        propagator: &dyn Propagator,
        sun_model: &dyn SunModel,
        satellite_id: &str,
        target: &GroundTarget,
        t: DateTime<Utc>,
        tolerance_eps_deg: f64,
    ) -> std::result::Result<AccessibilitySample, SampleFailure> {
        let sat_geo = self
            .propagate_cached(propagator, satellite_id, t)
            .map_err(SampleFailure::Propagator)?;

        let sun_subpoint = if target.mission_mode == MissionMode::Optical
            && target.min_sun_elevation_deg > 0.0
        {
            Some(sun_model.sun_subpoint(t))
        } else {
            None
        };

        is_accessible(sat_geo, target, sun_subpoint, tolerance_eps_deg).map_err(SampleFailure::Geometry)
    }

    /// Binary search for the accessible/inaccessible boundary between
    /// `t_not_accessible` and `t_accessible` (chronological order either
    /// way), refined to `time_edge_epsilon_s`.
    fn bisect_edge(
        &self,
        propagator: &dyn Propagator,
        sun_model: &dyn SunModel,
        satellite_id: &str,
        target: &GroundTarget,
        mut t_not_accessible: DateTime<Utc>,
        mut t_accessible: DateTime<Utc>,
        params: &VisibilityParams,
    ) -> Result<DateTime<Utc>> {
        let epsilon_ms = (params.time_edge_epsilon_s * 1000.0) as i64;

        while (t_accessible - t_not_accessible).num_milliseconds().abs() > epsilon_ms {
            let mid = t_not_accessible + (t_accessible - t_not_accessible) / 2;
            let sample = self
                .sample_at(
                    propagator,
                    sun_model,
                    satellite_id,
                    target,
                    mid,
                    params.tolerance_eps_deg,
                )
                .map_err(|e| self.to_visibility_error(e, satellite_id, &target.id))?;

            if sample.accessible {
                t_accessible = mid;
            } else {
                t_not_accessible = mid;
            }
        }

        Ok(t_accessible)
    }

    fn to_visibility_error(
        &self,
        failure: SampleFailure,
        satellite_id: &str,
        target_id: &str,
    ) -> VisibilityError {
        match failure {
            SampleFailure::Geometry(e) => VisibilityError::GeometryInvalidInput(e),
            SampleFailure::Propagator(e) => VisibilityError::PropagatorUnavailable {
                satellite_id: satellite_id.to_string(),
                target_id: target_id.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Samples at `Δt/4` inside `[start, end]`, keeps the argmax-elevation
    /// instant as the pass peak, and computes the peak's azimuth,
    /// incidence, and signed roll there.
    fn close_pass(
        &self,
        propagator: &dyn Propagator,
        sun_model: &dyn SunModel,
        satellite_id: &str,
        target: &GroundTarget,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        params: &VisibilityParams,
    ) -> Result<Option<Pass>> {
        let duration_s = (end - start).num_milliseconds() as f64 / 1000.0;
        if duration_s < params.min_pass_duration_s {
            return Ok(None);
        }

        let peak_step = Duration::milliseconds(((params.step_s / 4.0) * 1000.0).max(1.0) as i64);

        let mut peak_time = start;
        let mut peak_sample = self
            .sample_at(
                propagator,
                sun_model,
                satellite_id,
                target,
                start,
                params.tolerance_eps_deg,
            )
            .map_err(|e| self.to_visibility_error(e, satellite_id, &target.id))?;

        let mut t = start + peak_step;
        while t <= end {
            let sample = self
                .sample_at(
                    propagator,
                    sun_model,
                    satellite_id,
                    target,
                    t,
                    params.tolerance_eps_deg,
                )
                .map_err(|e| self.to_visibility_error(e, satellite_id, &target.id))?;
            if sample.elevation_deg > peak_sample.elevation_deg {
                peak_sample = sample;
                peak_time = t;
            }
            t += peak_step;
        }

        let peak_signed_roll_deg =
            match propagation::satellite_state_at(propagator, satellite_id, peak_time) {
                Ok(state) => {
                    let target_geo = target
                        .geodetic()
                        .map_err(VisibilityError::GeometryInvalidInput)?;
                    geometry::signed_roll_angle(state, target_geo)
                        .map_err(VisibilityError::GeometryInvalidInput)?
                }
                Err(e) => {
                    tracing::warn!(satellite_id, target_id = %target.id, error = %e, "could not derive roll sign at peak");
                    0.0
                }
            };

        Ok(Some(Pass {
            target_id: target.id.clone(),
            satellite_id: satellite_id.to_string(),
            start,
            peak: peak_time,
            end,
            max_elevation_deg: peak_sample.elevation_deg,
            peak_azimuth_deg: peak_sample.azimuth_deg,
            peak_incidence_deg: peak_sample.off_nadir_deg,
            peak_signed_roll_deg,
        }))
    }

    fn adaptive_step(
        &self,
        propagator: &dyn Propagator,
        satellite_id: &str,
        target: &GroundTarget,
        t: DateTime<Utc>,
        currently_accessible: bool,
        params: &VisibilityParams,
    ) -> Duration {
        let fine_step = Duration::milliseconds((params.step_s * 1000.0) as i64);
        if currently_accessible {
            return fine_step;
        }

        let Ok(sat_geo) = self.propagate_cached(propagator, satellite_id, t) else {
            return fine_step;
        };

        let angular_rate_deg_s = geometry::orbital_velocity_km_s(sat_geo.altitude_km)
            / (geometry::EARTH_RADIUS_KM + sat_geo.altitude_km)
            * 180.0
            / std::f64::consts::PI;
        if angular_rate_deg_s <= 0.0 {
            return fine_step;
        }

        let lat_diff_deg = (sat_geo.latitude_deg - target.latitude_deg).abs();
        let estimate_s = lat_diff_deg / angular_rate_deg_s;
        let orbital_quarter_s = propagator
            .orbital_period(satellite_id)
            .map(|d| d.num_milliseconds() as f64 / 1000.0 / 4.0)
            .unwrap_or(estimate_s);

        let skip_s = estimate_s.min(orbital_quarter_s).max(params.step_s);
        Duration::milliseconds((skip_s * 1000.0) as i64)
    }

    /// Finds all passes for one (satellite, target) pair over `horizon`.
    pub fn find_passes(
        &self,
        propagator: &dyn Propagator,
        sun_model: &dyn SunModel,
        satellite_id: &str,
        target: &GroundTarget,
        horizon: (DateTime<Utc>, DateTime<Utc>),
        params: &VisibilityParams,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Pass>> {
        let (t_start, t_end) = horizon;
        if t_end <= t_start {
            return Err(VisibilityError::InvalidInput(
                "horizon end must be after start".into(),
            ));
        }

        let mut passes = Vec::new();
        let mut prev: Option<(DateTime<Utc>, bool)> = None;
        let mut window_start: Option<DateTime<Utc>> = None;
        let mut failure_run_start: Option<DateTime<Utc>> = None;
        let mut iterations: u64 = 0;
        let mut t = t_start;

        while t <= t_end {
            iterations += 1;
            if iterations % 1000 == 0 && cancellation.is_cancelled() {
                return Err(VisibilityError::Cancelled);
            }

            let sampled = self.sample_at(
                propagator,
                sun_model,
                satellite_id,
                target,
                t,
                params.tolerance_eps_deg,
            );

            let accessible_now = match sampled {
                Ok(sample) => {
                    failure_run_start = None;
                    Some(sample.accessible)
                }
                Err(SampleFailure::Geometry(e)) => return Err(VisibilityError::GeometryInvalidInput(e)),
                Err(SampleFailure::Propagator(e)) => {
                    tracing::warn!(satellite_id, target_id = %target.id, %t, error = %e, "propagator sample failed, skipping");
                    let run_start = *failure_run_start.get_or_insert(t);
                    if (t - run_start).num_milliseconds() as f64 / 1000.0
                        > params.propagator_failure_abort_s
                    {
                        return Err(VisibilityError::PropagatorUnavailable {
                            satellite_id: satellite_id.to_string(),
                            target_id: target.id.clone(),
                            reason: e.to_string(),
                        });
                    }
                    None
                }
            };

            if let Some(accessible_now) = accessible_now {
                match prev {
                    Some((prev_t, prev_accessible)) if !prev_accessible && accessible_now => {
                        let aos = self.bisect_edge(
                            propagator, sun_model, satellite_id, target, prev_t, t, params,
                        )?;
                        window_start = Some(aos);
                    }
                    Some((prev_t, prev_accessible)) if prev_accessible && !accessible_now => {
                        let los = self.bisect_edge(
                            propagator, sun_model, satellite_id, target, t, prev_t, params,
                        )?;
                        if let Some(start) = window_start.take() {
                            if let Some(pass) = self.close_pass(
                                propagator, sun_model, satellite_id, target, start, los, params,
                            )? {
                                passes.push(pass);
                            }
                        }
                    }
                    None if accessible_now => {
                        window_start = Some(t_start);
                    }
                    _ => {}
                }
                prev = Some((t, accessible_now));
            }

            let step = if params.adaptive {
                self.adaptive_step(
                    propagator,
                    satellite_id,
                    target,
                    t,
                    accessible_now.unwrap_or(false),
                    params,
                )
            } else {
                Duration::milliseconds((params.step_s * 1000.0) as i64)
            };
            t += step;
        }

        if let (Some(start), Some((last_t, last_accessible))) = (window_start.take(), prev) {
            if last_accessible {
                if let Some(pass) = self.close_pass(
                    propagator,
                    sun_model,
                    satellite_id,
                    target,
                    start,
                    last_t.min(t_end),
                    params,
                )? {
                    passes.push(pass);
                }
            }
        }

        Ok(passes)
    }

    /// Searches every (satellite, target) pair in parallel, bounded to
    /// `min(available_parallelism, num_pairs)` worker threads, merging
    /// results into a map keyed by target id.
    pub fn search_all(
        &self,
        propagator: &dyn Propagator,
        sun_model: &dyn SunModel,
        satellite_ids: &[String],
        targets: &[GroundTarget],
        horizon: (DateTime<Utc>, DateTime<Utc>),
        params: &VisibilityParams,
        cancellation: &CancellationToken,
    ) -> Result<HashMap<String, Vec<Pass>>> {
        let pairs: Vec<(&str, &GroundTarget)> = satellite_ids
            .iter()
            .flat_map(|sat| targets.iter().map(move |tgt| (sat.as_str(), tgt)))
            .collect();

        if pairs.is_empty() {
            return Ok(HashMap::new());
        }

        let worker_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(pairs.len());
        let chunk_size = (pairs.len() + worker_count - 1) / worker_count;

        let results: Mutex<Vec<Result<(String, Vec<Pass>)>>> = Mutex::new(Vec::new());

        thread::scope(|scope| {
            for chunk in pairs.chunks(chunk_size.max(1)) {
                let results = &results;
                scope.spawn(move || {
                    for &(satellite_id, target) in chunk {
                        let outcome = self
                            .find_passes(propagator, sun_model, satellite_id, target, horizon, params, cancellation)
                            .map(|passes| (target.id.clone(), passes));
                        results.lock().unwrap().push(outcome);
                    }
                });
            }
        });

        let mut by_target: HashMap<String, Vec<Pass>> = HashMap::new();
        for outcome in results.into_inner().unwrap() {
            let (target_id, mut passes) = outcome?;
            by_target.entry(target_id).or_default().append(&mut passes);
        }

        Ok(by_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use propagation::{OrbitalElements, RawElements, Sgp4Propagator, SubsolarSunModel};

    fn overhead_target() -> GroundTarget {
        GroundTarget::new(
            "t1", 10.0, 20.0, 0.0, 5, MissionMode::Sar, 45.0, 30.0, 5.0,
        )
        .unwrap()
    }

    fn leo_propagator() -> Sgp4Propagator {
        let raw = RawElements {
            epoch: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            norad_id: 90002,
            inclination_deg: 10.0,
            right_ascension_deg: 20.0,
            eccentricity: 0.0005,
            argument_of_perigee_deg: 0.0,
            mean_anomaly_deg: 0.0,
            mean_motion_orbits_day: 14.99,
        };
        Sgp4Propagator::with_elements([OrbitalElements::from_raw("sat-1", raw)])
    }

    #[test]
    fn ground_target_rejects_bad_priority() {
        let err = GroundTarget::new("t", 0.0, 0.0, 0.0, 0, MissionMode::Sar, 10.0, 10.0, 0.0);
        assert!(err.is_err());
    }

    #[test]
    fn is_accessible_true_when_overhead() {
        let target = overhead_target();
        let sat = Geodetic::new(10.0, 20.0, 600.0).unwrap();
        let sample = is_accessible(sat, &target, None, 1e-6).unwrap();
        assert!(sample.accessible);
        assert!(sample.elevation_deg > 80.0);
    }

    #[test]
    fn is_accessible_false_below_horizon() {
        let target = overhead_target();
        let sat = Geodetic::new(-10.0, 20.0, 600.0).unwrap();
        let sample = is_accessible(sat, &target, None, 1e-6).unwrap();
        assert!(!sample.accessible);
    }

    #[test]
    fn find_passes_detects_an_overhead_pass() {
        let propagator = leo_propagator();
        let sun_model = SubsolarSunModel;
        let target = overhead_target();
        let engine = VisibilityEngine::new();
        let cancellation = CancellationToken::new();

        let start = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let end = start + Duration::hours(6);

        let passes = engine
            .find_passes(
                &propagator,
                &sun_model,
                "sat-1",
                &target,
                (start, end),
                &VisibilityParams::default(),
                &cancellation,
            )
            .unwrap();

        assert!(!passes.is_empty(), "expected at least one pass over 6h for a 10-deg inclination orbit over a 10N target");
        for pass in &passes {
            assert!(pass.start <= pass.peak);
            assert!(pass.peak <= pass.end);
            assert!(pass.max_elevation_deg >= target.elevation_mask_deg);
        }
    }

    #[test]
    fn fixed_and_adaptive_modes_agree_on_pass_count() {
        let propagator = leo_propagator();
        let sun_model = SubsolarSunModel;
        let target = overhead_target();
        let cancellation = CancellationToken::new();

        let start = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let end = start + Duration::hours(12);

        let fixed_engine = VisibilityEngine::new();
        let fixed = fixed_engine
            .find_passes(
                &propagator,
                &sun_model,
                "sat-1",
                &target,
                (start, end),
                &VisibilityParams::default(),
                &cancellation,
            )
            .unwrap();

        let adaptive_engine = VisibilityEngine::new();
        let adaptive_params = VisibilityParams {
            adaptive: true,
            ..VisibilityParams::default()
        };
        let adaptive = adaptive_engine
            .find_passes(
                &propagator,
                &sun_model,
                "sat-1",
                &target,
                (start, end),
                &adaptive_params,
                &cancellation,
            )
            .unwrap();

        assert_eq!(fixed.len(), adaptive.len());
        for (f, a) in fixed.iter().zip(adaptive.iter()) {
            assert!((f.start - a.start).num_seconds().abs() <= 5);
        }
    }

    #[test]
    fn cancellation_aborts_search() {
        let propagator = leo_propagator();
        let sun_model = SubsolarSunModel;
        let target = overhead_target();
        let engine = VisibilityEngine::new();
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let start = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let end = start + Duration::days(7);

        let result = engine.find_passes(
            &propagator,
            &sun_model,
            "sat-1",
            &target,
            (start, end),
            &VisibilityParams::default(),
            &cancellation,
        );
        assert!(matches!(result, Err(VisibilityError::Cancelled)));
    }
}
