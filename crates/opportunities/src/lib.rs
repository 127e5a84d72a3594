//! Converts each visibility [`Pass`](visibility::Pass) into one or more
//! discrete, scheduler-ready imaging [`Opportunity`] records.

use chrono::{DateTime, Duration, Utc};
use propagation::Propagator;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use visibility::{GroundTarget, Pass};

#[derive(Error, Debug)]
pub enum OpportunityError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    GeometryInvalidInput(#[from] geometry::GeometryError),
    #[error("propagator failed while sampling opportunity: {0}")]
    PropagatorFailed(String),
}

pub type Result<T> = std::result::Result<T, OpportunityError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationMode {
    RollOnly,
    RollPitch,
}

/// Maps an incidence angle to a `[0, 1]`-ish image-quality proxy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum QualityModel {
    Off,
    Monotonic,
    Banded {
        ideal_incidence_deg: f64,
        band_width_deg: f64,
    },
}

impl QualityModel {
    pub fn banded_default() -> Self {
        QualityModel::Banded {
            ideal_incidence_deg: 35.0,
            band_width_deg: 7.5,
        }
    }

    fn score(&self, incidence_deg: f64) -> f64 {
        match *self {
            QualityModel::Off => 1.0,
            QualityModel::Monotonic => (-0.03 * incidence_deg).exp(),
            QualityModel::Banded {
                ideal_incidence_deg,
                band_width_deg,
            } => {
                let z = (incidence_deg - ideal_incidence_deg) / band_width_deg;
                (-(z * z)).exp()
            }
        }
    }
}

/// `Standard` is `priority · (1 - w) + quality · w · priority_scale`, the
/// spec's canonical formula. `AdditiveLegacy` is `priority + quality · w`,
/// kept for callers migrating from source modules that used that formula
/// (see spec's Open Questions) — never the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueModel {
    #[default]
    Standard,
    AdditiveLegacy,
}

#[derive(Debug, Clone)]
pub struct OpportunityParams {
    pub mode: GenerationMode,
    pub imaging_time_s: f64,
    pub max_spacecraft_roll_deg: f64,
    pub max_spacecraft_pitch_deg: f64,
    pub quality_model: QualityModel,
    pub quality_weight: f64,
    pub value_model: ValueModel,
    pub priority_scale: f64,
    pub min_pass_for_windows_s: f64,
    pub sample_interval_s: f64,
}

impl OpportunityParams {
    pub fn new(
        mode: GenerationMode,
        imaging_time_s: f64,
        max_spacecraft_roll_deg: f64,
        max_spacecraft_pitch_deg: f64,
        quality_model: QualityModel,
    ) -> Result<Self> {
        if imaging_time_s <= 0.0 {
            return Err(OpportunityError::InvalidInput(
                "imaging_time_s must be > 0".into(),
            ));
        }
        if max_spacecraft_roll_deg <= 0.0 || max_spacecraft_pitch_deg <= 0.0 {
            return Err(OpportunityError::InvalidInput(
                "max_spacecraft_roll_deg and max_spacecraft_pitch_deg must be > 0".into(),
            ));
        }
        Ok(Self {
            mode,
            imaging_time_s,
            max_spacecraft_roll_deg,
            max_spacecraft_pitch_deg,
            quality_model,
            quality_weight: 0.5,
            value_model: ValueModel::Standard,
            priority_scale: 1.0,
            min_pass_for_windows_s: 60.0,
            sample_interval_s: 20.0,
        })
    }

    pub fn with_quality_weight(mut self, quality_weight: f64) -> Self {
        self.quality_weight = quality_weight.clamp(0.0, 1.0);
        self
    }

    pub fn with_value_model(mut self, value_model: ValueModel) -> Self {
        self.value_model = value_model;
        self
    }
}

fn opportunity_value(priority: u32, incidence_deg: f64, params: &OpportunityParams) -> f64 {
    let quality = params.quality_model.score(incidence_deg);
    let priority_f = priority as f64;
    match params.value_model {
        ValueModel::Standard => {
            priority_f * (1.0 - params.quality_weight)
                + quality * params.quality_weight * params.priority_scale
        }
        ValueModel::AdditiveLegacy => priority_f + quality * params.quality_weight,
    }
}

/// A discrete, scheduler-ready imaging candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub satellite_id: String,
    pub target_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_s: f64,
    pub value: f64,
    pub priority: u32,
    pub incidence_angle_deg: f64,
    pub roll_angle_deg: f64,
    pub pitch_angle_deg: f64,
    pub parent_pass_index: usize,
}

/// Generates opportunities for every pass of one (satellite, target) pair.
pub fn generate_all(
    propagator: &dyn Propagator,
    passes: &[Pass],
    target: &GroundTarget,
    params: &OpportunityParams,
) -> Result<Vec<Opportunity>> {
    let mut opportunities = Vec::new();
    for (pass_index, pass) in passes.iter().enumerate() {
        opportunities.extend(generate_for_pass(propagator, pass, pass_index, target, params)?);
    }
    Ok(opportunities)
}

pub fn generate_for_pass(
    propagator: &dyn Propagator,
    pass: &Pass,
    pass_index: usize,
    target: &GroundTarget,
    params: &OpportunityParams,
) -> Result<Vec<Opportunity>> {
    match params.mode {
        GenerationMode::RollOnly => Ok(roll_only(pass, pass_index, target, params)),
        GenerationMode::RollPitch => roll_pitch(propagator, pass, pass_index, target, params),
    }
}

fn roll_only(
    pass: &Pass,
    pass_index: usize,
    target: &GroundTarget,
    params: &OpportunityParams,
) -> Vec<Opportunity> {
    if pass.peak_signed_roll_deg.abs() > params.max_spacecraft_roll_deg {
        return Vec::new();
    }

    let start = pass.peak;
    let end = start + Duration::milliseconds((params.imaging_time_s * 1000.0) as i64);
    let value = opportunity_value(target.priority, pass.peak_incidence_deg, params);

    vec![Opportunity {
        id: format!("{}:{}:{}:roll-only", pass.satellite_id, pass.target_id, pass_index),
        satellite_id: pass.satellite_id.clone(),
        target_id: pass.target_id.clone(),
        start,
        end,
        duration_s: params.imaging_time_s,
        value,
        priority: target.priority,
        incidence_angle_deg: pass.peak_incidence_deg,
        roll_angle_deg: pass.peak_signed_roll_deg,
        pitch_angle_deg: 0.0,
        parent_pass_index: pass_index,
    }]
}

fn roll_pitch(
    propagator: &dyn Propagator,
    pass: &Pass,
    pass_index: usize,
    target: &GroundTarget,
    params: &OpportunityParams,
) -> Result<Vec<Opportunity>> {
    let pass_duration_s = (pass.end - pass.start).num_milliseconds() as f64 / 1000.0;

    let sample_times: Vec<DateTime<Utc>> = if pass_duration_s >= params.min_pass_for_windows_s {
        let raw_count = (pass_duration_s / params.sample_interval_s).round() as i64 + 1;
        let count = raw_count.clamp(3, 11) as usize;
        (0..count)
            .map(|i| {
                let frac = i as f64 / (count - 1) as f64;
                pass.start
                    + Duration::milliseconds((pass_duration_s * frac * 1000.0) as i64)
            })
            .collect()
    } else {
        vec![pass.start + (pass.end - pass.start) / 2]
    };

    let target_geo = target.geodetic()?;
    let mut opportunities = Vec::with_capacity(sample_times.len());

    for (sample_index, &t) in sample_times.iter().enumerate() {
        let sat_geo = propagator
            .propagate(&pass.satellite_id, t)
            .map_err(|e| OpportunityError::PropagatorFailed(e.to_string()))?;

        let incidence_deg = geometry::off_nadir_angle(sat_geo, target_geo)?;

        let state = propagation::satellite_state_at(propagator, &pass.satellite_id, t)
            .map_err(|e| OpportunityError::PropagatorFailed(e.to_string()))?;
        let roll_deg = geometry::signed_roll_angle(state, target_geo)?;

        if roll_deg.abs() > params.max_spacecraft_roll_deg {
            continue;
        }

        let t_offset_s = (t - pass.peak).num_milliseconds() as f64 / 1000.0;
        let pitch_deg = geometry::along_track_pitch_angle(
            t_offset_s,
            sat_geo.altitude_km,
            params.max_spacecraft_pitch_deg,
        );

        let start = t;
        let end = start + Duration::milliseconds((params.imaging_time_s * 1000.0) as i64);
        let value = opportunity_value(target.priority, incidence_deg, params);

        opportunities.push(Opportunity {
            id: format!(
                "{}:{}:{}:{}",
                pass.satellite_id, pass.target_id, pass_index, sample_index
            ),
            satellite_id: pass.satellite_id.clone(),
            target_id: pass.target_id.clone(),
            start,
            end,
            duration_s: params.imaging_time_s,
            value,
            priority: target.priority,
            incidence_angle_deg: incidence_deg,
            roll_angle_deg: roll_deg,
            pitch_angle_deg: pitch_deg,
            parent_pass_index: pass_index,
        });
    }

    Ok(opportunities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use propagation::{OrbitalElements, RawElements, Sgp4Propagator};
    use visibility::MissionMode;

    fn target() -> GroundTarget {
        GroundTarget::new("t1", 10.0, 20.0, 0.0, 5, MissionMode::Optical, 45.0, 30.0, 5.0).unwrap()
    }

    fn sample_pass() -> Pass {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        Pass {
            target_id: "t1".into(),
            satellite_id: "sat-1".into(),
            start,
            peak: start + Duration::seconds(40),
            end: start + Duration::seconds(80),
            max_elevation_deg: 70.0,
            peak_azimuth_deg: 10.0,
            peak_incidence_deg: 12.0,
            peak_signed_roll_deg: 5.0,
        }
    }

    fn propagator() -> Sgp4Propagator {
        let raw = RawElements {
            epoch: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            norad_id: 90003,
            inclination_deg: 97.6,
            right_ascension_deg: 10.0,
            eccentricity: 0.0006,
            argument_of_perigee_deg: 0.0,
            mean_anomaly_deg: 0.0,
            mean_motion_orbits_day: 14.99,
        };
        Sgp4Propagator::with_elements([OrbitalElements::from_raw("sat-1", raw)])
    }

    #[test]
    fn roll_only_emits_single_opportunity_at_peak() {
        let pass = sample_pass();
        let target = target();
        let params =
            OpportunityParams::new(GenerationMode::RollOnly, 5.0, 30.0, 20.0, QualityModel::Monotonic)
                .unwrap();

        let opportunities = roll_only(&pass, 0, &target, &params);
        assert_eq!(opportunities.len(), 1);
        let opp = &opportunities[0];
        assert_eq!(opp.start, pass.peak);
        assert_eq!(opp.roll_angle_deg, pass.peak_signed_roll_deg);
        assert_eq!(opp.pitch_angle_deg, 0.0);
    }

    #[test]
    fn roll_only_rejects_excessive_roll() {
        let mut pass = sample_pass();
        pass.peak_signed_roll_deg = 40.0;
        let target = target();
        let params =
            OpportunityParams::new(GenerationMode::RollOnly, 5.0, 30.0, 20.0, QualityModel::Monotonic)
                .unwrap();

        assert!(roll_only(&pass, 0, &target, &params).is_empty());
    }

    #[test]
    fn roll_pitch_short_pass_emits_one_centred_sample() {
        let propagator = propagator();
        let pass = sample_pass(); // 80s pass
        let target = target();
        let mut params =
            OpportunityParams::new(GenerationMode::RollPitch, 5.0, 30.0, 20.0, QualityModel::Monotonic)
                .unwrap();
        params.min_pass_for_windows_s = 200.0; // force the short-pass branch for an 80s pass

        let opportunities = generate_for_pass(&propagator, &pass, 0, &target, &params).unwrap();
        assert_eq!(opportunities.len(), 1);
    }

    #[test]
    fn roll_pitch_long_pass_samples_clamped_between_3_and_11() {
        let propagator = propagator();
        let mut pass = sample_pass();
        pass.end = pass.start + Duration::seconds(400);
        pass.peak = pass.start + Duration::seconds(200);
        let target = target();
        let params =
            OpportunityParams::new(GenerationMode::RollPitch, 5.0, 45.0, 45.0, QualityModel::Monotonic)
                .unwrap();

        let opportunities = generate_for_pass(&propagator, &pass, 0, &target, &params).unwrap();
        assert!(opportunities.len() >= 3 && opportunities.len() <= 11);
    }

    #[test]
    fn quality_models_rank_lower_incidence_higher_for_monotonic() {
        assert!(QualityModel::Monotonic.score(5.0) > QualityModel::Monotonic.score(30.0));
    }

    #[test]
    fn banded_quality_peaks_at_ideal_incidence() {
        let banded = QualityModel::banded_default();
        assert!(banded.score(35.0) > banded.score(10.0));
        assert!(banded.score(35.0) > banded.score(60.0));
    }

    #[test]
    fn value_model_blends_priority_and_quality_additively() {
        let params = OpportunityParams::new(GenerationMode::RollOnly, 5.0, 30.0, 20.0, QualityModel::Off)
            .unwrap()
            .with_quality_weight(0.5);
        let value = opportunity_value(7, 20.0, &params);
        assert!((value - 4.0).abs() < 1e-9);
    }

    #[test]
    fn value_model_at_full_quality_weight_is_bounded_by_priority_scale() {
        let params = OpportunityParams::new(GenerationMode::RollOnly, 5.0, 30.0, 20.0, QualityModel::Monotonic)
            .unwrap()
            .with_quality_weight(1.0);
        let value = opportunity_value(5, 20.0, &params);
        assert!(value <= params.priority_scale + 1e-9, "value {value} exceeds priority_scale");
    }
}
