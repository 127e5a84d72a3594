//! Coordinate transforms and pointing geometry for agile imaging satellites.
//!
//! Earth is modelled as a sphere of radius [`EARTH_RADIUS_KM`] throughout —
//! ellipsoidal refinement is explicitly out of scope. All angles are
//! degrees, all distances kilometres, all rates per second.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius, km. Spherical-Earth model per spec.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Standard gravitational parameter of Earth, km^3/s^2.
pub const MU_EARTH_KM3_S2: f64 = 3.986004418e5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid latitude {0}: must be in [-90, 90]")]
    InvalidLatitude(f64),
    #[error("invalid altitude {0}: must be finite and >= -{EARTH_RADIUS_KM}")]
    InvalidAltitude(f64),
    #[error("degenerate vector: satellite and target coincide")]
    DegenerateVector,
}

pub type Result<T> = std::result::Result<T, GeometryError>;

/// A point on (or above) the Earth's surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geodetic {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_km: f64,
}

impl Geodetic {
    pub fn new(latitude_deg: f64, longitude_deg: f64, altitude_km: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude_deg) || !latitude_deg.is_finite() {
            return Err(GeometryError::InvalidLatitude(latitude_deg));
        }
        if !altitude_km.is_finite() || altitude_km < -EARTH_RADIUS_KM {
            return Err(GeometryError::InvalidAltitude(altitude_km));
        }
        Ok(Self {
            latitude_deg,
            longitude_deg: normalize_longitude(longitude_deg),
            altitude_km,
        })
    }
}

/// Earth-Centered Earth-Fixed position, km.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ecef {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Ecef {
    fn sub(self, other: Ecef) -> Ecef {
        Ecef {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    fn dot(self, other: Ecef) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn cross(self, other: Ecef) -> Ecef {
        Ecef {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    fn scale(self, s: f64) -> Ecef {
        Ecef {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    fn normalized(self) -> Result<Ecef> {
        let n = self.norm();
        if n < 1e-9 {
            return Err(GeometryError::DegenerateVector);
        }
        Ok(self.scale(1.0 / n))
    }
}

/// Satellite kinematic state needed for roll-sign geometry: position and
/// velocity, both in ECEF, km and km/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatelliteState {
    pub position: Ecef,
    pub velocity: Ecef,
}

/// Local East/North/Up unit vectors (in ECEF) at a geodetic point on the
/// spherical-Earth model.
struct Enu {
    east: Ecef,
    north: Ecef,
    up: Ecef,
}

fn enu_basis(lat_deg: f64, lon_deg: f64) -> Enu {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();

    Enu {
        east: Ecef {
            x: -sin_lon,
            y: cos_lon,
            z: 0.0,
        },
        north: Ecef {
            x: -sin_lat * cos_lon,
            y: -sin_lat * sin_lon,
            z: cos_lat,
        },
        up: Ecef {
            x: cos_lat * cos_lon,
            y: cos_lat * sin_lon,
            z: sin_lat,
        },
    }
}

/// Convert geodetic (spherical-Earth) coordinates to ECEF, km.
pub fn geodetic_to_ecef(point: Geodetic) -> Ecef {
    let r = EARTH_RADIUS_KM + point.altitude_km;
    let lat = point.latitude_deg.to_radians();
    let lon = point.longitude_deg.to_radians();
    Ecef {
        x: r * lat.cos() * lon.cos(),
        y: r * lat.cos() * lon.sin(),
        z: r * lat.sin(),
    }
}

/// Convert ECEF, km, back to geodetic (spherical-Earth) coordinates.
pub fn ecef_to_geodetic(pos: Ecef) -> Result<Geodetic> {
    let r = pos.norm();
    if r < 1e-9 {
        return Err(GeometryError::DegenerateVector);
    }
    let latitude_deg = (pos.z / r).asin().to_degrees();
    let longitude_deg = pos.y.atan2(pos.x).to_degrees();
    let altitude_km = r - EARTH_RADIUS_KM;
    Geodetic::new(latitude_deg, longitude_deg, altitude_km)
}

fn normalize_longitude(lon_deg: f64) -> f64 {
    let mut lon = lon_deg % 360.0;
    if lon < -180.0 {
        lon += 360.0;
    } else if lon >= 180.0 {
        lon -= 360.0;
    }
    lon
}

fn clamp_unit(x: f64) -> f64 {
    x.clamp(-1.0, 1.0)
}

/// Elevation and azimuth of the satellite as seen from the target.
///
/// Elevation is the angle above the target's local horizontal plane, in
/// `[-90, 90]`. Azimuth is measured clockwise from local north, `[0, 360)`.
pub fn elevation_azimuth(sat: Geodetic, target: Geodetic) -> Result<(f64, f64)> {
    let sat_ecef = geodetic_to_ecef(sat);
    let target_ecef = geodetic_to_ecef(target);
    let line_of_sight = sat_ecef.sub(target_ecef);

    let enu = enu_basis(target.latitude_deg, target.longitude_deg);
    let east = line_of_sight.dot(enu.east);
    let north = line_of_sight.dot(enu.north);
    let up = line_of_sight.dot(enu.up);

    let horizontal_range = (east * east + north * north).sqrt();
    let range = (horizontal_range * horizontal_range + up * up).sqrt();
    if range < 1e-9 {
        return Err(GeometryError::DegenerateVector);
    }

    let elevation_deg = up.atan2(horizontal_range).to_degrees();
    let mut azimuth_deg = east.atan2(north).to_degrees();
    if azimuth_deg < 0.0 {
        azimuth_deg += 360.0;
    }

    Ok((elevation_deg, azimuth_deg))
}

/// Angle between the satellite's nadir direction and the satellite→target
/// line, `[0, 90]`. This is the required slew from nadir in target-center
/// aiming mode, and is reported as the opportunity's incidence angle under
/// the off-nadir-proxy convention (see spec §4.1).
pub fn off_nadir_angle(sat: Geodetic, target: Geodetic) -> Result<f64> {
    let sat_ecef = geodetic_to_ecef(sat);
    let target_ecef = geodetic_to_ecef(target);

    let nadir = sat_ecef.scale(-1.0).normalized()?;
    let to_target = target_ecef.sub(sat_ecef).normalized()?;

    let cos_angle = clamp_unit(nadir.dot(to_target));
    Ok(cos_angle.acos().to_degrees())
}

/// Signed roll angle required to point the satellite's sensor at `target`.
///
/// Positive when the target lies to the left of the velocity vector (the
/// spacecraft must roll right to reach it); negative for right-of-track.
pub fn signed_roll_angle(sat: SatelliteState, target: Geodetic) -> Result<f64> {
    let target_ecef = geodetic_to_ecef(target);
    let to_target = target_ecef.sub(sat.position);

    let nadir = sat.position.scale(-1.0).normalized()?;
    let velocity_dir = sat.velocity.normalized()?;
    let cross_track = velocity_dir.cross(nadir).normalized()?;

    let nadir_component = to_target.dot(nadir);
    let cross_component = to_target.dot(cross_track);

    Ok(cross_component.atan2(nadir_component).to_degrees())
}

/// Orbital velocity for a circular orbit at the given altitude, km/s.
pub fn orbital_velocity_km_s(altitude_km: f64) -> f64 {
    (MU_EARTH_KM3_S2 / (EARTH_RADIUS_KM + altitude_km)).sqrt()
}

/// Solar elevation at a site, given the subsolar point, via the
/// spherical law of cosines. Degrees, `[-90, 90]`.
pub fn solar_elevation_deg(
    site_lat_deg: f64,
    site_lon_deg: f64,
    sun_lat_deg: f64,
    sun_lon_deg: f64,
) -> f64 {
    let site_lat = site_lat_deg.to_radians();
    let sun_lat = sun_lat_deg.to_radians();
    let delta_lon = (site_lon_deg - sun_lon_deg).to_radians();

    let sin_elevation = clamp_unit(
        site_lat.sin() * sun_lat.sin() + site_lat.cos() * sun_lat.cos() * delta_lon.cos(),
    );
    sin_elevation.asin().to_degrees()
}

/// Along-track pitch angle for a target imaged at `time_offset_from_peak_s`
/// seconds away from the moment the target is nominally overhead, clipped
/// to `±max_pitch_deg`.
///
/// Negative for a look-backward (target imaged before overhead), positive
/// for a look-forward (imaged after overhead).
pub fn along_track_pitch_angle(
    time_offset_from_peak_s: f64,
    altitude_km: f64,
    max_pitch_deg: f64,
) -> f64 {
    let velocity = orbital_velocity_km_s(altitude_km);
    let along_track_distance_km = velocity * time_offset_from_peak_s;
    let pitch_deg = along_track_distance_km
        .atan2(altitude_km)
        .to_degrees();
    pitch_deg.clamp(-max_pitch_deg, max_pitch_deg)
}
