//! Geographic coordinates on the unit globe.
//!
//! Convention shared by every consumer (boundaries, markers, camera):
//! polar angle `phi = (90 - lat)` and azimuth `theta = (lon + 180)`, both in
//! radians, with
//!
//! ```text
//! x = -r * sin(phi) * cos(theta)
//! y =  r * cos(phi)
//! z =  r * sin(phi) * sin(theta)
//! ```
//!
//! so +Y is the polar axis and the north pole sits at `lat = 90`.

use super::Vec3;

/// Latitude/longitude in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// From a `[lon, lat]` coordinate pair, the order GeoJSON uses.
    pub fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self::new(pair[1], pair[0])
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    pub fn is_in_range(&self) -> bool {
        self.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Polar angle (radians) for a latitude in degrees.
pub fn polar_angle(lat_deg: f64) -> f64 {
    (90.0 - lat_deg).to_radians()
}

/// Azimuth (radians) for a longitude in degrees.
pub fn azimuth(lon_deg: f64) -> f64 {
    (lon_deg + 180.0).to_radians()
}

/// Point at polar angle `phi` and azimuth `theta` on a sphere of `radius`.
pub fn from_spherical(phi: f64, theta: f64, radius: f64) -> Vec3 {
    let sin_phi = phi.sin();
    Vec3::new(
        -radius * sin_phi * theta.cos(),
        radius * phi.cos(),
        radius * sin_phi * theta.sin(),
    )
}

/// Maps a latitude/longitude (degrees) to a point at `radius` from the center.
///
/// Callers validate finiteness; the mapping itself is total.
pub fn project(lat_deg: f64, lon_deg: f64, radius: f64) -> Vec3 {
    from_spherical(polar_angle(lat_deg), azimuth(lon_deg), radius)
}

pub fn project_point(p: GeoPoint, radius: f64) -> Vec3 {
    project(p.lat, p.lon, radius)
}

pub fn unit_vector(p: GeoPoint) -> Vec3 {
    project(p.lat, p.lon, 1.0)
}

/// Inverse of [`project`]; longitude is wrapped to `[-180, 180]`.
pub fn unproject(v: Vec3) -> Option<GeoPoint> {
    let r = v.length();
    if !r.is_finite() || r <= 1e-12 {
        return None;
    }
    let phi = (v.y / r).clamp(-1.0, 1.0).acos();
    let theta = v.z.atan2(-v.x);
    let lat = 90.0 - phi.to_degrees();
    let mut lon = theta.to_degrees() - 180.0;
    if lon < -180.0 {
        lon += 360.0;
    }
    Some(GeoPoint::new(lat, lon))
}

/// Angle (radians) between two unit vectors, clamped against rounding.
pub fn angle_between(a: Vec3, b: Vec3) -> f64 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

/// Great-circle angular distance (radians) between two geographic points.
pub fn angular_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    angle_between(unit_vector(a), unit_vector(b))
}
