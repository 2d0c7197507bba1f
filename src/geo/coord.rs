//! Lon/lat coordinates on a spherical Earth.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lon: f64,
    pub lat: f64,
}

impl GeoCoord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Unit vector on the sphere for this coordinate.
    pub fn to_unit(&self) -> DVec3 {
        lon_lat_to_unit(self.lon, self.lat)
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

/// Converts lon/lat degrees to a unit vector (x toward lon 0, z toward the north pole).
#[inline]
pub fn lon_lat_to_unit(lon_deg: f64, lat_deg: f64) -> DVec3 {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
}

/// Great-circle distance between two unit vectors, in kilometers.
///
/// Angle via `atan2(|a×b|, a·b)`.
#[inline]
pub fn unit_distance_km(a: DVec3, b: DVec3) -> f64 {
    let angle = a.cross(b).length().atan2(a.dot(b));
    EARTH_RADIUS_KM * angle
}

/// Great-circle distance between two coordinates, in kilometers.
pub fn great_circle_km(a: GeoCoord, b: GeoCoord) -> f64 {
    unit_distance_km(a.to_unit(), b.to_unit())
}

/// Axis-aligned lon/lat box used to clip inputs to the study area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Self {
        Self { west, east, south, north }
    }

    /// Monsoon Asia, the default study area.
    pub fn asia() -> Self {
        Self::new(60.0, 150.0, -10.0, 55.0)
    }

    /// Inclusive containment test.
    pub fn contains(&self, coord: GeoCoord) -> bool {
        coord.lon >= self.west
            && coord.lon <= self.east
            && coord.lat >= self.south
            && coord.lat <= self.north
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::asia()
    }
}
