//! Geographic coordinates and great-circle distances.
//!
//! Station locations and grid cells are carried as lon/lat degrees; distances
//! used by the kriging covariance are measured along the sphere.

mod coord;

pub use coord::{
    great_circle_km, lon_lat_to_unit, unit_distance_km, BoundingBox, GeoCoord, EARTH_RADIUS_KM,
};
