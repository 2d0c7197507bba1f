//! Projection of niche models through a paleoclimate proxy record.
//!
//! Each time step of the proxy carries a lower, central and upper anomaly in
//! SD units. Evaluating a cultivar's response curves at those anomalies gives
//! one raster layer per time step for each band.

mod project;
mod proxy;
mod raster;

pub use project::project;
pub use proxy::{load_proxy, read_proxy_csv, ProxyError, ProxySeries, ProxyUnits};
pub use raster::{to_percent, Band, RasterStack, Reconstruction};
