//! Geodetic <-> local planar conversion anchored at the first GPS fix of a run.

/// Mean Earth radius in meters.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// East/north planar frame fixed at a geodetic anchor.
///
/// Equirectangular small-angle approximation, accurate over the few
/// kilometers a single run covers. Near the poles `cos(lat0)` approaches
/// zero and the east axis degenerates; polar anchors are a known limitation
/// and are not handled.
#[derive(Clone, Copy, Debug)]
pub struct LocalFrame {
    lat0: f64,
    lon0: f64,
}

impl LocalFrame {
    pub fn new(lat0: f64, lon0: f64) -> Self {
        Self { lat0, lon0 }
    }

    pub fn anchor(&self) -> (f64, f64) {
        (self.lat0, self.lon0)
    }

    /// Geodetic degrees to local meters (east, north).
    pub fn to_local(&self, lat: f64, lon: f64) -> (f64, f64) {
        let x = (lon - self.lon0).to_radians() * EARTH_RADIUS * self.lat0.to_radians().cos();
        let y = (lat - self.lat0).to_radians() * EARTH_RADIUS;
        (x, y)
    }

    /// Local meters back to geodetic degrees. Exact inverse of `to_local`.
    pub fn to_geodetic(&self, x: f64, y: f64) -> (f64, f64) {
        let lat = (y / EARTH_RADIUS).to_degrees() + self.lat0;
        let lon = (x / (EARTH_RADIUS * self.lat0.to_radians().cos())).to_degrees() + self.lon0;
        (lat, lon)
    }
}
