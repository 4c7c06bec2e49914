//! Geofence containment against a GeoJSON polygon boundary.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

/// Denominator guard for horizontal edges; also what resolves a point that
/// sits exactly on an edge.
const EDGE_EPSILON: f64 = 1e-12;

#[derive(Debug, Error)]
pub enum GeofenceError {
    #[error("failed to open geofence file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse geofence file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("geofence file {path} has no polygon ring at features[0].geometry.coordinates[0]")]
    MissingRing { path: String },
}

/// A closed ring of (lon, lat) vertices checked by ray casting.
#[derive(Clone, Debug)]
pub struct Geofence {
    ring: Vec<(f64, f64)>,
}

impl Geofence {
    /// Builds a fence from (lon, lat) vertices. The ring closes itself; a
    /// trailing duplicate of the first vertex is harmless.
    pub fn new(ring: Vec<(f64, f64)>) -> Self {
        Self { ring }
    }

    /// Loads the first ring of the first feature of a GeoJSON file, the
    /// layout the boundary files in this system use.
    pub fn from_geojson_file<P: AsRef<Path>>(path: P) -> Result<Self, GeofenceError> {
        let display = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|source| GeofenceError::Io {
            path: display.clone(),
            source,
        })?;
        let json: Value =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| GeofenceError::Json {
                path: display.clone(),
                source,
            })?;

        let ring = json
            .pointer("/features/0/geometry/coordinates/0")
            .and_then(Value::as_array)
            .map(|vertices| {
                vertices
                    .iter()
                    .filter_map(|v| {
                        let lon = v.get(0)?.as_f64()?;
                        let lat = v.get(1)?.as_f64()?;
                        Some((lon, lat))
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|ring: &Vec<(f64, f64)>| ring.len() >= 3)
            .ok_or(GeofenceError::MissingRing { path: display })?;

        Ok(Self::new(ring))
    }

    pub fn vertex_count(&self) -> usize {
        self.ring.len()
    }

    /// Ray-casting containment test. Casts a ray toward increasing
    /// longitude and counts edge crossings.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let (x, y) = (lon, lat);
        let mut inside = false;
        let n = self.ring.len();
        for i in 0..n {
            let (lon1, lat1) = self.ring[i];
            let (lon2, lat2) = self.ring[(i + 1) % n];
            if (lat1 > y) != (lat2 > y) {
                let x_intersect = (lon2 - lon1) * (y - lat1) / (lat2 - lat1 + EDGE_EPSILON) + lon1;
                if x < x_intersect {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Breach means the fused position left the authorized boundary.
    pub fn is_breach(&self, lat: f64, lon: f64) -> bool {
        !self.contains(lat, lon)
    }
}
