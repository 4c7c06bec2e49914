use serde::{Deserialize, Serialize};

/// One accelerometer reading from the inertial log.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct InertialSample {
    pub timestamp: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
}

/// One GPS fix from the positional log.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PositionSample {
    pub timestamp: f64,
    pub lat: f64,
    pub lon: f64,
}

/// An inertial sample paired with its time-nearest GPS fix.
///
/// Produced by the stream aligner, one per inertial sample. The positional
/// partner may be reused across several observations when the fix rate is
/// lower than the inertial rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlignedObservation {
    pub timestamp: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub lat: f64,
    pub lon: f64,
}

/// Per-step fusion output. Acceleration is the raw (unclamped) reading,
/// passed through for downstream feature extraction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FusedRecord {
    pub time: f64,
    pub fused_lat: f64,
    pub fused_lon: f64,
    pub speed: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
}
