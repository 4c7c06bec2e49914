//! Batch GPS/IMU trajectory fusion with geofence and motion-anomaly
//! alerting.
//!
//! The pipeline replays a pair of recorded sensor logs: accelerometer
//! samples and GPS fixes are aligned by nearest timestamp, projected into a
//! local planar frame anchored at the first fix, and fused by a planar
//! position/velocity Kalman filter. The fused trajectory then feeds two
//! safety checks, geofence containment and isolation-forest anomaly
//! scoring, whose verdicts combine into a per-sample alert severity.
//!
//! Everything below the ingestion layer is pure computation over in-memory
//! samples, so the fusion and alerting passes can be unit-tested with
//! synthetic data and replayed over recorded logs unchanged.

pub mod align;
pub mod alert;
pub mod anomaly;
pub mod filters;
pub mod fusion;
pub mod geofence;
pub mod ingest;
pub mod projection;
pub mod types;

pub use alert::{build_report, resolve_alert, AlertLevel, AlertRecord};
pub use anomaly::{AnomalyDetector, FeatureExtractor, IsolationForest, TrainConfig};
pub use filters::{DtPolicy, FilterConfig, PlanarKalman};
pub use fusion::{run_fusion, FusionOutput, FusionSummary};
pub use geofence::Geofence;
pub use projection::LocalFrame;
pub use types::{AlignedObservation, FusedRecord, InertialSample, PositionSample};
