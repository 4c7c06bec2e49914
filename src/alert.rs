//! Alert severity resolution over the fused trajectory.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::anomaly::AnomalyDetector;
use crate::geofence::Geofence;
use crate::types::FusedRecord;

/// Severity of one fused sample, combining the geofence and anomaly
/// verdicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    #[serde(rename = "NO ALERT")]
    NoAlert,
    #[serde(rename = "SLIGHT ALERT")]
    SlightAlert,
    #[serde(rename = "HIGH ALERT")]
    HighAlert,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertLevel::NoAlert => "NO ALERT",
            AlertLevel::SlightAlert => "SLIGHT ALERT",
            AlertLevel::HighAlert => "HIGH ALERT",
        };
        f.write_str(label)
    }
}

/// The severity table. Exactly one of the four combinations escalates to
/// HIGH: an anomalous signature outside the boundary.
pub fn resolve_alert(inside: bool, anomaly: bool) -> AlertLevel {
    match (inside, anomaly) {
        (true, false) => AlertLevel::NoAlert,
        (true, true) => AlertLevel::SlightAlert,
        (false, false) => AlertLevel::SlightAlert,
        (false, true) => AlertLevel::HighAlert,
    }
}

/// One row of the final report.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AlertRecord {
    pub time: f64,
    pub lat: f64,
    pub lon: f64,
    pub speed: f64,
    pub inside_geofence: bool,
    pub anomaly: bool,
    pub alert: AlertLevel,
}

/// Runs the two safety checks over a fused trajectory, in order. The
/// detector carries the per-run magnitude-delta state, so a fresh one is
/// required for each trajectory.
pub fn build_report(
    records: &[FusedRecord],
    fence: &Geofence,
    detector: &mut AnomalyDetector,
) -> Vec<AlertRecord> {
    records
        .iter()
        .map(|rec| {
            let inside = fence.contains(rec.fused_lat, rec.fused_lon);
            let anomaly = detector.detect(rec.ax, rec.ay, rec.az, rec.speed);
            AlertRecord {
                time: rec.time,
                lat: rec.fused_lat,
                lon: rec.fused_lon,
                speed: rec.speed,
                inside_geofence: inside,
                anomaly,
                alert: resolve_alert(inside, anomaly),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_table_is_exhaustive() {
        assert_eq!(resolve_alert(true, false), AlertLevel::NoAlert);
        assert_eq!(resolve_alert(true, true), AlertLevel::SlightAlert);
        assert_eq!(resolve_alert(false, false), AlertLevel::SlightAlert);
        assert_eq!(resolve_alert(false, true), AlertLevel::HighAlert);
    }

    #[test]
    fn labels_match_the_report_format() {
        assert_eq!(AlertLevel::NoAlert.to_string(), "NO ALERT");
        assert_eq!(AlertLevel::SlightAlert.to_string(), "SLIGHT ALERT");
        assert_eq!(AlertLevel::HighAlert.to_string(), "HIGH ALERT");
    }

    #[test]
    fn static_run_end_to_end_reports_no_alert() {
        use crate::anomaly::{IsolationForest, TrainConfig};
        use crate::filters::FilterConfig;
        use crate::fusion::run_fusion;
        use crate::types::{InertialSample, PositionSample};

        let (lat0, lon0) = (32.2226, -110.9747);
        let inertial = (0..3)
            .map(|i| InertialSample {
                timestamp: i as f64,
                ax: 0.0,
                ay: 0.0,
                az: 9.8,
            })
            .collect();
        let position = (0..3)
            .map(|i| PositionSample {
                timestamp: i as f64,
                lat: lat0,
                lon: lon0,
            })
            .collect();
        let fused = run_fusion(inertial, position, &FilterConfig::gps_trusting()).unwrap();

        // Fence around the anchor, model trained on near-zero-motion features
        let fence = Geofence::new(vec![
            (lon0 - 0.01, lat0 - 0.01),
            (lon0 + 0.01, lat0 - 0.01),
            (lon0 + 0.01, lat0 + 0.01),
            (lon0 - 0.01, lat0 + 0.01),
        ]);
        let training: Vec<[f64; 3]> = (0..200)
            .map(|i| {
                let t = i as f64;
                [
                    9.8 + 0.05 * (t * 0.41).sin(),
                    0.03 * (t * 0.67).cos().abs(),
                    0.02 * (t * 0.23).sin().abs(),
                ]
            })
            .collect();
        let model = IsolationForest::fit(&training, &TrainConfig::default()).unwrap();
        let mut detector = AnomalyDetector::new(model);

        let report = build_report(&fused.records, &fence, &mut detector);
        assert_eq!(report.len(), 3);
        for row in &report {
            assert!(row.speed.abs() < 1e-9);
            assert!(row.inside_geofence);
            assert!(!row.anomaly);
            assert_eq!(row.alert, AlertLevel::NoAlert);
        }
    }

    #[test]
    fn serde_labels_match_display() {
        let json = serde_json::to_string(&AlertLevel::HighAlert).unwrap();
        assert_eq!(json, "\"HIGH ALERT\"");
        let back: AlertLevel = serde_json::from_str("\"NO ALERT\"").unwrap();
        assert_eq!(back, AlertLevel::NoAlert);
    }
}
