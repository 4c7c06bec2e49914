//! Fusion driver: anchors the local frame at the first GPS fix, aligns the
//! two streams, and runs one predict+correct cycle per aligned observation.
//!
//! Everything here is pure batch computation over already-loaded samples, so
//! it can be unit-tested with synthetic data and replayed over recorded logs
//! without touching the ingestion layer.

use log::{debug, info};
use thiserror::Error;

use crate::align::StreamAligner;
use crate::filters::{DtPolicy, FilterConfig, FilterError, PlanarKalman};
use crate::projection::LocalFrame;
use crate::types::{FusedRecord, InertialSample, PositionSample};

/// Shortest interval the measured-dt policy will accept; duplicate
/// timestamps collapse to this instead of a zero-length step.
const MIN_MEASURED_DT: f64 = 1e-3;

#[derive(Debug, Error)]
pub enum FusionError {
    #[error("state estimation failed: {0}")]
    Filter(#[from] FilterError),
}

/// Per-run bookkeeping reported alongside the fused trajectory.
#[derive(Clone, Copy, Debug, Default)]
pub struct FusionSummary {
    pub observations: u64,
    pub max_innovation_norm: f64,
    pub anchor: Option<(f64, f64)>,
}

pub struct FusionOutput {
    pub records: Vec<FusedRecord>,
    pub summary: FusionSummary,
}

/// Runs the full fusion pass. Empty inputs produce an empty trajectory, not
/// an error; an unrecoverable numerical condition inside the filter aborts
/// the run.
pub fn run_fusion(
    inertial: Vec<InertialSample>,
    position: Vec<PositionSample>,
    config: &FilterConfig,
) -> Result<FusionOutput, FusionError> {
    let aligner = StreamAligner::new(inertial, position);
    if aligner.is_empty() {
        info!("nothing to fuse: one of the input streams is empty");
        return Ok(FusionOutput {
            records: Vec::new(),
            summary: FusionSummary::default(),
        });
    }

    let anchor = aligner
        .first_fix()
        .expect("non-empty aligner has a first fix");
    let frame = LocalFrame::new(anchor.lat, anchor.lon);
    let mut filter = PlanarKalman::new(config.clone());
    let mut summary = FusionSummary {
        anchor: Some(frame.anchor()),
        ..FusionSummary::default()
    };

    let mut records = Vec::with_capacity(aligner.len());
    let mut last_ts: Option<f64> = None;

    for obs in aligner.iter() {
        let dt = match config.dt_policy {
            DtPolicy::Fixed(nominal) => nominal,
            DtPolicy::Measured { fallback } => last_ts
                .map(|prev| (obs.timestamp - prev).max(MIN_MEASURED_DT))
                .unwrap_or(fallback),
        };

        filter.predict(obs.ax, obs.ay, dt);
        let (gx, gy) = frame.to_local(obs.lat, obs.lon);
        let innovation_norm = filter.correct(gx, gy)?;
        if innovation_norm > summary.max_innovation_norm {
            summary.max_innovation_norm = innovation_norm;
        }

        let (x, y) = filter.position();
        let (fused_lat, fused_lon) = frame.to_geodetic(x, y);
        records.push(FusedRecord {
            time: obs.timestamp,
            fused_lat,
            fused_lon,
            speed: filter.speed(),
            ax: obs.ax,
            ay: obs.ay,
            az: obs.az,
        });

        summary.observations += 1;
        last_ts = Some(obs.timestamp);
    }

    let (predicts, corrects) = filter.cycles();
    debug!(
        "fusion pass done: {} observations, {} predicts, {} corrects",
        summary.observations, predicts, corrects
    );
    info!(
        "fused {} samples (anchor {:.6}, {:.6}; max innovation {:.2} m)",
        summary.observations, anchor.lat, anchor.lon, summary.max_innovation_norm
    );

    Ok(FusionOutput { records, summary })
}
