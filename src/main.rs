use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use log::{info, warn};

use track_sentry_rs::alert::build_report;
use track_sentry_rs::anomaly::{AnomalyDetector, IsolationForest};
use track_sentry_rs::filters::{DtPolicy, FilterConfig};
use track_sentry_rs::fusion::run_fusion;
use track_sentry_rs::geofence::Geofence;
use track_sentry_rs::ingest::{read_inertial, read_position};

#[derive(Parser, Debug)]
#[command(name = "track_sentry")]
#[command(about = "Fuse GPS/IMU logs and evaluate geofence + anomaly alerts")]
#[command(version)]
struct Args {
    /// Inertial log CSV (optionally .gz)
    #[arg(long)]
    accel: PathBuf,

    /// GPS fix log CSV (optionally .gz)
    #[arg(long)]
    gps: PathBuf,

    /// GeoJSON geofence boundary; with --model, enables the alert pass
    #[arg(long)]
    geofence: Option<PathBuf>,

    /// Trained anomaly model JSON; with --geofence, enables the alert pass
    #[arg(long)]
    model: Option<PathBuf>,

    /// Fused trajectory output CSV
    #[arg(long, default_value = "ekf_output.csv")]
    output: PathBuf,

    /// Final alert report output CSV
    #[arg(long, default_value = "final_alert_output.csv")]
    report: PathBuf,

    /// Filter tuning preset
    #[arg(long, value_enum, default_value = "gps-trusting")]
    preset: Preset,

    /// Override the acceleration clamp bound (m/s^2)
    #[arg(long)]
    accel_clamp: Option<f64>,

    /// Override dt with a fixed nominal sampling interval (seconds)
    #[arg(long)]
    nominal_dt: Option<f64>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Preset {
    /// Trust GPS fixes heavily, fixed 1 Hz dt
    GpsTrusting,
    /// Balance both sources, measured dt
    Balanced,
}

fn filter_config(args: &Args) -> FilterConfig {
    let mut config = match args.preset {
        Preset::GpsTrusting => FilterConfig::gps_trusting(),
        Preset::Balanced => FilterConfig::balanced(),
    };
    if let Some(bound) = args.accel_clamp {
        config.accel_clamp = bound;
    }
    if let Some(dt) = args.nominal_dt {
        config.dt_policy = DtPolicy::Fixed(dt);
        config.scale_q_by_dt = false;
    }
    config
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let inertial = read_inertial(&args.accel)
        .with_context(|| format!("reading inertial log {}", args.accel.display()))?;
    let position = read_position(&args.gps)
        .with_context(|| format!("reading GPS log {}", args.gps.display()))?;
    info!(
        "loaded {} inertial samples, {} GPS fixes",
        inertial.len(),
        position.len()
    );

    let config = filter_config(&args);
    let fusion = run_fusion(inertial, position, &config)?;

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    for record in &fusion.records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!(
        "wrote {} fused records to {}",
        fusion.records.len(),
        args.output.display()
    );

    match (&args.geofence, &args.model) {
        (Some(fence_path), Some(model_path)) => {
            let fence = Geofence::from_geojson_file(fence_path)
                .with_context(|| format!("loading geofence {}", fence_path.display()))?;
            let model = IsolationForest::load(model_path)
                .with_context(|| format!("loading anomaly model {}", model_path.display()))?;
            let mut detector = AnomalyDetector::new(model);

            let report = build_report(&fusion.records, &fence, &mut detector);
            let breaches = report.iter().filter(|r| !r.inside_geofence).count();
            let anomalies = report.iter().filter(|r| r.anomaly).count();

            let mut writer = csv::Writer::from_path(&args.report)
                .with_context(|| format!("creating {}", args.report.display()))?;
            for row in &report {
                writer.serialize(row)?;
            }
            writer.flush()?;
            info!(
                "wrote report to {} ({} rows, {} breaches, {} anomalies)",
                args.report.display(),
                report.len(),
                breaches,
                anomalies
            );
        }
        (None, None) => {
            info!("no geofence/model supplied; stopping after fusion");
        }
        _ => {
            warn!("the alert pass needs both --geofence and --model; skipping it");
        }
    }

    info!(
        "run finished at {} (max innovation {:.2} m)",
        Utc::now().to_rfc3339(),
        fusion.summary.max_innovation_norm
    );
    Ok(())
}
