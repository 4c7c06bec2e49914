use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use track_sentry_rs::anomaly::{FeatureExtractor, IsolationForest, TrainConfig};
use track_sentry_rs::types::FusedRecord;

#[derive(Parser, Debug)]
#[command(name = "train_anomaly")]
#[command(about = "Train the motion-anomaly model from a fused trajectory CSV")]
#[command(version)]
struct Args {
    /// Fused trajectory CSV produced by track_sentry
    #[arg(long)]
    input: PathBuf,

    /// Where to write the trained model JSON
    #[arg(long, default_value = "anomaly_model.json")]
    output: PathBuf,

    /// Number of isolation trees
    #[arg(long, default_value_t = 100)]
    trees: usize,

    /// Subsample size per tree
    #[arg(long, default_value_t = 256)]
    sample_size: usize,

    /// Expected fraction of anomalous samples in the training run
    #[arg(long, default_value_t = 0.05)]
    contamination: f64,

    /// RNG seed, for reproducible models
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut reader = csv::Reader::from_path(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let mut extractor = FeatureExtractor::new();
    let mut features = Vec::new();
    for row in reader.deserialize() {
        let record: FusedRecord = row?;
        features.push(extractor.extract(record.ax, record.ay, record.az, record.speed));
    }
    info!(
        "extracted {} feature vectors from {}",
        features.len(),
        args.input.display()
    );

    let config = TrainConfig {
        trees: args.trees,
        sample_size: args.sample_size,
        contamination: args.contamination,
        seed: args.seed,
    };
    let model = IsolationForest::fit(&features, &config)
        .context("training the isolation forest")?;
    model
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(
        "model saved to {} (decision threshold {:.4})",
        args.output.display(),
        model.threshold()
    );
    Ok(())
}
