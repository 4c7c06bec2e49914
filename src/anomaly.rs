//! Motion-signature anomaly detection.
//!
//! Each fused sample is reduced to three features: acceleration magnitude,
//! the absolute change in magnitude since the previous sample, and fused
//! speed. An isolation forest trained on a recorded run scores how easily a
//! feature vector separates from the training distribution; easy separation
//! means anomalous motion.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Euler-Mascheroni constant, used in the expected-path-length correction.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

pub const FEATURE_COUNT: usize = 3;

#[derive(Debug, Error)]
pub enum AnomalyError {
    #[error("cannot train an anomaly model on an empty feature set")]
    EmptyTrainingSet,

    #[error("model i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("model serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-run feature extraction state. The magnitude delta needs the previous
/// sample's magnitude, so each fusion run constructs its own extractor and
/// nothing leaks across runs.
#[derive(Debug, Default)]
pub struct FeatureExtractor {
    prev_mag: Option<f64>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Features for one sample: [magnitude, |magnitude delta|, speed].
    /// The delta is zero for the first sample of a run.
    pub fn extract(&mut self, ax: f64, ay: f64, az: f64, speed: f64) -> [f64; FEATURE_COUNT] {
        let mag = (ax * ax + ay * ay + az * az).sqrt();
        let delta = self.prev_mag.map(|prev| (mag - prev).abs()).unwrap_or(0.0);
        self.prev_mag = Some(mag);
        [mag, delta, speed]
    }
}

/// Training knobs, defaulting to the reference configuration.
#[derive(Clone, Copy, Debug)]
pub struct TrainConfig {
    pub trees: usize,
    pub sample_size: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            trees: 100,
            sample_size: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// A trained isolation forest. Immutable after training or load, so one
/// model can be shared across concurrent runs.
#[derive(Debug, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    threshold: f64,
    contamination: f64,
}

impl IsolationForest {
    /// Fits the forest on the training features and fixes the decision
    /// threshold at the `(1 - contamination)` quantile of training scores.
    /// Deterministic for a given seed.
    pub fn fit(data: &[[f64; FEATURE_COUNT]], config: &TrainConfig) -> Result<Self, AnomalyError> {
        if data.is_empty() {
            return Err(AnomalyError::EmptyTrainingSet);
        }
        let mut rng = StdRng::seed_from_u64(config.seed);
        let sample_size = config.sample_size.min(data.len()).max(1);
        let height_limit = (sample_size as f64).log2().ceil().max(0.0) as usize;

        let mut indices: Vec<usize> = (0..data.len()).collect();
        let mut trees = Vec::with_capacity(config.trees);
        for _ in 0..config.trees {
            indices.shuffle(&mut rng);
            let subsample: Vec<[f64; FEATURE_COUNT]> =
                indices[..sample_size].iter().map(|&i| data[i]).collect();
            trees.push(build_tree(subsample, 0, height_limit, &mut rng));
        }

        let mut forest = Self {
            trees,
            sample_size,
            threshold: 0.0,
            contamination: config.contamination,
        };
        let mut scores: Vec<f64> = data.iter().map(|p| forest.score(p)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = ((1.0 - config.contamination) * (scores.len() as f64 - 1.0)).round() as usize;
        forest.threshold = scores[rank.min(scores.len() - 1)];
        Ok(forest)
    }

    /// Anomaly score in (0, 1]; higher means easier to isolate.
    pub fn score(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, features, 0.0))
            .sum();
        let avg = total / self.trees.len() as f64;
        let normalizer = expected_path_length(self.sample_size).max(1.0);
        2f64.powf(-avg / normalizer)
    }

    pub fn is_anomalous(&self, features: &[f64; FEATURE_COUNT]) -> bool {
        self.score(features) > self.threshold
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), AnomalyError> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AnomalyError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Expected unsuccessful-search path length in a binary tree of n points.
fn expected_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn build_tree(
    points: Vec<[f64; FEATURE_COUNT]>,
    depth: usize,
    limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= limit || points.len() <= 1 {
        return Node::Leaf {
            size: points.len(),
        };
    }

    // Try features in random order; a subsample collapsed to a single point
    // in every dimension becomes a leaf.
    let mut order = [0usize, 1, 2];
    order.shuffle(rng);
    for &feature in order.iter() {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for p in &points {
            lo = lo.min(p[feature]);
            hi = hi.max(p[feature]);
        }
        if !(hi - lo).is_finite() || hi - lo <= f64::EPSILON {
            continue;
        }
        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<_>, Vec<_>) =
            points.iter().copied().partition(|p| p[feature] < threshold);
        return Node::Split {
            feature,
            threshold,
            left: Box::new(build_tree(left, depth + 1, limit, rng)),
            right: Box::new(build_tree(right, depth + 1, limit, rng)),
        };
    }
    Node::Leaf {
        size: points.len(),
    }
}

fn path_length(node: &Node, x: &[f64; FEATURE_COUNT], depth: f64) -> f64 {
    match node {
        Node::Leaf { size } => depth + expected_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if x[*feature] < *threshold {
                path_length(left, x, depth + 1.0)
            } else {
                path_length(right, x, depth + 1.0)
            }
        }
    }
}

/// A loaded model paired with per-run extraction state.
pub struct AnomalyDetector {
    model: IsolationForest,
    extractor: FeatureExtractor,
}

impl AnomalyDetector {
    pub fn new(model: IsolationForest) -> Self {
        Self {
            model,
            extractor: FeatureExtractor::new(),
        }
    }

    /// Verdict for one fused sample, in run order.
    pub fn detect(&mut self, ax: f64, ay: f64, az: f64, speed: f64) -> bool {
        let features = self.extractor.extract(ax, ay, az, speed);
        self.model.is_anomalous(&features)
    }
}
