//! Nearest-neighbor alignment of the inertial and positional sample streams.
//!
//! The two logs are sampled independently, usually at different rates. Each
//! inertial sample is paired with the GPS fix closest to it in time; no
//! interpolation of positional values is performed.

use std::cmp::Ordering;

use crate::types::{AlignedObservation, InertialSample, PositionSample};

/// Owns the two time-sorted streams and hands out aligned passes over them.
pub struct StreamAligner {
    inertial: Vec<InertialSample>,
    position: Vec<PositionSample>,
}

impl StreamAligner {
    /// Sorts both streams ascending by timestamp (stable, so equal
    /// timestamps keep their input order) and prepares for alignment.
    pub fn new(mut inertial: Vec<InertialSample>, mut position: Vec<PositionSample>) -> Self {
        inertial.sort_by(|a, b| cmp_time(a.timestamp, b.timestamp));
        position.sort_by(|a, b| cmp_time(a.timestamp, b.timestamp));
        Self { inertial, position }
    }

    /// Number of observations a full pass will yield: one per inertial
    /// sample, or zero when either stream is empty.
    pub fn len(&self) -> usize {
        if self.position.is_empty() {
            0
        } else {
            self.inertial.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest GPS fix of the run, used as the projection anchor.
    pub fn first_fix(&self) -> Option<&PositionSample> {
        self.position.first()
    }

    /// A fresh lazy pass over the aligned pairs. Not resumable mid-stream;
    /// call again to restart.
    pub fn iter(&self) -> AlignedIter<'_> {
        AlignedIter {
            inertial: &self.inertial,
            position: &self.position,
            next: 0,
            candidate: 0,
        }
    }
}

fn cmp_time(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Lazy iterator over aligned observations.
pub struct AlignedIter<'a> {
    inertial: &'a [InertialSample],
    position: &'a [PositionSample],
    next: usize,
    candidate: usize,
}

impl Iterator for AlignedIter<'_> {
    type Item = AlignedObservation;

    fn next(&mut self) -> Option<AlignedObservation> {
        if self.position.is_empty() || self.next >= self.inertial.len() {
            return None;
        }
        let imu = &self.inertial[self.next];
        // Both streams are sorted, so the nearest fix index never moves
        // backwards. Strict `<` keeps the earlier fix on a tie.
        while self.candidate + 1 < self.position.len()
            && (self.position[self.candidate + 1].timestamp - imu.timestamp).abs()
                < (self.position[self.candidate].timestamp - imu.timestamp).abs()
        {
            self.candidate += 1;
        }
        let fix = &self.position[self.candidate];
        self.next += 1;
        Some(AlignedObservation {
            timestamp: imu.timestamp,
            ax: imu.ax,
            ay: imu.ay,
            az: imu.az,
            lat: fix.lat,
            lon: fix.lon,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.position.is_empty() {
            0
        } else {
            self.inertial.len() - self.next
        };
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imu(timestamp: f64) -> InertialSample {
        InertialSample {
            timestamp,
            ax: 0.0,
            ay: 0.0,
            az: 9.8,
        }
    }

    fn fix(timestamp: f64, lat: f64) -> PositionSample {
        PositionSample {
            timestamp,
            lat,
            lon: 0.0,
        }
    }

    #[test]
    fn nearest_fix_with_tie_toward_earlier() {
        let aligner = StreamAligner::new(
            vec![imu(0.0), imu(1.0), imu(2.0)],
            vec![fix(0.4, 10.0), fix(1.6, 20.0)],
        );
        let lats: Vec<f64> = aligner.iter().map(|o| o.lat).collect();
        // t=0 -> 0.4, t=1 -> 0.4 (tie at 0.6s each, earlier wins), t=2 -> 1.6
        assert_eq!(lats, vec![10.0, 10.0, 20.0]);
    }

    #[test]
    fn one_observation_per_inertial_sample() {
        let aligner = StreamAligner::new(
            vec![imu(0.0), imu(0.5), imu(1.0), imu(1.5), imu(2.0)],
            vec![fix(0.0, 1.0), fix(2.0, 2.0)],
        );
        assert_eq!(aligner.len(), 5);
        assert_eq!(aligner.iter().count(), 5);
    }

    #[test]
    fn unsorted_inputs_are_sorted_first() {
        let aligner = StreamAligner::new(
            vec![imu(2.0), imu(0.0), imu(1.0)],
            vec![fix(1.9, 2.0), fix(0.1, 1.0)],
        );
        let out: Vec<AlignedObservation> = aligner.iter().collect();
        assert_eq!(out[0].timestamp, 0.0);
        assert_eq!(out[0].lat, 1.0);
        assert_eq!(out[2].timestamp, 2.0);
        assert_eq!(out[2].lat, 2.0);
        assert_eq!(aligner.first_fix().unwrap().timestamp, 0.1);
    }

    #[test]
    fn empty_streams_yield_nothing() {
        let aligner = StreamAligner::new(vec![], vec![fix(0.0, 1.0)]);
        assert_eq!(aligner.iter().count(), 0);

        let aligner = StreamAligner::new(vec![imu(0.0)], vec![]);
        assert!(aligner.is_empty());
        assert_eq!(aligner.iter().count(), 0);
    }

    #[test]
    fn pass_is_restartable() {
        let aligner = StreamAligner::new(vec![imu(0.0), imu(1.0)], vec![fix(0.0, 1.0)]);
        assert_eq!(aligner.iter().count(), 2);
        assert_eq!(aligner.iter().count(), 2);
    }
}
