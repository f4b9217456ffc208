//! Rolling average of heading samples, decoupling the rendered orientation
//! from the jittery physics heading.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-window vector smoother. Feed it the physics heading once per tick
/// and render the returned average instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadingSmoother {
    samples: VecDeque<Vec2>,
    capacity: usize,
}

impl HeadingSmoother {
    /// Create a smoother retaining up to `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a sample and return the renormalized window average. Near-zero
    /// averages (opposing samples cancelling out) are returned as-is rather
    /// than normalized.
    pub fn update(&mut self, sample: Vec2) -> Vec2 {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);

        let sum: Vec2 = self.samples.iter().copied().sum();
        let average = sum / self.samples.len() as f32;
        if average.length_squared() > 1e-6 {
            average.normalize()
        } else {
            average
        }
    }

    /// Number of samples currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true when no samples have been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn single_sample_passes_through() {
        let mut smoother = HeadingSmoother::new(4);
        let out = smoother.update(Vec2::Y);
        assert!((out - Vec2::Y).length() < EPS);
    }

    #[test]
    fn average_is_unit_length() {
        let mut smoother = HeadingSmoother::new(8);
        smoother.update(Vec2::X);
        let out = smoother.update(Vec2::Y);
        assert!((out.length() - 1.0).abs() < EPS);
        // Diagonal between the two samples.
        assert!((out - Vec2::new(1.0, 1.0).normalize()).length() < EPS);
    }

    #[test]
    fn window_drops_oldest_sample() {
        let mut smoother = HeadingSmoother::new(2);
        smoother.update(Vec2::X);
        smoother.update(Vec2::Y);
        // Third sample evicts the X heading; window is now all Y.
        let out = smoother.update(Vec2::Y);
        assert!((out - Vec2::Y).length() < EPS);
        assert_eq!(smoother.len(), 2);
    }

    #[test]
    fn cancelling_samples_stay_unnormalized() {
        let mut smoother = HeadingSmoother::new(2);
        smoother.update(Vec2::X);
        let out = smoother.update(-Vec2::X);
        assert!(out.length() < EPS);
    }
}
