//! Spatial indexing abstractions for agent neighborhood queries.
//!
//! The simulation core rebuilds an index from the roster once per tick and
//! asks it for each agent's flock-mates. Queries are radius-bounded but the
//! effective reach is `sense_radius + other_radius`, so larger bodies are
//! noticed from further away.

use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by neighborhood index implementations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Indicates body data that cannot be indexed (e.g., a non-finite radius).
    #[error("invalid body data: {0}")]
    InvalidBody(&'static str),
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from agent positions and collision radii.
    fn rebuild(&mut self, bodies: &[(Vec2, f32)]) -> Result<(), IndexError>;

    /// Visit every *other* body whose center lies within
    /// `sense_radius + other_radius` of the body at `agent_idx`.
    ///
    /// The visitor receives the other body's index and the squared
    /// center-to-center distance. Visit order is unspecified; callers must
    /// treat the result as a set.
    fn neighbors_within(
        &self,
        agent_idx: usize,
        sense_radius: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );
}

/// Exhaustive pairwise index: O(N) per query, O(N²) per tick when every
/// agent queries once. Rebuilt from scratch every tick, no incremental state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BruteForceIndex {
    positions: Vec<Vec2>,
    radii: Vec<f32>,
}

impl BruteForceIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed bodies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true when no bodies are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl NeighborhoodIndex for BruteForceIndex {
    fn rebuild(&mut self, bodies: &[(Vec2, f32)]) -> Result<(), IndexError> {
        self.positions.clear();
        self.radii.clear();
        self.positions.reserve(bodies.len());
        self.radii.reserve(bodies.len());
        for &(position, radius) in bodies {
            if !radius.is_finite() || radius < 0.0 {
                return Err(IndexError::InvalidBody(
                    "radius must be finite and non-negative",
                ));
            }
            self.positions.push(position);
            self.radii.push(radius);
        }
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        sense_radius: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(&center) = self.positions.get(agent_idx) else {
            return;
        };
        for (idx, (&position, &radius)) in
            self.positions.iter().zip(self.radii.iter()).enumerate()
        {
            if idx == agent_idx {
                continue;
            }
            let reach = sense_radius + radius;
            let dist_sq = center.distance_squared(position);
            if dist_sq < reach * reach {
                visitor(idx, OrderedFloat(dist_sq));
            }
        }
    }
}
