//! Read-only world data consumed from the map and player collaborators.

use crate::steering::Mover;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Static circular obstacle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Obstacle {
    pub position: Vec2,
    pub radius: f32,
}

impl Obstacle {
    #[must_use]
    pub const fn new(position: Vec2, radius: f32) -> Self {
        Self { position, radius }
    }
}

/// Static boundary wall segment with an inward-facing unit normal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Wall {
    pub from: Vec2,
    pub to: Vec2,
    pub normal: Vec2,
}

impl Wall {
    /// Build a wall whose normal is the left perpendicular of `to - from`.
    /// Wind boundary walls counter-clockwise in screen coordinates so the
    /// normals face into the arena.
    #[must_use]
    pub fn new(from: Vec2, to: Vec2) -> Self {
        let delta = to - from;
        Self {
            from,
            to,
            normal: delta.perp().normalize_or_zero(),
        }
    }
}

/// Arena extent plus the obstacle and wall lists. Owned by the map
/// collaborator; this core only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArenaMap {
    pub width: f32,
    pub height: f32,
    pub obstacles: Vec<Obstacle>,
    pub walls: Vec<Wall>,
}

impl ArenaMap {
    /// An empty arena with no obstacles or walls.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            obstacles: Vec::new(),
            walls: Vec::new(),
        }
    }

    /// An arena enclosed by four boundary walls with inward normals.
    #[must_use]
    pub fn bounded(width: f32, height: f32) -> Self {
        let corners = [
            Vec2::new(0.0, 0.0),
            Vec2::new(width, 0.0),
            Vec2::new(width, height),
            Vec2::new(0.0, height),
        ];
        let walls = (0..4)
            .map(|i| Wall::new(corners[i], corners[(i + 1) % 4]))
            .collect();
        Self {
            width,
            height,
            obstacles: Vec::new(),
            walls,
        }
    }
}

/// Per-tick snapshot of the player, supplied by the player collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlayerView {
    pub position: Vec2,
    pub velocity: Vec2,
    pub heading: Vec2,
    pub radius: f32,
}

impl PlayerView {
    /// The player as a steering target.
    #[must_use]
    pub fn mover(&self) -> Mover {
        Mover {
            position: self.position,
            velocity: self.velocity,
            heading: self.heading,
            side: self.heading.perp(),
        }
    }
}
