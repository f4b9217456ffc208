//! The enemy agent: kinematic body, behavioral state, and the per-tick
//! Newtonian integration step.

use crate::flock::GroupManager;
use crate::peek::PeekController;
use crate::smoothing::HeadingSmoother;
use crate::steering::{Kinematics, Mover, SteeringBehaviors};
use crate::{AgentId, AgentState, HordeConfig};
use glam::Vec2;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Velocities below this squared magnitude leave the heading untouched.
const HEADING_EPSILON_SQ: f32 = 1e-8;

/// A single enemy in the horde.
///
/// Positions are mutated by the agent's own integration and, in the
/// non-penetration pass, by the world; everything else is owned. The
/// `neighbors` list holds generational handles, never references; stale
/// entries from removed agents simply fail lookup until the next recompute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Monotonic creation sequence number; the leader-election tie-break.
    pub serial: u64,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Unit direction of travel; retains its last value while stationary.
    pub heading: Vec2,
    /// Perpendicular-left of heading.
    pub side: Vec2,
    pub radius: f32,
    pub mass: f32,
    pub max_speed: f32,
    pub max_force: f32,
    /// Sensing radius for the neighbor relation.
    pub flocking_radius: f32,
    pub state: AgentState,
    /// True only for the elected leader of an attack pack.
    pub is_group_leader: bool,
    /// Shared identifier of the current attack cohort (the leader's serial).
    pub attack_group_id: Option<u64>,
    /// Leader-local follow offset; sampled lazily, cleared on leader change.
    pub attack_offset: Option<Vec2>,
    /// Flock-mates from this tick's neighbor scan.
    pub neighbors: Vec<AgentId>,
    pub group: GroupManager,
    pub steering: SteeringBehaviors,
    pub peek: PeekController,
    pub smoother: HeadingSmoother,
    /// Window-averaged heading for rendering.
    pub smoothed_heading: Vec2,
}

impl Agent {
    /// Build a fresh explorer at `position` with a random initial heading.
    pub(crate) fn spawn(
        serial: u64,
        position: Vec2,
        config: &HordeConfig,
        rng: &mut dyn RngCore,
    ) -> Self {
        let heading = Vec2::from_angle(rng.random_range(0.0..TAU));
        Self {
            serial,
            position,
            velocity: Vec2::ZERO,
            heading,
            side: heading.perp(),
            radius: config.agent_radius,
            mass: config.agent_mass,
            max_speed: config.max_speed,
            max_force: config.max_force,
            flocking_radius: config.flocking_radius,
            state: AgentState::Explore,
            is_group_leader: false,
            attack_group_id: None,
            attack_offset: None,
            neighbors: Vec::new(),
            group: GroupManager::default(),
            steering: SteeringBehaviors::new(config.wander_radius),
            peek: PeekController::new(config, rng),
            smoother: HeadingSmoother::new(config.smoothing_samples),
            smoothed_heading: heading,
        }
    }

    /// Kinematic view for the steering toolkit.
    #[must_use]
    pub fn kinematics(&self) -> Kinematics {
        Kinematics {
            position: self.position,
            velocity: self.velocity,
            heading: self.heading,
            side: self.side,
            radius: self.radius,
            max_speed: self.max_speed,
            max_force: self.max_force,
        }
    }

    /// This agent as a steering target for others.
    #[must_use]
    pub fn mover(&self) -> Mover {
        Mover {
            position: self.position,
            velocity: self.velocity,
            heading: self.heading,
            side: self.side,
        }
    }

    /// Apply a steering force for `dt` seconds: Newtonian acceleration,
    /// speed cap, heading refresh, smoother feed.
    pub(crate) fn integrate(&mut self, force: Vec2, dt: f32) {
        let acceleration = force / self.mass;
        self.velocity += acceleration * dt;
        self.velocity = self.velocity.clamp_length_max(self.max_speed);
        self.position += self.velocity * dt;

        if self.velocity.length_squared() > HEADING_EPSILON_SQ {
            self.heading = self.velocity.normalize();
            self.side = self.heading.perp();
        }
        self.smoothed_heading = self.smoother.update(self.heading);
    }

    /// Draw-relevant projection handed to the renderer.
    #[must_use]
    pub fn snapshot(&self, id: AgentId) -> AgentSnapshot {
        AgentSnapshot {
            id,
            serial: self.serial,
            position: self.position,
            heading: self.heading,
            smoothed_heading: self.smoothed_heading,
            radius: self.radius,
            state: self.state,
            is_group_leader: self.is_group_leader,
        }
    }
}

/// Read-only projection of an agent for rendering and UI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub serial: u64,
    pub position: Vec2,
    pub heading: Vec2,
    pub smoothed_heading: Vec2,
    pub radius: f32,
    pub state: AgentState,
    pub is_group_leader: bool,
}
