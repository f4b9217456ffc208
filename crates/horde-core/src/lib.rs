//! Core simulation types for the horde: steering behaviors, flock grouping,
//! and the per-tick world pipeline.
//!
//! The crate owns the enemy population of a top-down arena game. Agents
//! wander a bounded map, hide from the player behind circular obstacles, and
//! flock with nearby agents. Once a large enough cluster has held together
//! through a cooldown, it promotes itself into an attack pack with one
//! elected leader and offset-following members. Rendering, input, map
//! generation, and the player's own logic live outside this crate and talk
//! to it through [`ArenaMap`], [`PlayerView`], and the [`HordeState`] API.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

pub mod agent;
pub mod arena;
pub mod behavior;
pub mod collision;
pub mod flock;
pub mod math;
pub mod peek;
pub mod smoothing;
pub mod steering;
pub mod world;

pub use agent::{Agent, AgentSnapshot};
pub use arena::{ArenaMap, Obstacle, PlayerView, Wall};
pub use flock::GroupManager;
pub use peek::PeekController;
pub use smoothing::HeadingSmoother;
pub use steering::{Deceleration, Kinematics, Mover, Path, SteeringBehaviors, SteeringParams};
pub use world::{HordeState, Roster};

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// Monotonic simulation tick counter.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Discrete behavioral state of an agent.
///
/// `Dead` is terminal and only ever set externally via [`HordeState::kill`];
/// the explore→attack transition is owned by the group manager. There is no
/// attack→explore transition.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AgentState {
    /// Wandering, hiding, flocking; eligible for group promotion.
    #[default]
    Explore,
    /// Member of an attack pack, either leading or offset-following.
    Attack,
    /// Killed by the outer game; inert but may linger in the roster.
    Dead,
}

/// Errors that can occur when constructing or mutating world state.
#[derive(Debug, Error)]
pub enum HordeStateError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Collision-free placement gave up after the configured attempt budget.
    #[error("no free spawn location found after {0} attempts")]
    SpawnExhausted(u32),
}

/// Static configuration for a horde world.
///
/// Steering constants default to the tuning the game shipped with; the
/// weight and probability tables drive the explore-mode force dithering
/// described in [`behavior`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HordeConfig {
    /// Optional RNG seed for reproducible simulations.
    pub rng_seed: Option<u64>,

    /// Collision radius assigned to spawned agents.
    pub agent_radius: f32,
    /// Mass used for force integration.
    pub agent_mass: f32,
    /// Speed cap enforced at the end of every tick.
    pub max_speed: f32,
    /// Magnitude cap for the per-tick steering force sum.
    pub max_force: f32,
    /// Sensing radius defining the neighbor relation.
    pub flocking_radius: f32,

    /// Connected-component size required before a cluster may turn hostile.
    pub min_group_size: usize,
    /// Seconds a qualifying cluster must hold together before promotion.
    pub attack_cooldown: f64,

    /// Radius of the wander circle.
    pub wander_radius: f32,
    /// Distance of the wander circle's center ahead of the agent.
    pub wander_distance: f32,
    /// Maximum random displacement of the wander target per second.
    pub wander_jitter: f32,

    /// Detection box length at rest; doubles at full speed.
    pub min_detection_box_length: f32,
    /// Scale applied to the obstacle-avoidance braking component.
    pub braking_weight: f32,
    /// Length of the forward wall feeler; side feelers use 0.8 of it.
    pub feeler_length: f32,
    /// Clearance between an obstacle's rim and its hiding point.
    pub hide_clearance: f32,
    /// Scales all arrive deceleration tiers.
    pub deceleration_tweaker: f32,
    /// Distance at which a path waypoint counts as reached.
    pub waypoint_seek_radius: f32,

    /// Explore-mode behavior weights.
    pub weight_hide: f32,
    pub weight_separation: f32,
    pub weight_wall_avoidance: f32,
    pub weight_obstacle_avoidance: f32,
    pub weight_alignment: f32,
    pub weight_cohesion: f32,
    pub weight_wander: f32,

    /// Explore-mode per-tick Bernoulli activation probabilities.
    pub prob_hide: f64,
    pub prob_separation: f64,
    pub prob_wall_avoidance: f64,
    pub prob_obstacle_avoidance: f64,
    pub prob_alignment: f64,
    pub prob_cohesion: f64,
    pub prob_wander: f64,

    /// Wander amplification applied while the agent is peeking.
    pub peek_wander_boost: f32,

    /// Attack-mode behavior weights (no probability gating).
    pub attack_weight_pursuit: f32,
    pub attack_weight_offset: f32,
    pub attack_weight_separation: f32,
    pub attack_weight_alignment: f32,
    pub attack_weight_cohesion: f32,
    pub attack_weight_obstacle_avoidance: f32,
    pub attack_weight_wall_avoidance: f32,

    /// Follower offset sampling: distance behind the leader.
    pub offset_behind_min: f32,
    pub offset_behind_max: f32,
    /// Follower offset sampling: lateral half-range beside the leader.
    pub offset_lateral: f32,

    /// Seconds between peek Bernoulli checks while idle.
    pub peek_check_interval: f32,
    /// Base peek probability before flock-density damping.
    pub peek_base_chance: f64,
    /// Exponential damping per neighbor: p = base · exp(−scale · n).
    pub peek_group_scale: f64,
    /// Cooldown range sampled at spawn, before the first peek.
    pub peek_initial_cooldown_min: f32,
    pub peek_initial_cooldown_max: f32,
    /// Cooldown range sampled after each peek ends.
    pub peek_cooldown_min: f32,
    pub peek_cooldown_max: f32,
    /// Peek duration range.
    pub peek_duration_min: f32,
    pub peek_duration_max: f32,
    /// Wander-target nudge half-range applied when a peek starts.
    pub peek_wander_nudge: f32,

    /// Heading samples kept by the presentation smoother.
    pub smoothing_samples: usize,

    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
    /// Placement attempts before collision-free spawning gives up.
    pub spawn_attempts: u32,
}

impl Default for HordeConfig {
    fn default() -> Self {
        Self {
            rng_seed: None,

            agent_radius: 20.0,
            agent_mass: 1.0,
            max_speed: 150.0,
            max_force: 300.0,
            flocking_radius: 100.0,

            min_group_size: 10,
            attack_cooldown: 4.0,

            wander_radius: 30.0,
            wander_distance: 40.0,
            wander_jitter: 80.0,

            min_detection_box_length: 120.0,
            braking_weight: 0.1,
            feeler_length: 500.0,
            hide_clearance: 50.0,
            deceleration_tweaker: 0.3,
            waypoint_seek_radius: 50.0,

            weight_hide: 10.0,
            weight_separation: 18_000.0,
            weight_wall_avoidance: 10.0,
            weight_obstacle_avoidance: 10.0,
            weight_alignment: 200.0,
            weight_cohesion: 0.1,
            weight_wander: 3.5,

            prob_hide: 0.8,
            prob_separation: 0.2,
            prob_wall_avoidance: 0.5,
            prob_obstacle_avoidance: 0.5,
            prob_alignment: 0.3,
            prob_cohesion: 0.6,
            prob_wander: 0.8,

            peek_wander_boost: 1.8,

            attack_weight_pursuit: 1.0,
            attack_weight_offset: 1.0,
            attack_weight_separation: 9_000.0,
            attack_weight_alignment: 100.0,
            attack_weight_cohesion: 0.05,
            attack_weight_obstacle_avoidance: 10.0,
            attack_weight_wall_avoidance: 10.0,

            offset_behind_min: 30.0,
            offset_behind_max: 80.0,
            offset_lateral: 60.0,

            peek_check_interval: 0.5,
            peek_base_chance: 0.6,
            peek_group_scale: 0.15,
            peek_initial_cooldown_min: 5.0,
            peek_initial_cooldown_max: 15.0,
            peek_cooldown_min: 6.0,
            peek_cooldown_max: 18.0,
            peek_duration_min: 1.0,
            peek_duration_max: 3.0,
            peek_wander_nudge: 5.0,

            smoothing_samples: 10,

            history_capacity: 256,
            spawn_attempts: 2_000,
        }
    }
}

impl HordeConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), HordeStateError> {
        if self.agent_radius <= 0.0 || !self.agent_radius.is_finite() {
            return Err(HordeStateError::InvalidConfig(
                "agent_radius must be positive",
            ));
        }
        if self.agent_mass <= 0.0 {
            return Err(HordeStateError::InvalidConfig("agent_mass must be positive"));
        }
        if self.max_speed <= 0.0 {
            return Err(HordeStateError::InvalidConfig("max_speed must be positive"));
        }
        if self.max_force <= 0.0 {
            return Err(HordeStateError::InvalidConfig("max_force must be positive"));
        }
        if self.flocking_radius <= 0.0 {
            return Err(HordeStateError::InvalidConfig(
                "flocking_radius must be positive",
            ));
        }
        if self.min_group_size < 2 {
            return Err(HordeStateError::InvalidConfig(
                "min_group_size must be at least 2",
            ));
        }
        if self.attack_cooldown < 0.0 {
            return Err(HordeStateError::InvalidConfig(
                "attack_cooldown must be non-negative",
            ));
        }
        if self.wander_radius <= 0.0 || self.wander_distance <= 0.0 || self.wander_jitter < 0.0 {
            return Err(HordeStateError::InvalidConfig(
                "wander radius/distance must be positive, jitter non-negative",
            ));
        }
        if self.min_detection_box_length <= 0.0 || self.feeler_length <= 0.0 {
            return Err(HordeStateError::InvalidConfig(
                "detection box and feeler lengths must be positive",
            ));
        }
        if self.deceleration_tweaker <= 0.0 {
            return Err(HordeStateError::InvalidConfig(
                "deceleration_tweaker must be positive",
            ));
        }
        if self.waypoint_seek_radius <= 0.0 {
            return Err(HordeStateError::InvalidConfig(
                "waypoint_seek_radius must be positive",
            ));
        }
        let probabilities = [
            self.prob_hide,
            self.prob_separation,
            self.prob_wall_avoidance,
            self.prob_obstacle_avoidance,
            self.prob_alignment,
            self.prob_cohesion,
            self.prob_wander,
            self.peek_base_chance,
        ];
        if probabilities.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(HordeStateError::InvalidConfig(
                "behavior probabilities must lie in [0, 1]",
            ));
        }
        if self.peek_group_scale < 0.0 {
            return Err(HordeStateError::InvalidConfig(
                "peek_group_scale must be non-negative",
            ));
        }
        if self.peek_check_interval <= 0.0 {
            return Err(HordeStateError::InvalidConfig(
                "peek_check_interval must be positive",
            ));
        }
        if self.peek_initial_cooldown_min > self.peek_initial_cooldown_max
            || self.peek_cooldown_min > self.peek_cooldown_max
            || self.peek_duration_min > self.peek_duration_max
            || self.peek_initial_cooldown_min < 0.0
            || self.peek_cooldown_min < 0.0
            || self.peek_duration_min < 0.0
        {
            return Err(HordeStateError::InvalidConfig(
                "peek timer ranges must be non-negative and ordered",
            ));
        }
        if self.offset_behind_min > self.offset_behind_max
            || self.offset_behind_min < 0.0
            || self.offset_lateral < 0.0
        {
            return Err(HordeStateError::InvalidConfig(
                "follower offset ranges must be non-negative and ordered",
            ));
        }
        if self.smoothing_samples == 0 {
            return Err(HordeStateError::InvalidConfig(
                "smoothing_samples must be at least 1",
            ));
        }
        if self.history_capacity == 0 {
            return Err(HordeStateError::InvalidConfig(
                "history_capacity must be at least 1",
            ));
        }
        if self.spawn_attempts == 0 {
            return Err(HordeStateError::InvalidConfig(
                "spawn_attempts must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding from entropy when no seed is set.
    #[must_use]
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// Samples a follower's leader-local attack offset: behind the leader,
    /// spread to either side.
    #[must_use]
    pub(crate) fn sample_attack_offset(&self, rng: &mut impl Rng) -> glam::Vec2 {
        let behind = rng.random_range(self.offset_behind_min..=self.offset_behind_max);
        let lateral = rng.random_range(-self.offset_lateral..=self.offset_lateral);
        glam::Vec2::new(-behind, lateral)
    }
}

/// Events emitted after processing a world tick.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickEvents {
    pub tick: Tick,
    /// Agents flipped from explore to attack this tick.
    pub promotions: usize,
    /// Leader elections that installed a different leader.
    pub leader_changes: usize,
}

/// Per-tick population summary retained in the rolling history.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: Tick,
    pub total: usize,
    pub exploring: usize,
    pub attacking: usize,
    pub dead: usize,
    pub leaders: usize,
}
