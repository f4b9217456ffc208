//! The steering toolkit: each behavior maps agent kinematics and a target
//! description to a desired force, uncapped. The orchestrator in
//! [`crate::behavior`] weighs, gates, and caps contributions.
//!
//! Behaviors are stateless per call except for wander (the persistent point
//! on the wander circle), the wall-avoidance feeler scratch, and the path
//! cursor. Degenerate inputs (zero-length directions, zero speed sums) are
//! absorbed into zero forces; nothing here errors.

use crate::math::{local_to_world, segment_intersection, world_to_local};
use crate::{Obstacle, Wall};
use glam::Vec2;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Per-call kinematic view of the steered agent.
#[derive(Debug, Clone, Copy)]
pub struct Kinematics {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Unit direction of travel; local +X axis.
    pub heading: Vec2,
    /// Perpendicular-left of heading; local +Y axis.
    pub side: Vec2,
    pub radius: f32,
    pub max_speed: f32,
    pub max_force: f32,
}

/// A moving target: the player, an attack leader, or another agent.
#[derive(Debug, Clone, Copy)]
pub struct Mover {
    pub position: Vec2,
    pub velocity: Vec2,
    pub heading: Vec2,
    pub side: Vec2,
}

/// Arrive deceleration tier; higher tiers brake earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deceleration {
    Fast,
    Normal,
    Slow,
}

impl Deceleration {
    const fn factor(self) -> f32 {
        match self {
            Self::Fast => 1.0,
            Self::Normal => 2.0,
            Self::Slow => 3.0,
        }
    }
}

/// Waypoint sequence for [`SteeringBehaviors::follow_path`]. Closed paths
/// wrap from the last waypoint back to the first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Path {
    pub waypoints: Vec<Vec2>,
    pub closed: bool,
}

/// Tunable constants consumed by the toolkit, lifted from [`crate::HordeConfig`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SteeringParams {
    pub wander_radius: f32,
    pub wander_distance: f32,
    pub wander_jitter: f32,
    pub min_detection_box_length: f32,
    pub braking_weight: f32,
    pub feeler_length: f32,
    pub hide_clearance: f32,
    pub deceleration_tweaker: f32,
    pub waypoint_seek_radius: f32,
}

impl From<&crate::HordeConfig> for SteeringParams {
    fn from(config: &crate::HordeConfig) -> Self {
        Self {
            wander_radius: config.wander_radius,
            wander_distance: config.wander_distance,
            wander_jitter: config.wander_jitter,
            min_detection_box_length: config.min_detection_box_length,
            braking_weight: config.braking_weight,
            feeler_length: config.feeler_length,
            hide_clearance: config.hide_clearance,
            deceleration_tweaker: config.deceleration_tweaker,
            waypoint_seek_radius: config.waypoint_seek_radius,
        }
    }
}

const FEELER_COUNT: usize = 3;
const FEELER_SPREAD_RADIANS: f32 = 30.0 * std::f32::consts::PI / 180.0;
const FEELER_SIDE_SCALE: f32 = 0.8;

/// Per-agent steering state and the behavior library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteeringBehaviors {
    wander_target: Vec2,
    feelers: [Vec2; FEELER_COUNT],
    path: Option<Path>,
    current_waypoint: usize,
}

impl SteeringBehaviors {
    /// Create fresh behavior state; the wander target starts on the circle's
    /// +X rim.
    #[must_use]
    pub fn new(wander_radius: f32) -> Self {
        Self {
            wander_target: Vec2::new(wander_radius, 0.0),
            feelers: [Vec2::ZERO; FEELER_COUNT],
            path: None,
            current_waypoint: 0,
        }
    }

    /// Steer directly at a world-space point. Zero force when already there.
    #[must_use]
    pub fn seek(kin: &Kinematics, target: Vec2) -> Vec2 {
        let to_target = target - kin.position;
        if to_target.length_squared() <= f32::EPSILON {
            return Vec2::ZERO;
        }
        let desired = to_target.normalize() * kin.max_speed;
        desired - kin.velocity
    }

    /// Steer directly away from a point. With `panic_distance` set, targets
    /// beyond it provoke no reaction.
    #[must_use]
    pub fn flee(kin: &Kinematics, target: Vec2, panic_distance: Option<f32>) -> Vec2 {
        let to_target = kin.position - target;
        if let Some(panic) = panic_distance {
            if to_target.length_squared() > panic * panic {
                return Vec2::ZERO;
            }
        }
        if to_target.length_squared() <= f32::EPSILON {
            return Vec2::ZERO;
        }
        let desired = to_target.normalize() * kin.max_speed;
        desired - kin.velocity
    }

    /// Steer at a point, slowing to a stop on approach.
    #[must_use]
    pub fn arrive(
        params: &SteeringParams,
        kin: &Kinematics,
        target: Vec2,
        deceleration: Deceleration,
    ) -> Vec2 {
        let to_target = target - kin.position;
        let dist = to_target.length();
        if dist > 0.0 {
            let speed = (dist / (deceleration.factor() * params.deceleration_tweaker))
                .min(kin.max_speed);
            let desired = to_target * (speed / dist);
            desired - kin.velocity
        } else {
            Vec2::ZERO
        }
    }

    /// Intercept a moving target by seeking its predicted future position.
    /// A target dead ahead and closing nearly head-on is sought directly.
    #[must_use]
    pub fn pursuit(kin: &Kinematics, evader: &Mover) -> Vec2 {
        let to_evader = evader.position - kin.position;
        let relative_heading = kin.heading.dot(evader.heading);

        if to_evader.dot(kin.heading) > 0.0 && relative_heading < -0.95 {
            return Self::seek(kin, evader.position);
        }

        let distance = to_evader.length();
        let speed_sum = kin.max_speed + evader.velocity.length();
        let look_ahead = if speed_sum > 0.0 {
            distance / speed_sum
        } else {
            0.0
        };
        Self::seek(kin, evader.position + evader.velocity * look_ahead)
    }

    /// Flee from a pursuer's predicted future position.
    #[must_use]
    pub fn evade(kin: &Kinematics, pursuer: &Mover) -> Vec2 {
        let to_pursuer = pursuer.position - kin.position;
        let speed_sum = kin.max_speed + pursuer.velocity.length();
        let look_ahead = if speed_sum > 0.0 {
            to_pursuer.length() / speed_sum
        } else {
            0.0
        };
        Self::flee(kin, pursuer.position + pursuer.velocity * look_ahead, None)
    }

    /// Meander: jitter a persistent target around a circle projected ahead
    /// of the agent and seek it.
    #[must_use]
    pub fn wander(
        &mut self,
        params: &SteeringParams,
        kin: &Kinematics,
        dt: f32,
        rng: &mut dyn RngCore,
    ) -> Vec2 {
        let jitter = params.wander_jitter * dt;
        self.wander_target += Vec2::new(
            rng.random_range(-1.0..=1.0) * jitter,
            rng.random_range(-1.0..=1.0) * jitter,
        );
        if self.wander_target.length_squared() > 0.0 {
            self.wander_target = self.wander_target.normalize() * params.wander_radius;
        }

        let target_local = self.wander_target + Vec2::new(params.wander_distance, 0.0);
        let target_world = kin.position + local_to_world(target_local, kin.heading, kin.side);
        Self::seek(kin, target_world)
    }

    /// Shift the wander target; used by the peek controller to break a
    /// settled hiding orbit.
    pub fn nudge_wander_target(&mut self, delta: Vec2) {
        self.wander_target += delta;
    }

    /// Steer around the obstacle that would be struck first, braking and
    /// pushing laterally in the agent's local frame.
    #[must_use]
    pub fn obstacle_avoidance(
        params: &SteeringParams,
        kin: &Kinematics,
        obstacles: &[Obstacle],
    ) -> Vec2 {
        if obstacles.is_empty() {
            return Vec2::ZERO;
        }

        // Detection box grows with speed: its minimum length at rest, double
        // at full speed.
        let speed_ratio = if kin.max_speed > 0.0 {
            kin.velocity.length() / kin.max_speed
        } else {
            0.0
        };
        let box_length = params.min_detection_box_length * (1.0 + speed_ratio);

        let mut closest: Option<(&Obstacle, Vec2, f32)> = None;
        for obstacle in obstacles {
            let local = world_to_local(obstacle.position, kin.position, kin.heading, kin.side);
            if local.x < 0.0 {
                continue;
            }
            let expanded = obstacle.radius + kin.radius;
            if local.y.abs() >= expanded {
                continue;
            }
            // Nearest intersection of the local x-axis with the expanded circle.
            let offset = (expanded * expanded - local.y * local.y).sqrt();
            let mut intersection = local.x - offset;
            if intersection <= 0.0 {
                intersection = local.x + offset;
            }
            match closest {
                Some((_, _, best)) if intersection >= best => {}
                _ => closest = Some((obstacle, local, intersection)),
            }
        }

        let Some((obstacle, local, _)) = closest else {
            return Vec2::ZERO;
        };

        let multiplier = 1.0 + (box_length - local.x) / box_length;
        let lateral = (obstacle.radius - local.y) * multiplier;
        let braking = (obstacle.radius - local.x) * params.braking_weight;
        local_to_world(Vec2::new(braking, lateral), kin.heading, kin.side)
    }

    /// Cast three feelers ahead of the agent and steer along the inward
    /// normal of the nearest intersected wall, scaled by the feeler's
    /// overshoot past the intersection.
    #[must_use]
    pub fn wall_avoidance(
        &mut self,
        params: &SteeringParams,
        kin: &Kinematics,
        walls: &[Wall],
    ) -> Vec2 {
        self.create_feelers(params, kin);

        let mut closest_dist = f32::INFINITY;
        let mut hit: Option<(&Wall, Vec2, usize)> = None;

        for (feeler_idx, &feeler) in self.feelers.iter().enumerate() {
            for wall in walls {
                if let Some(point) =
                    segment_intersection(kin.position, feeler, wall.from, wall.to)
                {
                    let dist = point.distance(kin.position);
                    if dist < closest_dist {
                        closest_dist = dist;
                        hit = Some((wall, point, feeler_idx));
                    }
                }
            }
        }

        match hit {
            Some((wall, point, feeler_idx)) => {
                let overshoot = self.feelers[feeler_idx] - point;
                wall.normal * overshoot.length()
            }
            None => Vec2::ZERO,
        }
    }

    fn create_feelers(&mut self, params: &SteeringParams, kin: &Kinematics) {
        let length = params.feeler_length;
        self.feelers[0] = kin.position + kin.heading * length;
        self.feelers[1] = kin.position
            + Vec2::from_angle(FEELER_SPREAD_RADIANS).rotate(kin.heading)
                * (length * FEELER_SIDE_SCALE);
        self.feelers[2] = kin.position
            + Vec2::from_angle(-FEELER_SPREAD_RADIANS).rotate(kin.heading)
                * (length * FEELER_SIDE_SCALE);
    }

    /// Feeler endpoints from the last wall-avoidance pass, for debug overlays.
    #[must_use]
    pub fn feelers(&self) -> &[Vec2; FEELER_COUNT] {
        &self.feelers
    }

    /// Push away from each neighbor, weighted by inverse distance so close
    /// neighbors dominate.
    #[must_use]
    pub fn separation(kin: &Kinematics, neighbor_positions: &[Vec2]) -> Vec2 {
        let mut force = Vec2::ZERO;
        for &other in neighbor_positions {
            let to_agent = kin.position - other;
            let dist = to_agent.length();
            if dist > 0.0 {
                force += (to_agent / dist) / dist;
            }
        }
        force
    }

    /// Turn toward the mean heading of the neighbors.
    #[must_use]
    pub fn alignment(kin: &Kinematics, neighbor_headings: &[Vec2]) -> Vec2 {
        if neighbor_headings.is_empty() {
            return Vec2::ZERO;
        }
        let sum: Vec2 = neighbor_headings.iter().copied().sum();
        let average = sum / neighbor_headings.len() as f32;
        average - kin.heading
    }

    /// Seek the centroid of the neighbors. Capped at `max_force` internally.
    #[must_use]
    pub fn cohesion(kin: &Kinematics, neighbor_positions: &[Vec2]) -> Vec2 {
        if neighbor_positions.is_empty() {
            return Vec2::ZERO;
        }
        let sum: Vec2 = neighbor_positions.iter().copied().sum();
        let centroid = sum / neighbor_positions.len() as f32;

        let to_centroid = centroid - kin.position;
        if to_centroid.length_squared() <= f32::EPSILON {
            return Vec2::ZERO;
        }
        let desired = to_centroid.normalize() * kin.max_speed;
        (desired - kin.velocity).clamp_length_max(kin.max_force)
    }

    /// World-space hiding point for one obstacle: on the far side from the
    /// threat, `hide_clearance` beyond the rim. `None` when the obstacle is
    /// centered on the threat (direction undefined).
    #[must_use]
    pub fn hiding_position(
        params: &SteeringParams,
        obstacle: &Obstacle,
        threat_position: Vec2,
    ) -> Option<Vec2> {
        let away = (obstacle.position - threat_position).normalize_or_zero();
        if away == Vec2::ZERO {
            return None;
        }
        Some(obstacle.position + away * (obstacle.radius + params.hide_clearance))
    }

    /// Arrive at the nearest hiding point; with no obstacles, evade instead.
    #[must_use]
    pub fn hide(
        params: &SteeringParams,
        kin: &Kinematics,
        threat: &Mover,
        obstacles: &[Obstacle],
    ) -> Vec2 {
        let mut best: Option<(Vec2, f32)> = None;
        for obstacle in obstacles {
            let Some(spot) = Self::hiding_position(params, obstacle, threat.position) else {
                continue;
            };
            let dist_sq = spot.distance_squared(kin.position);
            match best {
                Some((_, best_dist)) if dist_sq >= best_dist => {}
                _ => best = Some((spot, dist_sq)),
            }
        }

        match best {
            Some((spot, _)) => Self::arrive(params, kin, spot, Deceleration::Fast),
            None => Self::evade(kin, threat),
        }
    }

    /// Hold a fixed leader-local offset, arriving at its predicted future
    /// world position.
    #[must_use]
    pub fn offset_pursuit(
        params: &SteeringParams,
        kin: &Kinematics,
        leader: &Mover,
        offset: Vec2,
    ) -> Vec2 {
        let world_offset =
            leader.position + local_to_world(offset, leader.heading, leader.side);
        let to_offset = world_offset - kin.position;

        let speed_sum = kin.max_speed + leader.velocity.length();
        let look_ahead = if speed_sum > 0.0 {
            to_offset.length() / speed_sum
        } else {
            0.0
        };
        Self::arrive(
            params,
            kin,
            world_offset + leader.velocity * look_ahead,
            Deceleration::Fast,
        )
    }

    /// Arrive at the predicted midpoint between two movers.
    #[must_use]
    pub fn interpose(
        params: &SteeringParams,
        kin: &Kinematics,
        a: &Mover,
        b: &Mover,
    ) -> Vec2 {
        let midpoint = (a.position + b.position) * 0.5;
        let time_to_reach = if kin.max_speed > 0.0 {
            midpoint.distance(kin.position) / kin.max_speed
        } else {
            0.0
        };

        let future_a = a.position + a.velocity * time_to_reach;
        let future_b = b.position + b.velocity * time_to_reach;
        Self::arrive(
            params,
            kin,
            (future_a + future_b) * 0.5,
            Deceleration::Fast,
        )
    }

    /// Install a waypoint path and rewind the cursor.
    pub fn set_path(&mut self, path: Path) {
        self.path = Some(path);
        self.current_waypoint = 0;
    }

    /// Drop the current path.
    pub fn clear_path(&mut self) {
        self.path = None;
        self.current_waypoint = 0;
    }

    /// The installed path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    /// Seek along the installed waypoint sequence, arriving at the terminal
    /// waypoint of an open path. Zero force with no path installed.
    #[must_use]
    pub fn follow_path(&mut self, params: &SteeringParams, kin: &Kinematics) -> Vec2 {
        let Some(path) = &self.path else {
            return Vec2::ZERO;
        };
        if path.waypoints.is_empty() {
            return Vec2::ZERO;
        }
        let last = path.waypoints.len() - 1;
        self.current_waypoint = self.current_waypoint.min(last);

        let mut target = path.waypoints[self.current_waypoint];
        let seek_radius_sq = params.waypoint_seek_radius * params.waypoint_seek_radius;
        if target.distance_squared(kin.position) < seek_radius_sq {
            if self.current_waypoint >= last {
                self.current_waypoint = if path.closed { 0 } else { last };
            } else {
                self.current_waypoint += 1;
            }
            target = path.waypoints[self.current_waypoint];
        }

        if self.current_waypoint == last && !path.closed {
            Self::arrive(params, kin, target, Deceleration::Normal)
        } else {
            Self::seek(kin, target)
        }
    }
}
