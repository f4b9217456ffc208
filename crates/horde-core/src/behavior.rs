//! Steering orchestration: selects and blends toolkit behaviors per tick
//! based on agent state and pack role.
//!
//! Explore mode dithers: each behavior in a fixed priority order rolls an
//! independent Bernoulli gate, and surviving contributions accumulate under
//! the agent's remaining `max_force` budget (the final sum is always
//! magnitude-capped). Attack mode is deterministic and role-conditioned.

use crate::arena::ArenaMap;
use crate::steering::{Kinematics, Mover, SteeringBehaviors, SteeringParams};
use crate::HordeConfig;
use glam::Vec2;
use rand::{Rng, RngCore};

/// Shared read-only inputs for one agent's force computation.
#[derive(Debug, Clone, Copy)]
pub struct BehaviorContext<'a> {
    pub config: &'a HordeConfig,
    pub params: SteeringParams,
    pub map: &'a ArenaMap,
    pub player: Option<Mover>,
    pub neighbor_positions: &'a [Vec2],
    pub neighbor_headings: &'a [Vec2],
}

/// Add `force` to `total` without letting the running magnitude exceed
/// `max_force`; an overflowing contribution is truncated to the remaining
/// budget. Returns false once the budget is spent.
pub fn accumulate_force(total: &mut Vec2, max_force: f32, force: Vec2) -> bool {
    let magnitude_so_far = total.length();
    let remaining = max_force - magnitude_so_far;
    if remaining <= 0.0 {
        return false;
    }

    if force.length() < remaining {
        *total += force;
    } else {
        *total += force.normalize_or_zero() * remaining;
    }
    true
}

/// Explore-mode force: hide, separation, wall avoidance, obstacle avoidance,
/// alignment, cohesion, and wander, each probability-gated. Hide is
/// suppressed and wander amplified while the agent peeks.
pub fn explore_force(
    ctx: &BehaviorContext<'_>,
    kin: &Kinematics,
    steering: &mut SteeringBehaviors,
    peeking: bool,
    dt: f32,
    rng: &mut dyn RngCore,
) -> Vec2 {
    let config = ctx.config;
    let mut total = Vec2::ZERO;

    if !peeking {
        if let Some(player) = &ctx.player {
            if rng.random_bool(config.prob_hide) {
                let force = SteeringBehaviors::hide(&ctx.params, kin, player, &ctx.map.obstacles)
                    * config.weight_hide;
                if !accumulate_force(&mut total, kin.max_force, force) {
                    return total;
                }
            }
        }
    }

    if !ctx.neighbor_positions.is_empty() && rng.random_bool(config.prob_separation) {
        let force = SteeringBehaviors::separation(kin, ctx.neighbor_positions)
            * config.weight_separation;
        if !accumulate_force(&mut total, kin.max_force, force) {
            return total;
        }
    }

    if rng.random_bool(config.prob_wall_avoidance) {
        let force = steering.wall_avoidance(&ctx.params, kin, &ctx.map.walls)
            * config.weight_wall_avoidance;
        if !accumulate_force(&mut total, kin.max_force, force) {
            return total;
        }
    }

    if rng.random_bool(config.prob_obstacle_avoidance) {
        let force = SteeringBehaviors::obstacle_avoidance(&ctx.params, kin, &ctx.map.obstacles)
            * config.weight_obstacle_avoidance;
        if !accumulate_force(&mut total, kin.max_force, force) {
            return total;
        }
    }

    if !ctx.neighbor_headings.is_empty() && rng.random_bool(config.prob_alignment) {
        let force =
            SteeringBehaviors::alignment(kin, ctx.neighbor_headings) * config.weight_alignment;
        if !accumulate_force(&mut total, kin.max_force, force) {
            return total;
        }
    }

    if !ctx.neighbor_positions.is_empty() && rng.random_bool(config.prob_cohesion) {
        let force =
            SteeringBehaviors::cohesion(kin, ctx.neighbor_positions) * config.weight_cohesion;
        if !accumulate_force(&mut total, kin.max_force, force) {
            return total;
        }
    }

    if rng.random_bool(config.prob_wander) {
        let boost = if peeking { config.peek_wander_boost } else { 1.0 };
        let force = steering.wander(&ctx.params, kin, dt, rng) * (config.weight_wander * boost);
        accumulate_force(&mut total, kin.max_force, force);
    }

    total
}

/// Attack-mode force for the pack leader: chase the player, dodge terrain.
/// With no player in view only the avoidance terms act.
pub fn attack_leader_force(
    ctx: &BehaviorContext<'_>,
    kin: &Kinematics,
    steering: &mut SteeringBehaviors,
) -> Vec2 {
    let config = ctx.config;
    let mut total = Vec2::ZERO;

    if let Some(player) = &ctx.player {
        let force = SteeringBehaviors::pursuit(kin, player) * config.attack_weight_pursuit;
        if !accumulate_force(&mut total, kin.max_force, force) {
            return total;
        }
    }

    let force = SteeringBehaviors::obstacle_avoidance(&ctx.params, kin, &ctx.map.obstacles)
        * config.attack_weight_obstacle_avoidance;
    if !accumulate_force(&mut total, kin.max_force, force) {
        return total;
    }

    let force = steering.wall_avoidance(&ctx.params, kin, &ctx.map.walls)
        * config.attack_weight_wall_avoidance;
    accumulate_force(&mut total, kin.max_force, force);

    total
}

/// Attack-mode force for a follower: hold the leader-local offset, keep
/// flock spacing, dodge terrain.
pub fn attack_follower_force(
    ctx: &BehaviorContext<'_>,
    kin: &Kinematics,
    steering: &mut SteeringBehaviors,
    leader: &Mover,
    offset: Vec2,
) -> Vec2 {
    let config = ctx.config;
    let mut total = Vec2::ZERO;

    let force = SteeringBehaviors::offset_pursuit(&ctx.params, kin, leader, offset)
        * config.attack_weight_offset;
    if !accumulate_force(&mut total, kin.max_force, force) {
        return total;
    }

    if !ctx.neighbor_positions.is_empty() {
        let force = SteeringBehaviors::separation(kin, ctx.neighbor_positions)
            * config.attack_weight_separation;
        if !accumulate_force(&mut total, kin.max_force, force) {
            return total;
        }
    }

    if !ctx.neighbor_headings.is_empty() {
        let force = SteeringBehaviors::alignment(kin, ctx.neighbor_headings)
            * config.attack_weight_alignment;
        if !accumulate_force(&mut total, kin.max_force, force) {
            return total;
        }
    }

    if !ctx.neighbor_positions.is_empty() {
        let force = SteeringBehaviors::cohesion(kin, ctx.neighbor_positions)
            * config.attack_weight_cohesion;
        if !accumulate_force(&mut total, kin.max_force, force) {
            return total;
        }
    }

    let force = SteeringBehaviors::obstacle_avoidance(&ctx.params, kin, &ctx.map.obstacles)
        * config.attack_weight_obstacle_avoidance;
    if !accumulate_force(&mut total, kin.max_force, force) {
        return total;
    }

    let force = steering.wall_avoidance(&ctx.params, kin, &ctx.map.walls)
        * config.attack_weight_wall_avoidance;
    accumulate_force(&mut total, kin.max_force, force);

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    const EPS: f32 = 1e-3;

    fn kinematics() -> Kinematics {
        Kinematics {
            position: Vec2::new(400.0, 300.0),
            velocity: Vec2::new(10.0, 0.0),
            heading: Vec2::X,
            side: Vec2::X.perp(),
            radius: 20.0,
            max_speed: 150.0,
            max_force: 300.0,
        }
    }

    fn context<'a>(config: &'a HordeConfig, map: &'a ArenaMap) -> BehaviorContext<'a> {
        BehaviorContext {
            config,
            params: SteeringParams::from(config),
            map,
            player: None,
            neighbor_positions: &[],
            neighbor_headings: &[],
        }
    }

    #[test]
    fn accumulate_respects_budget() {
        let mut total = Vec2::ZERO;
        assert!(accumulate_force(&mut total, 100.0, Vec2::new(80.0, 0.0)));
        // Second contribution is truncated to the remaining 20.
        assert!(accumulate_force(&mut total, 100.0, Vec2::new(500.0, 0.0)));
        assert!((total.length() - 100.0).abs() < EPS);
        // Budget spent: further contributions are refused.
        assert!(!accumulate_force(&mut total, 100.0, Vec2::new(1.0, 0.0)));
    }

    #[test]
    fn explore_force_is_deterministic_under_a_seed() {
        let config = HordeConfig::default();
        let map = ArenaMap::bounded(800.0, 600.0);
        let ctx = context(&config, &map);
        let kin = kinematics();

        let mut steering_a = SteeringBehaviors::new(config.wander_radius);
        let mut steering_b = SteeringBehaviors::new(config.wander_radius);
        let mut rng_a = SmallRng::seed_from_u64(77);
        let mut rng_b = SmallRng::seed_from_u64(77);

        for _ in 0..32 {
            let fa = explore_force(&ctx, &kin, &mut steering_a, false, 0.016, &mut rng_a);
            let fb = explore_force(&ctx, &kin, &mut steering_b, false, 0.016, &mut rng_b);
            assert_eq!(fa, fb);
        }
    }

    #[test]
    fn explore_force_never_exceeds_max_force() {
        let config = HordeConfig {
            weight_separation: 1e9,
            weight_wander: 1e6,
            ..HordeConfig::default()
        };
        let map = ArenaMap::bounded(800.0, 600.0);
        let neighbor_positions = [Vec2::new(401.0, 300.0), Vec2::new(399.5, 300.2)];
        let neighbor_headings = [Vec2::X, Vec2::Y];
        let ctx = BehaviorContext {
            neighbor_positions: &neighbor_positions,
            neighbor_headings: &neighbor_headings,
            ..context(&config, &map)
        };
        let kin = kinematics();
        let mut steering = SteeringBehaviors::new(config.wander_radius);
        let mut rng = SmallRng::seed_from_u64(13);

        for _ in 0..64 {
            let force = explore_force(&ctx, &kin, &mut steering, false, 0.016, &mut rng);
            assert!(force.length() <= kin.max_force + EPS);
        }
    }

    #[test]
    fn peeking_suppresses_hide() {
        // Only the hide gate is open; a peeking agent must produce no force.
        let config = HordeConfig {
            prob_hide: 1.0,
            prob_separation: 0.0,
            prob_wall_avoidance: 0.0,
            prob_obstacle_avoidance: 0.0,
            prob_alignment: 0.0,
            prob_cohesion: 0.0,
            prob_wander: 0.0,
            ..HordeConfig::default()
        };
        let map = ArenaMap::bounded(800.0, 600.0);
        let player = Mover {
            position: Vec2::new(100.0, 100.0),
            velocity: Vec2::ZERO,
            heading: Vec2::X,
            side: Vec2::Y,
        };
        let ctx = BehaviorContext {
            player: Some(player),
            ..context(&config, &map)
        };
        let kin = kinematics();
        let mut steering = SteeringBehaviors::new(config.wander_radius);
        let mut rng = SmallRng::seed_from_u64(21);

        let hidden = explore_force(&ctx, &kin, &mut steering, false, 0.016, &mut rng);
        assert!(hidden.length() > 0.0);
        let peeking = explore_force(&ctx, &kin, &mut steering, true, 0.016, &mut rng);
        assert_eq!(peeking, Vec2::ZERO);
    }

    #[test]
    fn peeking_amplifies_wander() {
        // Wander is the only open gate and the player is absent, so both
        // runs consume identical RNG draws.
        let config = HordeConfig {
            prob_hide: 0.0,
            prob_separation: 0.0,
            prob_wall_avoidance: 0.0,
            prob_obstacle_avoidance: 0.0,
            prob_alignment: 0.0,
            prob_cohesion: 0.0,
            prob_wander: 1.0,
            ..HordeConfig::default()
        };
        let map = ArenaMap::new(800.0, 600.0);
        let ctx = context(&config, &map);
        let kin = kinematics();

        let mut steering_idle = SteeringBehaviors::new(config.wander_radius);
        let mut steering_peek = SteeringBehaviors::new(config.wander_radius);
        let mut rng_idle = SmallRng::seed_from_u64(5);
        let mut rng_peek = SmallRng::seed_from_u64(5);

        let idle = explore_force(&ctx, &kin, &mut steering_idle, false, 0.016, &mut rng_idle);
        let peek = explore_force(&ctx, &kin, &mut steering_peek, true, 0.016, &mut rng_peek);
        assert!((peek - idle * config.peek_wander_boost).length() < EPS);
    }

    #[test]
    fn leader_without_player_only_avoids() {
        let config = HordeConfig::default();
        let map = ArenaMap::new(800.0, 600.0);
        let ctx = context(&config, &map);
        let kin = kinematics();
        let mut steering = SteeringBehaviors::new(config.wander_radius);

        let force = attack_leader_force(&ctx, &kin, &mut steering);
        assert_eq!(force, Vec2::ZERO);
    }

    #[test]
    fn leader_pursues_the_player() {
        let config = HordeConfig::default();
        let map = ArenaMap::new(800.0, 600.0);
        let player = Mover {
            position: Vec2::new(700.0, 300.0),
            velocity: Vec2::ZERO,
            heading: Vec2::X,
            side: Vec2::Y,
        };
        let ctx = BehaviorContext {
            player: Some(player),
            ..context(&config, &map)
        };
        let kin = kinematics();
        let mut steering = SteeringBehaviors::new(config.wander_radius);

        let force = attack_leader_force(&ctx, &kin, &mut steering);
        assert!(force.x > 0.0, "leader should chase the player to +X");
    }

    #[test]
    fn follower_at_station_feels_no_force() {
        let config = HordeConfig::default();
        let map = ArenaMap::new(800.0, 600.0);
        let ctx = context(&config, &map);
        let leader = Mover {
            position: Vec2::new(440.0, 300.0),
            velocity: Vec2::ZERO,
            heading: Vec2::X,
            side: Vec2::X.perp(),
        };
        // Sitting exactly on the offset slot, not moving.
        let mut kin = kinematics();
        kin.position = Vec2::new(400.0, 300.0);
        kin.velocity = Vec2::ZERO;
        let mut steering = SteeringBehaviors::new(config.wander_radius);

        let force = attack_follower_force(
            &ctx,
            &kin,
            &mut steering,
            &leader,
            Vec2::new(-40.0, 0.0),
        );
        assert!(force.length() < EPS);
    }
}
