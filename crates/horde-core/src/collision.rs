//! Circle collision tests, positional correction, and the leader-biased
//! agent-agent separation rule applied after integration.

use glam::Vec2;
use rand::RngCore;
use std::f32::consts::TAU;

/// Squared-distance overlap test for two circles.
#[must_use]
pub fn circles_overlap(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> bool {
    let radius_sum = radius_a + radius_b;
    a.distance_squared(b) < radius_sum * radius_sum
}

/// Pushes `position` fully out of the circle at `other`. Coincident centers
/// resolve along +X. Used against static obstacles, which never move.
pub fn resolve_circle_overlap(position: &mut Vec2, radius: f32, other: Vec2, other_radius: f32) {
    let mut delta = *position - other;
    let mut dist_sq = delta.length_squared();
    let min_dist = radius + other_radius;

    if dist_sq == 0.0 {
        delta = Vec2::X;
        dist_sq = 1.0;
    }

    if dist_sq < min_dist * min_dist {
        let dist = dist_sq.sqrt();
        let overlap = min_dist - dist;
        *position += (delta / dist) * overlap;
    }
}

/// Keeps a circle inside the arena rectangle `[0, width] × [0, height]`.
pub fn clamp_to_bounds(position: &mut Vec2, radius: f32, width: f32, height: f32) {
    if position.x - radius < 0.0 {
        position.x = radius;
    } else if position.x + radius > width {
        position.x = width - radius;
    }
    if position.y - radius < 0.0 {
        position.y = radius;
    } else if position.y + radius > height {
        position.y = height - radius;
    }
}

/// Displacements separating an overlapping agent pair, or `None` when the
/// pair does not overlap.
///
/// Leaders are never displaced by non-leaders: the non-leader absorbs the
/// full overlap. When both or neither lead, the overlap splits evenly.
/// Coincident centers separate along a uniformly random axis.
#[must_use]
pub fn separate_pair(
    a: Vec2,
    radius_a: f32,
    a_is_leader: bool,
    b: Vec2,
    radius_b: f32,
    b_is_leader: bool,
    rng: &mut dyn RngCore,
) -> Option<(Vec2, Vec2)> {
    use rand::Rng;

    let min_dist = radius_a + radius_b;
    let delta = b - a;
    let dist_sq = delta.length_squared();
    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    let axis = if dist > 0.0 {
        delta / dist
    } else {
        Vec2::from_angle(rng.random_range(0.0..TAU))
    };
    let overlap = min_dist - dist;

    match (a_is_leader, b_is_leader) {
        (true, false) => Some((Vec2::ZERO, axis * overlap)),
        (false, true) => Some((-axis * overlap, Vec2::ZERO)),
        _ => {
            let half = axis * (overlap * 0.5);
            Some((-half, half))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    const EPS: f32 = 1e-3;

    #[test]
    fn overlap_test_uses_radius_sum() {
        assert!(circles_overlap(Vec2::ZERO, 5.0, Vec2::new(9.0, 0.0), 5.0));
        assert!(!circles_overlap(Vec2::ZERO, 5.0, Vec2::new(10.0, 0.0), 5.0));
    }

    #[test]
    fn resolve_pushes_fully_out() {
        let mut position = Vec2::new(8.0, 0.0);
        resolve_circle_overlap(&mut position, 5.0, Vec2::ZERO, 5.0);
        assert!((position.x - 10.0).abs() < EPS);
        assert_eq!(position.y, 0.0);
    }

    #[test]
    fn resolve_leaves_separated_circles_alone() {
        let mut position = Vec2::new(20.0, 0.0);
        resolve_circle_overlap(&mut position, 5.0, Vec2::ZERO, 5.0);
        assert_eq!(position, Vec2::new(20.0, 0.0));
    }

    #[test]
    fn resolve_handles_coincident_centers() {
        let mut position = Vec2::new(3.0, 4.0);
        resolve_circle_overlap(&mut position, 2.0, Vec2::new(3.0, 4.0), 2.0);
        assert!((position.distance(Vec2::new(3.0, 4.0)) - 4.0).abs() < EPS);
    }

    #[test]
    fn clamp_snaps_to_arena_edge() {
        let mut position = Vec2::new(-5.0, 50.0);
        clamp_to_bounds(&mut position, 10.0, 500.0, 500.0);
        assert_eq!(position.x, 10.0);
        assert_eq!(position.y, 50.0);

        let mut position = Vec2::new(495.0, 498.0);
        clamp_to_bounds(&mut position, 10.0, 500.0, 500.0);
        assert_eq!(position, Vec2::new(490.0, 490.0));
    }

    #[test]
    fn leader_is_never_displaced() {
        let mut rng = SmallRng::seed_from_u64(1);
        let a = Vec2::ZERO;
        let b = Vec2::new(15.0, 0.0);
        let (da, db) =
            separate_pair(a, 10.0, true, b, 10.0, false, &mut rng).expect("overlapping");
        assert_eq!(da, Vec2::ZERO);
        let resolved = b + db;
        assert!((resolved.distance(a) - 20.0).abs() < EPS);
    }

    #[test]
    fn peers_split_overlap_evenly() {
        let mut rng = SmallRng::seed_from_u64(1);
        let a = Vec2::ZERO;
        let b = Vec2::new(15.0, 0.0);
        let (da, db) =
            separate_pair(a, 10.0, false, b, 10.0, false, &mut rng).expect("overlapping");
        assert!((da.length() - 2.5).abs() < EPS);
        assert!((db.length() - 2.5).abs() < EPS);
        assert!(((b + db).distance(a + da) - 20.0).abs() < EPS);
    }

    #[test]
    fn coincident_pair_separates_along_random_axis() {
        let mut rng = SmallRng::seed_from_u64(9);
        let a = Vec2::new(4.0, 4.0);
        let (da, db) =
            separate_pair(a, 6.0, false, a, 6.0, false, &mut rng).expect("overlapping");
        assert!(((a + db).distance(a + da) - 12.0).abs() < EPS);
    }

    #[test]
    fn disjoint_pair_yields_no_correction() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(
            separate_pair(
                Vec2::ZERO,
                5.0,
                false,
                Vec2::new(50.0, 0.0),
                5.0,
                false,
                &mut rng
            )
            .is_none()
        );
    }
}
