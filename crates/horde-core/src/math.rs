//! Frame transforms and geometry helpers shared by the steering toolkit and
//! the outer game's ray-cast weapons.

use glam::Vec2;

/// Projects a world-space point into an agent's local frame, where `heading`
/// is the local +X axis and `side` the local +Y axis. Both basis vectors must
/// be unit length.
#[must_use]
pub fn world_to_local(point: Vec2, origin: Vec2, heading: Vec2, side: Vec2) -> Vec2 {
    let delta = point - origin;
    Vec2::new(delta.dot(heading), delta.dot(side))
}

/// Maps a local-frame vector back into world space. Inverse of
/// [`world_to_local`] for the direction part (no origin translation).
#[must_use]
pub fn local_to_world(local: Vec2, heading: Vec2, side: Vec2) -> Vec2 {
    heading * local.x + side * local.y
}

/// Distance along the ray to its nearest forward intersection with the
/// circle, or `None` when the ray misses or the circle lies entirely behind
/// the origin. `direction` need not be normalized; the returned `t` is in
/// units of `direction`'s length.
#[must_use]
pub fn ray_circle_intersection(
    origin: Vec2,
    direction: Vec2,
    center: Vec2,
    radius: f32,
) -> Option<f32> {
    let to_origin = origin - center;
    let a = direction.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * to_origin.dot(direction);
    let c = to_origin.length_squared() - radius * radius;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();

    let mut nearest = None;
    for t in [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)] {
        if t > 0.0 {
            nearest = Some(nearest.map_or(t, |best: f32| best.min(t)));
        }
    }
    nearest
}

/// Intersection point of the segments `p1→p2` and `q1→q2`, or `None` when
/// they are parallel or do not cross within both segments.
#[must_use]
pub fn segment_intersection(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> Option<Vec2> {
    let r = p2 - p1;
    let s = q2 - q1;
    let denominator = r.perp_dot(s);
    if denominator == 0.0 {
        return None;
    }
    let t = (q1 - p1).perp_dot(s) / denominator;
    let u = (q1 - p1).perp_dot(r) / denominator;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + r * t)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn local_frame_round_trip() {
        let heading = Vec2::new(0.6, 0.8);
        let side = heading.perp();
        let origin = Vec2::new(12.0, -7.5);
        let point = Vec2::new(-3.25, 41.0);

        let local = world_to_local(point, origin, heading, side);
        let back = origin + local_to_world(local, heading, side);
        assert!((back - point).length() < EPS);
    }

    #[test]
    fn world_to_local_separates_ahead_and_beside() {
        let heading = Vec2::X;
        let side = heading.perp();
        let local = world_to_local(Vec2::new(5.0, 3.0), Vec2::ZERO, heading, side);
        assert!((local.x - 5.0).abs() < EPS);
        assert!((local.y - 3.0).abs() < EPS);
    }

    #[test]
    fn ray_hits_circle_ahead() {
        let t = ray_circle_intersection(Vec2::ZERO, Vec2::X, Vec2::new(10.0, 0.0), 2.0);
        assert!((t.expect("hit") - 8.0).abs() < EPS);
    }

    #[test]
    fn ray_ignores_circle_behind() {
        let t = ray_circle_intersection(Vec2::ZERO, Vec2::X, Vec2::new(-10.0, 0.0), 2.0);
        assert!(t.is_none());
    }

    #[test]
    fn ray_from_inside_reports_exit() {
        let t = ray_circle_intersection(Vec2::ZERO, Vec2::X, Vec2::ZERO, 3.0);
        assert!((t.expect("exit") - 3.0).abs() < EPS);
    }

    #[test]
    fn ray_misses_offset_circle() {
        let t = ray_circle_intersection(Vec2::ZERO, Vec2::X, Vec2::new(10.0, 5.0), 2.0);
        assert!(t.is_none());
    }

    #[test]
    fn zero_direction_never_hits() {
        let t = ray_circle_intersection(Vec2::ZERO, Vec2::ZERO, Vec2::new(1.0, 0.0), 5.0);
        assert!(t.is_none());
    }

    #[test]
    fn crossing_segments_intersect() {
        let point = segment_intersection(
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, -1.0),
            Vec2::new(0.0, 1.0),
        );
        assert!((point.expect("crossing") - Vec2::ZERO).length() < EPS);
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        let point = segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
        );
        assert!(point.is_none());
    }

    #[test]
    fn disjoint_segments_do_not_intersect() {
        let point = segment_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(5.0, -1.0),
            Vec2::new(5.0, 1.0),
        );
        assert!(point.is_none());
    }
}
