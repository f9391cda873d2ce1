use crate::arena::Arena;
use crate::tank::{angle_diff, TankHandle};
use ranks_api::scan::Contact;
use std::f64::consts::PI;

/// Finds the nearest live tank other than `scanner` whose bearing lies within
/// `width` radians of `heading`. Ties go to the lower tank id.
pub fn scan(arena: &Arena, scanner: TankHandle, heading: f64, width: f64) -> Option<Contact> {
    let width = width.abs().min(PI);
    let center = arena.tank(scanner).position();
    let mut best: Option<(f64, f64, TankHandle)> = None;
    for target in arena.live_tanks() {
        if target.handle() == scanner {
            continue;
        }
        let dp = target.position() - center;
        let distance = dp.norm();
        let bearing = dp.y.atan2(dp.x);
        if angle_diff(heading, bearing).abs() > width {
            continue;
        }
        // Strict comparison keeps the first (lowest id) of equidistant tanks.
        if best.map_or(true, |(d, _, _)| distance < d) {
            best = Some((distance, bearing, target.handle()));
        }
    }
    best.map(|(distance, bearing, handle)| Contact {
        id: handle.0 as u8,
        distance,
        bearing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use approx::assert_abs_diff_eq;
    use nalgebra::vector;

    fn arena(positions: &[(f64, f64)]) -> Arena {
        let mut arena = Arena::new(Config::default()).unwrap();
        for (i, &(x, y)) in positions.iter().enumerate() {
            arena.add_tank(&format!("t{i}"), vector![x, y], 0.0);
        }
        arena
    }

    #[test]
    fn test_empty_window() {
        let arena = arena(&[(0.0, 0.0), (100.0, 0.0)]);
        assert_eq!(scan(&arena, TankHandle(0), PI, 0.5), None);
    }

    #[test]
    fn test_ignores_self() {
        let arena = arena(&[(0.0, 0.0)]);
        assert_eq!(scan(&arena, TankHandle(0), 0.0, PI), None);
    }

    #[test]
    fn test_nearest_wins() {
        let arena = arena(&[(0.0, 0.0), (200.0, 10.0), (50.0, -5.0), (-20.0, 0.0)]);
        let contact = scan(&arena, TankHandle(0), 0.0, 0.2).unwrap();
        assert_eq!(contact.id, 2);
        assert_abs_diff_eq!(contact.distance, (50.0f64 * 50.0 + 25.0).sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(contact.bearing, (-5.0f64).atan2(50.0), epsilon = 1e-9);
    }

    #[test]
    fn test_window_wraps_around_pi() {
        let arena = arena(&[(0.0, 0.0), (-100.0, -1.0)]);
        let contact = scan(&arena, TankHandle(0), PI - 0.01, 0.05).unwrap();
        assert_eq!(contact.id, 1);
    }

    #[test]
    fn test_negative_width_is_magnitude() {
        let arena = arena(&[(0.0, 0.0), (0.0, 100.0)]);
        assert!(scan(&arena, TankHandle(0), PI / 2.0, -0.1).is_some());
    }

    #[test]
    fn test_tie_goes_to_lower_id() {
        let arena = arena(&[(0.0, 0.0), (0.0, 30.0), (0.0, -30.0)]);
        let contact = scan(&arena, TankHandle(0), 0.0, PI).unwrap();
        assert_eq!(contact.id, 1);
    }
}
