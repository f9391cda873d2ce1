use crate::arena::Arena;
use crate::tank::TankHandle;
use nalgebra::vector;
use serde::{Deserialize, Serialize};

/// A resolved shot. Shots are hit-scan: they exist only for the tick they
/// were fired in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FireEvent {
    pub origin: TankHandle,
    pub aim: f64,
    pub target: Option<TankHandle>,
}

/// Casts a ray from `shooter` along `aim` and returns the first other live
/// tank whose hit circle it enters within weapon range.
pub fn trace(arena: &Arena, shooter: TankHandle, aim: f64) -> Option<TankHandle> {
    let config = arena.config();
    let (radius, range) = (config.hit_radius, config.weapon_range);
    let origin = arena.tank(shooter).position();
    let dir = vector![aim.cos(), aim.sin()];

    let mut best: Option<(f64, TankHandle)> = None;
    for target in arena.live_tanks() {
        if target.handle() == shooter {
            continue;
        }
        let dp = target.position() - origin;
        let along = dp.dot(&dir);
        let perp_sq = dp.norm_squared() - along * along;
        if perp_sq > radius * radius {
            continue;
        }
        let half_chord = (radius * radius - perp_sq).max(0.0).sqrt();
        if along + half_chord < 0.0 {
            // Circle is entirely behind the muzzle.
            continue;
        }
        let entry = (along - half_chord).max(0.0);
        if entry > range {
            continue;
        }
        if best.map_or(true, |(d, _)| entry < d) {
            best = Some((entry, target.handle()));
        }
    }
    best.map(|(_, handle)| handle)
}
