use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Identifies a tank within one arena. Handles are allocated in insertion
/// order and double as the tank's id in scan results.
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Serialize, Deserialize)]
pub struct TankHandle(pub u32);

impl TankHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TankHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tank {}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TankState {
    Alive,
    Dead,
}

#[derive(Clone, Debug)]
pub struct Tank {
    handle: TankHandle,
    name: String,
    pub(crate) position: Vector2<f64>,
    pub(crate) heading: f64,
    pub(crate) aim: f64,
    pub(crate) heat: i32,
    state: TankState,
}

impl Tank {
    pub(crate) fn new(handle: TankHandle, name: String, position: Vector2<f64>, heading: f64) -> Tank {
        Tank {
            handle,
            name,
            position,
            heading: normalize_angle(heading),
            aim: normalize_angle(heading),
            heat: 0,
            state: TankState::Alive,
        }
    }

    pub fn handle(&self) -> TankHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vector2<f64> {
        self.position
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn aim(&self) -> f64 {
        self.aim
    }

    pub fn heat(&self) -> i32 {
        self.heat
    }

    pub fn state(&self) -> TankState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == TankState::Alive
    }

    pub(crate) fn set_heading(&mut self, angle: f64) {
        self.heading = normalize_angle(angle);
    }

    pub(crate) fn set_aim(&mut self, angle: f64) {
        self.aim = normalize_angle(angle);
    }

    /// Adds (or removes, for negative `delta`) heat, keeping it within `[0, death_heat]`.
    pub(crate) fn apply_heat(&mut self, delta: i32, death_heat: i32) {
        self.heat = self.heat.saturating_add(delta).clamp(0, death_heat);
    }

    /// Returns false if the tank was already dead.
    pub(crate) fn kill(&mut self) -> bool {
        let was_alive = self.is_alive();
        self.state = TankState::Dead;
        was_alive
    }
}

/// Maps any finite angle into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let c = angle.rem_euclid(TAU);
    if c > PI {
        c - TAU
    } else {
        c
    }
}

/// Returns the smallest rotation from `a` to `b`.
///
/// A positive result is a counter-clockwise rotation and negative is clockwise.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let c = (b - a).rem_euclid(TAU);
    if c > PI {
        c - TAU
    } else {
        c
    }
}
