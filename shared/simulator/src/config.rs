use crate::vm::Error;
use serde::{Deserialize, Serialize};

/// Match constants. Fixed for the lifetime of a match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Heat at which a tank is destroyed.
    pub death_heat: i32,
    /// Heat added by each accepted shot.
    pub shoot_heat: i32,
    /// Heat removed from every live tank at the end of each tick.
    pub heat_decay: i32,
    /// Heat added by each step forward.
    pub forward_heat: i32,
    /// Distance covered by one step forward.
    pub tank_velocity: f64,
    /// Side length of the square arena centered on the origin.
    pub world_size: f64,
    /// Tanks start evenly spaced on a circle of this radius.
    pub spawn_radius: f64,
    pub hit_radius: f64,
    pub weapon_range: f64,
    /// Radius destroyed by a voluntary self-destruct.
    pub blast_radius: f64,
    /// Metered wasm instructions allowed between two yields.
    pub gas_per_turn: u32,
    /// Host calls a builtin program may make between two yields.
    pub calls_per_turn: u32,
    pub max_ticks: u32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            death_heat: 300,
            shoot_heat: 26,
            heat_decay: 2,
            forward_heat: 0,
            tank_velocity: 1.0,
            world_size: 1000.0,
            spawn_radius: 375.0,
            hit_radius: 10.0,
            weapon_range: 400.0,
            blast_radius: 50.0,
            gas_per_turn: 1_000_000,
            calls_per_turn: 100_000,
            max_ticks: 100_000,
        }
    }
}

impl Config {
    pub fn half_extent(&self) -> f64 {
        self.world_size * 0.5
    }

    /// Shots are accepted only while heat is below this value.
    pub fn max_fire_heat(&self) -> i32 {
        self.death_heat - self.shoot_heat
    }

    pub fn validate(&self) -> Result<(), Error> {
        let geometry = [
            ("tank_velocity", self.tank_velocity),
            ("world_size", self.world_size),
            ("hit_radius", self.hit_radius),
            ("weapon_range", self.weapon_range),
        ];
        for (name, value) in geometry {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::new(format!("{name} must be positive, got {value}")));
            }
        }
        for (name, value) in [
            ("spawn_radius", self.spawn_radius),
            ("blast_radius", self.blast_radius),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::new(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        if self.death_heat <= 0 {
            return Err(Error::new("death_heat must be positive"));
        }
        if self.shoot_heat < 0 || self.heat_decay < 0 || self.forward_heat < 0 {
            return Err(Error::new("heat rates must not be negative"));
        }
        if self.shoot_heat >= self.death_heat {
            return Err(Error::new("shoot_heat must be below death_heat"));
        }
        if self.gas_per_turn == 0 || self.gas_per_turn > i32::MAX as u32 {
            return Err(Error::new(format!(
                "gas_per_turn must be in 1..={}",
                i32::MAX
            )));
        }
        if self.calls_per_turn == 0 {
            return Err(Error::new("calls_per_turn must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        Config::default().validate().unwrap();
        assert_eq!(Config::default().max_fire_heat(), 274);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let config = Config {
            world_size: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = Config {
            blast_radius: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unusable_weapon() {
        let config = Config {
            shoot_heat: 300,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
