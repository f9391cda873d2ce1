use crate::config::Config;
use crate::radar;
use crate::scheduler::Status;
use crate::snapshot::Snapshot;
use crate::tank::{Tank, TankHandle};
use crate::vm;
use crate::weapon::{self, FireEvent};
use nalgebra::{vector, Vector2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tanks an arena can tell apart in a scan word.
pub const MAX_TANKS: usize = 256;

/// An arena state that can only be reached through a host bug. The match
/// must not continue past one of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("{tank} has heat {heat} outside [0, {death_heat}]")]
    HeatOutOfRange {
        tank: TankHandle,
        heat: i32,
        death_heat: i32,
    },
    #[error("{tank} reached death heat at tick {tick} but is still alive")]
    OverheatedAlive { tank: TankHandle, tick: u32 },
    #[error("{tank} left the arena: ({x}, {y})")]
    OutOfBounds { tank: TankHandle, x: f64, y: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    SelfDestruct,
    Blast { by: TankHandle },
    Shot { by: TankHandle },
    Overheat,
    Fault,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Death {
    pub tank: TankHandle,
    pub cause: DeathCause,
    pub tick: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub tank: TankHandle,
    pub text: String,
}

/// Everything that happened during the current tick.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ArenaEvents {
    pub fires: Vec<FireEvent>,
    pub deaths: Vec<Death>,
    pub messages: Vec<Message>,
    pub errors: Vec<(TankHandle, vm::Error)>,
}

impl ArenaEvents {
    pub fn clear(&mut self) {
        self.fires.clear();
        self.deaths.clear();
        self.messages.clear();
        self.errors.clear();
    }
}

/// The authoritative state of one match. Tanks are only ever changed through
/// the actuation methods below, which the host ABI dispatches into.
pub struct Arena {
    config: Config,
    tanks: Vec<Tank>,
    tick: u32,
    events: ArenaEvents,
}

impl Arena {
    /// Fails if the config does not pass [`Config::validate`].
    pub fn new(config: Config) -> Result<Arena, vm::Error> {
        config.validate()?;
        Ok(Arena {
            config,
            tanks: Vec::new(),
            tick: 0,
            events: ArenaEvents::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn add_tank(&mut self, name: &str, position: Vector2<f64>, heading: f64) -> TankHandle {
        let handle = TankHandle(self.tanks.len() as u32);
        if self.tanks.len() >= MAX_TANKS {
            log::warn!(
                "{} does not fit the scan word's 8-bit id and aliases {}",
                handle,
                TankHandle(handle.0 & 0xff)
            );
        }
        let position = self.clamp_to_bounds(position);
        self.tanks
            .push(Tank::new(handle, name.to_string(), position, heading));
        log::debug!("added {} {:?} at {:?}", handle, name, position);
        handle
    }

    /// Handles are only meaningful for the arena that issued them. Panics on
    /// a handle this arena never returned from [`Arena::add_tank`].
    pub fn tank(&self, handle: TankHandle) -> &Tank {
        &self.tanks[handle.index()]
    }

    fn tank_mut(&mut self, handle: TankHandle) -> &mut Tank {
        &mut self.tanks[handle.index()]
    }

    pub fn tanks(&self) -> impl Iterator<Item = &Tank> {
        self.tanks.iter()
    }

    pub fn live_tanks(&self) -> impl Iterator<Item = &Tank> {
        self.tanks.iter().filter(|t| t.is_alive())
    }

    pub fn is_alive(&self, handle: TankHandle) -> bool {
        self.tank(handle).is_alive()
    }

    pub fn events(&self) -> &ArenaEvents {
        &self.events
    }

    pub fn turn(&mut self, handle: TankHandle, angle: f64) {
        if self.is_alive(handle) {
            self.tank_mut(handle).set_heading(angle);
        }
    }

    pub fn aim(&mut self, handle: TankHandle, angle: f64) {
        if self.is_alive(handle) {
            self.tank_mut(handle).set_aim(angle);
        }
    }

    /// Moves one step along the heading. Each axis stops at the arena edge on
    /// its own, so a tank heading along a wall slides along it.
    pub fn forward(&mut self, handle: TankHandle) {
        if !self.is_alive(handle) {
            return;
        }
        let (forward_heat, death_heat) = (self.config.forward_heat, self.config.death_heat);
        let velocity = self.config.tank_velocity;
        let tank = &self.tanks[handle.index()];
        let dir = vector![tank.heading.cos(), tank.heading.sin()];
        let position = self.clamp_to_bounds(tank.position + dir * velocity);
        let tank = self.tank_mut(handle);
        tank.position = position;
        tank.apply_heat(forward_heat, death_heat);
    }

    /// Fires along the aim angle. Returns `None` without any effect when the
    /// tank is too hot to shoot.
    pub fn fire(&mut self, handle: TankHandle) -> Option<FireEvent> {
        if !self.is_alive(handle) || self.tank(handle).heat >= self.config.max_fire_heat() {
            return None;
        }
        let (shoot_heat, death_heat) = (self.config.shoot_heat, self.config.death_heat);
        self.tank_mut(handle).apply_heat(shoot_heat, death_heat);

        let aim = self.tank(handle).aim;
        let target = weapon::trace(self, handle, aim);
        if let Some(target) = target {
            self.destroy(target, DeathCause::Shot { by: handle });
        }
        let event = FireEvent {
            origin: handle,
            aim,
            target,
        };
        self.events.fires.push(event.clone());
        Some(event)
    }

    /// Returns the packed scan word for the nearest other live tank in the window.
    pub fn scan(&self, handle: TankHandle, angle: f64, width: f64) -> u64 {
        match radar::scan(self, handle, angle, width) {
            Some(contact) => ranks_api::scan::encode(&contact),
            None => ranks_api::scan::NOTHING,
        }
    }

    /// Voluntary self-destruct. Other live tanks within the blast radius are
    /// destroyed too. Does nothing for a tank that is already dead.
    pub fn explode(&mut self, handle: TankHandle) {
        if !self.destroy(handle, DeathCause::SelfDestruct) {
            return;
        }
        let center = self.tank(handle).position;
        let radius = self.config.blast_radius;
        let caught: Vec<TankHandle> = self
            .live_tanks()
            .filter(|t| (t.position - center).norm() <= radius)
            .map(|t| t.handle())
            .collect();
        for other in caught {
            self.destroy(other, DeathCause::Blast { by: handle });
        }
    }

    /// Transitions a tank to dead. Returns false if it was already dead.
    pub(crate) fn destroy(&mut self, handle: TankHandle, cause: DeathCause) -> bool {
        if !self.tank_mut(handle).kill() {
            return false;
        }
        log::info!("{} destroyed at tick {}: {:?}", handle, self.tick, cause);
        self.events.deaths.push(Death {
            tank: handle,
            cause,
            tick: self.tick,
        });
        true
    }

    pub fn post_message(&mut self, handle: TankHandle, text: String) {
        log::info!("{} ({}): {}", handle, self.tank(handle).name(), text);
        self.events.messages.push(Message { tank: handle, text });
    }

    pub(crate) fn record_error(&mut self, handle: TankHandle, error: vm::Error) {
        self.events.errors.push((handle, error));
    }

    pub fn begin_tick(&mut self) {
        self.events.clear();
    }

    /// Applies overheat deaths and passive cooling, then advances the clock.
    pub fn end_tick(&mut self) -> Result<(), InvariantViolation> {
        let death_heat = self.config.death_heat;
        let overheated: Vec<TankHandle> = self
            .live_tanks()
            .filter(|t| t.heat >= death_heat)
            .map(|t| t.handle())
            .collect();
        for handle in overheated {
            self.destroy(handle, DeathCause::Overheat);
        }

        let decay = self.config.heat_decay;
        for tank in self.tanks.iter_mut().filter(|t| t.is_alive()) {
            tank.apply_heat(-decay, death_heat);
        }

        self.check_invariants()?;
        self.tick += 1;
        Ok(())
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let death_heat = self.config.death_heat;
        let h = self.config.half_extent();
        for tank in self.tanks.iter() {
            if !(0..=death_heat).contains(&tank.heat) {
                return Err(InvariantViolation::HeatOutOfRange {
                    tank: tank.handle(),
                    heat: tank.heat,
                    death_heat,
                });
            }
            if tank.is_alive() && tank.heat >= death_heat {
                return Err(InvariantViolation::OverheatedAlive {
                    tank: tank.handle(),
                    tick: self.tick,
                });
            }
            let p = tank.position;
            if !(p.x.is_finite() && p.y.is_finite() && p.x.abs() <= h && p.y.abs() <= h) {
                return Err(InvariantViolation::OutOfBounds {
                    tank: tank.handle(),
                    x: p.x,
                    y: p.y,
                });
            }
        }
        Ok(())
    }

    fn clamp_to_bounds(&self, p: Vector2<f64>) -> Vector2<f64> {
        let h = self.config.half_extent();
        vector![p.x.clamp(-h, h), p.y.clamp(-h, h)]
    }

    /// Captures the arena without guest states.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self, Status::evaluate(self))
    }

    pub fn hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::Hasher;
        let fixedpoint = |v: f64| (v * 1e9) as i64;
        let mut s = DefaultHasher::new();
        s.write_u32(self.tick);
        for tank in self.tanks.iter() {
            s.write_i64(fixedpoint(tank.position.x));
            s.write_i64(fixedpoint(tank.position.y));
            s.write_i64(fixedpoint(tank.heading));
            s.write_i64(fixedpoint(tank.aim));
            s.write_i32(tank.heat);
            s.write_u8(tank.is_alive() as u8);
        }
        s.finish()
    }
}
