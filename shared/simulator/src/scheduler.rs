use crate::arena::{Arena, DeathCause, InvariantViolation, MAX_TANKS};
use crate::config::Config;
use crate::snapshot::Snapshot;
use crate::tank::TankHandle;
use crate::vm::{self, Code, ExecState, GuestHandle, TurnOutcome};
use nalgebra::{vector, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Running,
    Victory { tank: TankHandle },
    Draw,
}

impl Status {
    /// The match is over once at most one tank is alive or the tick limit is
    /// reached.
    pub fn evaluate(arena: &Arena) -> Status {
        let mut alive = arena.live_tanks();
        match (alive.next(), alive.next()) {
            (None, _) => Status::Draw,
            (Some(winner), None) if arena.tanks().count() > 1 => Status::Victory {
                tank: winner.handle(),
            },
            _ if arena.tick() >= arena.config().max_ticks => Status::Draw,
            _ => Status::Running,
        }
    }

    pub fn is_finished(self) -> bool {
        self != Status::Running
    }
}

struct Slot {
    tank: TankHandle,
    guest: Box<dyn GuestHandle>,
}

/// Gives every live guest one turn per tick, in insertion order.
pub struct Scheduler {
    arena: Arena,
    slots: Vec<Slot>,
    status: Status,
    load_errors: Vec<(String, vm::Error)>,
}

impl Scheduler {
    pub fn new(config: Config) -> Result<Scheduler, vm::Error> {
        Ok(Scheduler {
            arena: Arena::new(config)?,
            slots: Vec::new(),
            status: Status::Running,
            load_errors: Vec::new(),
        })
    }

    /// Loads each program and spawns its tank on the spawn circle, facing the
    /// origin. Programs that fail to load get no tank, and neither do programs
    /// past the first [`MAX_TANKS`]. Only an invalid config is an error.
    pub fn with_codes(config: Config, codes: &[(String, Code)]) -> Result<Scheduler, vm::Error> {
        let mut scheduler = Scheduler::new(config)?;
        let n = codes.len().max(1) as f64;
        let radius = scheduler.arena.config().spawn_radius;
        for (i, (name, code)) in codes.iter().enumerate() {
            if scheduler.arena.tanks().count() >= MAX_TANKS {
                log::warn!("Arena is full, {:?} gets no tank", name);
                scheduler
                    .load_errors
                    .push((name.clone(), vm::Error::new("arena is full")));
                continue;
            }
            let angle = TAU * i as f64 / n;
            let position = vector![radius * angle.cos(), radius * angle.sin()];
            let heading = angle + PI;
            match vm::load(code, scheduler.arena.config()) {
                Ok(guest) => {
                    scheduler.add_guest(name, guest, position, heading);
                }
                Err(e) => {
                    log::warn!("Loading {:?} failed: {}", name, e);
                    scheduler.load_errors.push((name.clone(), e));
                }
            }
        }
        log::info!(
            "match starting with {} tanks",
            scheduler.arena.tanks().count()
        );
        Ok(scheduler)
    }

    pub fn add_guest(
        &mut self,
        name: &str,
        guest: Box<dyn GuestHandle>,
        position: Vector2<f64>,
        heading: f64,
    ) -> TankHandle {
        let tank = self.arena.add_tank(name, position, heading);
        self.slots.push(Slot { tank, guest });
        tank
    }

    pub fn run_tick(&mut self) -> Result<(), InvariantViolation> {
        if self.status.is_finished() {
            return Ok(());
        }
        self.arena.begin_tick();

        for slot in self.slots.iter_mut() {
            if !self.arena.is_alive(slot.tank) || slot.guest.state() == ExecState::Terminated {
                continue;
            }
            match slot.guest.resume(&mut self.arena, slot.tank) {
                TurnOutcome::Yielded => {}
                TurnOutcome::Destroyed => slot.guest.terminate(),
                TurnOutcome::Faulted(e) => {
                    log::warn!("{} faulted: {}", slot.tank, e);
                    self.arena.record_error(slot.tank, e);
                    self.arena.destroy(slot.tank, DeathCause::Fault);
                    slot.guest.terminate();
                }
            }
        }

        self.arena.end_tick()?;

        // Tanks shot or caught in a blast after their own turn.
        for slot in self.slots.iter_mut() {
            if !self.arena.is_alive(slot.tank) && slot.guest.state() != ExecState::Terminated {
                slot.guest.terminate();
            }
        }

        self.status = Status::evaluate(&self.arena);
        if let Status::Victory { tank } = self.status {
            log::info!(
                "{} ({}) wins at tick {}",
                tank,
                self.arena.tank(tank).name(),
                self.arena.tick()
            );
        } else if self.status == Status::Draw {
            log::info!("draw at tick {}", self.arena.tick());
        }
        Ok(())
    }

    /// Runs ticks until the match is decided.
    pub fn run(&mut self) -> Result<Status, InvariantViolation> {
        while !self.status.is_finished() {
            self.run_tick()?;
        }
        Ok(self.status)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn tick(&self) -> u32 {
        self.arena.tick()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn hash(&self) -> u64 {
        self.arena.hash()
    }

    pub fn load_errors(&self) -> &[(String, vm::Error)] {
        &self.load_errors
    }

    pub fn guest_state(&self, tank: TankHandle) -> Option<ExecState> {
        self.slots
            .iter()
            .find(|slot| slot.tank == tank)
            .map(|slot| slot.guest.state())
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::capture(&self.arena, self.status);
        for tank in snapshot.tanks.iter_mut() {
            tank.guest = self.guest_state(tank.id);
        }
        snapshot
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.guest.terminate();
        }
    }
}
