//! Tank programs compiled into the host.
//!
//! A native program has no stack to park in `yield`, so it is written as a
//! state machine: [`Program::run_turn`] is one turn and returning from it is
//! the yield.
use super::bridge::{self, HostCall, Reply};
use super::{Error, ExecState, GuestHandle, TurnOutcome};
use crate::arena::Arena;
use crate::tank::TankHandle;
use ranks_api::scan::{self, Contact};

pub trait Program {
    fn run_turn(&mut self, api: &mut TankApi) -> Result<(), Error>;
}

/// Host calls available to a native program during one turn.
pub struct TankApi<'a> {
    arena: &'a mut Arena,
    tank: TankHandle,
    calls_left: u32,
}

impl<'a> TankApi<'a> {
    pub fn new(arena: &'a mut Arena, tank: TankHandle, calls_per_turn: u32) -> TankApi<'a> {
        TankApi {
            arena,
            tank,
            calls_left: calls_per_turn,
        }
    }

    fn call(&mut self, call: HostCall) -> Result<Reply, Error> {
        if self.calls_left == 0 {
            return Err(Error::new("exceeded host call budget"));
        }
        self.calls_left -= 1;
        bridge::dispatch(self.arena, self.tank, call)
    }

    pub fn scan(&mut self, angle: f32, width: f32) -> Result<Option<Contact>, Error> {
        let word = self.call(HostCall::Scan { angle, width })?.as_u64()?;
        Ok(scan::decode(word))
    }

    pub fn fire(&mut self) -> Result<(), Error> {
        self.call(HostCall::Fire).map(|_| ())
    }

    pub fn aim(&mut self, angle: f32) -> Result<(), Error> {
        self.call(HostCall::Aim(angle)).map(|_| ())
    }

    pub fn turn(&mut self, angle: f32) -> Result<(), Error> {
        self.call(HostCall::Turn(angle)).map(|_| ())
    }

    pub fn gpsx(&mut self) -> Result<f32, Error> {
        self.call(HostCall::GpsX)?.as_f32()
    }

    pub fn gpsy(&mut self) -> Result<f32, Error> {
        self.call(HostCall::GpsY)?.as_f32()
    }

    pub fn forward(&mut self) -> Result<(), Error> {
        self.call(HostCall::Forward).map(|_| ())
    }

    pub fn explode(&mut self) -> Result<(), Error> {
        self.call(HostCall::Explode).map(|_| ())
    }

    pub fn temp(&mut self) -> Result<i32, Error> {
        self.call(HostCall::Temp)?.as_i32()
    }

    pub fn post_string(&mut self, text: &str) -> Result<(), Error> {
        self.call(HostCall::PostString(text.to_string())).map(|_| ())
    }

    pub fn post_float(&mut self, value: f32) -> Result<(), Error> {
        self.call(HostCall::PostFloat(value)).map(|_| ())
    }

    pub fn death_heat(&self) -> i32 {
        self.arena.config().death_heat
    }

    pub fn shoot_heat(&self) -> i32 {
        self.arena.config().shoot_heat
    }

    pub fn tank_velocity(&self) -> f32 {
        self.arena.config().tank_velocity as f32
    }

    pub fn can_fire(&mut self) -> Result<bool, Error> {
        Ok(self.temp()? < self.death_heat() - self.shoot_heat())
    }
}

/// Drives a [`Program`] as a guest.
pub struct NativeGuest {
    program: Box<dyn Program>,
    calls_per_turn: u32,
    state: ExecState,
}

impl NativeGuest {
    pub fn new(program: Box<dyn Program>, calls_per_turn: u32) -> NativeGuest {
        NativeGuest {
            program,
            calls_per_turn,
            state: ExecState::Ready,
        }
    }
}

impl GuestHandle for NativeGuest {
    fn state(&self) -> ExecState {
        self.state
    }

    fn resume(&mut self, arena: &mut Arena, tank: TankHandle) -> TurnOutcome {
        if self.state == ExecState::Terminated {
            return TurnOutcome::Faulted(Error::terminated());
        }
        self.state = ExecState::Running;
        let mut api = TankApi::new(arena, tank, self.calls_per_turn);
        let result = self.program.run_turn(&mut api);
        self.state = ExecState::Suspended;
        if !arena.is_alive(tank) {
            return TurnOutcome::Destroyed;
        }
        match result {
            Ok(()) => TurnOutcome::Yielded,
            Err(e) => TurnOutcome::Faulted(e),
        }
    }

    fn terminate(&mut self) {
        self.state = ExecState::Terminated;
    }
}

/// Names accepted by [`load`].
pub const BUILTINS: &[&str] = &["idle", "square", "turret", "kamikaze"];

pub fn load(name: &str) -> Result<Box<dyn Program>, Error> {
    match name {
        "idle" => Ok(Box::new(Idle)),
        "square" => Ok(Box::new(Square::default())),
        "turret" => Ok(Box::new(Turret::default())),
        "kamikaze" => Ok(Box::new(Kamikaze::default())),
        _ => Err(Error::new(format!("Unknown builtin program {name:?}"))),
    }
}

/// Yields forever.
pub struct Idle;

impl Program for Idle {
    fn run_turn(&mut self, _api: &mut TankApi) -> Result<(), Error> {
        Ok(())
    }
}

const SQUARE_CORNERS: [(f32, f32); 4] = [(100.0, 0.0), (100.0, 100.0), (0.0, 100.0), (0.0, 0.0)];

/// Drives around a square, shooting at the origin whenever cool enough.
#[derive(Default)]
pub struct Square {
    greeted: bool,
    corner: usize,
}

impl Program for Square {
    fn run_turn(&mut self, api: &mut TankApi) -> Result<(), Error> {
        if !self.greeted {
            api.post_string("greetings from a tank!")?;
            self.greeted = true;
        }
        let (x, y) = (api.gpsx()?, api.gpsy()?);
        let (dx, dy) = SQUARE_CORNERS[self.corner];
        if (dx - x).hypot(dy - y) <= api.tank_velocity() {
            self.corner = (self.corner + 1) % SQUARE_CORNERS.len();
            let (nx, ny) = SQUARE_CORNERS[self.corner];
            api.post_string("navigating to (x, y):")?;
            api.post_float(nx)?;
            api.post_float(ny)?;
        }
        let (dx, dy) = SQUARE_CORNERS[self.corner];
        api.turn((dy - y).atan2(dx - x))?;
        api.forward()?;
        if api.can_fire()? {
            let (x, y) = (api.gpsx()?, api.gpsy()?);
            api.aim((-y).atan2(-x))?;
            api.fire()?;
        }
        Ok(())
    }
}

/// Stays put and sweeps its radar, firing at the first contact.
#[derive(Default)]
pub struct Turret {
    sweep: f32,
}

impl Turret {
    const WIDTH: f32 = std::f32::consts::PI / 8.0;
}

impl Program for Turret {
    fn run_turn(&mut self, api: &mut TankApi) -> Result<(), Error> {
        match api.scan(self.sweep, Turret::WIDTH)? {
            Some(contact) => {
                api.aim(contact.bearing as f32)?;
                if api.can_fire()? {
                    api.fire()?;
                }
                // Stay on the target.
                self.sweep = contact.bearing as f32;
            }
            None => {
                self.sweep = (self.sweep + Turret::WIDTH * 2.0) % std::f32::consts::TAU;
            }
        }
        Ok(())
    }
}

/// Closes on the nearest tank and self-destructs once it is inside the blast.
#[derive(Default)]
pub struct Kamikaze;

impl Program for Kamikaze {
    fn run_turn(&mut self, api: &mut TankApi) -> Result<(), Error> {
        let Some(contact) = api.scan(0.0, std::f32::consts::PI)? else {
            return Ok(());
        };
        // Keep a margin for the target moving away this tick.
        if contact.distance < 40.0 {
            return api.explode();
        }
        api.turn(contact.bearing as f32)?;
        api.forward()
    }
}
