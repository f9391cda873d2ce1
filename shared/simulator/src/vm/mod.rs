pub mod bridge;
pub mod builtin;
mod limiter;
pub mod math;
pub mod wasm;

use crate::arena::Arena;
use crate::config::Config;
use crate::tank::TankHandle;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Error {
    pub msg: String,
}

impl Error {
    pub fn new(msg: impl Into<String>) -> Error {
        Error { msg: msg.into() }
    }

    /// The guest's tank was destroyed while it was running.
    pub(crate) fn destroyed() -> Error {
        Error::new("tank destroyed")
    }

    /// The host stopped servicing the guest.
    pub(crate) fn terminated() -> Error {
        Error::new("guest terminated")
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for Error {}

impl From<wasmer::InstantiationError> for Error {
    fn from(err: wasmer::InstantiationError) -> Self {
        match err {
            wasmer::InstantiationError::Start(e) => match e.downcast::<Error>() {
                Ok(e) => e,
                Err(e) => Self {
                    msg: format!("Start function failed: {e}"),
                },
            },
            err => Self {
                msg: format!("Wasmer instantiation error: {err:?}"),
            },
        }
    }
}

/// A tank program as submitted to the arena.
#[derive(Clone, Serialize, Deserialize, Debug, Eq, Hash, PartialEq)]
pub enum Code {
    Wasm(Vec<u8>),
    Builtin(String),
}

/// Execution state of a sandboxed guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecState {
    /// Loaded, entry point not yet entered.
    Ready,
    Running,
    /// Parked in `yield()`.
    Suspended,
    Terminated,
}

/// How a guest's turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Yielded,
    /// The guest's own tank died during the turn.
    Destroyed,
    Faulted(Error),
}

/// One isolated guest program. The scheduler owns these; the arena owns the
/// tanks they drive.
pub trait GuestHandle {
    fn state(&self) -> ExecState;

    /// Runs the guest until it yields, faults, or its tank dies. Every host
    /// call made during the turn is dispatched against `tank` in `arena`.
    fn resume(&mut self, arena: &mut Arena, tank: TankHandle) -> TurnOutcome;

    /// Releases the guest. Only called between turns. Idempotent.
    fn terminate(&mut self);
}

pub fn load(code: &Code, config: &Config) -> Result<Box<dyn GuestHandle>, Error> {
    match code {
        Code::Wasm(wasm) => Ok(Box::new(wasm::WasmGuest::load(wasm, config)?)),
        Code::Builtin(name) => Ok(Box::new(builtin::NativeGuest::new(
            builtin::load(name)?,
            config.calls_per_turn,
        ))),
    }
}

pub(crate) fn translate_error<T, U>(err: Result<T, U>) -> Result<T, Error>
where
    U: std::fmt::Debug,
{
    match err {
        Ok(val) => Ok(val),
        Err(err) => Err(Error {
            msg: format!("Wasmer error: {err:?}"),
        }),
    }
}

pub(crate) fn translate_runtime_error<T>(err: Result<T, wasmer::RuntimeError>) -> Result<T, Error> {
    match err {
        Ok(val) => Ok(val),
        Err(err) => Err(Error {
            msg: format!("Tank runtime error: {err}"),
        }),
    }
}
