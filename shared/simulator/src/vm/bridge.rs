//! Translates guest calls into arena mutations and queries.
//!
//! Every sandbox funnels its imports through [`dispatch`], so argument
//! validation and the dead-tank rule live in exactly one place.
use super::Error;
use crate::arena::Arena;
use crate::tank::TankHandle;

/// A single call from a guest into the host.
#[derive(Clone, Debug, PartialEq)]
pub enum HostCall {
    Scan { angle: f32, width: f32 },
    Fire,
    Aim(f32),
    Turn(f32),
    GpsX,
    GpsY,
    Forward,
    Explode,
    Temp,
    PostString(String),
    PostFloat(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reply {
    Unit,
    F32(f32),
    I32(i32),
    U64(u64),
}

impl Reply {
    /// Any mismatch is a host bug. It surfaces as a fault of the calling
    /// guest instead of a silent zero.
    fn mismatch(self, expected: &str) -> Error {
        log::error!("expected {} reply, got {:?}", expected, self);
        Error::new(format!("internal error: expected {expected} reply, got {self:?}"))
    }

    pub fn as_f32(self) -> Result<f32, Error> {
        match self {
            Reply::F32(v) => Ok(v),
            other => Err(other.mismatch("f32")),
        }
    }

    pub fn as_i32(self) -> Result<i32, Error> {
        match self {
            Reply::I32(v) => Ok(v),
            other => Err(other.mismatch("i32")),
        }
    }

    pub fn as_u64(self) -> Result<u64, Error> {
        match self {
            Reply::U64(v) => Ok(v),
            other => Err(other.mismatch("u64")),
        }
    }
}

fn finite(name: &str, value: f32) -> Result<f64, Error> {
    if value.is_finite() {
        Ok(value as f64)
    } else {
        Err(Error::new(format!("{name}: non-finite argument {value}")))
    }
}

/// Applies `call` on behalf of `tank`. An `Err` is a guest fault.
pub fn dispatch(arena: &mut Arena, tank: TankHandle, call: HostCall) -> Result<Reply, Error> {
    if !arena.is_alive(tank) {
        return Err(Error::destroyed());
    }
    log::trace!("{} {:?}", tank, call);
    let reply = match call {
        HostCall::Scan { angle, width } => {
            let angle = finite("scan", angle)?;
            let width = finite("scan", width)?;
            Reply::U64(arena.scan(tank, angle, width))
        }
        HostCall::Fire => {
            arena.fire(tank);
            Reply::Unit
        }
        HostCall::Aim(angle) => {
            arena.aim(tank, finite("aim", angle)?);
            Reply::Unit
        }
        HostCall::Turn(angle) => {
            arena.turn(tank, finite("turn", angle)?);
            Reply::Unit
        }
        HostCall::GpsX => Reply::F32(arena.tank(tank).position().x as f32),
        HostCall::GpsY => Reply::F32(arena.tank(tank).position().y as f32),
        HostCall::Forward => {
            arena.forward(tank);
            Reply::Unit
        }
        HostCall::Explode => {
            arena.explode(tank);
            Reply::Unit
        }
        HostCall::Temp => Reply::I32(arena.tank(tank).heat()),
        HostCall::PostString(text) => {
            arena.post_message(tank, text);
            Reply::Unit
        }
        HostCall::PostFloat(value) => {
            arena.post_message(tank, format!("{value}"));
            Reply::Unit
        }
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use nalgebra::vector;

    #[test]
    fn test_reply_mismatch_is_error() {
        assert_eq!(Reply::F32(1.5).as_f32(), Ok(1.5));
        assert_eq!(Reply::U64(7).as_u64(), Ok(7));
        assert!(Reply::Unit.as_f32().is_err());
        assert!(Reply::F32(1.0).as_i32().is_err());
        assert!(Reply::I32(3).as_u64().is_err());
    }

    #[test]
    fn test_non_finite_is_fault() {
        let mut arena = Arena::new(Config::default()).unwrap();
        let tank = arena.add_tank("a", vector![0.0, 0.0], 0.0);
        assert!(dispatch(&mut arena, tank, HostCall::Turn(f32::NAN)).is_err());
        assert!(dispatch(&mut arena, tank, HostCall::Aim(f32::INFINITY)).is_err());
        assert!(dispatch(
            &mut arena,
            tank,
            HostCall::Scan {
                angle: 0.0,
                width: f32::NEG_INFINITY
            }
        )
        .is_err());
        assert_eq!(arena.tank(tank).heading(), 0.0);
    }

    #[test]
    fn test_dead_tank_cannot_call() {
        let mut arena = Arena::new(Config::default()).unwrap();
        let tank = arena.add_tank("a", vector![3.0, -4.0], 0.0);
        assert_eq!(
            dispatch(&mut arena, tank, HostCall::GpsY),
            Ok(Reply::F32(-4.0))
        );
        assert_eq!(
            dispatch(&mut arena, tank, HostCall::Explode),
            Ok(Reply::Unit)
        );
        assert!(dispatch(&mut arena, tank, HostCall::GpsX).is_err());
    }
}
