use crate::arena::{Arena, ArenaEvents};
use crate::scheduler::Status;
use crate::tank::{TankHandle, TankState};
use crate::vm::ExecState;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Snapshot {
    pub tick: u32,
    pub status: Status,
    pub world_size: f64,
    pub tanks: Vec<TankSnapshot>,
    pub events: ArenaEvents,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TankSnapshot {
    pub id: TankHandle,
    pub name: String,
    pub position: Vector2<f64>,
    pub heading: f64,
    pub aim: f64,
    pub heat: i32,
    pub state: TankState,
    /// Unset when the arena is captured without its scheduler.
    pub guest: Option<ExecState>,
}

impl Snapshot {
    pub fn capture(arena: &Arena, status: Status) -> Snapshot {
        Snapshot {
            tick: arena.tick(),
            status,
            world_size: arena.config().world_size,
            tanks: arena
                .tanks()
                .map(|tank| TankSnapshot {
                    id: tank.handle(),
                    name: tank.name().to_string(),
                    position: tank.position(),
                    heading: tank.heading(),
                    aim: tank.aim(),
                    heat: tank.heat(),
                    state: tank.state(),
                    guest: None,
                })
                .collect(),
            events: arena.events().clone(),
        }
    }
}
