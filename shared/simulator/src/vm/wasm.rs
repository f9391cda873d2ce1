//! WebAssembly guests.
//!
//! Each guest runs on a dedicated thread that owns its store and instance.
//! The thread and the scheduler hand control back and forth over a pair of
//! channels so that exactly one side runs at a time: host imports send a
//! [`HostCall`] and block until the scheduler replies, and `yield` blocks until
//! the next turn. The guest's native stack is preserved across turns without
//! any coroutine support in the sandbox.
use super::bridge::{self, HostCall, Reply};
use super::limiter::{self, GET_GAS, RESET_GAS};
use super::{math, translate_error, Error, ExecState, GuestHandle, TurnOutcome};
use crate::arena::Arena;
use crate::config::Config;
use crate::tank::TankHandle;
use crossbeam::channel::{unbounded, Receiver, Sender};
use ranks_api::abi::{imports as names, ENTRY_POINT, IMPORT_MODULE, MEMORY};
use ranks_api::MAX_MESSAGE_LENGTH;
use std::thread::JoinHandle;
use wasmer::{
    Function, FunctionEnv, FunctionEnvMut, Imports, Instance, Memory, MemoryView, Module, Store,
    TypedFunction,
};

enum ToGuest {
    Resume,
    Reply(Reply),
}

enum FromGuest {
    Loaded,
    Call(HostCall),
    Yielded,
    Fault(Error),
}

struct GuestEnv {
    to_host: Sender<FromGuest>,
    from_host: Receiver<ToGuest>,
    memory: Option<Memory>,
    reset_gas: Option<TypedFunction<i32, ()>>,
    /// Set once the entry point has been entered.
    running: bool,
    gas_per_turn: i32,
    death_heat: i32,
    shoot_heat: i32,
    tank_velocity: f32,
}

impl GuestEnv {
    fn check_running(&self, name: &str) -> Result<(), Error> {
        if self.running {
            Ok(())
        } else {
            Err(Error::new(format!(
                "{name} called outside of the {ENTRY_POINT} entry point"
            )))
        }
    }

    fn call(&self, name: &str, call: HostCall) -> Result<Reply, Error> {
        self.check_running(name)?;
        self.to_host
            .send(FromGuest::Call(call))
            .map_err(|_| Error::terminated())?;
        match self.from_host.recv() {
            Ok(ToGuest::Reply(reply)) => Ok(reply),
            _ => Err(Error::terminated()),
        }
    }
}

fn scan(env: FunctionEnvMut<GuestEnv>, angle: f32, width: f32) -> Result<u64, Error> {
    let reply = env
        .data()
        .call(names::SCAN, HostCall::Scan { angle, width })?;
    reply.as_u64()
}

fn fire(env: FunctionEnvMut<GuestEnv>) -> Result<(), Error> {
    env.data().call(names::FIRE, HostCall::Fire).map(|_| ())
}

fn aim(env: FunctionEnvMut<GuestEnv>, angle: f32) -> Result<(), Error> {
    env.data().call(names::AIM, HostCall::Aim(angle)).map(|_| ())
}

fn turn(env: FunctionEnvMut<GuestEnv>, angle: f32) -> Result<(), Error> {
    env.data().call(names::TURN, HostCall::Turn(angle)).map(|_| ())
}

fn gpsx(env: FunctionEnvMut<GuestEnv>) -> Result<f32, Error> {
    env.data().call(names::GPSX, HostCall::GpsX)?.as_f32()
}

fn gpsy(env: FunctionEnvMut<GuestEnv>) -> Result<f32, Error> {
    env.data().call(names::GPSY, HostCall::GpsY)?.as_f32()
}

fn forward(env: FunctionEnvMut<GuestEnv>) -> Result<(), Error> {
    env.data().call(names::FORWARD, HostCall::Forward).map(|_| ())
}

fn explode(env: FunctionEnvMut<GuestEnv>) -> Result<(), Error> {
    env.data().call(names::EXPLODE, HostCall::Explode).map(|_| ())
}

fn temp(env: FunctionEnvMut<GuestEnv>) -> Result<i32, Error> {
    env.data().call(names::TEMP, HostCall::Temp)?.as_i32()
}

fn post_float(env: FunctionEnvMut<GuestEnv>, value: f32) -> Result<(), Error> {
    env.data()
        .call(names::POST_FLOAT, HostCall::PostFloat(value))
        .map(|_| ())
}

fn post_string(env: FunctionEnvMut<GuestEnv>, ptr: i32) -> Result<(), Error> {
    let data = env.data();
    data.check_running(names::POST_STRING)?;
    let memory = data
        .memory
        .as_ref()
        .ok_or_else(|| Error::new(format!("post_string requires an exported {MEMORY}")))?;
    let view = memory.view(&env);
    let text = read_c_string(&view, ptr as u32)?;
    data.call(names::POST_STRING, HostCall::PostString(text))
        .map(|_| ())
}

/// Reads up to `MAX_MESSAGE_LENGTH` bytes, stopping at a NUL.
fn read_c_string(view: &MemoryView, offset: u32) -> Result<String, Error> {
    let mut bytes = Vec::new();
    for i in 0..MAX_MESSAGE_LENGTH as u64 {
        let b = view
            .read_u8(offset as u64 + i)
            .map_err(|e| Error::new(format!("post_string: {e}")))?;
        if b == 0 {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn death_heat(env: FunctionEnvMut<GuestEnv>) -> Result<i32, Error> {
    env.data().check_running(names::DEATH_HEAT)?;
    Ok(env.data().death_heat)
}

fn shoot_heat(env: FunctionEnvMut<GuestEnv>) -> Result<i32, Error> {
    env.data().check_running(names::SHOOT_HEAT)?;
    Ok(env.data().shoot_heat)
}

fn tank_velocity(env: FunctionEnvMut<GuestEnv>) -> Result<f32, Error> {
    env.data().check_running(names::TANK_VELOCITY)?;
    Ok(env.data().tank_velocity)
}

/// Parks the guest until its next turn, then refills its gas.
fn yield_(mut env: FunctionEnvMut<GuestEnv>) -> Result<(), Error> {
    let (data, mut store) = env.data_and_store_mut();
    data.check_running(names::YIELD)?;
    data.to_host
        .send(FromGuest::Yielded)
        .map_err(|_| Error::terminated())?;
    match data.from_host.recv() {
        Ok(ToGuest::Resume) => {}
        _ => return Err(Error::terminated()),
    }
    let reset_gas = data
        .reset_gas
        .clone()
        .ok_or_else(|| Error::new("gas meter missing"))?;
    let gas = data.gas_per_turn;
    super::translate_runtime_error(reset_gas.call(&mut store, gas))
}

struct Loaded {
    store: Store,
    env: FunctionEnv<GuestEnv>,
    entry: TypedFunction<(), ()>,
    reset_gas: TypedFunction<i32, ()>,
    get_gas: TypedFunction<(), i32>,
}

fn instantiate(wasm: &[u8], env: GuestEnv) -> Result<Loaded, Error> {
    let gas = env.gas_per_turn;
    let wasm = limiter::rewrite(wasm, gas)?;
    let mut store = Store::new(wasmer_compiler_singlepass::Singlepass::new());
    let module = translate_error(Module::new(&store, wasm))?;
    let env = FunctionEnv::new(&mut store, env);

    let mut imports = Imports::new();
    math::register(&mut store, &mut imports);
    macro_rules! define {
        ($($name:expr => $f:expr),* $(,)?) => {
            $(imports.define(IMPORT_MODULE, $name, Function::new_typed_with_env(&mut store, &env, $f));)*
        };
    }
    define! {
        names::SCAN => scan,
        names::FIRE => fire,
        names::AIM => aim,
        names::TURN => turn,
        names::GPSX => gpsx,
        names::GPSY => gpsy,
        names::FORWARD => forward,
        names::EXPLODE => explode,
        names::YIELD => yield_,
        names::TEMP => temp,
        names::POST_STRING => post_string,
        names::POST_FLOAT => post_float,
        names::DEATH_HEAT => death_heat,
        names::SHOOT_HEAT => shoot_heat,
        names::TANK_VELOCITY => tank_velocity,
    }

    let instance = Instance::new(&mut store, &module, &imports)?;
    let memory = instance.exports.get_memory(MEMORY).ok().cloned();
    let entry = translate_error(instance.exports.get_typed_function(&store, ENTRY_POINT))?;
    let reset_gas = translate_error(instance.exports.get_typed_function(&store, RESET_GAS))?;
    let get_gas = translate_error(instance.exports.get_typed_function(&store, GET_GAS))?;

    let data = env.as_mut(&mut store);
    data.memory = memory;
    data.reset_gas = Some(reset_gas.clone());

    Ok(Loaded {
        store,
        env,
        entry,
        reset_gas,
        get_gas,
    })
}

/// Body of a guest thread. Returns when the guest faults or the host hangs up.
fn run_guest(wasm: Vec<u8>, env: GuestEnv) {
    let to_host = env.to_host.clone();
    let from_host = env.from_host.clone();
    let Loaded {
        mut store,
        env,
        entry,
        reset_gas,
        get_gas,
    } = match instantiate(&wasm, env) {
        Ok(loaded) => loaded,
        Err(e) => {
            let _ = to_host.send(FromGuest::Fault(e));
            return;
        }
    };
    if to_host.send(FromGuest::Loaded).is_err() {
        return;
    }
    match from_host.recv() {
        Ok(ToGuest::Resume) => {}
        _ => return,
    }

    let gas = env.as_ref(&store).gas_per_turn;
    if let Err(e) = super::translate_runtime_error(reset_gas.call(&mut store, gas)) {
        let _ = to_host.send(FromGuest::Fault(e));
        return;
    }
    env.as_mut(&mut store).running = true;

    let error = match entry.call(&mut store) {
        Ok(()) => Error::new(format!("{ENTRY_POINT} returned")),
        Err(e) => match e.downcast::<Error>() {
            Ok(e) => e,
            Err(e) => match get_gas.call(&mut store) {
                Ok(0) => Error::new("ran out of gas"),
                _ => Error::new(format!("Tank runtime error: {e}")),
            },
        },
    };
    let _ = to_host.send(FromGuest::Fault(error));
}

/// A wasm program running on its own thread.
pub struct WasmGuest {
    state: ExecState,
    to_guest: Option<Sender<ToGuest>>,
    from_guest: Receiver<FromGuest>,
    thread: Option<JoinHandle<()>>,
}

impl WasmGuest {
    /// Compiles and instantiates `wasm`, running its start function if any.
    pub fn load(wasm: &[u8], config: &Config) -> Result<WasmGuest, Error> {
        let (to_guest, from_host) = unbounded();
        let (to_host, from_guest) = unbounded();
        let env = GuestEnv {
            to_host,
            from_host,
            memory: None,
            reset_gas: None,
            running: false,
            gas_per_turn: config.gas_per_turn.min(i32::MAX as u32) as i32,
            death_heat: config.death_heat,
            shoot_heat: config.shoot_heat,
            tank_velocity: config.tank_velocity as f32,
        };
        let wasm = wasm.to_vec();
        let thread = std::thread::Builder::new()
            .name("wasm-guest".to_string())
            .spawn(move || run_guest(wasm, env))
            .map_err(|e| Error::new(format!("failed to spawn guest thread: {e}")))?;

        let mut guest = WasmGuest {
            state: ExecState::Ready,
            to_guest: Some(to_guest),
            from_guest,
            thread: Some(thread),
        };
        match guest.from_guest.recv() {
            Ok(FromGuest::Loaded) => Ok(guest),
            Ok(FromGuest::Fault(e)) => {
                guest.terminate();
                Err(e)
            }
            _ => {
                guest.terminate();
                Err(Error::new("guest thread exited during load"))
            }
        }
    }
}

impl GuestHandle for WasmGuest {
    fn state(&self) -> ExecState {
        self.state
    }

    fn resume(&mut self, arena: &mut Arena, tank: TankHandle) -> TurnOutcome {
        let sent = match &self.to_guest {
            Some(sender) if self.state != ExecState::Terminated => {
                sender.send(ToGuest::Resume).is_ok()
            }
            _ => false,
        };
        if !sent {
            self.state = ExecState::Terminated;
            return TurnOutcome::Faulted(Error::terminated());
        }
        self.state = ExecState::Running;

        loop {
            match self.from_guest.recv() {
                Ok(FromGuest::Call(call)) => match bridge::dispatch(arena, tank, call) {
                    Ok(_) if !arena.is_alive(tank) => {
                        self.state = ExecState::Suspended;
                        return TurnOutcome::Destroyed;
                    }
                    Ok(reply) => {
                        let delivered = self
                            .to_guest
                            .as_ref()
                            .map_or(false, |sender| sender.send(ToGuest::Reply(reply)).is_ok());
                        if !delivered {
                            self.state = ExecState::Terminated;
                            return TurnOutcome::Faulted(Error::terminated());
                        }
                    }
                    Err(e) => {
                        self.state = ExecState::Suspended;
                        return TurnOutcome::Faulted(e);
                    }
                },
                Ok(FromGuest::Yielded) => {
                    self.state = ExecState::Suspended;
                    return TurnOutcome::Yielded;
                }
                Ok(FromGuest::Fault(e)) => {
                    self.state = ExecState::Terminated;
                    return TurnOutcome::Faulted(e);
                }
                Ok(FromGuest::Loaded) | Err(_) => {
                    self.state = ExecState::Terminated;
                    return TurnOutcome::Faulted(Error::new("guest thread exited"));
                }
            }
        }
    }

    fn terminate(&mut self) {
        // Hanging up wakes the guest thread with an error, which unwinds it
        // out of the entry point.
        self.to_guest = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("guest thread panicked");
            }
        }
        self.state = ExecState::Terminated;
    }
}

impl Drop for WasmGuest {
    fn drop(&mut self) {
        self.terminate();
    }
}
