use approx::assert_abs_diff_eq;
use ranks_simulator::arena::DeathCause;
use ranks_simulator::config::Config;
use ranks_simulator::scheduler::{Scheduler, Status};
use ranks_simulator::tank::TankHandle;
use ranks_simulator::vm::{self, Code, ExecState};
use test_log::test;

const FORWARD_LOOP: &str = r#"
(module
    (import "env" "yield" (func $yield))
    (import "env" "forward" (func $forward))
    (func (export "tank")
        (loop $loop
            call $forward
            call $yield
            br $loop)))
"#;

const SPIN: &str = r#"
(module
    (func (export "tank")
        (loop $loop
            br $loop)))
"#;

fn wasm(wat: &str) -> Code {
    Code::Wasm(wasmer::wat2wasm(wat.as_bytes()).unwrap().to_vec())
}

fn config() -> Config {
    Config {
        gas_per_turn: 100_000,
        ..Default::default()
    }
}

fn scheduler(codes: &[&str]) -> Scheduler {
    let codes: Vec<(String, Code)> = codes
        .iter()
        .enumerate()
        .map(|(i, wat)| (format!("guest{i}"), wasm(wat)))
        .collect();
    Scheduler::with_codes(config(), &codes).unwrap()
}

fn messages(sched: &Scheduler) -> Vec<(u32, String)> {
    sched
        .arena()
        .events()
        .messages
        .iter()
        .map(|m| (m.tank.0, m.text.clone()))
        .collect()
}

fn fault(sched: &Scheduler, tank: TankHandle) -> Option<String> {
    sched
        .arena()
        .events()
        .errors
        .iter()
        .find(|(t, _)| *t == tank)
        .map(|(_, e)| e.msg.clone())
}

#[test]
fn test_yield_loop_moves() {
    let mut sched = scheduler(&[FORWARD_LOOP, FORWARD_LOOP]);
    assert_eq!(sched.guest_state(TankHandle(0)), Some(ExecState::Ready));
    for _ in 0..10 {
        sched.run_tick().unwrap();
    }
    assert_eq!(sched.tick(), 10);
    assert_eq!(sched.guest_state(TankHandle(0)), Some(ExecState::Suspended));
    let p0 = sched.arena().tank(TankHandle(0)).position();
    let p1 = sched.arena().tank(TankHandle(1)).position();
    assert_abs_diff_eq!(p0.x, 365.0, epsilon = 1e-9);
    assert_abs_diff_eq!(p1.x, -365.0, epsilon = 1e-9);
}

#[test]
fn test_resumes_after_yield() {
    let counter = r#"
(module
    (import "env" "yield" (func $yield))
    (import "env" "post_float" (func $post_float (param f32)))
    (func (export "tank") (local $i f32)
        (loop $loop
            local.get $i
            f32.const 1
            f32.add
            local.set $i
            local.get $i
            call $post_float
            call $yield
            br $loop)))
"#;
    let mut sched = scheduler(&[counter, FORWARD_LOOP]);
    for expected in ["1", "2", "3"] {
        sched.run_tick().unwrap();
        assert_eq!(messages(&sched), vec![(0, expected.to_string())]);
    }
}

#[test]
fn test_turn_order_is_insertion_order() {
    let poster = |value: u32| {
        format!(
            r#"
(module
    (import "env" "yield" (func $yield))
    (import "env" "post_float" (func $post_float (param f32)))
    (func (export "tank")
        (loop $loop
            f32.const {value}
            call $post_float
            call $yield
            br $loop)))
"#
        )
    };
    let (a, b, c) = (poster(0), poster(1), poster(2));
    let mut sched = scheduler(&[&a, &b, &c]);
    for _ in 0..3 {
        sched.run_tick().unwrap();
        assert_eq!(
            messages(&sched),
            vec![
                (0, "0".to_string()),
                (1, "1".to_string()),
                (2, "2".to_string())
            ]
        );
    }
}

#[test]
fn test_infinite_loop_is_terminated() {
    let mut sched = scheduler(&[SPIN, FORWARD_LOOP]);
    sched.run_tick().unwrap();

    let spinner = TankHandle(0);
    assert!(!sched.arena().is_alive(spinner));
    assert_eq!(sched.guest_state(spinner), Some(ExecState::Terminated));
    assert!(fault(&sched, spinner).unwrap().contains("gas"));
    assert_eq!(
        sched.arena().events().deaths[0].cause,
        DeathCause::Fault
    );

    // The other guest took its turn unaffected.
    assert_abs_diff_eq!(
        sched.arena().tank(TankHandle(1)).position().x,
        -374.0,
        epsilon = 1e-9
    );
    assert_eq!(
        sched.status(),
        Status::Victory {
            tank: TankHandle(1)
        }
    );
}

#[test]
fn test_gas_is_refilled_each_turn() {
    let busy = r#"
(module
    (import "env" "yield" (func $yield))
    (func (export "tank") (local $n i32)
        (loop $outer
            i32.const 0
            local.set $n
            (block $done
                (loop $inner
                    local.get $n
                    i32.const 5000
                    i32.ge_u
                    br_if $done
                    local.get $n
                    i32.const 1
                    i32.add
                    local.set $n
                    br $inner))
            call $yield
            br $outer)))
"#;
    let mut sched = scheduler(&[busy, FORWARD_LOOP]);
    for _ in 0..10 {
        sched.run_tick().unwrap();
    }
    assert!(sched.arena().is_alive(TankHandle(0)));
    assert_eq!(sched.status(), Status::Running);
}

#[test]
fn test_non_finite_turn_is_fault() {
    let bad = r#"
(module
    (import "env" "turn" (func $turn (param f32)))
    (import "env" "yield" (func $yield))
    (func (export "tank")
        f32.const nan
        call $turn
        call $yield))
"#;
    let mut sched = scheduler(&[bad, FORWARD_LOOP]);
    sched.run_tick().unwrap();
    assert!(!sched.arena().is_alive(TankHandle(0)));
    assert!(fault(&sched, TankHandle(0)).unwrap().contains("non-finite"));
    assert_abs_diff_eq!(
        sched.arena().tank(TankHandle(0)).heading().abs(),
        std::f64::consts::PI,
        epsilon = 1e-12
    );
}

#[test]
fn test_entry_returning_is_fault() {
    let mut sched = scheduler(&["(module (func (export \"tank\")))", FORWARD_LOOP]);
    sched.run_tick().unwrap();
    assert!(!sched.arena().is_alive(TankHandle(0)));
    assert!(fault(&sched, TankHandle(0)).unwrap().contains("returned"));
}

#[test]
fn test_trap_is_fault() {
    let mut sched = scheduler(&["(module (func (export \"tank\") unreachable))", FORWARD_LOOP]);
    sched.run_tick().unwrap();
    assert!(!sched.arena().is_alive(TankHandle(0)));
    assert!(sched.arena().is_alive(TankHandle(1)));
}

#[test]
fn test_post_string() {
    let greeter = r#"
(module
    (import "env" "post_string" (func $post_string (param i32)))
    (import "env" "yield" (func $yield))
    (memory (export "memory") 1)
    (data (i32.const 16) "hello\00ignored")
    (func (export "tank")
        i32.const 16
        call $post_string
        (loop $loop
            call $yield
            br $loop)))
"#;
    let mut sched = scheduler(&[greeter, FORWARD_LOOP]);
    sched.run_tick().unwrap();
    assert_eq!(messages(&sched), vec![(0, "hello".to_string())]);
    sched.run_tick().unwrap();
    assert!(messages(&sched).is_empty());
}

#[test]
fn test_post_string_out_of_bounds_is_fault() {
    let bad = r#"
(module
    (import "env" "post_string" (func $post_string (param i32)))
    (memory (export "memory") 1)
    (func (export "tank")
        i32.const 70000
        call $post_string))
"#;
    let mut sched = scheduler(&[bad, FORWARD_LOOP]);
    sched.run_tick().unwrap();
    assert!(!sched.arena().is_alive(TankHandle(0)));
    assert!(messages(&sched).is_empty());
}

#[test]
fn test_math_bridge() {
    let math = r#"
(module
    (import "env" "hypot_float" (func $hypot (param f32 f32) (result f32)))
    (import "env" "atan2_double" (func $atan2 (param f64 f64) (result f64)))
    (import "env" "post_float" (func $post_float (param f32)))
    (import "env" "yield" (func $yield))
    (func (export "tank")
        f32.const 3
        f32.const 4
        call $hypot
        call $post_float
        f64.const 1
        f64.const 1
        call $atan2
        f32.demote_f64
        call $post_float
        (loop $loop
            call $yield
            br $loop)))
"#;
    let mut sched = scheduler(&[math, FORWARD_LOOP]);
    sched.run_tick().unwrap();
    let messages = messages(&sched);
    assert_eq!(messages[0], (0, "5".to_string()));
    let angle: f32 = messages[1].1.parse().unwrap();
    assert_abs_diff_eq!(angle, std::f32::consts::FRAC_PI_4);
}

#[test]
fn test_constants_and_temp() {
    let consts = r#"
(module
    (import "env" "DEATH_HEAT" (func $death_heat (result i32)))
    (import "env" "SHOOT_HEAT" (func $shoot_heat (result i32)))
    (import "env" "TANK_VELOCITY" (func $tank_velocity (result f32)))
    (import "env" "temp" (func $temp (result i32)))
    (import "env" "fire" (func $fire))
    (import "env" "post_float" (func $post_float (param f32)))
    (import "env" "yield" (func $yield))
    (func (export "tank")
        call $death_heat
        f32.convert_i32_s
        call $post_float
        call $shoot_heat
        f32.convert_i32_s
        call $post_float
        call $tank_velocity
        call $post_float
        call $fire
        call $temp
        f32.convert_i32_s
        call $post_float
        (loop $loop
            call $yield
            br $loop)))
"#;
    let mut sched = scheduler(&[consts, FORWARD_LOOP]);
    sched.run_tick().unwrap();
    let texts: Vec<String> = messages(&sched).into_iter().map(|(_, t)| t).collect();
    assert_eq!(texts, vec!["300", "26", "1", "26"]);
    assert_eq!(sched.arena().events().fires.len(), 1);
}

#[test]
fn test_scan_and_gps() {
    let scanner = r#"
(module
    (import "env" "scan" (func $scan (param f32 f32) (result i64)))
    (import "env" "gpsx" (func $gpsx (result f32)))
    (import "env" "gpsy" (func $gpsy (result f32)))
    (import "env" "post_float" (func $post_float (param f32)))
    (import "env" "yield" (func $yield))
    (func (export "tank")
        call $gpsx
        call $post_float
        call $gpsy
        call $post_float
        ;; Post the version byte of a scan toward the other tank.
        f32.const 3.1415927
        f32.const 0.1
        call $scan
        i64.const 56
        i64.shr_u
        f32.convert_i64_u
        call $post_float
        (loop $loop
            call $yield
            br $loop)))
"#;
    let mut sched = scheduler(&[scanner, FORWARD_LOOP]);
    sched.run_tick().unwrap();
    let texts: Vec<String> = messages(&sched).into_iter().map(|(_, t)| t).collect();
    assert_eq!(texts, vec!["375", "0", "1"]);
}

#[test]
fn test_explode_ends_turn() {
    let bomber = r#"
(module
    (import "env" "explode" (func $explode))
    (import "env" "post_float" (func $post_float (param f32)))
    (import "env" "yield" (func $yield))
    (func (export "tank")
        call $explode
        f32.const 1
        call $post_float
        call $yield))
"#;
    let mut sched = scheduler(&[bomber, FORWARD_LOOP, FORWARD_LOOP]);
    sched.run_tick().unwrap();
    let bomber = TankHandle(0);
    assert!(!sched.arena().is_alive(bomber));
    assert_eq!(sched.guest_state(bomber), Some(ExecState::Terminated));
    assert_eq!(
        sched.arena().events().deaths[0].cause,
        DeathCause::SelfDestruct
    );
    assert!(messages(&sched).is_empty());
    assert!(fault(&sched, bomber).is_none());
}

#[test]
fn test_import_in_start_function_fails_load() {
    let eager = r#"
(module
    (import "env" "fire" (func $fire))
    (func $init
        call $fire)
    (start $init)
    (func (export "tank")))
"#;
    let sched = scheduler(&[eager, FORWARD_LOOP, FORWARD_LOOP]);
    assert_eq!(sched.arena().tanks().count(), 2);
    assert_eq!(sched.load_errors().len(), 1);
    assert_eq!(sched.load_errors()[0].0, "guest0");
    assert!(sched.load_errors()[0].1.msg.contains("outside"));
}

#[test]
fn test_load_errors() {
    let config = config();
    let missing_entry = wasm("(module (func (export \"main\")))");
    assert!(vm::load(&missing_entry, &config).is_err());

    let unknown_import = wasm(
        r#"(module (import "env" "teleport" (func)) (func (export "tank")))"#,
    );
    assert!(vm::load(&unknown_import, &config).is_err());

    assert!(vm::load(&Code::Wasm(b"not wasm".to_vec()), &config).is_err());
    assert!(vm::load(&Code::Builtin("nonexistent".to_string()), &config).is_err());
}

#[test]
fn test_terminate_is_idempotent() {
    let config = config();
    let mut guest = vm::load(&wasm(FORWARD_LOOP), &config).unwrap();
    assert_eq!(guest.state(), ExecState::Ready);
    guest.terminate();
    guest.terminate();
    assert_eq!(guest.state(), ExecState::Terminated);
}
