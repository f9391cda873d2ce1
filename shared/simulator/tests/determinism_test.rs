use ranks_simulator::config::Config;
use ranks_simulator::scheduler::Scheduler;
use ranks_simulator::vm::Code;
use test_log::test;

const WANDERER: &str = r#"
(module
    (import "env" "turn" (func $turn (param f32)))
    (import "env" "forward" (func $forward))
    (import "env" "fire" (func $fire))
    (import "env" "aim" (func $aim (param f32)))
    (import "env" "sin_float" (func $sin (param f32) (result f32)))
    (import "env" "yield" (func $yield))
    (func (export "tank") (local $t f32)
        (loop $loop
            local.get $t
            f32.const 0.01
            f32.add
            local.set $t
            local.get $t
            call $sin
            f32.const 3
            f32.mul
            call $turn
            call $forward
            local.get $t
            f32.const 7
            f32.mul
            call $aim
            call $fire
            call $yield
            br $loop)))
"#;

fn codes() -> Vec<(String, Code)> {
    let wanderer = wasmer::wat2wasm(WANDERER.as_bytes()).unwrap().to_vec();
    vec![
        ("turret".to_string(), Code::Builtin("turret".to_string())),
        ("wanderer".to_string(), Code::Wasm(wanderer)),
        ("square".to_string(), Code::Builtin("square".to_string())),
        ("kamikaze".to_string(), Code::Builtin("kamikaze".to_string())),
    ]
}

fn trajectory(ticks: u32) -> Vec<u64> {
    let config = Config {
        max_ticks: ticks,
        ..Default::default()
    };
    let mut sched = Scheduler::with_codes(config, &codes()).unwrap();
    let mut hashes = vec![sched.hash()];
    while !sched.status().is_finished() {
        sched.run_tick().unwrap();
        hashes.push(sched.hash());
    }
    hashes
}

#[test]
fn test_replay_is_bit_identical() {
    let first = trajectory(2000);
    let second = trajectory(2000);
    assert!(first.len() > 1);
    assert_eq!(first, second);
}
