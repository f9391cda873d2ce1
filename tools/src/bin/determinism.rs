use clap::Parser;
use ranks_simulator::scheduler::Scheduler;
use ranks_simulator::snapshot::Snapshot;
use std::path::PathBuf;

/// Runs the same match twice in lockstep and reports the first tick at which
/// the two arenas diverge.
#[derive(Parser, Debug)]
#[clap()]
struct Arguments {
    #[clap(required = true)]
    programs: Vec<String>,

    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(long, default_value = "10000")]
    max_ticks: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Arguments::parse();
    let mut config = ranks_tools::load_config(args.config.as_deref())?;
    config.max_ticks = args.max_ticks;
    let codes = ranks_tools::load_multiple(&args.programs)?;

    let mut scheds = [0, 1]
        .iter()
        .map(|_| Scheduler::with_codes(config.clone(), &codes))
        .collect::<Result<Vec<_>, _>>()?;
    while !scheds[0].status().is_finished() {
        let hashes = scheds.iter().map(|sched| sched.hash()).collect::<Vec<_>>();
        if hashes[0] != hashes[1] {
            println!("hashes differ at tick {}", scheds[0].tick());
            diff_snapshots(&scheds[0].snapshot(), &scheds[1].snapshot());
            anyhow::bail!("nondeterminism detected");
        }
        for sched in scheds.iter_mut() {
            sched.run_tick()?;
        }
    }

    println!(
        "{} ticks identical, final hash {:016x}",
        scheds[0].tick(),
        scheds[0].hash()
    );
    Ok(())
}

fn diff_snapshots(a: &Snapshot, b: &Snapshot) {
    if a.tanks.len() != b.tanks.len() {
        println!("tank count differs");
        println!("  a: {}", a.tanks.len());
        println!("  b: {}", b.tanks.len());
    }

    for (a, b) in a.tanks.iter().zip(b.tanks.iter()) {
        if a.position != b.position {
            println!("{} position differs", a.id);
            println!("  a: {:?}", a.position);
            println!("  b: {:?}", b.position);
        }
        if a.heading != b.heading || a.aim != b.aim {
            println!("{} heading/aim differs", a.id);
            println!("  a: {} {}", a.heading, a.aim);
            println!("  b: {} {}", b.heading, b.aim);
        }
        if a.heat != b.heat {
            println!("{} heat differs", a.id);
            println!("  a: {}", a.heat);
            println!("  b: {}", b.heat);
        }
        if a.state != b.state {
            println!("{} state differs", a.id);
            println!("  a: {:?}", a.state);
            println!("  b: {:?}", b.state);
        }
    }
}
