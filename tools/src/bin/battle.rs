use clap::Parser;
use ranks_simulator::scheduler::{Scheduler, Status};
use std::path::PathBuf;

/// Runs one match and reports the winner.
///
/// Programs are `.wasm`/`.wat` files or `builtin:<name>`.
#[derive(Parser, Debug)]
#[clap()]
struct Arguments {
    #[clap(required = true)]
    programs: Vec<String>,

    /// JSON file overriding match constants.
    #[clap(short, long)]
    config: Option<PathBuf>,

    #[clap(long)]
    max_ticks: Option<u32>,

    /// Print a JSON snapshot after every tick.
    #[clap(short, long)]
    snapshots: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Arguments::parse();
    let mut config = ranks_tools::load_config(args.config.as_deref())?;
    if let Some(max_ticks) = args.max_ticks {
        config.max_ticks = max_ticks;
    }
    let codes = ranks_tools::load_multiple(&args.programs)?;

    let mut sched = Scheduler::with_codes(config, &codes)?;
    if sched.arena().tanks().count() == 0 {
        anyhow::bail!("No program could be loaded");
    }

    while !sched.status().is_finished() {
        sched.run_tick()?;
        if args.snapshots {
            println!("{}", serde_json::to_string(&sched.snapshot())?);
        }
    }

    match sched.status() {
        Status::Victory { tank } => log::info!(
            "{} ({:?}) wins after {} ticks",
            tank,
            sched.arena().tank(tank).name(),
            sched.tick()
        ),
        Status::Draw => log::info!("Draw after {} ticks", sched.tick()),
        Status::Running => unreachable!(),
    }
    println!("{}", serde_json::to_string(&sched.status())?);
    Ok(())
}
