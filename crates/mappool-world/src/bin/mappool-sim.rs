//! Headless pool simulation.
//!
//! Loads a world document, populates every map, activates every populated
//! zone, then runs ticks while killing a share of the live population so the
//! respawn machinery has work to do. Console commands given with `--cmd` run
//! after the last tick.
//!
//! ```text
//! mappool-sim <world.json> [--ticks N] [--kill-every N] [--timers OUT.json] [--cmd "dump 0 1"]...
//! ```
//!
//! Set `RUST_LOG=debug` to follow individual spawns.

use std::path::PathBuf;

use anyhow::{bail, Context};

use mappool_admin::console::execute_line;
use mappool_core::handle::EntityHandle;
use mappool_world::prelude::*;

struct Args {
    world: PathBuf,
    ticks: u64,
    kill_every: u64,
    timers_out: Option<PathBuf>,
    commands: Vec<String>,
}

fn parse_args() -> Result<Args, anyhow::Error> {
    let mut raw = std::env::args().skip(1);
    let mut args = Args {
        world: PathBuf::new(),
        ticks: 600,
        kill_every: 7,
        timers_out: None,
        commands: Vec::new(),
    };
    let mut world = None;

    while let Some(arg) = raw.next() {
        let mut value = |name: &str| raw.next().with_context(|| format!("{name} needs a value"));
        match arg.as_str() {
            "--ticks" => args.ticks = value("--ticks")?.parse().context("--ticks")?,
            "--kill-every" => args.kill_every = value("--kill-every")?.parse().context("--kill-every")?,
            "--timers" => args.timers_out = Some(PathBuf::from(value("--timers")?)),
            "--cmd" => args.commands.push(value("--cmd")?),
            flag if flag.starts_with("--") => bail!("unknown flag {flag}"),
            path => world = Some(PathBuf::from(path)),
        }
    }

    args.world = world.context("usage: mappool-sim <world.json> [--ticks N] [--kill-every N] [--timers OUT] [--cmd LINE]")?;
    Ok(args)
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let world = load_world(&args.world).with_context(|| format!("loading {}", args.world.display()))?;
    let mut manager = MapManager::from_document(&world).context("building map instances")?;

    let maps: Vec<_> = manager.maps().collect();
    for &map in &maps {
        let instance = manager.require(map)?;
        for zone in instance.populated_zones() {
            instance.activate_zone(zone);
        }
    }

    let mut respawned = 0u64;
    let mut expired = 0u64;
    let mut killed = 0u64;
    for tick in 1..=args.ticks {
        if args.kill_every > 0 && tick % args.kill_every == 0 {
            for &map in &maps {
                let registry = manager.require(map)?.registry_mut();
                let victims: Vec<EntityHandle> = registry
                    .points()
                    .filter_map(|p| p.current_object())
                    .step_by(3)
                    .collect();
                for handle in victims {
                    if registry.handle_death(handle, tick % 2 == 0) {
                        killed += 1;
                    }
                }
            }
        }
        for (_, summary) in manager.step() {
            respawned += u64::from(summary.respawned);
            expired += u64::from(summary.expired);
        }
    }

    println!("ran {} ticks: {killed} killed, {respawned} respawned, {expired} corpses expired", args.ticks);
    for &map in &maps {
        let instance = manager.require(map)?;
        let registry = instance.registry();
        println!(
            "{map}: {} live, {} pending timers, state {}",
            registry.live_count(),
            registry.respawns().len(),
            registry.state_hash()?
        );
    }

    for line in &args.commands {
        let output = execute_line(&mut manager, line).with_context(|| format!("console command {line:?}"))?;
        print!("{output}");
    }

    if let Some(path) = &args.timers_out {
        let snapshots = maps
            .iter()
            .map(|&map| -> Result<TimerSnapshot, anyhow::Error> {
                let instance = manager.instance(map).context("map vanished")?;
                Ok(TimerSnapshot::capture(instance)?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let json = serde_json::to_string_pretty(&snapshots)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("wrote {} timer snapshots to {}", snapshots.len(), path.display());
    }

    Ok(())
}
