//! Headless tactics sandbox
//!
//! Builds a seeded battlefield with a walled choke between two armies, runs
//! an attacking squad against a defended position, and prints a JSON or
//! text summary of how the clusters behaved.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use glam::Vec2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use warband::core::types::{ChokeId, Side, UnitTypeId};
use warband::spatial::TilePos;
use warband::world::{roster, Choke, Terrain};
use warband::{Sandbox, Squad, SquadRegistry, TacticsConfig};

/// Tactics sandbox - run squads against a scripted defence
#[derive(Parser, Debug)]
#[command(name = "tactics_sandbox")]
#[command(about = "Run a seeded squad scenario and report cluster behaviour")]
struct Args {
    /// Number of ticks to simulate
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Attacking army size (combat units)
    #[arg(long, default_value_t = 12)]
    attackers: usize,

    /// Defending army size (combat units)
    #[arg(long, default_value_t = 8)]
    defenders: usize,

    /// Tactics configuration file (TOML); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Report cluster state every this many ticks (0 = final report only)
    #[arg(long, default_value_t = 0)]
    every: u64,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

const MAP_WIDTH: usize = 80;
const MAP_HEIGHT: usize = 40;

#[derive(Debug, Serialize)]
struct ClusterReport {
    id: u32,
    units: usize,
    activity: &'static str,
    sub_activity: &'static str,
    center: [f32; 2],
    progress: f32,
}

#[derive(Debug, Serialize)]
struct SquadReport {
    label: String,
    policy: &'static str,
    combat_units: usize,
    needs_detection: bool,
    units_by_type: BTreeMap<String, usize>,
    clusters: Vec<ClusterReport>,
}

#[derive(Debug, Serialize)]
struct Snapshot {
    tick: u64,
    my_alive: usize,
    enemy_alive: usize,
    hits: usize,
    squads: Vec<SquadReport>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    seed: u64,
    ticks: u64,
    snapshots: Vec<Snapshot>,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    if let Err(e) = run(&args) {
        tracing::error!("tactics sandbox failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> warband::Result<()> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    tracing::info!(seed, ticks = args.ticks, "starting tactics sandbox");

    let config = match &args.config {
        Some(path) => TacticsConfig::load(path)?,
        None => TacticsConfig::default(),
    };

    let mut sandbox = Sandbox::new(MAP_WIDTH, MAP_HEIGHT)?;
    sandbox.config = config;
    let target = build_map(&mut sandbox);

    let mut registry = SquadRegistry::new();
    registry.initialize();
    let attack = registry.add(Squad::attack("assault", target));

    let mine = spawn_attackers(&mut sandbox, &mut rng, args.attackers)?;
    spawn_defenders(&mut sandbox, &mut rng, args.defenders, target)?;
    {
        let ctx = sandbox.context(0);
        for unit in mine {
            registry.assign(&ctx, attack, unit)?;
        }
    }

    let mut snapshots = Vec::new();
    let mut hits = 0;
    for tick in 0..args.ticks {
        let commands = {
            let ctx = sandbox.context(tick);
            registry.update(&ctx)
        };
        hits += sandbox.resolve_attacks(&commands, tick);
        sandbox.advance(&commands);

        if args.every > 0 && tick % args.every == 0 {
            snapshots.push(snapshot(&sandbox, &registry, tick, hits));
        }
    }
    snapshots.push(snapshot(&sandbox, &registry, args.ticks, hits));
    registry.teardown();

    let report = RunReport {
        seed,
        ticks: args.ticks,
        snapshots,
    };
    match args.format.as_str() {
        "text" => print_text(&report),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        other => {
            tracing::warn!("unknown format '{}', defaulting to json", other);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

/// Wall off the middle of the map except for a four-tile gap, put the
/// defenders on high ground, and return the attack target
fn build_map(sandbox: &mut Sandbox) -> Vec2 {
    let map = &mut sandbox.map;
    let gap_top = MAP_HEIGHT as i32 / 2 - 2;
    let gap_bottom = MAP_HEIGHT as i32 / 2 + 1;
    map.set_walkable(TilePos::new(39, 0), TilePos::new(40, gap_top - 1), false);
    map.set_walkable(
        TilePos::new(39, gap_bottom + 1),
        TilePos::new(40, MAP_HEIGHT as i32 - 1),
        false,
    );
    map.set_elevation(TilePos::new(60, 0), TilePos::new(MAP_WIDTH as i32 - 1, MAP_HEIGHT as i32 - 1), 1);

    let mid_y = (MAP_HEIGHT as f32 / 2.0) * 32.0;
    map.add_choke(Choke {
        id: ChokeId(1),
        center: Vec2::new(40.0 * 32.0, mid_y),
        end1: Vec2::new(40.0 * 32.0, gap_top as f32 * 32.0),
        end2: Vec2::new(40.0 * 32.0, (gap_bottom + 1) as f32 * 32.0),
        width: 128.0,
        narrow: true,
    });
    let home = Vec2::new(160.0, mid_y);
    let target = Vec2::new(MAP_WIDTH as f32 * 32.0 - 240.0, mid_y);
    map.set_home(home);
    map.add_navigation_grid(target);
    map.add_navigation_grid(home);
    target
}

fn jitter(rng: &mut ChaCha8Rng, around: Vec2, spread: f32) -> Vec2 {
    around + Vec2::new(rng.gen_range(-spread..spread), rng.gen_range(-spread..spread))
}

fn spawn_attackers(
    sandbox: &mut Sandbox,
    rng: &mut ChaCha8Rng,
    count: usize,
) -> warband::Result<Vec<warband::core::types::UnitId>> {
    let rally = sandbox.map.home_position() + Vec2::new(200.0, 0.0);
    let mut units = Vec::with_capacity(count + 2);
    for i in 0..count {
        let kind = match i % 3 {
            0 => roster::BRAWLER,
            1 => roster::RIFLEMAN,
            _ => roster::LANCER,
        };
        units.push(sandbox.spawn(kind, Side::Mine, jitter(rng, rally, 96.0))?);
    }
    units.push(sandbox.spawn(roster::OBSERVER, Side::Mine, rally)?);
    units.push(sandbox.spawn(roster::WARDEN, Side::Mine, rally)?);
    Ok(units)
}

fn spawn_defenders(
    sandbox: &mut Sandbox,
    rng: &mut ChaCha8Rng,
    count: usize,
    target: Vec2,
) -> warband::Result<()> {
    let kinds: [UnitTypeId; 3] = [roster::RIFLEMAN, roster::BRAWLER, roster::RIFLEMAN];
    for i in 0..count {
        let pos = jitter(rng, target - Vec2::new(160.0, 0.0), 128.0);
        let id = sandbox.spawn(kinds[i % kinds.len()], Side::Enemy, pos)?;
        let range = sandbox
            .catalog
            .get(kinds[i % kinds.len()])
            .map_or(32.0, |k| k.max_ground_range());
        sandbox.enemy_grid.add_ground_threat(pos, range + 32.0, 1);
        sandbox.enemy_grid.add_detection(pos, 224.0);
        tracing::debug!(unit = %id, "defender placed");
    }

    let cannon = target - Vec2::new(64.0, 160.0);
    sandbox.spawn(roster::CANNON, Side::Enemy, cannon)?;
    sandbox.enemy_grid.add_static_ground_threat(cannon, 256.0, 2);
    sandbox.enemy_grid.add_detection(cannon, 352.0);

    let shade = sandbox.spawn(roster::SHADE, Side::Enemy, target - Vec2::new(320.0, 0.0))?;
    if let Some(state) = sandbox.units.get_mut(shade) {
        state.undetected = true;
    }
    Ok(())
}

fn snapshot(sandbox: &Sandbox, registry: &SquadRegistry, tick: u64, hits: usize) -> Snapshot {
    let ctx = sandbox.context(tick);
    let alive = |side: Side| sandbox.units.side(side).filter(|s| s.is_alive()).count();
    let squads = registry
        .iter()
        .map(|squad| SquadReport {
            label: squad.label().to_string(),
            policy: squad.policy_name(),
            combat_units: squad.combat_unit_count(),
            needs_detection: squad.needs_detection(),
            units_by_type: squad
                .unit_count_by_type(&ctx)
                .into_iter()
                .map(|(kind, n)| {
                    let name = ctx.catalog.get(kind).map_or_else(|| kind.0.to_string(), |k| k.name.clone());
                    (name, n)
                })
                .collect(),
            clusters: squad
                .clusters()
                .iter()
                .map(|c| ClusterReport {
                    id: c.id.0,
                    units: c.len(),
                    activity: c.activity_name(),
                    sub_activity: c.sub_activity_name(),
                    center: [c.center().x, c.center().y],
                    progress: c.progress(),
                })
                .collect(),
        })
        .collect();
    Snapshot {
        tick,
        my_alive: alive(Side::Mine),
        enemy_alive: alive(Side::Enemy),
        hits,
        squads,
    }
}

fn print_text(report: &RunReport) {
    println!("Tactics Sandbox");
    println!("===============");
    println!("Seed: {}  Ticks: {}", report.seed, report.ticks);
    for snap in &report.snapshots {
        println!();
        println!(
            "[tick {}] mine alive: {}  enemy alive: {}  hits: {}",
            snap.tick, snap.my_alive, snap.enemy_alive, snap.hits
        );
        for squad in &snap.squads {
            println!(
                "  squad {} ({}) - {} combat units{}",
                squad.label,
                squad.policy,
                squad.combat_units,
                if squad.needs_detection { ", needs detection" } else { "" }
            );
            for (kind, n) in &squad.units_by_type {
                println!("    {:<12} x{}", kind, n);
            }
            for c in &squad.clusters {
                println!(
                    "    cluster c{}: {} units, {}/{} at ({:.0}, {:.0}), progress {:.2}",
                    c.id, c.units, c.activity, c.sub_activity, c.center[0], c.center[1], c.progress
                );
            }
        }
    }
}
