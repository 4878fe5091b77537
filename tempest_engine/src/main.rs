use std::collections::BTreeMap;
use std::fs;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tempest_engine::{
    LayerKind, PoolStats, RangeMode, RecordingScene, SceneCounters, Settings, TickReport,
    Visualization,
};
use tempest_formats::DataLayout;

mod cli;
use cli::{Command, DataSource, DescribeArgs, Overrides, RunArgs};

#[derive(Serialize)]
struct PoolSummary {
    group: String,
    layer: LayerKind,
    enabled: bool,
    capacity: usize,
    entities: usize,
    free: usize,
    stats: PoolStats,
}

#[derive(Serialize)]
struct FrameLog<'a> {
    frames: u64,
    ticks: &'a [TickReport],
    pools: Vec<PoolSummary>,
    scene: SceneCounters,
    visible: BTreeMap<String, usize>,
}

fn main() -> Result<()> {
    env_logger::init();

    match cli::parse()? {
        Command::Run(args) => run(args),
        Command::Describe(args) => describe(args),
    }
}

fn load_settings(source: &DataSource, overrides: &Overrides) -> Result<Settings> {
    let mut settings = match source {
        DataSource::Config(path) => Settings::load(path)?,
        DataSource::DataRoot(root) => {
            let layout = DataLayout::discover(root)
                .with_context(|| format!("scanning data root {}", root.display()))?;
            Settings::from_layout(&layout)
        }
    };

    if let Some(kind) = overrides.display_mode {
        settings.display_mode = kind;
    }
    if overrides.legacy_ranges {
        settings.range_mode = RangeMode::Legacy;
    }
    if let Some(interval) = overrides.move_interval {
        settings.move_interval = interval;
    }
    if let Some(spread) = overrides.spread_factor {
        settings.spread_factor = spread;
    }
    Ok(settings)
}

fn compose(source: &DataSource, overrides: &Overrides) -> Result<Visualization<RecordingScene>> {
    let settings = load_settings(source, overrides)?;
    Visualization::from_settings(RecordingScene::new(), &settings).context("composing visualization")
}

fn pool_summaries(visualization: &Visualization<RecordingScene>) -> Vec<PoolSummary> {
    visualization
        .groups()
        .iter()
        .map(|group| PoolSummary {
            group: group.name().to_string(),
            layer: group.layer(),
            enabled: group.is_enabled(),
            capacity: group.pool().config().capacity,
            entities: group.pool().len(),
            free: group.pool().free_len(),
            stats: group.pool().stats(),
        })
        .collect()
}

fn describe(args: DescribeArgs) -> Result<()> {
    let visualization = compose(&args.source, &args.overrides)?;
    println!(
        "{} groups, {:?} ranges, display mode {:?}",
        visualization.groups().len(),
        visualization.registry().mode(),
        visualization.display_mode()
    );
    for group in visualization.groups() {
        let keys: Vec<&str> = group.variable_keys().collect();
        println!(
            "  {} ({:?}{}) variables [{}] pool capacity {}",
            group.name(),
            group.layer(),
            if group.is_enabled() { "" } else { ", disabled" },
            keys.join(", "),
            group.pool().config().capacity
        );
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let mut visualization = compose(&args.source, &args.overrides)?;

    let warmup_frames: usize = visualization
        .groups()
        .iter()
        .map(|group| {
            let config = group.pool().config();
            config.capacity / config.batch_size.max(1) + 2
        })
        .max()
        .unwrap_or(1);
    let frames_per_tick = ((visualization.scheduler().interval() / args.frame_dt).ceil() as usize)
        .saturating_add(1);
    let max_frames = warmup_frames
        .saturating_add(frames_per_tick.saturating_mul(args.ticks))
        .saturating_add(16) as u64;

    let mut ticks: Vec<TickReport> = Vec::with_capacity(args.ticks);
    let mut frames = 0u64;
    while ticks.len() < args.ticks {
        if frames >= max_frames {
            bail!(
                "playback stalled: {} of {} ticks after {frames} frames",
                ticks.len(),
                args.ticks
            );
        }
        let update = visualization.update(args.frame_dt);
        frames = update.frame;
        let Some(tick) = update.tick else {
            continue;
        };
        if args.verbose {
            println!(
                "  [{:>3}] timestep {:>2} {:<16} active {:>5}{}",
                tick.frame,
                tick.timestep,
                tick.label,
                tick.active(),
                if tick.errors.is_empty() {
                    String::new()
                } else {
                    format!(" errors: {}", tick.errors.join("; "))
                }
            );
        }
        ticks.push(tick);
    }

    let pools = pool_summaries(&visualization);
    let snapshot = visualization.scene().snapshot();
    let errors: usize = ticks.iter().map(|tick| tick.errors.len()).sum();
    println!(
        "Played {} ticks over {frames} frames ({} errors)",
        ticks.len(),
        errors
    );
    for pool in &pools {
        println!(
            "  {:<16} capacity {:>6} entities {:>6} free {:>6} exhaustions {}",
            pool.group, pool.capacity, pool.entities, pool.free, pool.stats.exhaustions
        );
    }
    println!(
        "Scene: {} spawned, {} particles emitted",
        snapshot.counters.spawned, snapshot.counters.particles_emitted
    );

    if let Some(path) = args.frame_log_json.as_ref() {
        let log = FrameLog {
            frames,
            ticks: &ticks,
            pools,
            scene: snapshot.counters,
            visible: snapshot.visible,
        };
        let json = serde_json::to_string_pretty(&log).context("serializing frame log to JSON")?;
        fs::write(path, json)
            .with_context(|| format!("writing frame log to {}", path.display()))?;
        println!("Saved frame log to {}", path.display());
    }

    visualization.shutdown();
    Ok(())
}
