use anyhow::{bail, Context, Result};
use glam::Vec2;
use serde::Serialize;
use tempest_formats::{CoordinateTables, TIMESTEPS};

use crate::group::{GroupSource, PassContext, PassReport, VisualizationGroup};
use crate::palette::{DiscretePalettes, PaletteProvider};
use crate::placement::PlacementEngine;
use crate::pool::Progress;
use crate::ranges::VariableRangeRegistry;
use crate::scene::Scene;
use crate::scheduler::TimestepScheduler;
use crate::settings::{LoadedData, Settings};
use crate::visual::VisualKind;

/// Read-only inputs of every pipeline pass.
struct Shared {
    coords: CoordinateTables,
    registry: VariableRangeRegistry,
    palette: Box<dyn PaletteProvider>,
    placement: PlacementEngine,
    display_mode: VisualKind,
    scale_factor: f32,
}

impl Shared {
    fn context(&self) -> PassContext<'_> {
        PassContext {
            coords: &self.coords,
            registry: &self.registry,
            palette: self.palette.as_ref(),
            placement: &self.placement,
            display_mode: self.display_mode,
            scale_factor: self.scale_factor,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub frame: u64,
    pub timestep: usize,
    pub label: String,
    /// Centre of the origin track at this timestep, when one is configured.
    pub observer: Option<Vec2>,
    pub groups: Vec<PassReport>,
    pub errors: Vec<String>,
}

impl TickReport {
    pub fn active(&self) -> usize {
        self.groups.iter().map(|group| group.active).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameUpdate {
    pub frame: u64,
    /// Warm-up progress summed over every pool, while warming.
    pub warmup: Option<Progress>,
    pub tick: Option<TickReport>,
}

/// Owns the scene and every group and drives them from `update`.
pub struct Visualization<S: Scene> {
    scene: S,
    groups: Vec<VisualizationGroup>,
    shared: Shared,
    scheduler: TimestepScheduler,
    warmup_batch: usize,
    ready: bool,
    frame: u64,
}

impl<S: Scene> Visualization<S> {
    /// Loads every table named by `settings` and attaches the groups to
    /// `scene`.
    pub fn from_settings(scene: S, settings: &Settings) -> Result<Self> {
        let data = settings.load_data()?;
        Self::from_loaded(scene, settings, data)
    }

    pub fn from_loaded(mut scene: S, settings: &Settings, data: LoadedData) -> Result<Self> {
        let LoadedData {
            coords,
            origin,
            groups: sources,
            warnings,
        } = data;
        if warnings > 0 {
            log::warn!("{warnings} table cells could not be parsed and were read as 0");
        }

        let registry = settings.registry();
        let headroom = settings.pool_headroom();
        let mut groups = Vec::with_capacity(sources.len());
        for (source, enabled) in sources {
            let mut group = build_group(&mut scene, source, &coords, &registry, headroom, settings)?;
            if !enabled {
                group.set_enabled(&mut scene, false);
            }
            groups.push(group);
        }

        let placement = PlacementEngine::new(settings.spread_factor).with_origin(origin);
        let scheduler = TimestepScheduler::new(settings.start_timestep, settings.move_interval);
        let scheduler = if settings.timestamps.is_empty() {
            scheduler
        } else {
            scheduler.with_timestamps(settings.timestamps.clone())
        };

        log::info!(
            "composed {} groups over {} spatial points ({} ranges, {:?} mode, origin {})",
            groups.len(),
            coords.max_points(),
            registry.entries().len(),
            registry.mode(),
            if placement.is_tracking() { "tracked" } else { "fixed" }
        );

        Ok(Self {
            scene,
            groups,
            shared: Shared {
                coords,
                registry,
                palette: Box::new(DiscretePalettes::default()),
                placement,
                display_mode: settings.display_mode,
                scale_factor: settings.scale_factor,
            },
            scheduler,
            warmup_batch: settings.warmup_batch.max(1),
            ready: false,
            frame: 0,
        })
    }

    pub fn with_palette(mut self, palette: Box<dyn PaletteProvider>) -> Self {
        self.shared.palette = palette;
        self
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn groups(&self) -> &[VisualizationGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&VisualizationGroup> {
        self.groups.iter().find(|group| group.name() == name)
    }

    pub fn scheduler(&self) -> &TimestepScheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &VariableRangeRegistry {
        &self.shared.registry
    }

    /// True once every pool finished warming up.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn display_mode(&self) -> VisualKind {
        self.shared.display_mode
    }

    /// Takes effect on the next pass.
    pub fn set_display_mode(&mut self, kind: VisualKind) {
        self.shared.display_mode = kind;
    }

    pub fn cycle_display_mode(&mut self) -> VisualKind {
        self.shared.display_mode = self.shared.display_mode.next();
        self.shared.display_mode
    }

    pub fn set_spread_factor(&mut self, spread_factor: f32) {
        self.shared.placement.set_spread_factor(spread_factor);
    }

    pub fn set_move_interval(&mut self, seconds: f32) {
        self.scheduler.set_interval(seconds);
    }

    pub fn set_interval_from_slider(&mut self, value: f32) {
        self.scheduler.set_interval_from_slider(value);
    }

    pub fn start(&mut self) {
        if self.ready {
            self.scheduler.start();
        }
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Advances warm-up or playback by `dt` seconds.
    pub fn update(&mut self, dt: f32) -> FrameUpdate {
        self.frame += 1;
        if !self.ready {
            let progress = self.step_warmup();
            return FrameUpdate {
                frame: self.frame,
                warmup: Some(progress),
                tick: None,
            };
        }

        let tick = self.scheduler.advance(dt).map(|timestep| self.tick(timestep));
        FrameUpdate {
            frame: self.frame,
            warmup: None,
            tick,
        }
    }

    /// Enables or disables a group by name. Enabling shows the current
    /// timestep right away once pools are ready.
    pub fn set_group_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let Some(group) = self.groups.iter_mut().find(|group| group.name() == name) else {
            bail!("no visualization group named '{name}'");
        };
        group.set_enabled(&mut self.scene, enabled);
        if enabled && self.ready {
            let ctx = self.shared.context();
            let next = (self.scheduler.timestep() + 1) % TIMESTEPS;
            group
                .show_initial(&mut self.scene, &ctx, next)
                .with_context(|| format!("showing group '{name}'"))?;
        }
        Ok(())
    }

    /// Destroys every pooled entity and group root.
    pub fn shutdown(&mut self) {
        self.scheduler.stop();
        for group in &mut self.groups {
            group.teardown(&mut self.scene);
        }
        self.groups.clear();
        self.ready = false;
        log::info!("visualization shut down after {} frames", self.frame);
    }

    pub fn into_scene(self) -> S {
        self.scene
    }

    fn step_warmup(&mut self) -> Progress {
        let mut total = Progress { done: 0, total: 0 };
        for group in &mut self.groups {
            let progress = group.pool_mut().step_warmup(&mut self.scene, self.warmup_batch);
            total.done += progress.done;
            total.total += progress.total;
        }

        if self.groups.iter().all(VisualizationGroup::is_ready) {
            self.ready = true;
            log::info!("all {} pools ready; starting playback", self.groups.len());
            self.show_current();
            self.scheduler.start();
        }
        total
    }

    /// Draws the timestep the scheduler currently points at.
    fn show_current(&mut self) {
        let ctx = self.shared.context();
        let next = (self.scheduler.timestep() + 1) % TIMESTEPS;
        for group in self.groups.iter_mut().filter(|group| group.is_enabled()) {
            if let Err(err) = group.show_initial(&mut self.scene, &ctx, next) {
                log::error!("{err}");
            }
        }
    }

    fn tick(&mut self, timestep: usize) -> TickReport {
        let ctx = self.shared.context();
        let mut report = TickReport {
            frame: self.frame,
            timestep,
            label: self.scheduler.timestamp_label(timestep),
            observer: self
                .shared
                .placement
                .is_tracking()
                .then(|| self.shared.placement.origin(timestep)),
            groups: Vec::with_capacity(self.groups.len()),
            errors: Vec::new(),
        };

        // Each group releases its own previous frame before acquiring.
        for group in self.groups.iter_mut().filter(|group| group.is_enabled()) {
            match group.pass(&mut self.scene, &ctx, timestep) {
                Ok(pass) => report.groups.push(pass),
                Err(err) => report.errors.push(err.to_string()),
            }
        }

        log::debug!(
            "tick {} -> timestep {timestep} ({}): {} active",
            self.frame,
            report.label,
            report.active()
        );
        report
    }
}

fn build_group<S: Scene>(
    scene: &mut S,
    source: GroupSource,
    coords: &CoordinateTables,
    registry: &VariableRangeRegistry,
    headroom: f32,
    settings: &Settings,
) -> Result<VisualizationGroup> {
    let name = source.name.clone();
    VisualizationGroup::new(scene, source, coords, registry, headroom, settings.warmup_batch)
        .with_context(|| format!("composing group '{name}'"))
}
