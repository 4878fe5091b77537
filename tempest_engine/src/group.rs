//! One independent visualization: a set of data tables that share a pool,
//! drawn at the positions given by the shared coordinate tables.

use serde::Serialize;
use tempest_formats::{CoordinateTables, ShapeMismatch, TimeSeriesTable, TIMESTEPS};
use thiserror::Error;

use crate::palette::PaletteProvider;
use crate::placement::{HeightScale, LogHeightScale, PlacementEngine};
use crate::point_cache::TimestepMatch;
use crate::pool::{EntityId, PointBinding, PoolConfig, VisualPool};
use crate::ranges::{RangeError, VariableRangeRegistry, SURFACE_KEY};
use crate::scene::{EntityHandle, PrefabKind, Scene};
use crate::visual::{apply_sample, surface_scale, Jitter, VisualKind};

/// Elevation of surface tiles.
pub const SURFACE_HEIGHT: f32 = 1.0;

#[derive(Debug, Error)]
pub enum PassError {
    #[error("group '{group}': {source}")]
    ShapeMismatch {
        group: String,
        #[source]
        source: ShapeMismatch,
    },
    #[error("group '{group}': {source}")]
    Range {
        group: String,
        #[source]
        source: RangeError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Points placed at the height of their matching `z*` table.
    #[default]
    Volume,
    /// Flat tiles at a fixed elevation, coloured by sea-level pressure.
    Surface,
}

/// Tables that make up one group before it is attached to a scene.
#[derive(Debug, Clone)]
pub struct GroupSource {
    pub name: String,
    pub layer: LayerKind,
    pub heights: Vec<TimeSeriesTable>,
    pub data: Vec<TimeSeriesTable>,
}

#[derive(Debug, Clone)]
struct DataSeries {
    table: TimeSeriesTable,
    /// Key used for range lookup; the data stem for volume layers.
    range_key: String,
    /// Registry key of the matched range, used to pick a palette.
    palette_key: String,
    variable: Option<usize>,
    heights: Option<usize>,
}

/// Per-pass inputs shared by every group.
pub struct PassContext<'a, H = LogHeightScale> {
    pub coords: &'a CoordinateTables,
    pub registry: &'a VariableRangeRegistry,
    pub palette: &'a dyn PaletteProvider,
    pub placement: &'a PlacementEngine<H>,
    pub display_mode: VisualKind,
    pub scale_factor: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub group: String,
    pub timestep: usize,
    pub released: usize,
    pub active: usize,
    /// Cells with no value in a data or height row at this timestep.
    pub skipped: usize,
    /// Entities whose cache had no exact sample for the timestep.
    pub approximate: usize,
    pub exhausted: usize,
}

#[derive(Debug)]
pub struct VisualizationGroup {
    name: String,
    layer: LayerKind,
    heights: Vec<TimeSeriesTable>,
    series: Vec<DataSeries>,
    pool: VisualPool,
    root: EntityHandle,
    active: Vec<EntityId>,
    enabled: bool,
    jitter: Jitter,
}

/// Index of the first height table whose stem, minus its leading `z`, occurs
/// in the data stem.
pub fn match_height_table(heights: &[TimeSeriesTable], data_stem: &str) -> Option<usize> {
    heights.iter().position(|table| {
        let stem = table.stem();
        let geo = stem.get(1..).unwrap_or("");
        data_stem.contains(geo)
    })
}

impl VisualizationGroup {
    /// Resolves every data table against `registry` and spawns the group's
    /// root node. Fails when a variable has no range in strict mode.
    pub fn new<S: Scene>(
        scene: &mut S,
        source: GroupSource,
        coords: &CoordinateTables,
        registry: &VariableRangeRegistry,
        headroom: f32,
        batch_size: usize,
    ) -> Result<Self, RangeError> {
        let GroupSource {
            name,
            layer,
            heights,
            data,
        } = source;

        let mut series = Vec::with_capacity(data.len());
        for table in data {
            let stem = table.stem().to_string();
            let range_key = match layer {
                LayerKind::Volume => stem.clone(),
                LayerKind::Surface => SURFACE_KEY.to_string(),
            };
            registry.check(&range_key)?;
            let lookup = registry.lookup(&range_key);
            let palette_key = lookup
                .map(|(_, range)| range.key.clone())
                .unwrap_or_else(|| range_key.clone());
            let variable = lookup.map(|(index, _)| index);

            let height_table = match layer {
                LayerKind::Volume if heights.is_empty() => None,
                LayerKind::Volume => Some(match_height_table(&heights, &stem).unwrap_or_else(|| {
                    log::warn!(
                        "group '{name}': no height table matches '{stem}'; using '{}'",
                        heights[0].stem()
                    );
                    0
                })),
                LayerKind::Surface => None,
            };

            series.push(DataSeries {
                table,
                range_key,
                palette_key,
                variable,
                heights: height_table,
            });
        }
        if layer == LayerKind::Volume && heights.is_empty() {
            log::warn!("group '{name}' has no height tables; points sit at elevation 0");
        }

        let mut config = PoolConfig::for_load(coords.max_points(), series.len(), headroom);
        config.batch_size = batch_size.max(1);

        let root = scene.spawn(PrefabKind::GroupRoot);
        scene.set_active(root, true);
        let pool = VisualPool::new(name.clone(), config).with_parent(root);

        log::info!(
            "group '{name}': {} data tables, {} height tables, pool capacity {}",
            series.len(),
            heights.len(),
            config.capacity
        );

        let seed = name.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        Ok(Self {
            name,
            layer,
            heights,
            series,
            pool,
            root,
            active: Vec::new(),
            enabled: true,
            jitter: Jitter::new(seed),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> LayerKind {
        self.layer
    }

    pub fn root(&self) -> EntityHandle {
        self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_ready(&self) -> bool {
        self.pool.is_ready()
    }

    pub fn pool(&self) -> &VisualPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut VisualPool {
        &mut self.pool
    }

    pub fn active(&self) -> &[EntityId] {
        &self.active
    }

    /// Variable keys in data-table order.
    pub fn variable_keys(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|series| series.palette_key.as_str())
    }

    /// Height table index matched to each data table.
    pub fn height_matches(&self) -> Vec<Option<usize>> {
        self.series.iter().map(|series| series.heights).collect()
    }

    /// Returns every active entity to the pool.
    pub fn release_active<S: Scene>(&mut self, scene: &mut S) -> usize {
        let mut released = 0;
        for id in self.active.drain(..) {
            if self.pool.release(scene, id) {
                released += 1;
            }
        }
        released
    }

    pub fn set_enabled<S: Scene>(&mut self, scene: &mut S, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            let released = self.release_active(scene);
            log::debug!("group '{}' disabled, released {released} entities", self.name);
        }
        scene.set_active(self.root, enabled);
    }

    /// Shows the timestep before `timestep`, which is what was on screen
    /// while the group was hidden.
    pub fn show_initial<S: Scene, H: HeightScale>(
        &mut self,
        scene: &mut S,
        ctx: &PassContext<'_, H>,
        timestep: usize,
    ) -> Result<PassReport, PassError> {
        let previous = (timestep % TIMESTEPS + TIMESTEPS - 1) % TIMESTEPS;
        self.pass(scene, ctx, previous)
    }

    /// Replaces the group's entities with the ones for `timestep`.
    pub fn pass<S: Scene, H: HeightScale>(
        &mut self,
        scene: &mut S,
        ctx: &PassContext<'_, H>,
        timestep: usize,
    ) -> Result<PassReport, PassError> {
        let released = self.release_active(scene);
        let mut report = PassReport {
            group: self.name.clone(),
            timestep,
            released,
            ..PassReport::default()
        };

        let points = ctx.coords.check_timestep(timestep).map_err(|source| {
            log::error!("group '{}': {source}", self.name);
            PassError::ShapeMismatch {
                group: self.name.clone(),
                source,
            }
        })?;

        let exhausted_before = self.pool.stats().exhaustions;
        let kind = match self.layer {
            LayerKind::Volume => ctx.display_mode,
            LayerKind::Surface => VisualKind::Ellipsoid,
        };

        for spatial in 0..points {
            for data_file in 0..self.series.len() {
                let series = &self.series[data_file];
                let heights = series.heights.and_then(|index| self.heights.get(index));
                if series.table.value(timestep, spatial).is_none()
                    || heights.is_some_and(|table| table.value(timestep, spatial).is_none())
                {
                    log::warn!(
                        "group '{}': '{}' has no value for point {spatial} at timestep {timestep}",
                        self.name,
                        series.table.stem()
                    );
                    report.skipped += 1;
                    continue;
                }

                let binding = PointBinding {
                    spatial,
                    data_file,
                    variable: series.variable,
                };
                let id = self.pool.acquire(scene);
                self.active.push(id);

                let matched = self.populate(id, binding, timestep, ctx.registry)?;
                if let TimestepMatch::Approximate { index } = matched {
                    log::warn!(
                        "group '{}': no sample for '{}' point {spatial} at timestep {timestep}; showing cached entry {index}",
                        self.name,
                        self.series[data_file].table.stem()
                    );
                    report.approximate += 1;
                }

                let Some(handle) = self.pool.show(scene, id, kind) else {
                    continue;
                };
                let Some(entity) = self.pool.get_mut(id) else {
                    continue;
                };
                let sample = entity.cache().current_sample();
                entity.mark_populated();

                let series = &self.series[data_file];
                let color = ctx.palette.color(&series.palette_key, sample.normalized);
                match self.layer {
                    LayerKind::Volume => apply_sample(
                        scene,
                        handle,
                        kind,
                        sample,
                        color,
                        ctx.scale_factor,
                        &mut self.jitter,
                    ),
                    LayerKind::Surface => {
                        scene.set_material_color(handle, color);
                        scene.set_local_scale(handle, surface_scale(sample.normalized, ctx.scale_factor));
                    }
                }

                let fixed_height = match self.layer {
                    LayerKind::Volume => 0.0,
                    LayerKind::Surface => SURFACE_HEIGHT,
                };
                let heights = series.heights.and_then(|index| self.heights.get(index));
                if let Some(position) =
                    ctx.placement
                        .place(ctx.coords, heights, fixed_height, timestep, spatial)
                {
                    scene.set_local_position(handle, position);
                }
            }
        }

        report.active = self.active.len();
        report.exhausted = self.pool.stats().exhaustions - exhausted_before;
        log::debug!(
            "group '{}' timestep {timestep}: {} active, {} released",
            self.name,
            report.active,
            report.released
        );
        Ok(report)
    }

    /// Binds `id` to a cell and fills its cache with every timestep the cell
    /// has a value for.
    fn populate(
        &mut self,
        id: EntityId,
        binding: PointBinding,
        timestep: usize,
        registry: &VariableRangeRegistry,
    ) -> Result<TimestepMatch, PassError> {
        let series = &self.series[binding.data_file];
        let Some(entity) = self.pool.get_mut(id) else {
            return Ok(TimestepMatch::Empty);
        };
        entity.bind(binding);

        if !entity.cache().is_complete() {
            for t in 0..TIMESTEPS {
                let Some(raw) = series.table.value(t, binding.spatial) else {
                    continue;
                };
                let normalized = registry
                    .normalize(&series.range_key, raw, binding.data_file)
                    .map_err(|source| PassError::Range {
                        group: self.name.clone(),
                        source,
                    })?;
                entity.cache_mut().add_sample(t, raw, normalized);
            }
        }
        Ok(entity.cache_mut().set_current_timestep(timestep))
    }

    pub fn teardown<S: Scene>(&mut self, scene: &mut S) {
        self.active.clear();
        self.pool.teardown(scene);
        scene.destroy(self.root);
    }
}
