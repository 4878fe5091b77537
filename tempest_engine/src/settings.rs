use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tempest_formats::{CoordinateTables, DataLayout, ParseWarning, TimeSeriesTable};

use crate::group::{GroupSource, LayerKind};
use crate::placement::{OriginMode, OriginTrack};
use crate::pool::PoolConfig;
use crate::ranges::{RangeMode, VariableRange, VariableRangeRegistry};
use crate::visual::VisualKind;

/// Extra range registration; wins over the built-in table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSetting {
    pub key: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    pub name: String,
    /// `z*` height tables.
    pub heights: Vec<PathBuf>,
    pub data: Vec<PathBuf>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub x_points: Option<PathBuf>,
    pub y_points: Option<PathBuf>,
    /// Single file of `[x,y]` pairs, used instead of `x_points`/`y_points`.
    pub coordinate_pairs: Option<PathBuf>,
    pub origin_track: Option<PathBuf>,
    pub spread_factor: f32,
    pub scale_factor: f32,
    /// Seconds between timestep transitions.
    pub move_interval: f32,
    pub start_timestep: usize,
    pub display_mode: VisualKind,
    pub range_mode: RangeMode,
    pub warmup_batch: usize,
    pub pool_headroom: f32,
    pub ranges: Vec<RangeSetting>,
    pub timestamps: Vec<String>,
    pub groups: Vec<GroupSettings>,
    /// Sea-level pressure tables drawn as the surface layer.
    pub surface: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            x_points: None,
            y_points: None,
            coordinate_pairs: None,
            origin_track: None,
            spread_factor: 1.0,
            scale_factor: 1.0,
            move_interval: 1.0,
            start_timestep: 0,
            display_mode: VisualKind::default(),
            range_mode: RangeMode::default(),
            warmup_batch: PoolConfig::DEFAULT_BATCH,
            pool_headroom: PoolConfig::DEFAULT_HEADROOM,
            ranges: Vec::new(),
            timestamps: Vec::new(),
            groups: Vec::new(),
            surface: Vec::new(),
        }
    }
}

/// Everything read from disk for one run.
#[derive(Debug)]
pub struct LoadedData {
    pub coords: CoordinateTables,
    pub origin: OriginMode,
    /// Group sources paired with their initial enabled flag.
    pub groups: Vec<(GroupSource, bool)>,
    pub warnings: usize,
}

impl Settings {
    /// Reads a JSON settings file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let mut settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        settings.resolve_paths(base);
        Ok(settings)
    }

    /// Settings for a discovered data directory, every other field at its
    /// default.
    pub fn from_layout(layout: &DataLayout) -> Self {
        let groups = layout
            .groups
            .iter()
            .map(|group| GroupSettings {
                name: group.name.clone(),
                heights: group.height_files.clone(),
                data: group.data_files.clone(),
                disabled: false,
            })
            .collect();
        Self {
            x_points: Some(layout.x_points.clone()),
            y_points: Some(layout.y_points.clone()),
            origin_track: layout.origin_track.clone(),
            groups,
            surface: layout.surface.clone(),
            ..Self::default()
        }
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        for path in [
            &mut self.x_points,
            &mut self.y_points,
            &mut self.coordinate_pairs,
            &mut self.origin_track,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
        for group in &mut self.groups {
            group.heights.iter_mut().for_each(resolve);
            group.data.iter_mut().for_each(resolve);
        }
        self.surface.iter_mut().for_each(resolve);
    }

    pub fn registry(&self) -> VariableRangeRegistry {
        let mut registry = VariableRangeRegistry::with_builtin_ranges(self.range_mode);
        registry.register_first(
            self.ranges
                .iter()
                .map(|range| VariableRange::new(range.key.clone(), range.min, range.max)),
        );
        registry
    }

    pub fn pool_headroom(&self) -> f32 {
        if self.pool_headroom < 1.0 {
            log::warn!(
                "pool headroom {} is below 1.0; using 1.0",
                self.pool_headroom
            );
            return 1.0;
        }
        self.pool_headroom
    }

    /// Loads every table the settings reference. A table with the wrong row
    /// count aborts loading.
    pub fn load_data(&self) -> Result<LoadedData> {
        let mut warnings = 0;

        let coords = match (&self.coordinate_pairs, &self.x_points, &self.y_points) {
            (Some(pairs), _, _) => {
                let (coords, parse_warnings) = CoordinateTables::load_pairs(pairs)
                    .with_context(|| format!("loading coordinate pairs {}", pairs.display()))?;
                warnings += report_warnings(&pairs.display().to_string(), &parse_warnings);
                coords
            }
            (None, Some(x), Some(y)) => {
                let x = load_table(x, &mut warnings)?;
                let y = load_table(y, &mut warnings)?;
                CoordinateTables::from_tables(x, y)
            }
            _ => bail!("settings need either coordinate_pairs or both x_points and y_points"),
        };

        let origin = match &self.origin_track {
            Some(path) => {
                let (track, parse_warnings) = CoordinateTables::load_pairs(path)
                    .with_context(|| format!("loading origin track {}", path.display()))?;
                warnings += report_warnings(&path.display().to_string(), &parse_warnings);
                OriginMode::Track(OriginTrack::from_pairs(&track))
            }
            None => OriginMode::Fixed,
        };

        let mut groups = Vec::with_capacity(self.groups.len() + 1);
        for group in &self.groups {
            let source = GroupSource {
                name: group.name.clone(),
                layer: LayerKind::Volume,
                heights: load_tables(&group.heights, &mut warnings)
                    .with_context(|| format!("loading heights of group '{}'", group.name))?,
                data: load_tables(&group.data, &mut warnings)
                    .with_context(|| format!("loading data of group '{}'", group.name))?,
            };
            groups.push((source, !group.disabled));
        }
        if !self.surface.is_empty() {
            let source = GroupSource {
                name: "surface".to_string(),
                layer: LayerKind::Surface,
                heights: Vec::new(),
                data: load_tables(&self.surface, &mut warnings)
                    .context("loading surface layer")?,
            };
            groups.push((source, true));
        }

        Ok(LoadedData {
            coords,
            origin,
            groups,
            warnings,
        })
    }
}

fn load_table(path: &Path, warnings: &mut usize) -> Result<TimeSeriesTable> {
    let load = TimeSeriesTable::load(path)?;
    *warnings += report_warnings(load.table.name(), &load.warnings);
    Ok(load.table)
}

fn load_tables(paths: &[PathBuf], warnings: &mut usize) -> Result<Vec<TimeSeriesTable>> {
    paths.iter().map(|path| load_table(path, warnings)).collect()
}

fn report_warnings(name: &str, warnings: &[ParseWarning]) -> usize {
    for warning in warnings {
        log::warn!(
            "{name}: row {} column {}: could not parse '{}', using 0",
            warning.row,
            warning.column,
            warning.token
        );
    }
    warnings.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempest_formats::TIMESTEPS;
    use tempfile::tempdir;

    fn write_rows(path: &Path, row: &str) {
        fs::write(path, vec![row; TIMESTEPS].join("\n")).unwrap();
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{ "spread_factor": 3.0 }"#).unwrap();
        assert_eq!(settings.spread_factor, 3.0);
        assert_eq!(settings.warmup_batch, 100);
        assert_eq!(settings.range_mode, RangeMode::Strict);
        assert_eq!(settings.display_mode, VisualKind::Ellipsoid);
    }

    #[test]
    fn relative_paths_follow_the_settings_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("tempest.json");
        fs::write(
            &path,
            r#"{
                "coordinate_pairs": "coords.txt",
                "range_mode": "legacy",
                "display_mode": "numeric_label",
                "groups": [{ "name": "temp", "data": ["t/data_t.txt"] }]
            }"#,
        )?;
        let settings = Settings::load(&path)?;
        assert_eq!(settings.coordinate_pairs, Some(dir.path().join("coords.txt")));
        assert_eq!(settings.groups[0].data[0], dir.path().join("t/data_t.txt"));
        assert_eq!(settings.range_mode, RangeMode::Legacy);
        assert_eq!(settings.display_mode, VisualKind::NumericLabel);
        Ok(())
    }

    #[test]
    fn configured_ranges_take_precedence() {
        let settings = Settings {
            ranges: vec![RangeSetting {
                key: "t".into(),
                min: 0.0,
                max: 10.0,
            }],
            ..Settings::default()
        };
        let registry = settings.registry();
        assert_eq!(registry.normalize("t", 5.0, 0).unwrap(), 0.5);
    }

    #[test]
    fn load_data_reads_groups_and_surface() -> Result<()> {
        let dir = tempdir()?;
        write_rows(&dir.path().join("pairs.txt"), "[1,2],[3,4]");
        write_rows(&dir.path().join("z_t.txt"), "100,200");
        write_rows(&dir.path().join("data_t.txt"), "250,260");
        write_rows(&dir.path().join("mslp.txt"), "100000,x");

        let settings = Settings {
            coordinate_pairs: Some(dir.path().join("pairs.txt")),
            groups: vec![GroupSettings {
                name: "temp".into(),
                heights: vec![dir.path().join("z_t.txt")],
                data: vec![dir.path().join("data_t.txt")],
                disabled: true,
            }],
            surface: vec![dir.path().join("mslp.txt")],
            ..Settings::default()
        };
        let loaded = settings.load_data()?;
        assert_eq!(loaded.coords.max_points(), 2);
        assert_eq!(loaded.groups.len(), 2);
        assert!(!loaded.groups[0].1);
        assert_eq!(loaded.groups[1].0.layer, LayerKind::Surface);
        assert_eq!(loaded.warnings, TIMESTEPS);
        Ok(())
    }

    #[test]
    fn short_table_aborts_loading() -> Result<()> {
        let dir = tempdir()?;
        write_rows(&dir.path().join("pairs.txt"), "[1,2]");
        fs::write(dir.path().join("data_t.txt"), "1\n2\n3")?;
        let settings = Settings {
            coordinate_pairs: Some(dir.path().join("pairs.txt")),
            groups: vec![GroupSettings {
                name: "temp".into(),
                data: vec![dir.path().join("data_t.txt")],
                ..GroupSettings::default()
            }],
            ..Settings::default()
        };
        let err = settings.load_data().unwrap_err();
        assert!(format!("{err:#}").contains("expected 24 rows"));
        Ok(())
    }

    #[test]
    fn coordinates_are_required() {
        let err = Settings::default().load_data().unwrap_err();
        assert!(err.to_string().contains("coordinate_pairs"));
    }
}
