use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use walkdir::WalkDir;

pub const X_POINTS_FILE: &str = "x_points.txt";
pub const Y_POINTS_FILE: &str = "y_points.txt";
pub const ORIGIN_TRACK_FILE: &str = "origin_track.txt";
pub const SURFACE_DIR: &str = "surface";

/// Table files for one visualization group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupFiles {
    pub name: String,
    pub height_files: Vec<PathBuf>,
    pub data_files: Vec<PathBuf>,
}

/// A dataset directory:
///
/// ```text
/// root/
///   x_points.txt  y_points.txt  [origin_track.txt]
///   r_levels/  z500.txt z850.txt r_500.txt r_850.txt
///   surface/   mslp.txt
/// ```
///
/// Files whose name starts with `z` are height tables; every other `.txt`
/// file in a group directory is a variable table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataLayout {
    pub root: PathBuf,
    pub x_points: PathBuf,
    pub y_points: PathBuf,
    pub origin_track: Option<PathBuf>,
    pub groups: Vec<GroupFiles>,
    pub surface: Vec<PathBuf>,
}

impl DataLayout {
    pub fn discover(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("data root {} is not a directory", root.display());
        }

        let x_points = root.join(X_POINTS_FILE);
        let y_points = root.join(Y_POINTS_FILE);
        for path in [&x_points, &y_points] {
            if !path.is_file() {
                bail!("missing coordinate table {}", path.display());
            }
        }
        let origin_track = Some(root.join(ORIGIN_TRACK_FILE)).filter(|path| path.is_file());

        let mut groups: BTreeMap<String, GroupFiles> = BTreeMap::new();
        let mut surface = Vec::new();

        for entry in WalkDir::new(root).min_depth(2).max_depth(2) {
            let entry =
                entry.with_context(|| format!("traversing data root {}", root.display()))?;
            if !entry.file_type().is_file() || !is_table(entry.path()) {
                continue;
            }
            let Some(dir_name) = entry
                .path()
                .parent()
                .and_then(|parent| parent.file_name())
                .and_then(|name| name.to_str())
            else {
                continue;
            };

            if dir_name.eq_ignore_ascii_case(SURFACE_DIR) {
                surface.push(entry.into_path());
                continue;
            }

            let group = groups
                .entry(dir_name.to_string())
                .or_insert_with(|| GroupFiles {
                    name: dir_name.to_string(),
                    ..GroupFiles::default()
                });
            if is_height_table(entry.path()) {
                group.height_files.push(entry.into_path());
            } else {
                group.data_files.push(entry.into_path());
            }
        }

        let mut groups: Vec<GroupFiles> = groups.into_values().collect();
        for group in &mut groups {
            group.height_files.sort();
            group.data_files.sort();
        }
        surface.sort();

        Ok(DataLayout {
            root: root.to_path_buf(),
            x_points,
            y_points,
            origin_track,
            groups,
            surface,
        })
    }
}

fn is_table(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false)
}

fn is_height_table(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('z') || name.starts_with('Z'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn discovers_groups_and_surface() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(X_POINTS_FILE), "").unwrap();
        fs::write(root.join(Y_POINTS_FILE), "").unwrap();
        fs::create_dir(root.join("t_levels")).unwrap();
        fs::write(root.join("t_levels").join("z850.txt"), "").unwrap();
        fs::write(root.join("t_levels").join("t_850.txt"), "").unwrap();
        fs::write(root.join("t_levels").join("notes.md"), "").unwrap();
        fs::create_dir(root.join(SURFACE_DIR)).unwrap();
        fs::write(root.join(SURFACE_DIR).join("mslp.txt"), "").unwrap();

        let layout = DataLayout::discover(root).unwrap();
        assert_eq!(layout.origin_track, None);
        assert_eq!(layout.groups.len(), 1);
        let group = &layout.groups[0];
        assert_eq!(group.name, "t_levels");
        assert_eq!(group.height_files, vec![root.join("t_levels").join("z850.txt")]);
        assert_eq!(group.data_files, vec![root.join("t_levels").join("t_850.txt")]);
        assert_eq!(layout.surface, vec![root.join(SURFACE_DIR).join("mslp.txt")]);
    }

    #[test]
    fn missing_coordinates_fail() {
        let dir = tempdir().unwrap();
        let err = DataLayout::discover(dir.path()).unwrap_err();
        assert!(err.to_string().contains(X_POINTS_FILE));
    }
}
