use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Every table in the dataset covers one diurnal cycle.
pub const TIMESTEPS: usize = 24;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("{name}: expected {expected} rows but found {found}")]
    RowCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("reading table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// x/y coordinate tables disagree on the number of spatial points at a timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("x and y coordinate rows differ at timestep {timestep}: {x_len} vs {y_len}")]
pub struct ShapeMismatch {
    pub timestep: usize,
    pub x_len: usize,
    pub y_len: usize,
}

/// A token that failed to parse and was stored as `0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub row: usize,
    pub column: usize,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesTable {
    name: String,
    rows: Vec<Vec<f32>>,
}

/// Result of parsing a table: the table itself plus the cells that were
/// recovered as zero.
#[derive(Debug, Clone)]
pub struct TableLoad {
    pub table: TimeSeriesTable,
    pub warnings: Vec<ParseWarning>,
}

impl TimeSeriesTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<TableLoad, TableError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_named(&path.display().to_string(), &text)
    }

    pub fn parse_str(text: &str) -> Result<TableLoad, TableError> {
        Self::parse_named("<inline>", text)
    }

    pub fn parse_named(name: &str, text: &str) -> Result<TableLoad, TableError> {
        let cells = split_rows(name, text)?;
        let mut warnings = Vec::new();
        let rows = cells
            .into_iter()
            .enumerate()
            .map(|(row, line)| parse_row(row, line, &mut warnings))
            .collect();

        Ok(TableLoad {
            table: TimeSeriesTable {
                name: name.to_string(),
                rows,
            },
            warnings,
        })
    }

    /// Builds a table from already-parsed rows; the row count must still be 24.
    pub fn from_rows(name: &str, rows: Vec<Vec<f32>>) -> Result<Self, TableError> {
        if rows.len() != TIMESTEPS {
            return Err(TableError::RowCount {
                name: name.to_string(),
                expected: TIMESTEPS,
                found: rows.len(),
            });
        }
        Ok(TimeSeriesTable {
            name: name.to_string(),
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File stem of the source path, used to derive variable keys.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.name)
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn row(&self, timestep: usize) -> &[f32] {
        self.rows.get(timestep).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn value(&self, timestep: usize, spatial: usize) -> Option<f32> {
        self.rows.get(timestep)?.get(spatial).copied()
    }

    pub fn max_row_len(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn summary(&self, warnings: usize) -> TableSummary {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for value in self.rows.iter().flatten() {
            min = min.min(*value);
            max = max.max(*value);
        }
        let (min, max) = if min <= max { (Some(min), Some(max)) } else { (None, None) };
        TableSummary {
            name: self.name.clone(),
            rows: self.rows.len(),
            min_row_len: self.rows.iter().map(Vec::len).min().unwrap_or(0),
            max_row_len: self.max_row_len(),
            value_min: min,
            value_max: max,
            warnings,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
    pub min_row_len: usize,
    pub max_row_len: usize,
    pub value_min: Option<f32>,
    pub value_max: Option<f32>,
    pub warnings: usize,
}

/// Horizontal coordinates shared by every group.
#[derive(Debug, Clone)]
pub struct CoordinateTables {
    pub x: TimeSeriesTable,
    pub y: TimeSeriesTable,
}

impl CoordinateTables {
    pub fn from_tables(x: TimeSeriesTable, y: TimeSeriesTable) -> Self {
        Self { x, y }
    }

    /// Splits rows of `[x,y]` pairs into parallel x and y tables. A dangling
    /// odd cell lands in x only, which later shows up as a shape mismatch.
    pub fn parse_pairs(name: &str, text: &str) -> Result<(Self, Vec<ParseWarning>), TableError> {
        let TableLoad { table, warnings } = TimeSeriesTable::parse_named(name, text)?;
        let mut x_rows = Vec::with_capacity(TIMESTEPS);
        let mut y_rows = Vec::with_capacity(TIMESTEPS);
        for row in table.rows() {
            x_rows.push(row.iter().step_by(2).copied().collect());
            y_rows.push(row.iter().skip(1).step_by(2).copied().collect());
        }
        let x = TimeSeriesTable::from_rows(&format!("{name}#x"), x_rows)?;
        let y = TimeSeriesTable::from_rows(&format!("{name}#y"), y_rows)?;
        Ok((Self { x, y }, warnings))
    }

    pub fn load_pairs<P: AsRef<Path>>(path: P) -> Result<(Self, Vec<ParseWarning>), TableError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_pairs(&path.display().to_string(), &text)
    }

    /// Number of spatial points at `timestep`, or the mismatch that makes the
    /// timestep unusable.
    pub fn check_timestep(&self, timestep: usize) -> Result<usize, ShapeMismatch> {
        let x_len = self.x.row(timestep).len();
        let y_len = self.y.row(timestep).len();
        if x_len != y_len {
            return Err(ShapeMismatch {
                timestep,
                x_len,
                y_len,
            });
        }
        Ok(x_len)
    }

    pub fn point(&self, timestep: usize, spatial: usize) -> Option<(f32, f32)> {
        Some((
            self.x.value(timestep, spatial)?,
            self.y.value(timestep, spatial)?,
        ))
    }

    pub fn max_points(&self) -> usize {
        self.x.max_row_len()
    }
}

fn split_rows<'a>(name: &str, text: &'a str) -> Result<Vec<&'a str>, TableError> {
    let rows: Vec<&str> = text.trim().split('\n').map(str::trim).collect();
    if rows.len() != TIMESTEPS {
        return Err(TableError::RowCount {
            name: name.to_string(),
            expected: TIMESTEPS,
            found: rows.len(),
        });
    }
    Ok(rows)
}

fn parse_row(row: usize, line: &str, warnings: &mut Vec<ParseWarning>) -> Vec<f32> {
    let body = line.strip_prefix('[').unwrap_or(line);
    let body = body.strip_suffix(']').unwrap_or(body);
    body.split(',')
        .enumerate()
        .map(|(column, raw)| {
            let token = raw.trim().trim_matches(|c| c == '[' || c == ']').trim();
            match token.parse::<f32>() {
                Ok(value) if value.is_finite() => value,
                _ => {
                    warnings.push(ParseWarning {
                        row,
                        column,
                        token: token.to_string(),
                    });
                    0.0
                }
            }
        })
        .collect()
}
