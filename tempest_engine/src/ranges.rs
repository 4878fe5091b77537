use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("no range registered for variable '{key}'")]
    MissingRangeEntry { key: String },
}

/// What `normalize` does when no registered range matches the key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMode {
    #[default]
    Strict,
    /// Returns the data file index in place of a normalized value. Kept for
    /// parity with old datasets; the result is not in [0,1].
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRange {
    pub key: String,
    pub min: f64,
    pub max: f64,
}

impl VariableRange {
    pub fn new(key: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            key: key.into(),
            min,
            max,
        }
    }

    pub fn normalize(&self, raw: f32) -> f32 {
        if raw.is_nan() {
            return 0.0;
        }
        // Samples are f32, so compare against bounds at the same precision.
        let min = self.min as f32 as f64;
        let max = self.max as f32 as f64;
        let raw = raw as f64;
        if max == min {
            return if raw >= min { 1.0 } else { 0.0 };
        }
        let norm = (raw - min) / (max - min);
        (norm as f32).clamp(0.0, 1.0)
    }
}

/// Ranges of the hurricane dataset, in lookup order. Single-letter keys match
/// by substring, so their order decides which variable a file maps to.
pub const BUILTIN_RANGES: &[(&str, f64, f64)] = &[
    ("r", -3.8280, 138.0896),
    ("t", 187.4324, 305.06531),
    ("u", -45.1580, 41.9673),
    ("v", -43.2251, 54.0019),
    ("d", -0.0009, 0.0008),
    ("cc", 0.0039, 1.0),
    ("o3", 4.7788e-08, 1.60598e-05),
    ("pv", -3.1504e-05, 0.000271),
    ("ciwc", 2.9802e-08, 0.00113),
    ("clwc", 1.1920e-07, 0.0007518),
    ("q", 1.61099e-08, 0.02393),
    ("crwc", 1.28579e-10, 0.00205),
    ("cswc", 2.32830e-10, 0.007559),
    ("w", -10.3504, 3.58344),
    ("vo", -0.000440, 0.0020763),
];

/// Key of the surface pressure layer.
pub const SURFACE_KEY: &str = "mslp";
pub const SURFACE_RANGE: (f64, f64) = (96418.9375, 102169.5625);

#[derive(Debug, Clone, Default)]
pub struct VariableRangeRegistry {
    entries: Vec<VariableRange>,
    mode: RangeMode,
}

impl VariableRangeRegistry {
    pub fn new(mode: RangeMode) -> Self {
        Self {
            entries: Vec::new(),
            mode,
        }
    }

    pub fn with_builtin_ranges(mode: RangeMode) -> Self {
        let mut registry = Self::new(mode);
        for (key, min, max) in BUILTIN_RANGES {
            registry.register(*key, *min, *max);
        }
        registry.register(SURFACE_KEY, SURFACE_RANGE.0, SURFACE_RANGE.1);
        registry
    }

    pub fn mode(&self) -> RangeMode {
        self.mode
    }

    pub fn register(&mut self, key: impl Into<String>, min: f64, max: f64) {
        self.entries.push(VariableRange::new(key, min, max));
    }

    /// Registers ranges that must win over anything already present.
    pub fn register_first<I>(&mut self, ranges: I)
    where
        I: IntoIterator<Item = VariableRange>,
    {
        let mut front: Vec<VariableRange> = ranges.into_iter().collect();
        front.append(&mut self.entries);
        self.entries = front;
    }

    pub fn entries(&self) -> &[VariableRange] {
        &self.entries
    }

    /// First registered entry whose key occurs in `key`.
    pub fn lookup(&self, key: &str) -> Option<(usize, &VariableRange)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| key.contains(entry.key.as_str()))
    }

    pub fn variable_index(&self, key: &str) -> Option<usize> {
        self.lookup(key).map(|(index, _)| index)
    }

    pub fn normalize(&self, key: &str, raw: f32, file_index: usize) -> Result<f32, RangeError> {
        if let Some((_, range)) = self.lookup(key) {
            return Ok(range.normalize(raw));
        }
        match self.mode {
            RangeMode::Strict => Err(RangeError::MissingRangeEntry {
                key: key.to_string(),
            }),
            RangeMode::Legacy => {
                log::warn!(
                    "no range for variable '{key}'; using file index {file_index} as its value"
                );
                Ok(file_index as f32)
            }
        }
    }

    /// Resolves `key` up front so strict-mode gaps surface while composing
    /// the runtime rather than mid-playback.
    pub fn check(&self, key: &str) -> Result<(), RangeError> {
        if self.lookup(key).is_some() || self.mode == RangeMode::Legacy {
            return Ok(());
        }
        Err(RangeError::MissingRangeEntry {
            key: key.to_string(),
        })
    }
}
