use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Maps a normalized value of a variable to a display color.
pub trait PaletteProvider {
    fn color(&self, variable: &str, normalized: f32) -> Rgb;
}

/// A discrete lookup table of `len` colors sampled from a few stops.
#[derive(Debug, Clone)]
pub struct ColorTable {
    colors: Vec<Rgb>,
}

impl ColorTable {
    /// Samples `len` evenly spaced colors from piecewise-linear 8-bit stops.
    pub fn from_stops(stops: &[(u8, u8, u8)], len: usize) -> Self {
        let segments = stops.len().saturating_sub(1).max(1);
        let colors = (0..len)
            .map(|i| {
                let t = if len > 1 { i as f32 / (len - 1) as f32 } else { 0.0 };
                let seg = t * segments as f32;
                let idx = (seg as usize).min(segments - 1).min(stops.len() - 1);
                let next = (idx + 1).min(stops.len() - 1);
                let s = seg - idx as f32;
                let (r0, g0, b0) = stops[idx];
                let (r1, g1, b1) = stops[next];
                let lerp = |a: u8, b: u8| (a as f32 + s * (b as f32 - a as f32)) / 255.0;
                Rgb::new(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
            })
            .collect();
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Index is clamped into the table.
    pub fn get(&self, index: i64) -> Rgb {
        let max = self.colors.len().saturating_sub(1) as i64;
        self.colors[index.clamp(0, max) as usize]
    }
}

const RAINBOW: &[(u8, u8, u8)] = &[
    (110, 64, 170),
    (40, 110, 230),
    (30, 190, 200),
    (80, 230, 110),
    (200, 220, 50),
    (255, 140, 40),
    (230, 40, 40),
];
const BLUE_YELLOW_RED: &[(u8, u8, u8)] = &[
    (49, 54, 149),
    (116, 173, 209),
    (255, 255, 191),
    (244, 109, 67),
    (165, 0, 38),
];
const CIVIDIS: &[(u8, u8, u8)] = &[
    (0, 34, 78),
    (61, 77, 110),
    (124, 123, 120),
    (188, 175, 111),
    (254, 232, 56),
];
const INFERNO: &[(u8, u8, u8)] = &[
    (0, 0, 4),
    (87, 16, 110),
    (188, 55, 84),
    (249, 142, 9),
    (252, 255, 164),
];
const MAGMA: &[(u8, u8, u8)] = &[
    (0, 0, 4),
    (81, 18, 124),
    (183, 55, 121),
    (252, 137, 97),
    (252, 253, 191),
];
const VIRIDIS: &[(u8, u8, u8)] = &[
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];
const BLUE_GREEN: &[(u8, u8, u8)] = &[(247, 252, 253), (153, 216, 201), (35, 139, 69), (0, 68, 27)];
const GREEN_BLUE: &[(u8, u8, u8)] = &[(247, 252, 240), (168, 221, 181), (67, 162, 202), (8, 64, 129)];
const RED_YELLOW_GREEN: &[(u8, u8, u8)] = &[
    (165, 0, 38),
    (253, 174, 97),
    (255, 255, 191),
    (166, 217, 106),
    (0, 104, 55),
];
const YELLOW_GREEN: &[(u8, u8, u8)] = &[(255, 255, 229), (194, 230, 153), (49, 163, 84), (0, 69, 41)];

/// How a normalized value becomes a table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexRule {
    /// `floor(c * 255)`
    Full,
    /// `floor(c * 255) / 2` for the 128-entry tables.
    Half,
    /// `floor(c * 253)` for the 254-entry tables.
    Short,
}

impl IndexRule {
    fn index(self, normalized: f32) -> i64 {
        match self {
            IndexRule::Full => (normalized * 255.0) as i64,
            IndexRule::Half => (normalized * 255.0) as i64 / 2,
            IndexRule::Short => (normalized * 253.0) as i64,
        }
    }
}

/// Per-variable discrete palettes of the hurricane dataset.
#[derive(Debug, Clone)]
pub struct DiscretePalettes {
    tables: Vec<(&'static str, ColorTable, IndexRule)>,
    fallback: ColorTable,
}

impl Default for DiscretePalettes {
    fn default() -> Self {
        let tables = vec![
            ("o3", ColorTable::from_stops(BLUE_GREEN, 128), IndexRule::Half),
            ("r", ColorTable::from_stops(RAINBOW, 256), IndexRule::Full),
            ("t", ColorTable::from_stops(BLUE_YELLOW_RED, 254), IndexRule::Short),
            ("q", ColorTable::from_stops(CIVIDIS, 256), IndexRule::Full),
            ("u", ColorTable::from_stops(INFERNO, 256), IndexRule::Full),
            ("d", ColorTable::from_stops(GREEN_BLUE, 128), IndexRule::Half),
            ("v", ColorTable::from_stops(MAGMA, 256), IndexRule::Full),
            ("pv", ColorTable::from_stops(RED_YELLOW_GREEN, 128), IndexRule::Half),
            ("w", ColorTable::from_stops(YELLOW_GREEN, 256), IndexRule::Full),
            ("mslp", ColorTable::from_stops(VIRIDIS, 254), IndexRule::Short),
        ];
        Self {
            tables,
            fallback: ColorTable::from_stops(INFERNO, 256),
        }
    }
}

impl DiscretePalettes {
    fn table_for(&self, variable: &str) -> (&ColorTable, IndexRule) {
        self.tables
            .iter()
            .find(|(key, _, _)| *key == variable)
            .map(|(_, table, rule)| (table, *rule))
            .unwrap_or((&self.fallback, IndexRule::Full))
    }
}

impl PaletteProvider for DiscretePalettes {
    /// `variable` is the registry key (`t`, `o3`, ...), not the file name.
    fn color(&self, variable: &str, normalized: f32) -> Rgb {
        let (table, rule) = self.table_for(variable);
        table.get(rule.index(normalized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_endpoints_match_stops() {
        let table = ColorTable::from_stops(VIRIDIS, 254);
        assert_eq!(table.len(), 254);
        assert_eq!(table.get(0), Rgb::new(68.0 / 255.0, 1.0 / 255.0, 84.0 / 255.0));
        assert_eq!(table.get(253), Rgb::new(253.0 / 255.0, 231.0 / 255.0, 37.0 / 255.0));
    }

    #[test]
    fn out_of_range_indices_clamp() {
        let table = ColorTable::from_stops(INFERNO, 256);
        assert_eq!(table.get(-5), table.get(0));
        assert_eq!(table.get(10_000), table.get(255));
    }

    #[test]
    fn half_tables_cover_full_range() {
        let palettes = DiscretePalettes::default();
        let top = palettes.color("o3", 1.0);
        let (table, _) = palettes.table_for("o3");
        assert_eq!(table.len(), 128);
        assert_eq!(top, table.get(127));
        assert_eq!(palettes.color("o3", 0.0), table.get(0));
    }

    #[test]
    fn unknown_variables_use_inferno() {
        let palettes = DiscretePalettes::default();
        assert_eq!(palettes.color("cc", 0.5), palettes.color("u", 0.5));
    }
}
