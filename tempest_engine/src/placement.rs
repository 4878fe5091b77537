use glam::{Vec2, Vec3};
use tempest_formats::{CoordinateTables, TimeSeriesTable, TIMESTEPS};

const HEIGHT_SCALE: f32 = 20.0;

/// Maps a raw altitude value onto the vertical axis of the scene.
pub trait HeightScale {
    fn scale(&self, height: f32) -> f32;
}

/// Logarithmic vertical scale used by the hurricane dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHeightScale;

impl HeightScale for LogHeightScale {
    fn scale(&self, height: f32) -> f32 {
        scale_height(height)
    }
}

pub fn scale_height(height: f32) -> f32 {
    if height == 0.0 {
        return HEIGHT_SCALE;
    }
    if height < 0.0 {
        // Counts up from zero while still at or below the height; never runs
        // for a negative height, so every negative input lands on the first branch.
        let mut neg_scale = 0.0f32;
        while neg_scale <= height {
            neg_scale += 1.0;
        }
        if neg_scale < 10.0 {
            return neg_scale.max(0.01).log10() * HEIGHT_SCALE / 10.0;
        }
        return -neg_scale.max(10.0).log10() * HEIGHT_SCALE;
    }
    if height < 10.0 {
        return -height.max(0.01).log10() * HEIGHT_SCALE / 10.0;
    }
    height.log10() * HEIGHT_SCALE
}

/// Per-timestep centre points for a user-following origin.
#[derive(Debug, Clone)]
pub struct OriginTrack {
    centres: Vec<Vec2>,
}

impl OriginTrack {
    /// Takes the first `[x,y]` pair of each row.
    pub fn from_pairs(coords: &CoordinateTables) -> Self {
        let centres = (0..TIMESTEPS)
            .map(|t| {
                let (x, y) = coords.point(t, 0).unwrap_or((0.0, 0.0));
                Vec2::new(x, y)
            })
            .collect();
        Self { centres }
    }

    /// Centre shown while `timestep` is on screen. The track lags the data by
    /// one step.
    pub fn centre(&self, timestep: usize, spread_factor: f32) -> Vec2 {
        let lagged = (timestep + TIMESTEPS - 1) % TIMESTEPS;
        self.centres.get(lagged).copied().unwrap_or(Vec2::ZERO) * spread_factor
    }
}

#[derive(Debug, Clone, Default)]
pub enum OriginMode {
    #[default]
    Fixed,
    Track(OriginTrack),
}

#[derive(Debug, Clone)]
pub struct PlacementEngine<H = LogHeightScale> {
    spread_factor: f32,
    origin: OriginMode,
    height_scale: H,
}

impl PlacementEngine<LogHeightScale> {
    pub fn new(spread_factor: f32) -> Self {
        Self::with_height_scale(spread_factor, LogHeightScale)
    }
}

impl<H: HeightScale> PlacementEngine<H> {
    pub fn with_height_scale(spread_factor: f32, height_scale: H) -> Self {
        Self {
            spread_factor,
            origin: OriginMode::Fixed,
            height_scale,
        }
    }

    pub fn with_origin(mut self, origin: OriginMode) -> Self {
        self.origin = origin;
        self
    }

    pub fn spread_factor(&self) -> f32 {
        self.spread_factor
    }

    pub fn set_spread_factor(&mut self, spread_factor: f32) {
        self.spread_factor = spread_factor;
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.origin, OriginMode::Track(_))
    }

    pub fn origin(&self, timestep: usize) -> Vec2 {
        match &self.origin {
            OriginMode::Fixed => Vec2::ZERO,
            OriginMode::Track(track) => track.centre(timestep, self.spread_factor),
        }
    }

    pub fn scale_height(&self, height: f32) -> f32 {
        self.height_scale.scale(height)
    }

    /// Pushes a point away from the origin on the horizontal plane.
    pub fn apply_spread(&self, point: Vec3, timestep: usize) -> Vec3 {
        let origin = self.origin(timestep);
        let offset = Vec2::new(point.x, point.z) - origin;
        let spread = origin + offset * self.spread_factor;
        Vec3::new(spread.x, point.y, spread.y)
    }

    /// World position of one spatial sample. `heights` is `None` for layers
    /// drawn at a fixed elevation.
    pub fn place(
        &self,
        coords: &CoordinateTables,
        heights: Option<&TimeSeriesTable>,
        fixed_height: f32,
        timestep: usize,
        spatial: usize,
    ) -> Option<Vec3> {
        let (x, y) = coords.point(timestep, spatial)?;
        let elevation = match heights {
            Some(table) => self.scale_height(table.value(timestep, spatial)?),
            None => fixed_height,
        };
        Some(self.apply_spread(Vec3::new(x, elevation, y), timestep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn height_scale_branches() {
        assert_eq!(scale_height(0.0), 20.0);
        assert!(approx(scale_height(20.0), 20f32.log10() * 20.0));
        assert!(approx(scale_height(100.0), 40.0));
        assert!(approx(scale_height(10.0), 20.0));
        assert!(approx(scale_height(5.0), -1.39794));
        assert!(approx(scale_height(0.001), 4.0));
    }

    #[test]
    fn negative_heights_take_the_stepped_branch() {
        // neg_scale stays at 0, so log10(0.01) * 2.
        assert!(approx(scale_height(-5.0), -4.0));
        assert!(approx(scale_height(-50.0), -4.0));
        assert!(approx(scale_height(-0.5), -4.0));
    }

    #[test]
    fn spread_scales_from_fixed_origin() {
        let engine = PlacementEngine::new(3.0);
        let placed = engine.apply_spread(Vec3::new(1.0, 7.0, -2.0), 0);
        assert_eq!(placed, Vec3::new(3.0, 7.0, -6.0));
    }

    #[test]
    fn tracked_origin_lags_one_step() {
        let text = (0..24)
            .map(|t| format!("[{t},{}]", t * 2))
            .collect::<Vec<_>>()
            .join("\n");
        let (coords, _) = CoordinateTables::parse_pairs("track", &text).unwrap();
        let track = OriginTrack::from_pairs(&coords);
        assert_eq!(track.centre(5, 1.0), Vec2::new(4.0, 8.0));
        assert_eq!(track.centre(0, 2.0), Vec2::new(46.0, 92.0));

        let engine = PlacementEngine::new(2.0).with_origin(OriginMode::Track(track));
        // origin (2,4) at t=2; offset (1,1) doubled.
        let placed = engine.apply_spread(Vec3::new(3.0, 0.0, 5.0), 2);
        assert_eq!(placed, Vec3::new(4.0, 0.0, 6.0));
    }

    #[test]
    fn place_reads_coordinates_and_heights() {
        let coords = CoordinateTables::parse_pairs("xy", &vec!["[1,2],[3,4]"; 24].join("\n"))
            .unwrap()
            .0;
        let heights = TimeSeriesTable::parse_str(&vec!["100,0"; 24].join("\n"))
            .unwrap()
            .table;
        let engine = PlacementEngine::new(2.0);
        let first = engine.place(&coords, Some(&heights), 0.0, 3, 0).unwrap();
        assert!(approx(first.y, 40.0));
        assert_eq!((first.x, first.z), (2.0, 4.0));
        let second = engine.place(&coords, Some(&heights), 0.0, 3, 1).unwrap();
        assert_eq!(second, Vec3::new(6.0, 20.0, 8.0));
        let flat = engine.place(&coords, None, 1.0, 3, 1).unwrap();
        assert_eq!(flat.y, 1.0);
        assert!(engine.place(&coords, Some(&heights), 0.0, 3, 2).is_none());
    }
}
