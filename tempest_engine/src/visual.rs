use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::palette::Rgb;
use crate::point_cache::PointSample;
use crate::scene::{EntityHandle, Particle, PrefabKind, Scene};

/// Which representation of a pooled point is on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    #[default]
    Ellipsoid,
    Cloud,
    NumericLabel,
}

impl VisualKind {
    pub const ALL: [VisualKind; 3] = [
        VisualKind::Ellipsoid,
        VisualKind::Cloud,
        VisualKind::NumericLabel,
    ];

    pub fn slot(self) -> usize {
        match self {
            VisualKind::Ellipsoid => 0,
            VisualKind::Cloud => 1,
            VisualKind::NumericLabel => 2,
        }
    }

    pub fn prefab(self) -> PrefabKind {
        match self {
            VisualKind::Ellipsoid => PrefabKind::Ellipsoid,
            VisualKind::Cloud => PrefabKind::Cloud,
            VisualKind::NumericLabel => PrefabKind::NumericLabel,
        }
    }

    pub fn next(self) -> Self {
        VisualKind::ALL[(self.slot() + 1) % VisualKind::ALL.len()]
    }

    pub fn from_index(index: usize) -> Self {
        VisualKind::ALL.get(index).copied().unwrap_or_default()
    }
}

const MIN_SIZE: f32 = 1.0;
const CLOUD_DENSITY: f32 = 30.0;

/// Ellipsoids widen and flatten as the value grows.
pub fn ellipsoid_scale(normalized: f32, scale_factor: f32) -> Vec3 {
    let width = MIN_SIZE + normalized * scale_factor;
    let height = ((MIN_SIZE - normalized) * scale_factor.clamp(1.0, 1.5)).max(0.15);
    Vec3::new(width, height, width)
}

/// Flat tiles of the surface layer.
pub fn surface_scale(normalized: f32, scale_factor: f32) -> Vec3 {
    let width = MIN_SIZE + normalized * scale_factor;
    Vec3::new(width, 1.0, width)
}

pub fn cloud_particle_count(normalized: f32) -> usize {
    ((normalized * CLOUD_DENSITY) as usize).max(1)
}

pub fn label_scale(scale_factor: f32) -> Vec3 {
    Vec3::new(scale_factor / 5.0, scale_factor / 5.0, 1.0)
}

/// Formats `value` as `<mantissa>e<sign><exponent>` with `sig_figs`
/// significant figures; zero prints as `0`.
pub fn format_scientific(value: f32, sig_figs: u32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let value = value as f64;
    let exponent = value.abs().log10().floor() as i32;
    let mantissa = value / 10f64.powi(exponent);
    let places = sig_figs.saturating_sub(1) as i32;
    let factor = 10f64.powi(places);
    let rounded = (mantissa * factor).round() / factor;
    let sign = if exponent >= 0 { "+" } else { "" };
    format!("{rounded}e{sign}{exponent}")
}

/// Small deterministic generator for particle jitter.
#[derive(Debug, Clone)]
pub struct Jitter {
    state: u64,
}

impl Jitter {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0xDEAD_BEEF_CAFE,
        }
    }

    /// Uniform in `[lo, hi)`.
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let unit = (self.state >> 40) as f32 / (1u64 << 24) as f32;
        lo + unit * (hi - lo)
    }
}

pub fn cloud_particles(
    normalized: f32,
    scale_factor: f32,
    color: Rgb,
    jitter: &mut Jitter,
) -> Vec<Particle> {
    let count = cloud_particle_count(normalized);
    let reach = scale_factor / 4.0;
    let size = MIN_SIZE + (count as f32 / CLOUD_DENSITY) / 2.0;
    (0..count)
        .map(|_| Particle {
            offset: Vec3::new(
                jitter.range(-reach, reach),
                jitter.range(-reach, reach),
                jitter.range(-reach, reach),
            ),
            color,
            size,
        })
        .collect()
}

/// Pushes the current sample onto the active representation.
pub fn apply_sample<S: Scene>(
    scene: &mut S,
    handle: EntityHandle,
    kind: VisualKind,
    sample: PointSample,
    color: Rgb,
    scale_factor: f32,
    jitter: &mut Jitter,
) {
    match kind {
        VisualKind::Ellipsoid => {
            scene.set_material_color(handle, color);
            scene.set_local_scale(handle, ellipsoid_scale(sample.normalized, scale_factor));
        }
        VisualKind::Cloud => {
            let particles = cloud_particles(sample.normalized, scale_factor, color, jitter);
            scene.emit_particles(handle, &particles);
        }
        VisualKind::NumericLabel => {
            scene.set_material_color(handle, color);
            scene.set_label_text(handle, &format_scientific(sample.raw, 3));
            scene.set_local_scale(handle, label_scale(scale_factor));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ellipsoid_shape_tracks_value() {
        assert_eq!(ellipsoid_scale(0.0, 5.0), Vec3::new(1.0, 1.5, 1.0));
        assert_eq!(ellipsoid_scale(1.0, 5.0), Vec3::new(6.0, 0.15, 6.0));
        assert_eq!(ellipsoid_scale(0.5, 0.5), Vec3::new(1.25, 0.5, 1.25));
    }

    #[test]
    fn cloud_has_at_least_one_particle() {
        assert_eq!(cloud_particle_count(0.0), 1);
        assert_eq!(cloud_particle_count(0.5), 15);
        assert_eq!(cloud_particle_count(1.0), 30);
    }

    #[test]
    fn cloud_particles_stay_within_reach() {
        let mut jitter = Jitter::new(7);
        let particles = cloud_particles(1.0, 4.0, Rgb::new(0.0, 0.0, 0.0), &mut jitter);
        assert_eq!(particles.len(), 30);
        for particle in &particles {
            assert!(particle.offset.abs().max_element() <= 1.0);
            assert_eq!(particle.size, 1.5);
        }
    }

    #[test]
    fn scientific_labels() {
        assert_eq!(format_scientific(0.0, 3), "0");
        assert_eq!(format_scientific(12345.0, 3), "1.23e+4");
        assert_eq!(format_scientific(-0.000456, 3), "-4.56e-4");
        assert_eq!(format_scientific(2.0, 3), "2e+0");
    }

    #[test]
    fn kinds_cycle_in_order() {
        assert_eq!(VisualKind::Ellipsoid.next(), VisualKind::Cloud);
        assert_eq!(VisualKind::NumericLabel.next(), VisualKind::Ellipsoid);
        assert_eq!(VisualKind::from_index(9), VisualKind::Ellipsoid);
    }
}
