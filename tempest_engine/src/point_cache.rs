use serde::Serialize;
use tempest_formats::TIMESTEPS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PointSample {
    pub timestep: usize,
    pub raw: f32,
    pub normalized: f32,
}

/// How `set_current_timestep` resolved the requested timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestepMatch {
    Exact,
    /// No sample for the timestep; the cursor was clamped to a position in
    /// the cache instead, which may belong to a different timestep.
    Approximate { index: usize },
    Empty,
}

/// Time series of one spatial point, ordered by timestep.
#[derive(Debug, Clone, Default)]
pub struct PointDataCache {
    samples: Vec<PointSample>,
    cursor: usize,
}

impl PointDataCache {
    pub fn new() -> Self {
        Self {
            samples: Vec::with_capacity(TIMESTEPS),
            cursor: 0,
        }
    }

    /// Returns false when an identical sample for `timestep` is already held.
    pub fn add_sample(&mut self, timestep: usize, raw: f32, normalized: f32) -> bool {
        match self
            .samples
            .binary_search_by_key(&timestep, |sample| sample.timestep)
        {
            Ok(index) => {
                if self.samples[index].raw == raw {
                    return false;
                }
                self.samples[index] = PointSample {
                    timestep,
                    raw,
                    normalized,
                };
            }
            Err(index) => self.samples.insert(
                index,
                PointSample {
                    timestep,
                    raw,
                    normalized,
                },
            ),
        }
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.samples.len() >= TIMESTEPS
    }

    pub fn samples(&self) -> &[PointSample] {
        &self.samples
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_current_timestep(&mut self, timestep: usize) -> TimestepMatch {
        if self.samples.is_empty() {
            return TimestepMatch::Empty;
        }
        match self
            .samples
            .binary_search_by_key(&timestep, |sample| sample.timestep)
        {
            Ok(index) => {
                self.cursor = index;
                TimestepMatch::Exact
            }
            Err(_) => {
                let index = timestep.min(self.samples.len() - 1);
                self.cursor = index;
                TimestepMatch::Approximate { index }
            }
        }
    }

    pub fn current_sample(&self) -> PointSample {
        self.samples.get(self.cursor).copied().unwrap_or_default()
    }

    /// Steps the cursor to the next cached sample, wrapping around.
    pub fn advance(&mut self) -> Option<PointSample> {
        if self.samples.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.samples.len();
        Some(self.current_sample())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sample_is_a_no_op() {
        let mut cache = PointDataCache::new();
        assert!(cache.add_sample(3, 1.5, 0.2));
        assert!(!cache.add_sample(3, 1.5, 0.9));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.samples()[0].normalized, 0.2);
    }

    #[test]
    fn same_timestep_new_value_replaces() {
        let mut cache = PointDataCache::new();
        cache.add_sample(3, 1.5, 0.2);
        assert!(cache.add_sample(3, 2.5, 0.4));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.samples()[0],
            PointSample {
                timestep: 3,
                raw: 2.5,
                normalized: 0.4
            }
        );
    }

    #[test]
    fn samples_stay_sorted() {
        let mut cache = PointDataCache::new();
        for t in [5, 1, 9, 0, 3] {
            cache.add_sample(t, t as f32, 0.0);
        }
        let order: Vec<usize> = cache.samples().iter().map(|s| s.timestep).collect();
        assert_eq!(order, vec![0, 1, 3, 5, 9]);
    }

    #[test]
    fn completeness_needs_all_timesteps() {
        let mut cache = PointDataCache::new();
        for t in 0..TIMESTEPS - 1 {
            cache.add_sample(t, t as f32, 0.0);
        }
        assert!(!cache.is_complete());
        cache.add_sample(TIMESTEPS - 1, 0.0, 0.0);
        assert!(cache.is_complete());
    }

    #[test]
    fn exact_and_approximate_lookup() {
        let mut cache = PointDataCache::new();
        cache.add_sample(2, 20.0, 0.2);
        cache.add_sample(4, 40.0, 0.4);
        cache.add_sample(6, 60.0, 0.6);

        assert_eq!(cache.set_current_timestep(4), TimestepMatch::Exact);
        assert_eq!(cache.current_sample().raw, 40.0);

        assert_eq!(
            cache.set_current_timestep(1),
            TimestepMatch::Approximate { index: 1 }
        );
        assert_eq!(cache.current_sample().timestep, 4);

        assert_eq!(
            cache.set_current_timestep(17),
            TimestepMatch::Approximate { index: 2 }
        );
        assert_eq!(cache.current_sample().timestep, 6);
    }

    #[test]
    fn empty_cache_yields_zero_sample() {
        let mut cache = PointDataCache::new();
        assert_eq!(cache.set_current_timestep(5), TimestepMatch::Empty);
        assert_eq!(cache.current_sample(), PointSample::default());
        assert_eq!(cache.advance(), None);
    }

    #[test]
    fn advance_wraps_and_clear_resets() {
        let mut cache = PointDataCache::new();
        cache.add_sample(0, 1.0, 0.1);
        cache.add_sample(1, 2.0, 0.2);
        cache.set_current_timestep(1);
        assert_eq!(cache.advance().map(|s| s.timestep), Some(0));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.cursor(), 0);
    }
}
