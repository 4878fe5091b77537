use serde::Serialize;
use tempest_formats::TIMESTEPS;

/// Shortest interval between two timestep transitions, in seconds.
pub const MIN_INTERVAL: f32 = 0.1;

/// Labels of the bundled hurricane dataset, six hours apart.
pub const DEFAULT_TIMESTAMPS: [&str; TIMESTEPS] = [
    "2024-9-23 12am",
    "2024-9-23 6am",
    "2024-9-23 12pm",
    "2024-9-23 6pm",
    "2024-9-24 12am",
    "2024-9-24 6am",
    "2024-9-24 12pm",
    "2024-9-24 6pm",
    "2024-9-25 12am",
    "2024-9-25 6am",
    "2024-9-25 12pm",
    "2024-9-25 6pm",
    "2024-9-26 12am",
    "2024-9-26 6am",
    "2024-9-26 12pm",
    "2024-9-26 6pm",
    "2024-9-27 12am",
    "2024-9-27 6am",
    "2024-9-27 12pm",
    "2024-9-27 6pm",
    "2024-9-28 12am",
    "2024-9-28 6am",
    "2024-9-28 12pm",
    "2024-9-28 6pm",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackState {
    pub timestep: usize,
    pub interval: f32,
    pub elapsed: f32,
}

#[derive(Debug, Clone)]
pub struct TimestepScheduler {
    state: SchedulerState,
    playback: PlaybackState,
    timestamps: Vec<String>,
}

impl TimestepScheduler {
    pub fn new(start_timestep: usize, interval: f32) -> Self {
        Self {
            state: SchedulerState::Idle,
            playback: PlaybackState {
                timestep: start_timestep % TIMESTEPS,
                interval: interval.max(MIN_INTERVAL),
                elapsed: 0.0,
            },
            timestamps: DEFAULT_TIMESTAMPS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replaces the timestep labels. Missing entries fall back to
    /// `t<index>`.
    pub fn with_timestamps(mut self, timestamps: Vec<String>) -> Self {
        if !timestamps.is_empty() && timestamps.len() != TIMESTEPS {
            log::warn!(
                "{} timestamp labels configured for {TIMESTEPS} timesteps",
                timestamps.len()
            );
        }
        self.timestamps = timestamps;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    pub fn timestep(&self) -> usize {
        self.playback.timestep
    }

    pub fn interval(&self) -> f32 {
        self.playback.interval
    }

    pub fn start(&mut self) {
        if self.state == SchedulerState::Idle {
            log::info!(
                "playback started at timestep {} every {}",
                self.playback.timestep,
                self.interval_label()
            );
        }
        self.state = SchedulerState::Running;
    }

    pub fn stop(&mut self) {
        self.state = SchedulerState::Idle;
    }

    pub fn toggle(&mut self) {
        match self.state {
            SchedulerState::Idle => self.start(),
            SchedulerState::Running => self.stop(),
        }
    }

    /// Accumulates `dt` seconds and returns the new timestep when the
    /// interval elapses.
    pub fn advance(&mut self, dt: f32) -> Option<usize> {
        if self.state == SchedulerState::Idle {
            return None;
        }
        self.playback.elapsed += dt;
        if self.playback.elapsed < self.playback.interval {
            return None;
        }
        self.playback.elapsed = 0.0;
        self.playback.timestep = (self.playback.timestep + 1) % TIMESTEPS;
        Some(self.playback.timestep)
    }

    pub fn set_interval(&mut self, seconds: f32) {
        self.playback.interval = seconds.max(MIN_INTERVAL);
    }

    /// Slider positions in `[0, 1]` cover up to ten seconds.
    pub fn set_interval_from_slider(&mut self, value: f32) {
        self.set_interval(value * 10.0);
    }

    /// Interval rounded to two decimals, e.g. `2.5s`.
    pub fn interval_label(&self) -> String {
        let rounded = (self.playback.interval as f64 * 100.0).round() / 100.0;
        format!("{rounded}s")
    }

    pub fn timestamp_label(&self, timestep: usize) -> String {
        let index = timestep % TIMESTEPS;
        self.timestamps
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("t{index}"))
    }

    pub fn current_label(&self) -> String {
        self.timestamp_label(self.playback.timestep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_scheduler_never_ticks() {
        let mut scheduler = TimestepScheduler::new(0, 1.0);
        assert_eq!(scheduler.advance(10.0), None);
        assert_eq!(scheduler.timestep(), 0);
    }

    #[test]
    fn ticks_when_interval_elapses() {
        let mut scheduler = TimestepScheduler::new(0, 1.0);
        scheduler.start();
        assert_eq!(scheduler.advance(0.5), None);
        assert_eq!(scheduler.advance(0.5), Some(1));
        assert_eq!(scheduler.playback().elapsed, 0.0);
        assert_eq!(scheduler.advance(0.25), None);
    }

    #[test]
    fn timestep_wraps_after_last() {
        let mut scheduler = TimestepScheduler::new(23, 0.1);
        scheduler.start();
        assert_eq!(scheduler.advance(0.2), Some(0));
    }

    #[test]
    fn interval_has_a_floor() {
        let mut scheduler = TimestepScheduler::new(0, 0.0);
        assert_eq!(scheduler.interval(), MIN_INTERVAL);
        scheduler.set_interval_from_slider(0.25);
        assert_eq!(scheduler.interval(), 2.5);
        assert_eq!(scheduler.interval_label(), "2.5s");
        scheduler.set_interval_from_slider(0.0);
        assert_eq!(scheduler.interval(), MIN_INTERVAL);
        assert_eq!(scheduler.interval_label(), "0.1s");
    }

    #[test]
    fn labels_cover_the_dataset() {
        let scheduler = TimestepScheduler::new(0, 1.0);
        assert_eq!(scheduler.timestamp_label(0), "2024-9-23 12am");
        assert_eq!(scheduler.timestamp_label(23), "2024-9-28 6pm");
        assert_eq!(scheduler.timestamp_label(25), "2024-9-23 6am");

        let custom = TimestepScheduler::new(0, 1.0).with_timestamps(vec!["first".into()]);
        assert_eq!(custom.timestamp_label(0), "first");
        assert_eq!(custom.timestamp_label(1), "t1");
    }
}
