use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use tempest_engine::visual::VisualKind;

/// Smallest simulated frame step accepted on the command line, in seconds.
const MIN_FRAME_DT: f32 = 1e-3;

#[derive(Parser, Debug)]
#[command(
    about = "Headless playback of gridded atmospheric time series through pooled point visuals",
    version
)]
pub struct Args {
    /// JSON settings file; relative paths inside it resolve against its directory
    #[arg(long, conflicts_with = "data_root")]
    pub config: Option<PathBuf>,

    /// Data directory to scan (x_points.txt, y_points.txt, one folder per group, optional surface/)
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Number of timestep transitions to play before exiting
    #[arg(long, default_value_t = 24)]
    pub ticks: usize,

    /// Simulated seconds per frame
    #[arg(long, default_value_t = 0.1)]
    pub frame_dt: f32,

    /// Representation used for volume points
    #[arg(long, value_enum)]
    pub display_mode: Option<DisplayMode>,

    /// Fall back to the data file index for variables without a range instead of failing
    #[arg(long)]
    pub legacy_ranges: bool,

    /// Seconds between timestep transitions (minimum 0.1)
    #[arg(long)]
    pub move_interval: Option<f32>,

    /// Horizontal spread applied around the origin
    #[arg(long)]
    pub spread_factor: Option<f32>,

    /// Path to write the per-tick frame log as JSON
    #[arg(long)]
    pub frame_log_json: Option<PathBuf>,

    /// Print composed groups and pool sizing, then exit without playing
    #[arg(long)]
    pub describe: bool,

    /// Print every tick instead of the summary
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisplayMode {
    Ellipsoid,
    Cloud,
    Label,
}

impl From<DisplayMode> for VisualKind {
    fn from(mode: DisplayMode) -> Self {
        match mode {
            DisplayMode::Ellipsoid => VisualKind::Ellipsoid,
            DisplayMode::Cloud => VisualKind::Cloud,
            DisplayMode::Label => VisualKind::NumericLabel,
        }
    }
}

#[derive(Debug)]
pub enum DataSource {
    Config(PathBuf),
    DataRoot(PathBuf),
}

/// Values that override the loaded settings.
#[derive(Debug, Default)]
pub struct Overrides {
    pub display_mode: Option<VisualKind>,
    pub legacy_ranges: bool,
    pub move_interval: Option<f32>,
    pub spread_factor: Option<f32>,
}

#[derive(Debug)]
pub enum Command {
    Run(RunArgs),
    Describe(DescribeArgs),
}

#[derive(Debug)]
pub struct RunArgs {
    pub source: DataSource,
    pub overrides: Overrides,
    pub ticks: usize,
    pub frame_dt: f32,
    pub frame_log_json: Option<PathBuf>,
    pub verbose: bool,
}

#[derive(Debug)]
pub struct DescribeArgs {
    pub source: DataSource,
    pub overrides: Overrides,
}

pub fn parse() -> Result<Command> {
    let args = Args::parse();
    args.into_command()
}

impl Args {
    fn into_command(self) -> Result<Command> {
        let source = match (self.config, self.data_root) {
            (Some(config), _) => DataSource::Config(config),
            (None, Some(root)) => DataSource::DataRoot(root),
            (None, None) => bail!("either --config or --data-root is required"),
        };
        if !self.frame_dt.is_finite() || self.frame_dt < MIN_FRAME_DT {
            bail!(
                "--frame-dt must be a finite value of at least {MIN_FRAME_DT} (got {})",
                self.frame_dt
            );
        }
        if self.describe && self.frame_log_json.is_some() {
            bail!("--frame-log-json has no effect with --describe");
        }

        let overrides = Overrides {
            display_mode: self.display_mode.map(VisualKind::from),
            legacy_ranges: self.legacy_ranges,
            move_interval: self.move_interval,
            spread_factor: self.spread_factor,
        };

        if self.describe {
            return Ok(Command::Describe(DescribeArgs { source, overrides }));
        }
        Ok(Command::Run(RunArgs {
            source,
            overrides,
            ticks: self.ticks,
            frame_dt: self.frame_dt,
            frame_log_json: self.frame_log_json,
            verbose: self.verbose,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> Result<Command> {
        let mut argv = vec!["tempest_engine"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv)?.into_command()
    }

    #[test]
    fn a_data_source_is_required() {
        assert!(command(&[]).is_err());
    }

    #[test]
    fn run_collects_overrides() -> Result<()> {
        let Command::Run(run) = command(&[
            "--data-root",
            "data",
            "--display-mode",
            "label",
            "--legacy-ranges",
            "--ticks",
            "3",
        ])?
        else {
            panic!("expected a run command");
        };
        assert!(matches!(run.source, DataSource::DataRoot(_)));
        assert_eq!(run.overrides.display_mode, Some(VisualKind::NumericLabel));
        assert!(run.overrides.legacy_ranges);
        assert_eq!(run.ticks, 3);
        Ok(())
    }

    #[test]
    fn frame_dt_has_a_floor() {
        for dt in ["0", "-1", "1e-30", "NaN", "inf"] {
            assert!(command(&["--data-root", "data", "--frame-dt", dt]).is_err(), "{dt}");
        }
        assert!(command(&["--data-root", "data", "--frame-dt", "0.001"]).is_ok());
    }

    #[test]
    fn describe_rejects_frame_log() {
        assert!(command(&["--config", "a.json", "--describe", "--frame-log-json", "out.json"]).is_err());
        assert!(matches!(
            command(&["--config", "a.json", "--describe"]),
            Ok(Command::Describe(_))
        ));
    }
}
