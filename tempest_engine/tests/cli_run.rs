use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::tempdir;

fn write_rows(path: &Path, row: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, vec![row; 24].join("\n"))
        .with_context(|| format!("writing {}", path.display()))
}

/// Data root with one temperature group and a surface layer, two points each.
fn data_root(root: &Path) -> Result<()> {
    write_rows(&root.join("x_points.txt"), "1,2")?;
    write_rows(&root.join("y_points.txt"), "3,4")?;
    write_rows(&root.join("t_levels").join("z_t.txt"), "100,200")?;
    write_rows(&root.join("t_levels").join("data_t.txt"), "250,260")?;
    write_rows(&root.join("surface").join("mslp.txt"), "100000,101000")?;
    Ok(())
}

fn tempest(args: &[&str]) -> Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_tempest_engine"))
        .args(args)
        .output()
        .context("executing tempest_engine")
}

fn transcript(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

#[test]
fn headless_run_writes_frame_log() -> Result<()> {
    let dir = tempdir()?;
    data_root(dir.path())?;
    let log_path = dir.path().join("frames.json");
    let root = dir.path().to_str().context("temp path is not valid UTF-8")?;
    let log = log_path.to_str().context("log path is not valid UTF-8")?;

    let output = tempest(&[
        "--data-root",
        root,
        "--ticks",
        "3",
        "--frame-dt",
        "0.5",
        "--move-interval",
        "1",
        "--frame-log-json",
        log,
    ])?;
    assert!(output.status.success(), "{}", transcript(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Played 3 ticks"));

    let frames: Value = serde_json::from_str(&fs::read_to_string(&log_path)?)?;
    let ticks = frames["ticks"].as_array().context("ticks array")?;
    let timesteps: Vec<u64> = ticks
        .iter()
        .filter_map(|tick| tick["timestep"].as_u64())
        .collect();
    assert_eq!(timesteps, vec![1, 2, 3]);
    for tick in ticks {
        let groups = tick["groups"].as_array().context("groups array")?;
        assert_eq!(groups.len(), 2);
        for group in groups {
            assert_eq!(group["active"], 2);
        }
        assert!(tick["errors"].as_array().is_some_and(Vec::is_empty));
    }

    let pools = frames["pools"].as_array().context("pools array")?;
    assert_eq!(pools.len(), 2);
    assert_eq!(pools[0]["group"], "t_levels");
    assert_eq!(pools[1]["layer"], "surface");
    for pool in pools {
        assert_eq!(pool["stats"]["exhaustions"], 0);
    }
    Ok(())
}

#[test]
fn describe_lists_groups() -> Result<()> {
    let dir = tempdir()?;
    data_root(dir.path())?;
    let root = dir.path().to_str().context("temp path is not valid UTF-8")?;

    let output = tempest(&["--data-root", root, "--describe", "--display-mode", "label"])?;
    assert!(output.status.success(), "{}", transcript(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 groups"));
    assert!(stdout.contains("display mode NumericLabel"));
    assert!(stdout.contains("t_levels (Volume) variables [t]"));
    assert!(stdout.contains("surface (Surface) variables [mslp]"));
    Ok(())
}

#[test]
fn missing_data_root_fails() -> Result<()> {
    let dir = tempdir()?;
    let missing = dir.path().join("nope");
    let missing = missing.to_str().context("temp path is not valid UTF-8")?;

    let output = tempest(&["--data-root", missing])?;
    assert!(!output.status.success());
    assert!(transcript(&output).contains("is not a directory"));
    Ok(())
}

#[test]
fn short_table_aborts_startup() -> Result<()> {
    let dir = tempdir()?;
    data_root(dir.path())?;
    fs::write(dir.path().join("t_levels").join("data_t.txt"), "1\n2")?;
    let root = dir.path().to_str().context("temp path is not valid UTF-8")?;

    let output = tempest(&["--data-root", root, "--ticks", "1"])?;
    assert!(!output.status.success());
    assert!(transcript(&output).contains("expected 24 rows but found 2"));
    Ok(())
}
