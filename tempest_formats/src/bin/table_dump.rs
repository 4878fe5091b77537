use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tempest_formats::{TableSummary, TimeSeriesTable};

#[derive(Parser, Debug)]
#[command(about = "Inspect 24-row atmospheric table files", version)]
struct Args {
    /// Table files to inspect
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Print every recovered token, not just the count
    #[arg(long)]
    warnings: bool,

    /// Emit the summaries as JSON instead of a text listing
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut summaries: Vec<TableSummary> = Vec::with_capacity(args.files.len());
    let mut failures = 0usize;
    for path in &args.files {
        let load = match TimeSeriesTable::load(path) {
            Ok(load) => load,
            Err(err) => {
                eprintln!("[table_dump] {err}");
                failures += 1;
                continue;
            }
        };
        if args.warnings && !args.json {
            for warning in &load.warnings {
                println!(
                    "{}: row {} column {} -> 0.0 (token {:?})",
                    path.display(),
                    warning.row,
                    warning.column,
                    warning.token
                );
            }
        }
        summaries.push(load.table.summary(load.warnings.len()));
    }

    if args.json {
        let json =
            serde_json::to_string_pretty(&summaries).context("serializing table summaries")?;
        println!("{json}");
    } else {
        for summary in &summaries {
            println!(
                "{name:<40} rows {rows:>2} points {min_len:>5}..{max_len:<5} values {lo}..{hi} warnings {warnings}",
                name = summary.name,
                rows = summary.rows,
                min_len = summary.min_row_len,
                max_len = summary.max_row_len,
                lo = format_bound(summary.value_min),
                hi = format_bound(summary.value_max),
                warnings = summary.warnings
            );
        }
    }

    if failures > 0 {
        bail!("{failures} table(s) failed to load");
    }
    Ok(())
}

fn format_bound(value: Option<f32>) -> String {
    value
        .map(|v| format!("{v}"))
        .unwrap_or_else(|| String::from("-"))
}
