use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};
use pyproject_bump::{
    arguments::Arguments,
    engine::{self, RunReport},
    git::GitTracker,
    version::BumpDecision,
};

fn main() -> Result<()> {
    let args = Arguments::parse();
    pretty_env_logger::env_logger::builder()
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .format_timestamp(None)
        .init();

    info!("Checking for version bumps in changed packages...");

    let git = GitTracker::open(&args.path)?;
    let root = git
        .workdir()
        .context("Cannot bump versions in a bare repository")?
        .to_path_buf();
    let config = args.to_config(root)?;

    let report = engine::run(&config, &git)?;

    if !report.staged_paths.is_empty() {
        if args.no_stage {
            info!("Leaving {} rewritten file(s) unstaged", report.staged_paths.len());
        } else {
            git.stage_paths(&report.staged_paths)?;
        }
    }

    summarize(&report);
    Ok(())
}

fn summarize(report: &RunReport) {
    for skipped in &report.skipped {
        warn!("Skipped {}: {}", skipped.package.display_name(), skipped.reason);
    }

    if report.bumped.is_empty() {
        info!("No version bumps were needed.");
        return;
    }

    let touched: Vec<String> = report
        .bumped
        .iter()
        .map(|bumped| match bumped.decision {
            BumpDecision::ManuallyBumped => {
                format!("{} ({}, manual)", bumped.package.display_name(), bumped.current)
            }
            _ => format!("{} ({})", bumped.package.display_name(), bumped.current),
        })
        .collect();
    info!("Version processing completed: {}", touched.join(", "));
}
