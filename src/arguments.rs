use crate::changes::ChangeMode;
use crate::engine::BumpConfig;
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about, bin_name = "pyproject-bump")]
pub struct Arguments {
    /// Regular expressions matched (unanchored) against package directories to skip
    #[arg(long, num_args = 0.., value_name = "REGEX")]
    pub ignore_dirs: Vec<String>,
    /// Root pyproject.toml, relative to the repository root
    #[arg(long, default_value = "pyproject.toml")]
    pub root_pyproject_path: String,
    /// Do not cascade bumps to the root package
    #[arg(long)]
    pub dont_bump_root: bool,
    /// Compare against this revision instead of the staged files (CI mode)
    #[arg(long, value_name = "REV")]
    pub commit_before: Option<String>,
    /// Upper revision of the CI range; defaults to HEAD
    #[arg(long, value_name = "REV", requires = "commit_before")]
    pub commit_after: Option<String>,
    #[arg(long, short, default_value = "./")]
    pub path: String,
    #[arg(long, short)]
    pub verbose: bool,
    /// Rewrite files but leave them out of the index
    #[arg(long)]
    pub no_stage: bool,
}

impl Arguments {
    pub fn change_mode(&self) -> ChangeMode {
        match &self.commit_before {
            Some(before) => ChangeMode::Range {
                before: before.clone(),
                after: self.commit_after.clone().unwrap_or_else(|| "HEAD".to_string()),
            },
            None => ChangeMode::Staged,
        }
    }

    /// Builds the engine configuration for the repository rooted at `root`.
    pub fn to_config(&self, root: impl Into<PathBuf>) -> Result<BumpConfig> {
        Ok(BumpConfig::new(root)
            .with_ignore_patterns(self.ignore_dirs.as_slice())?
            .with_root_metadata_path(&self.root_pyproject_path)
            .with_bump_root(!self.dont_bump_root)
            .with_mode(self.change_mode()))
    }
}
