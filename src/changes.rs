use crate::discovery::{Package, clean, normalize};
use log::debug;
use std::path::{Path, PathBuf};

/// How the set of changed files is acquired.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChangeMode {
    /// Files staged in the index, compared against `HEAD` (pre-commit).
    #[default]
    Staged,
    /// Files differing between two revisions (CI).
    Range { before: String, after: String },
}

impl ChangeMode {
    /// The revision a package's previous version is read from.
    pub fn base_revision(&self) -> &str {
        match self {
            ChangeMode::Staged => "HEAD",
            ChangeMode::Range { before, .. } => before,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    paths: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn new<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Self {
        let mut paths: Vec<PathBuf> = paths.into_iter().map(clean).collect();
        paths.sort();
        paths.dedup();
        ChangeSet { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Component-wise containment, so `pkg` does not claim `pkg2/file`.
    pub fn touches(&self, dir: &Path) -> bool {
        self.paths.iter().any(|path| path.starts_with(dir))
    }
}

/// Returns the packages with at least one changed file under their directory,
/// in the order they were given.
pub fn changed_packages(packages: &[Package], changeset: &ChangeSet) -> Vec<Package> {
    let changed: Vec<Package> = packages
        .iter()
        .filter(|package| changeset.touches(&package.path))
        .cloned()
        .collect();
    debug!(
        "Changed packages: [{}]",
        changed.iter().map(|p| normalize(&p.path)).collect::<Vec<_>>().join(", ")
    );
    changed
}
