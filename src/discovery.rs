use crate::error::{BumpError, Result};
use log::debug;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const METADATA_FILE: &str = "pyproject.toml";

/// A directory holding a `pyproject.toml`. Paths are relative to the
/// repository root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Package {
    pub path: PathBuf,
    pub metadata_path: PathBuf,
    pub is_root: bool,
}

impl Package {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = clean(path);
        let metadata_path = path.join(METADATA_FILE);
        Package { path, metadata_path, is_root: false }
    }

    /// The root package is addressed by its metadata file, which does not
    /// have to be named `pyproject.toml`.
    pub fn root(metadata_path: impl AsRef<Path>) -> Self {
        let metadata_path = clean(metadata_path);
        let path = metadata_path.parent().map(Path::to_path_buf).unwrap_or_default();
        Package { path, metadata_path, is_root: true }
    }

    pub fn display_name(&self) -> String {
        match normalize(&self.path) {
            name if name.is_empty() => ".".to_string(),
            name => name,
        }
    }
}

/// Keeps only the normal components of a relative path.
pub fn clean(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref()
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Forward-slash form used for ignore pattern matching and display.
pub fn normalize(path: impl AsRef<Path>) -> String {
    clean(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            let pattern = pattern.as_ref();
            Regex::new(pattern).map_err(|source| BumpError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
        })
        .collect()
}

/// Finds every package under `root`, excluding the directory of the root
/// metadata file and any directory an ignore pattern matches.
///
/// Patterns use search semantics against the forward-slash relative path,
/// so `docs` also excludes `tools/docs-gen`; anchor with `^`/`$` to be exact.
pub fn discover(
    root: impl AsRef<Path>,
    ignore_patterns: &[Regex],
    root_metadata_path: impl AsRef<Path>,
) -> Result<Vec<Package>> {
    let root = root.as_ref();
    let root_dir = Package::root(relative_to(root, root_metadata_path.as_ref())).path;
    debug!("Discovering packages under '{}'", root.display());

    let mut packages = vec![];
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != METADATA_FILE {
            continue;
        }

        let Some(dir) = entry.path().parent() else { continue };
        let dir = clean(dir.strip_prefix(root).unwrap_or(dir));

        if dir == root_dir {
            debug!("Skipping root package directory '{}'", normalize(&dir));
            continue;
        }

        let normalized = normalize(&dir);
        if let Some(pattern) = ignore_patterns.iter().find(|p| p.is_match(&normalized)) {
            debug!("Ignoring package '{}' (matches '{}')", normalized, pattern.as_str());
            continue;
        }

        packages.push(Package::new(dir));
    }

    debug!("Found packages: {:?}", packages);
    Ok(packages)
}

/// Makes an absolute `path` relative to `root`. Paths that only share the
/// root after resolving symlinks are resolved first; anything outside the
/// root is returned unchanged.
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        return path.to_path_buf();
    }
    if let Ok(relative) = path.strip_prefix(root) {
        return relative.to_path_buf();
    }

    let resolved = path
        .parent()
        .and_then(|dir| dir.canonicalize().ok())
        .zip(path.file_name())
        .map(|(dir, name)| dir.join(name));
    match (root.canonicalize(), resolved) {
        (Ok(root), Some(resolved)) => resolved
            .strip_prefix(&root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
