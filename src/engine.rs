use crate::bump::bump;
use crate::changes::{ChangeMode, ChangeSet, changed_packages};
use crate::discovery::{Package, compile_patterns, discover, relative_to};
use crate::document::apply_bump;
use crate::error::{BumpError, Result};
use crate::git::GitSource;
use crate::version::{BumpDecision, classify};
use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BumpConfig {
    /// Repository root; every package path is relative to it.
    pub root: PathBuf,
    pub ignore_patterns: Vec<Regex>,
    pub root_metadata_path: PathBuf,
    pub bump_root: bool,
    pub mode: ChangeMode,
}

impl BumpConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        BumpConfig {
            root: root.into(),
            ignore_patterns: vec![],
            root_metadata_path: PathBuf::from("pyproject.toml"),
            bump_root: true,
            mode: ChangeMode::Staged,
        }
    }

    pub fn with_ignore_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        self.ignore_patterns = compile_patterns(patterns)?;
        Ok(self)
    }

    /// An absolute `path` inside `root` is stored relative to it.
    pub fn with_root_metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_metadata_path = relative_to(&self.root, &path.into());
        self
    }

    /// The root package, used both to exclude it from discovery and for the cascade.
    pub fn root_package(&self) -> Package {
        Package::root(relative_to(&self.root, &self.root_metadata_path))
    }

    pub fn with_bump_root(mut self, bump_root: bool) -> Self {
        self.bump_root = bump_root;
        self
    }

    pub fn with_mode(mut self, mode: ChangeMode) -> Self {
        self.mode = mode;
        self
    }
}

/// A package whose version moved forward in this run, either by hand or by us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpedPackage {
    pub package: Package,
    pub decision: BumpDecision,
    pub previous: Option<String>,
    pub current: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPackage {
    pub package: Package,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub bumped: Vec<BumpedPackage>,
    /// Files rewritten by this run that have to be re-staged.
    pub staged_paths: Vec<PathBuf>,
    pub skipped: Vec<SkippedPackage>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.bumped.is_empty() && self.staged_paths.is_empty()
    }
}

enum Outcome {
    Untouched,
    Bumped(BumpedPackage, Option<PathBuf>),
}

/// Bumps every changed package, then cascades to the root package if any
/// sub-package moved forward.
pub fn run<G: GitSource + ?Sized>(config: &BumpConfig, git: &G) -> Result<RunReport> {
    let mut report = RunReport::default();

    let changeset = ChangeSet::new(git.changed_files(&config.mode)?);
    if changeset.is_empty() {
        info!("No changed files found");
        return Ok(report);
    }
    debug!("{} changed file(s)", changeset.len());

    let root = config.root_package();
    let packages = discover(&config.root, &config.ignore_patterns, &root.metadata_path)?;
    let changed = changed_packages(&packages, &changeset);
    if changed.is_empty() {
        info!("No package changes detected");
        return Ok(report);
    }

    let mut written = HashSet::new();
    for package in &changed {
        process(config, git, package, &mut written, &mut report)?;
    }

    if report.bumped.is_empty() {
        return Ok(report);
    }

    if !config.bump_root {
        debug!("Root bump disabled");
        return Ok(report);
    }

    if written.contains(&root.metadata_path) {
        debug!("Root metadata already written in this run");
        return Ok(report);
    }
    process(config, git, &root, &mut written, &mut report)?;

    Ok(report)
}

fn process<G: GitSource + ?Sized>(
    config: &BumpConfig,
    git: &G,
    package: &Package,
    written: &mut HashSet<PathBuf>,
    report: &mut RunReport,
) -> Result<()> {
    match evaluate(config, git, package) {
        Ok(Outcome::Untouched) => {}
        Ok(Outcome::Bumped(bumped, path)) => {
            if let Some(path) = path {
                written.insert(path.clone());
                report.staged_paths.push(path);
            }
            report.bumped.push(bumped);
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!("Skipping {}: {}", package.display_name(), e);
            report.skipped.push(SkippedPackage {
                package: package.clone(),
                reason: error_chain(&e),
            });
        }
    }
    Ok(())
}

fn evaluate<G: GitSource + ?Sized>(
    config: &BumpConfig,
    git: &G,
    package: &Package,
) -> Result<Outcome> {
    let name = package.display_name();
    let classification = classify(&config.root, package, git, config.mode.base_revision())?;

    match (classification.decision, classification.current) {
        (BumpDecision::ManuallyBumped, Some(current)) => {
            let previous = classification.base.map(|v| v.raw);
            info!(
                "Version for {} was changed manually: {} -> {}, skipping auto-bump",
                name,
                previous.as_deref().unwrap_or("none"),
                current.raw
            );
            let bumped = BumpedPackage {
                package: package.clone(),
                decision: BumpDecision::ManuallyBumped,
                previous,
                current: current.raw,
            };
            Ok(Outcome::Bumped(bumped, None))
        }
        (BumpDecision::AutoBump, Some(current)) => {
            let next = bump(&current.raw)?;
            let path = apply_bump(&config.root, package, current.source_key, &next)?;
            info!("Bumped {}: {} -> {}", name, current.raw, next);
            let bumped = BumpedPackage {
                package: package.clone(),
                decision: BumpDecision::AutoBump,
                previous: Some(current.raw),
                current: next,
            };
            Ok(Outcome::Bumped(bumped, Some(path)))
        }
        (BumpDecision::MissingVersion, _) => {
            warn!("No version found in '{}', skipping", package.metadata_path.display());
            Ok(Outcome::Untouched)
        }
        _ => Ok(Outcome::Untouched),
    }
}

fn error_chain(error: &BumpError) -> String {
    use std::error::Error;

    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// In-memory stand-in for the repository: a fixed changeset and the
    /// file contents at the base revision.
    #[derive(Default)]
    struct FakeGit {
        changed: Vec<PathBuf>,
        base: HashMap<PathBuf, String>,
        fail: bool,
    }

    impl FakeGit {
        fn changed(mut self, path: &str) -> Self {
            self.changed.push(PathBuf::from(path));
            self
        }

        fn base(mut self, path: &str, content: &str) -> Self {
            self.base.insert(PathBuf::from(path), content.to_string());
            self
        }
    }

    impl GitSource for FakeGit {
        fn changed_files(&self, _mode: &ChangeMode) -> Result<Vec<PathBuf>> {
            if self.fail {
                return Err(BumpError::git("diff", git2::Error::from_str("unavailable")));
            }
            Ok(self.changed.clone())
        }

        fn read_at_revision(&self, _revision: &str, path: &Path) -> Result<Option<String>> {
            Ok(self.base.get(path).cloned())
        }
    }

    fn project(version: &str) -> String {
        format!("[project]\nname = \"x\"\nversion = \"{version}\"\n")
    }

    fn write(root: &Path, path: &str, content: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(root: &Path, path: &str) -> String {
        fs::read_to_string(root.join(path)).unwrap()
    }

    /// Root at 1.0.0 with two packages, A at 0.1.0 and B at 0.2.0, all committed.
    fn workspace() -> (TempDir, FakeGit) {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "pyproject.toml", &project("1.0.0"));
        write(temp_dir.path(), "packages/a/pyproject.toml", &project("0.1.0"));
        write(temp_dir.path(), "packages/b/pyproject.toml", &project("0.2.0"));
        let git = FakeGit::default()
            .base("pyproject.toml", &project("1.0.0"))
            .base("packages/a/pyproject.toml", &project("0.1.0"))
            .base("packages/b/pyproject.toml", &project("0.2.0"));
        (temp_dir, git)
    }

    #[test]
    fn test_root_cascade() {
        let (temp_dir, git) = workspace();
        let git = git.changed("packages/a/src/a.py");

        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();

        assert_eq!(read(temp_dir.path(), "packages/a/pyproject.toml"), project("0.1.1"));
        assert_eq!(read(temp_dir.path(), "packages/b/pyproject.toml"), project("0.2.0"));
        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("1.0.1"));
        assert_eq!(
            report.staged_paths,
            vec![PathBuf::from("packages/a/pyproject.toml"), PathBuf::from("pyproject.toml")]
        );
        assert_eq!(report.bumped.len(), 2);
        assert!(report.bumped[1].package.is_root);
    }

    #[test]
    fn test_dont_bump_root() {
        let (temp_dir, git) = workspace();
        let git = git.changed("packages/a/src/a.py");

        let config = BumpConfig::new(temp_dir.path()).with_bump_root(false);
        let report = run(&config, &git).unwrap();

        assert_eq!(read(temp_dir.path(), "packages/a/pyproject.toml"), project("0.1.1"));
        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("1.0.0"));
        assert_eq!(report.staged_paths, vec![PathBuf::from("packages/a/pyproject.toml")]);
    }

    #[test]
    fn test_manual_bump_is_kept_and_cascades() {
        let (temp_dir, git) = workspace();
        write(temp_dir.path(), "packages/a/pyproject.toml", &project("0.2.0"));
        let git = git.changed("packages/a/pyproject.toml");

        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();

        assert_eq!(read(temp_dir.path(), "packages/a/pyproject.toml"), project("0.2.0"));
        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("1.0.1"));
        assert_eq!(report.bumped[0].decision, BumpDecision::ManuallyBumped);
        assert_eq!(report.staged_paths, vec![PathBuf::from("pyproject.toml")]);
    }

    #[test]
    fn test_manual_root_bump_is_kept() {
        let (temp_dir, git) = workspace();
        write(temp_dir.path(), "pyproject.toml", &project("2.0.0"));
        let git = git.changed("packages/b/README.md").changed("pyproject.toml");

        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();

        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("2.0.0"));
        assert_eq!(read(temp_dir.path(), "packages/b/pyproject.toml"), project("0.2.1"));
        assert_eq!(report.staged_paths, vec![PathBuf::from("packages/b/pyproject.toml")]);
    }

    #[test]
    fn test_root_only_change_does_not_bump_root() {
        let (temp_dir, git) = workspace();
        let git = git.changed("pyproject.toml").changed("README.md");

        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();

        assert!(report.is_empty());
        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("1.0.0"));
    }

    #[test]
    fn test_no_op_run() {
        let (temp_dir, git) = workspace();
        let git = git.changed(".github/workflows/ci.yml");

        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();
        assert_eq!(report, RunReport::default());
    }

    #[test]
    fn test_empty_changeset() {
        let (temp_dir, git) = workspace();
        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_ignored_package_is_not_bumped() {
        let (temp_dir, git) = workspace();
        let git = git.changed("packages/a/src/a.py");

        let config = BumpConfig::new(temp_dir.path()).with_ignore_patterns(&["/a$"]).unwrap();
        let report = run(&config, &git).unwrap();

        assert!(report.is_empty());
        assert_eq!(read(temp_dir.path(), "packages/a/pyproject.toml"), project("0.1.0"));
        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("1.0.0"));
    }

    #[test]
    fn test_malformed_version_is_skipped_without_aborting() {
        let (temp_dir, git) = workspace();
        write(temp_dir.path(), "packages/a/pyproject.toml", &project("1.0.0-beta"));
        let git = git
            .base("packages/a/pyproject.toml", &project("1.0.0-beta"))
            .changed("packages/a/x.py")
            .changed("packages/b/x.py");

        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].package, Package::new("packages/a"));
        assert!(report.skipped[0].reason.contains("1.0.0-beta"));
        assert_eq!(read(temp_dir.path(), "packages/a/pyproject.toml"), project("1.0.0-beta"));
        assert_eq!(read(temp_dir.path(), "packages/b/pyproject.toml"), project("0.2.1"));
        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("1.0.1"));
    }

    #[test]
    fn test_unparsable_document_is_skipped() {
        let (temp_dir, git) = workspace();
        write(temp_dir.path(), "packages/a/pyproject.toml", "[project\n");
        let git = git.changed("packages/a/pyproject.toml");

        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert!(report.bumped.is_empty());
        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("1.0.0"));
    }

    #[test]
    fn test_missing_version_is_a_no_op() {
        let (temp_dir, git) = workspace();
        write(temp_dir.path(), "packages/a/pyproject.toml", "[project]\nname = \"a\"\n");
        let git = git.changed("packages/a/pyproject.toml");

        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();
        assert!(report.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_missing_root_metadata() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "pkg/pyproject.toml", &project("0.1.0"));
        let git = FakeGit::default().changed("pkg/main.py");

        let report = run(&BumpConfig::new(temp_dir.path()), &git).unwrap();
        assert_eq!(report.staged_paths, vec![PathBuf::from("pkg/pyproject.toml")]);
        assert!(!temp_dir.path().join("pyproject.toml").exists());
    }

    #[test]
    fn test_custom_root_metadata_path() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "python/pyproject.toml", &project("3.0.0"));
        write(temp_dir.path(), "python/libs/core/pyproject.toml", &project("0.0.9"));
        let git = FakeGit::default().changed("python/libs/core/core.py");

        let config =
            BumpConfig::new(temp_dir.path()).with_root_metadata_path("python/pyproject.toml");
        let report = run(&config, &git).unwrap();

        assert_eq!(read(temp_dir.path(), "python/libs/core/pyproject.toml"), project("0.0.10"));
        assert_eq!(read(temp_dir.path(), "python/pyproject.toml"), project("3.0.1"));
        assert_eq!(report.bumped.len(), 2);
    }

    #[test]
    fn test_absolute_root_metadata_path() {
        let (temp_dir, git) = workspace();
        let git = git.changed("packages/b/b.py");

        let config = BumpConfig::new(temp_dir.path())
            .with_root_metadata_path(temp_dir.path().join("pyproject.toml"));
        assert_eq!(config.root_metadata_path, PathBuf::from("pyproject.toml"));
        let report = run(&config, &git).unwrap();

        assert_eq!(read(temp_dir.path(), "packages/b/pyproject.toml"), project("0.2.1"));
        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("1.0.1"));
        assert_eq!(
            report.staged_paths,
            vec![PathBuf::from("packages/b/pyproject.toml"), PathBuf::from("pyproject.toml")]
        );
    }

    #[test]
    fn test_absolute_root_metadata_path_set_directly() {
        let (temp_dir, git) = workspace();
        let git = git.changed("packages/a/a.py");

        let mut config = BumpConfig::new(temp_dir.path());
        config.root_metadata_path = temp_dir.path().join("pyproject.toml");
        let report = run(&config, &git).unwrap();

        assert_eq!(read(temp_dir.path(), "pyproject.toml"), project("1.0.1"));
        assert!(report.bumped[1].package.is_root);
    }

    #[test]
    fn test_git_failure_aborts() {
        let (temp_dir, _) = workspace();
        let git = FakeGit { fail: true, ..FakeGit::default() };

        let err = run(&BumpConfig::new(temp_dir.path()), &git).unwrap_err();
        assert!(err.is_fatal());
    }
}
