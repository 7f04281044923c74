use crate::changes::ChangeMode;
use crate::error::{BumpError, Result};
use git2::{Delta, ErrorCode, Repository, Tree};
use log::debug;
use std::path::{Path, PathBuf};

/// The two git queries the bump engine depends on.
pub trait GitSource {
    /// Paths (relative to the repository root) changed under `mode`.
    fn changed_files(&self, mode: &ChangeMode) -> Result<Vec<PathBuf>>;

    /// Contents of `path` at `revision`, or `None` if the file did not
    /// exist there.
    fn read_at_revision(&self, revision: &str, path: &Path) -> Result<Option<String>>;
}

pub struct GitTracker {
    pub repository: Repository,
}

impl GitTracker {
    /// Opens the repository containing `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repository = Repository::discover(path).map_err(|source| {
            BumpError::git(format!("failed to find git repository at {:?}", path), source)
        })?;

        debug!("Opened repository at {:?}", repository.path());

        Ok(GitTracker { repository })
    }

    /// The working directory root; `None` for bare repositories.
    pub fn workdir(&self) -> Option<&Path> {
        self.repository.workdir()
    }

    fn resolve_tree(&self, revision: &str) -> Result<Tree<'_>> {
        self.repository
            .revparse_single(revision)
            .and_then(|object| object.peel_to_tree())
            .map_err(|source| BumpError::git(format!("failed to resolve '{revision}'"), source))
    }

    /// The tree at HEAD, or `None` before the first commit.
    fn head_tree(&self) -> Result<Option<Tree<'_>>> {
        match self.repository.head() {
            Ok(head) => head
                .peel_to_tree()
                .map(Some)
                .map_err(|source| BumpError::git("failed to read HEAD tree", source)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                debug!("HEAD is unborn, treating it as an empty tree");
                Ok(None)
            }
            Err(source) => Err(BumpError::git("failed to resolve HEAD", source)),
        }
    }

    fn tree_at(&self, revision: &str) -> Result<Option<Tree<'_>>> {
        if revision == "HEAD" {
            self.head_tree()
        } else {
            self.resolve_tree(revision).map(Some)
        }
    }

    /// Files staged in the index relative to HEAD
    pub fn staged_files(&self) -> Result<Vec<PathBuf>> {
        let head = self.head_tree()?;
        let diff = self
            .repository
            .diff_tree_to_index(head.as_ref(), None, None)
            .map_err(|source| BumpError::git("failed to diff HEAD against the index", source))?;
        Ok(Self::diff_paths(&diff))
    }

    /// Files that differ between two revisions
    pub fn files_between(&self, before: &str, after: &str) -> Result<Vec<PathBuf>> {
        let before_tree = self.resolve_tree(before)?;
        let after_tree = self.resolve_tree(after)?;
        let diff = self
            .repository
            .diff_tree_to_tree(Some(&before_tree), Some(&after_tree), None)
            .map_err(|source| {
                BumpError::git(format!("failed to diff '{before}'..'{after}'"), source)
            })?;
        Ok(Self::diff_paths(&diff))
    }

    fn diff_paths(diff: &git2::Diff<'_>) -> Vec<PathBuf> {
        diff.deltas()
            .filter(|delta| delta.status() != Delta::Unmodified)
            .filter_map(|delta| {
                delta
                    .new_file()
                    .path()
                    .or_else(|| delta.old_file().path())
                    .map(Path::to_path_buf)
            })
            .collect()
    }

    /// Adds the given repository-relative paths to the index
    pub fn stage_paths(&self, paths: &[PathBuf]) -> Result<()> {
        let mut index = self
            .repository
            .index()
            .map_err(|source| BumpError::git("failed to open the index", source))?;

        for path in paths {
            index.add_path(path).map_err(|source| {
                BumpError::git(format!("failed to stage '{}'", path.display()), source)
            })?;
            debug!("Staged '{}'", path.display());
        }

        index
            .write()
            .map_err(|source| BumpError::git("failed to write the index", source))
    }
}

impl GitSource for GitTracker {
    fn changed_files(&self, mode: &ChangeMode) -> Result<Vec<PathBuf>> {
        let files = match mode {
            ChangeMode::Staged => self.staged_files()?,
            ChangeMode::Range { before, after } => self.files_between(before, after)?,
        };
        debug!("Changed files: {:?}", files);
        Ok(files)
    }

    fn read_at_revision(&self, revision: &str, path: &Path) -> Result<Option<String>> {
        let Some(tree) = self.tree_at(revision)? else {
            return Ok(None);
        };

        let entry = match tree.get_path(path) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(source) => {
                return Err(BumpError::git(
                    format!("failed to look up '{}' at '{revision}'", path.display()),
                    source,
                ));
            }
        };

        let blob = entry
            .to_object(&self.repository)
            .and_then(|object| object.peel_to_blob())
            .map_err(|source| {
                BumpError::git(format!("failed to read '{}' at '{revision}'", path.display()), source)
            })?;

        Ok(Some(String::from_utf8_lossy(blob.content()).into_owned()))
    }
}
