use crate::discovery::Package;
use crate::document::{parse_document, read_document};
use crate::error::Result;
use crate::fields::{SourceKey, find_version};
use crate::git::GitSource;
use log::{debug, warn};
use std::fmt;
use std::path::Path;
use toml_edit::DocumentMut;

/// A version value read from a metadata document at one point in time.
/// A document without a version is represented by `None`, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub raw: String,
    pub source_key: SourceKey,
}

impl VersionRecord {
    pub fn from_document(document: &DocumentMut) -> Option<Self> {
        find_version(document).map(|(source_key, raw)| VersionRecord { raw, source_key })
    }
}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.raw, self.source_key)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BumpDecision {
    /// The metadata file is not present in the working tree.
    NoChange,
    /// The version differs from the base revision; the edit is respected.
    ManuallyBumped,
    /// The version equals the base revision (or has no base) and gets a patch bump.
    AutoBump,
    /// The document has no version field at any known location.
    MissingVersion,
}

impl fmt::Display for BumpDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BumpDecision::NoChange => "no change",
            BumpDecision::ManuallyBumped => "manually bumped",
            BumpDecision::AutoBump => "auto bump",
            BumpDecision::MissingVersion => "missing version",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub decision: BumpDecision,
    pub base: Option<VersionRecord>,
    pub current: Option<VersionRecord>,
}

/// Any difference between the base and current version string counts as a
/// manual bump, including decreases and non-numeric values.
pub fn decide(base: Option<&VersionRecord>, current: Option<&VersionRecord>) -> BumpDecision {
    match (base, current) {
        (_, None) => BumpDecision::MissingVersion,
        (None, Some(_)) => BumpDecision::AutoBump,
        (Some(base), Some(current)) if base.raw != current.raw => BumpDecision::ManuallyBumped,
        (Some(_), Some(_)) => BumpDecision::AutoBump,
    }
}

/// Compares the package's on-disk version with the one at `base_revision`.
///
/// A base document that does not parse is treated like a missing base. A
/// current document that does not parse is an error for this package.
pub fn classify<G: GitSource + ?Sized>(
    root: &Path,
    package: &Package,
    git: &G,
    base_revision: &str,
) -> Result<Classification> {
    let path = root.join(&package.metadata_path);
    if !path.is_file() {
        debug!("'{}' does not exist, nothing to do", package.metadata_path.display());
        return Ok(Classification { decision: BumpDecision::NoChange, base: None, current: None });
    }

    let current = VersionRecord::from_document(&read_document(&path)?);

    let base = match git.read_at_revision(base_revision, &package.metadata_path)? {
        Some(content) => match parse_document(&package.metadata_path, &content) {
            Ok(document) => VersionRecord::from_document(&document),
            Err(e) => {
                warn!(
                    "Ignoring unparsable '{}' at {}: {}",
                    package.metadata_path.display(),
                    base_revision,
                    e
                );
                None
            }
        },
        None => {
            debug!("'{}' is new since {}", package.metadata_path.display(), base_revision);
            None
        }
    };

    let decision = decide(base.as_ref(), current.as_ref());
    debug!(
        "{}: base={:?} current={:?} -> {}",
        package.display_name(),
        base.as_ref().map(|v| v.raw.as_str()),
        current.as_ref().map(|v| v.raw.as_str()),
        decision
    );

    Ok(Classification { decision, base, current })
}
