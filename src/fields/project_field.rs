use crate::fields::{SourceKey, VersionField};

/// The standard `[project] version = "..."` field.
pub struct ProjectField;

impl VersionField for ProjectField {
    fn source_key(&self) -> SourceKey {
        SourceKey::Project
    }

    fn key_path(&self) -> &'static [&'static str] {
        &["project", "version"]
    }
}
