use crate::fields::{SourceKey, VersionField};

/// Poetry's `[tool.poetry] version = "..."` field.
pub struct PoetryField;

impl VersionField for PoetryField {
    fn source_key(&self) -> SourceKey {
        SourceKey::Poetry
    }

    fn key_path(&self) -> &'static [&'static str] {
        &["tool", "poetry", "version"]
    }
}
