use std::fmt;
use toml_edit::{DocumentMut, Item};

pub mod poetry_field;
pub mod project_field;

use poetry_field::PoetryField;
use project_field::ProjectField;

/// Where in a metadata document a version value was found.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    Project,
    Poetry,
}

impl SourceKey {
    pub fn field(self) -> &'static dyn VersionField {
        FIELDS
            .iter()
            .copied()
            .find(|field| field.source_key() == self)
            .unwrap_or(&ProjectField)
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.field().key_path().join("."))
    }
}

/// A location a version value can live at. Strategies are tried in the
/// order of [`FIELDS`]; the first one that yields a value wins.
pub trait VersionField: Sync {
    fn source_key(&self) -> SourceKey;
    fn key_path(&self) -> &'static [&'static str];

    /// Walks the key path from `root` without inserting missing keys.
    fn lookup<'a>(&self, root: &'a Item) -> Option<&'a Item> {
        let mut item = root;
        for key in self.key_path() {
            item = item.get(*key)?;
        }
        Some(item)
    }

    fn item<'a>(&self, document: &'a DocumentMut) -> Option<&'a Item> {
        self.lookup(document.as_item())
    }

    /// Non-string values are returned in their TOML form so that they fail
    /// version parsing later instead of silently reading as "missing".
    fn read(&self, document: &DocumentMut) -> Option<String> {
        let value = self.item(document)?.as_value()?;
        match value.as_str() {
            Some(version) => Some(version.to_string()),
            None => Some(value.to_string().trim().to_string()),
        }
    }
}

pub static FIELDS: &[&dyn VersionField] = &[&ProjectField, &PoetryField];

/// Runs every strategy in priority order and returns the first hit.
pub fn find_version(document: &DocumentMut) -> Option<(SourceKey, String)> {
    FIELDS
        .iter()
        .find_map(|field| field.read(document).map(|version| (field.source_key(), version)))
}
