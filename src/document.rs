use crate::discovery::Package;
use crate::error::{BumpError, Result};
use crate::fields::SourceKey;
use log::debug;
use std::path::{Path, PathBuf};
use toml_edit::{Document, DocumentMut, Item, Value};

pub fn parse_document(path: &Path, content: &str) -> Result<DocumentMut> {
    content.parse::<DocumentMut>().map_err(|source| BumpError::DocumentParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_document(path: &Path) -> Result<DocumentMut> {
    let content = std::fs::read_to_string(path).map_err(|source| BumpError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &content)
}

/// Returns `content` with the version string at `key` replaced by
/// `new_version`, or `None` if the document has no string at that location.
///
/// Only the bytes of the old string token are swapped, in the token's own
/// quote style. Line endings and a missing final newline are left alone.
pub fn set_version(
    path: &Path,
    content: &str,
    key: SourceKey,
    new_version: &str,
) -> Result<Option<String>> {
    let document = Document::parse(content).map_err(|source| BumpError::DocumentParse {
        path: path.to_path_buf(),
        source,
    })?;

    let value = key.field().lookup(document.as_item()).and_then(Item::as_value);
    let Some(Value::String(current)) = value else {
        return Ok(None);
    };
    let Some(span) = current.span() else {
        return Ok(None);
    };

    let quote = quote_of(&content[span.clone()]);
    let mut updated = String::with_capacity(content.len() + new_version.len());
    updated.push_str(&content[..span.start]);
    updated.push_str(quote);
    updated.push_str(new_version);
    updated.push_str(quote);
    updated.push_str(&content[span.end..]);
    Ok(Some(updated))
}

fn quote_of(token: &str) -> &'static str {
    const QUOTES: [&str; 4] = ["\"\"\"", "'''", "\"", "'"];
    QUOTES.into_iter().find(|quote| token.starts_with(quote)).unwrap_or("\"")
}

/// Rewrites the package's metadata file with `new_version` at `key` and
/// returns the repository-relative path that has to be re-staged.
pub fn apply_bump(
    root: &Path,
    package: &Package,
    key: SourceKey,
    new_version: &str,
) -> Result<PathBuf> {
    let path = root.join(&package.metadata_path);
    let original = std::fs::read_to_string(&path).map_err(|source| BumpError::Io {
        path: path.clone(),
        source,
    })?;

    let Some(updated) = set_version(&path, &original, key, new_version)? else {
        let document = parse_document(&path, &original)?;
        return Err(BumpError::MalformedVersion {
            version: key.field().read(&document).unwrap_or_default(),
        });
    };

    if updated != original {
        std::fs::write(&path, updated).map_err(|source| BumpError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote {} = {} to '{}'", key, new_version, path.display());
    }

    Ok(package.metadata_path.clone())
}
