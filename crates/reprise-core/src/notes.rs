//! Discovering markdown notes and resolving their frontmatter properties.
//!
//! The notes root is chosen by the user; we only read it.

use std::path::{Component, Path, PathBuf};

use serde_yaml::Value;
use walkdir::WalkDir;

use crate::filter::{Properties, PropertyValue};

/// Scans `root` for all `.md` files and returns their paths.
/// Does not follow symlinks into directories (walkdir default).
pub fn scan_notes(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let mut notes = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| ScanError::Walk(e.to_string()))?;
        if is_markdown(entry.path()) && entry.file_type().is_file() {
            notes.push(entry.into_path());
        }
    }
    Ok(notes)
}

fn is_markdown(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == "md")
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Identifier a note is tracked under: its path relative to `root` with `/` separators,
/// or the path as given when it lives outside the root.
pub fn note_id(root: Option<&Path>, path: &Path) -> String {
    let relative = root.and_then(|r| path.strip_prefix(r).ok()).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(p) => Some(p.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir | Component::ParentDir => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Absolute form of a note path given on the command line, relative to `cwd`.
///
/// The note itself may be gone (deleted, or the old side of a rename): then the parent
/// directory is resolved instead, and failing that the path is normalised lexically.
pub fn resolve_path(cwd: &Path, path: &Path) -> PathBuf {
    let joined = normalize(&cwd.join(path));
    if let Ok(resolved) = joined.canonicalize() {
        return resolved;
    }
    let from_parent = match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize().ok().map(|p| p.join(name)),
        _ => None,
    };
    from_parent.unwrap_or(joined)
}

/// Drops `.` and resolves `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Where a tracked id lives on disk.
pub fn note_path(root: Option<&Path>, id: &str) -> PathBuf {
    match root {
        Some(root) if Path::new(id).is_relative() => root.join(id),
        _ => PathBuf::from(id),
    }
}

/// Existence check used by the cleanup sweep.
pub fn note_exists(root: Option<&Path>, id: &str) -> std::io::Result<bool> {
    note_path(root, id).try_exists()
}

/// Reads a tracked note's properties. Unreadable notes have none.
pub fn read_properties(root: Option<&Path>, id: &str) -> Properties {
    match std::fs::read_to_string(note_path(root, id)) {
        Ok(raw) => parse_properties(&raw),
        Err(e) => {
            log::debug!("no properties for {id}: {e}");
            Properties::new()
        }
    }
}

/// Frontmatter properties of a note. Missing or invalid frontmatter yields an empty map.
pub fn parse_properties(content: &str) -> Properties {
    let Some(yaml) = frontmatter(content) else {
        return Properties::new();
    };
    let mapping: serde_yaml::Mapping = match serde_yaml::from_str(yaml) {
        Ok(Value::Mapping(m)) => m,
        Ok(_) => return Properties::new(),
        Err(e) => {
            log::debug!("ignoring unreadable frontmatter: {e}");
            return Properties::new();
        }
    };
    mapping
        .into_iter()
        .filter_map(|(key, value)| {
            let key = match key {
                Value::String(s) => s,
                other => scalar_key(&other)?,
            };
            Some((key, to_property(value)))
        })
        .collect()
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn to_property(value: Value) -> PropertyValue {
    match value {
        Value::Null => PropertyValue::Null,
        Value::Bool(b) => PropertyValue::Bool(b),
        Value::Number(n) => n.as_f64().map_or(PropertyValue::Null, PropertyValue::Number),
        Value::String(s) => PropertyValue::Text(s),
        Value::Sequence(seq) => PropertyValue::List(seq.into_iter().map(to_property).collect()),
        // Nested maps are not filterable.
        Value::Mapping(_) => PropertyValue::Null,
        Value::Tagged(tagged) => to_property(tagged.value),
    }
}

/// YAML between the opening `---` and the closing `---`, if present.
fn frontmatter(content: &str) -> Option<&str> {
    let s = content.trim_start();
    let after_first = s.strip_prefix("---")?;
    let end = after_first.find("\n---")?;
    Some(&after_first[..end])
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("walk error: {0}")]
    Walk(String),
}
