//! Represents a single entry (file or folder) in a bucket listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad content classification used by the browsing UI to pick a renderer.
///
/// Derived purely from the file extension; anything unrecognized is `File`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Image,
    Video,
    Text,
    File,
}

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "svg"];
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "webm", "mov", "avi"];
const TEXT_EXTENSIONS: [&str; 12] = [
    "txt", "text", "log", "json", "yaml", "yml", "ini", "conf", "cfg", "config", "properties",
    "props",
];

impl ObjectKind {
    /// Classify a file by the lowercase extension of its relative name.
    pub fn from_name(name: &str) -> Self {
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => ext.to_lowercase(),
            _ => return ObjectKind::File,
        };
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            ObjectKind::Image
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            ObjectKind::Video
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            ObjectKind::Text
        } else {
            ObjectKind::File
        }
    }
}

/// A single file or folder within a prefix listing.
///
/// Immutable once constructed. Folders carry `size: 0`, `kind: File`, and a
/// `name` equal to the first path segment after the listing prefix.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntry {
    /// Full object key within the bucket (for folders, the common prefix).
    pub key: String,

    /// Key relative to the listing prefix.
    pub name: String,

    /// Size in bytes. Always 0 for folders.
    pub size: u64,

    /// Timestamp when the object was last modified.
    pub last_modified: DateTime<Utc>,

    /// Whether this entry is a folder (delimited common prefix).
    pub is_folder: bool,

    /// Content classification derived from the extension.
    #[serde(rename = "type")]
    pub kind: ObjectKind,
}

impl ObjectEntry {
    /// Build a file entry from a full key, stripping the listing prefix to
    /// derive the relative name and classify it.
    pub fn file(key: impl Into<String>, full_prefix: &str, size: u64, last_modified: DateTime<Utc>) -> Self {
        let key = key.into();
        let name = key
            .strip_prefix(full_prefix)
            .unwrap_or(&key)
            .trim_start_matches('/')
            .to_string();
        let kind = ObjectKind::from_name(&name);
        Self {
            key,
            name,
            size,
            last_modified,
            is_folder: false,
            kind,
        }
    }

    /// Build a folder entry from a delimited common prefix.
    ///
    /// The name is the common prefix with the listing prefix and the trailing
    /// slash removed.
    pub fn folder(common_prefix: impl Into<String>, full_prefix: &str, now: DateTime<Utc>) -> Self {
        let key = common_prefix.into();
        let name = key
            .strip_prefix(full_prefix)
            .unwrap_or(&key)
            .trim_start_matches('/')
            .trim_end_matches('/')
            .to_string();
        Self {
            key,
            name,
            size: 0,
            last_modified: now,
            is_folder: true,
            kind: ObjectKind::File,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(ObjectKind::from_name("photo.JPG"), ObjectKind::Image);
        assert_eq!(ObjectKind::from_name("clip.webm"), ObjectKind::Video);
        assert_eq!(ObjectKind::from_name("notes/readme.txt"), ObjectKind::Text);
        assert_eq!(ObjectKind::from_name("app.properties"), ObjectKind::Text);
        assert_eq!(ObjectKind::from_name("archive.tar.gz"), ObjectKind::File);
        assert_eq!(ObjectKind::from_name("binary.exe"), ObjectKind::File);
    }

    #[test]
    fn no_extension_is_plain_file() {
        assert_eq!(ObjectKind::from_name("Makefile"), ObjectKind::File);
        assert_eq!(ObjectKind::from_name(""), ObjectKind::File);
        assert_eq!(ObjectKind::from_name(".gitignore"), ObjectKind::File);
    }

    #[test]
    fn file_entry_strips_prefix() {
        let entry = ObjectEntry::file("data/photos/cat.png", "data/photos/", 42, Utc::now());
        assert_eq!(entry.name, "cat.png");
        assert_eq!(entry.kind, ObjectKind::Image);
        assert!(!entry.is_folder);
    }

    #[test]
    fn folder_entry_trims_delimiter() {
        let entry = ObjectEntry::folder("data/photos/2024/", "data/photos/", Utc::now());
        assert_eq!(entry.name, "2024");
        assert_eq!(entry.size, 0);
        assert!(entry.is_folder);
        assert_eq!(entry.kind, ObjectKind::File);
    }

    #[test]
    fn serializes_kind_as_type_field() {
        let entry = ObjectEntry::file("a.jpg", "", 1, Utc::now());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["isFolder"], false);
    }
}
