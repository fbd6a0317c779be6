//! The UI-facing file/folder entity.

use serde::{Deserialize, Serialize};

/// Whether an item is a plain file or an (emulated) folder.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

/// One entry in a folder listing, as consumed by the browser widget.
///
/// Items are not persisted anywhere; they are derived from a prefix scan of
/// the blob table on every list request.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Item {
    /// Absolute-path-like identifier, always with a leading `/` and never a
    /// trailing one (folders included).
    pub id: String,

    /// Last path segment.
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ItemKind,

    /// Byte count; always 0 for folders.
    pub size: i64,

    /// Seconds since epoch. Folders inferred from a prefix scan carry no
    /// authentic metadata and report the scan time instead.
    pub date: i64,

    /// Payload download location for files; empty for folders.
    pub url: String,
}
