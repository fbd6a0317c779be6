//! Data models for the file-manager service.
//!
//! `Blob` is the store-side metadata row; `Item` is the UI-facing entity
//! derived from one or more blobs on each listing.

pub mod blob;
pub mod item;
