//! Captured content model.

mod types;

pub use types::{truncate_chars, Author, ContentRecord, Media, MediaKind, Stats};
