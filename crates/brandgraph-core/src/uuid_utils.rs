//! UUID v7 utilities for time-ordered identifiers.
//!
//! Node and relation IDs are UUIDv7: the embedded millisecond timestamp
//! makes lexicographic order match creation order, which is what gives
//! "ordered by creation" listings a stable tie-break.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// True if the UUID is version 7.
pub fn is_v7(id: &Uuid) -> bool {
    id.get_version_num() == 7
}
