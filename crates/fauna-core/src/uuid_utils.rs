//! UUID v7 utilities for time-ordered identifiers.
//!
//! Jobs and tags use UUIDv7 so primary keys sort by creation time, which
//! keeps the queue's `ORDER BY created_at` index and the id index aligned.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use fauna_core::uuid_utils::new_v7;
///
/// let id = new_v7();
/// assert_eq!(id.get_version_num(), 7);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}
