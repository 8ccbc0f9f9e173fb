//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier
//! - [`MedicineId`]: Saved medicine identifier

use uuid::Uuid;

pub type UserId = Uuid;
pub type MedicineId = Uuid;

/// First eight characters of a UUID, for compact log fields.
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
