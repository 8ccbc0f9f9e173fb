//! Request and response records passed to and from the repositories.
//!
//! These are distinct from the API models in [`crate::api::models`] so the storage and wire
//! representations can evolve independently.

pub mod medicines;
pub mod users;
