//! HTTP request handlers for all API endpoints.
//!
//! Handlers receive requests via Axum's extractor system, authenticate through the
//! [`CurrentUser`](crate::api::models::users::CurrentUser) extractor where required, call into
//! repositories or the upload pipeline, and return typed responses or [`Error`](crate::errors::Error).

pub mod auth;
pub mod medicines;
pub mod upload;
pub mod users;
