//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): registration, login and logout
//! - **Users** (`/api/v1/users/current`): the caller's own profile
//! - **Medicines** (`/api/v1/medicines/*`): medicines saved after reviewing an upload
//! - **Upload** (`/upload`): prescription image processing
//!
//! OpenAPI documentation is served at `/docs` when the server is running.

pub mod handlers;
pub mod models;
