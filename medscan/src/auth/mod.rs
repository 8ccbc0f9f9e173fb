//! Authentication for the upload API.
//!
//! Users register and log in with an email address and password. A successful login issues a
//! signed JWT which the client presents on later requests, either as a
//! `Authorization: Bearer <token>` header or through the HTTP-only session cookie set by the
//! login response.
//!
//! # Modules
//!
//! - [`current_user`]: the `CurrentUser` extractor used by protected handlers
//! - [`password`]: Argon2id password hashing and verification
//! - [`session`]: JWT session token creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use medscan::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.name)
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod session;
