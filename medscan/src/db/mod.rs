//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL. Handlers never issue
//! SQL themselves; they open a connection or transaction and wrap it in a repository.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - request/response records)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use medscan::db::handlers::{Medicines, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = Medicines::new(&mut conn).scoped_to("patient@example.com");
//!
//!     let saved = repo.list(&MedicineFilter::new("patient@example.com", 0, 50)).await?;
//!     Ok(())
//! }
//! ```
//!
//! Queries use the runtime-checked `sqlx::query_as::<_, T>` API, so building the crate does not
//! require a live database.

pub mod errors;
pub mod handlers;
pub mod models;
