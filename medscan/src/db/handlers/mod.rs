//! Repository implementations for database access.
//!
//! - [`Users`]: accounts and credential lookup
//! - [`Medicines`]: medicines a user has saved from reviewed upload results
//!
//! Each repository wraps a borrowed `PgConnection`, so callers decide whether operations share a
//! transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let user = Users::new(&mut tx).create(&request).await?;
//! tx.commit().await?;
//! ```

pub mod medicines;
pub mod repository;
pub mod users;

pub use medicines::{MedicineFilter, Medicines};
pub use repository::Repository;
pub use users::{UserFilter, Users};
