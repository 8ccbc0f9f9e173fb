pub mod auth;
pub mod medicines;
pub mod pagination;
pub mod uploads;
pub mod users;
