//! Database models for saved medicines.

use crate::api::models::medicines::{MedicineCreate, MedicineUpdate};
use crate::types::MedicineId;
use chrono::{DateTime, Utc};

/// Database request for saving a medicine against its owner
#[derive(Debug, Clone)]
pub struct MedicineCreateDBRequest {
    pub user_email: String,
    pub name: String,
    pub dosage: Option<String>,
    pub notification_id: Option<String>,
}

impl MedicineCreateDBRequest {
    pub fn new(user_email: impl Into<String>, create: MedicineCreate) -> Self {
        Self {
            user_email: user_email.into(),
            name: create.name.trim().to_string(),
            dosage: create.dosage,
            notification_id: create.notification_id,
        }
    }
}

/// Database request for updating a medicine. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct MedicineUpdateDBRequest {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub notification_id: Option<String>,
}

impl From<MedicineUpdate> for MedicineUpdateDBRequest {
    fn from(update: MedicineUpdate) -> Self {
        Self {
            name: update.name.map(|name| name.trim().to_string()),
            dosage: update.dosage,
            notification_id: update.notification_id,
        }
    }
}

/// Database response for a medicine
#[derive(Debug, Clone, PartialEq)]
pub struct MedicineDBResponse {
    pub id: MedicineId,
    pub user_email: String,
    pub name: String,
    pub dosage: Option<String>,
    pub notification_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
