//! API request/response models for saved medicines.
//!
//! Field names are camelCase on the wire to match the upload response, so a reviewed candidate
//! can be posted back unchanged.

use crate::db::models::medicines::MedicineDBResponse;
use crate::types::MedicineId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicineCreate {
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub notification_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicineUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub notification_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicineResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MedicineId,
    pub user_email: String,
    pub name: String,
    pub dosage: Option<String>,
    pub notification_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MedicineDBResponse> for MedicineResponse {
    fn from(db: MedicineDBResponse) -> Self {
        Self {
            id: db.id,
            user_email: db.user_email,
            name: db.name,
            dosage: db.dosage,
            notification_id: db.notification_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_accepts_camel_case_candidate() {
        let create: MedicineCreate = serde_json::from_value(json!({
            "name": "Paracetamol",
            "dosage": "500mg",
            "notificationId": "n-1",
        }))
        .unwrap();
        assert_eq!(create.notification_id.as_deref(), Some("n-1"));

        let minimal: MedicineCreate = serde_json::from_value(json!({ "name": "Ibuprofen" })).unwrap();
        assert!(minimal.dosage.is_none());
    }
}
