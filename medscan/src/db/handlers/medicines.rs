//! Database repository for saved medicines.
//!
//! A repository can be scoped to an owner with [`Medicines::scoped_to`]. Scoped lookups, updates
//! and deletes only ever see rows whose `user_email` matches, so a row belonging to someone else
//! behaves exactly like a missing one.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::medicines::{MedicineCreateDBRequest, MedicineDBResponse, MedicineUpdateDBRequest},
};
use crate::types::{MedicineId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing one user's medicines
#[derive(Debug, Clone)]
pub struct MedicineFilter {
    pub user_email: String,
    pub skip: i64,
    pub limit: i64,
}

impl MedicineFilter {
    pub fn new(user_email: impl Into<String>, skip: i64, limit: i64) -> Self {
        Self {
            user_email: user_email.into(),
            skip,
            limit,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct Medicine {
    pub id: MedicineId,
    pub user_email: String,
    pub name: String,
    pub dosage: Option<String>,
    pub notification_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Medicine> for MedicineDBResponse {
    fn from(m: Medicine) -> Self {
        Self {
            id: m.id,
            user_email: m.user_email,
            name: m.name,
            dosage: m.dosage,
            notification_id: m.notification_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

const COLUMNS: &str = "id, user_email, name, dosage, notification_id, created_at, updated_at";

pub struct Medicines<'c> {
    db: &'c mut PgConnection,
    owner: Option<String>,
}

impl<'c> Medicines<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db, owner: None }
    }

    /// Restrict `get_by_id`, `update` and `delete` to rows owned by `user_email`.
    pub fn scoped_to(mut self, user_email: impl Into<String>) -> Self {
        self.owner = Some(user_email.into());
        self
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Medicines<'c> {
    type CreateRequest = MedicineCreateDBRequest;
    type UpdateRequest = MedicineUpdateDBRequest;
    type Response = MedicineDBResponse;
    type Id = MedicineId;
    type Filter = MedicineFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let query = format!(
            "INSERT INTO medicines (id, user_email, name, dosage, notification_id) VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        );
        let medicine = sqlx::query_as::<_, Medicine>(&query)
            .bind(Uuid::new_v4())
            .bind(&request.user_email)
            .bind(&request.name)
            .bind(&request.dosage)
            .bind(&request.notification_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(medicine.into())
    }

    #[instrument(skip(self), fields(medicine_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let query = format!("SELECT {COLUMNS} FROM medicines WHERE id = $1 AND ($2::text IS NULL OR user_email = $2)");
        let medicine = sqlx::query_as::<_, Medicine>(&query)
            .bind(id)
            .bind(&self.owner)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(medicine.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let query = format!("SELECT {COLUMNS} FROM medicines WHERE user_email = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3");
        let medicines = sqlx::query_as::<_, Medicine>(&query)
            .bind(&filter.user_email)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(medicines.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(medicine_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM medicines WHERE id = $1 AND ($2::text IS NULL OR user_email = $2)")
            .bind(id)
            .bind(&self.owner)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(medicine_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let query = format!(
            r#"
            UPDATE medicines SET
                name = COALESCE($3, name),
                dosage = COALESCE($4, dosage),
                notification_id = COALESCE($5, notification_id),
                updated_at = NOW()
            WHERE id = $1 AND ($2::text IS NULL OR user_email = $2)
            RETURNING {COLUMNS}
            "#
        );
        let medicine = sqlx::query_as::<_, Medicine>(&query)
            .bind(id)
            .bind(&self.owner)
            .bind(&request.name)
            .bind(&request.dosage)
            .bind(&request.notification_id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)?;

        Ok(medicine.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Users;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    async fn create_owner(pool: &PgPool, email: &str) {
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: email.to_string(),
                name: email.to_string(),
                password_hash: "$argon2id$placeholder".to_string(),
            })
            .await
            .unwrap();
    }

    fn paracetamol(owner: &str) -> MedicineCreateDBRequest {
        MedicineCreateDBRequest {
            user_email: owner.to_string(),
            name: "Paracetamol".to_string(),
            dosage: Some("500mg".to_string()),
            notification_id: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_create_and_list_newest_first(pool: PgPool) {
        create_owner(&pool, "alice@example.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Medicines::new(&mut conn);

        repo.create(&paracetamol("alice@example.com")).await.unwrap();
        let mut second = paracetamol("alice@example.com");
        second.name = "Amoxicillin".to_string();
        repo.create(&second).await.unwrap();

        let listed = repo.list(&MedicineFilter::new("alice@example.com", 0, 10)).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Amoxicillin");
        assert_eq!(listed[1].dosage.as_deref(), Some("500mg"));

        let other = repo.list(&MedicineFilter::new("bob@example.com", 0, 10)).await.unwrap();
        assert!(other.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_scoped_update_and_delete_ignore_other_owners(pool: PgPool) {
        create_owner(&pool, "alice@example.com").await;
        create_owner(&pool, "bob@example.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let created = Medicines::new(&mut conn).create(&paracetamol("alice@example.com")).await.unwrap();

        let mut bob = Medicines::new(&mut conn).scoped_to("bob@example.com");
        let update = MedicineUpdateDBRequest {
            dosage: Some("1g".to_string()),
            ..Default::default()
        };
        assert!(matches!(bob.update(created.id, &update).await, Err(DbError::NotFound)));
        assert!(bob.get_by_id(created.id).await.unwrap().is_none());
        assert!(!bob.delete(created.id).await.unwrap());

        let mut alice = Medicines::new(&mut conn).scoped_to("alice@example.com");
        let updated = alice.update(created.id, &update).await.unwrap();
        assert_eq!(updated.dosage.as_deref(), Some("1g"));
        assert_eq!(updated.name, "Paracetamol");
        assert!(alice.delete(created.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_blank_name_is_check_violation(pool: PgPool) {
        create_owner(&pool, "alice@example.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut blank = paracetamol("alice@example.com");
        blank.name = "   ".to_string();

        let err = Medicines::new(&mut conn).create(&blank).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_unknown_owner_is_foreign_key_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let err = Medicines::new(&mut conn).create(&paracetamol("ghost@example.com")).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
