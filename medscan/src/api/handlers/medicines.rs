use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        medicines::{MedicineCreate, MedicineResponse, MedicineUpdate},
        pagination::Pagination,
        users::CurrentUser,
    },
    db::{
        handlers::{MedicineFilter, Medicines, Repository},
        models::medicines::{MedicineCreateDBRequest, MedicineUpdateDBRequest},
    },
    errors::{Error, Result},
    types::MedicineId,
};

fn not_found(id: MedicineId) -> Error {
    Error::NotFound {
        resource: "Medicine".to_string(),
        id: id.to_string(),
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Medicine name must not be empty".to_string(),
        });
    }
    Ok(())
}

/// List the caller's saved medicines, newest first
#[utoipa::path(
    get,
    path = "/api/v1/medicines",
    tag = "medicines",
    params(Pagination),
    responses(
        (status = 200, description = "Saved medicines", body = [MedicineResponse]),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_medicines(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<MedicineResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let filter = MedicineFilter::new(&current_user.email, pagination.skip(), pagination.limit());

    let medicines = Medicines::new(&mut conn).list(&filter).await?;
    Ok(Json(medicines.into_iter().map(Into::into).collect()))
}

/// Save a medicine, typically a reviewed upload candidate
#[utoipa::path(
    post,
    path = "/api/v1/medicines",
    tag = "medicines",
    request_body = MedicineCreate,
    responses(
        (status = 201, description = "Medicine saved", body = MedicineResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_medicine(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<MedicineCreate>,
) -> Result<(StatusCode, Json<MedicineResponse>)> {
    require_name(&create.name)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let medicine = Medicines::new(&mut conn)
        .create(&MedicineCreateDBRequest::new(current_user.email, create))
        .await?;

    Ok((StatusCode::CREATED, Json(medicine.into())))
}

/// Update one of the caller's medicines
#[utoipa::path(
    patch,
    path = "/api/v1/medicines/{id}",
    tag = "medicines",
    request_body = MedicineUpdate,
    params(("id" = String, Path, description = "Medicine ID")),
    responses(
        (status = 200, description = "Medicine updated", body = MedicineResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such medicine for this user"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(medicine_id = %id))]
pub async fn update_medicine(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<MedicineId>,
    Json(update): Json<MedicineUpdate>,
) -> Result<Json<MedicineResponse>> {
    if let Some(name) = &update.name {
        require_name(name)?;
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Medicines::new(&mut conn).scoped_to(current_user.email);

    let medicine = repo
        .update(id, &MedicineUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            crate::db::errors::DbError::NotFound => not_found(id),
            other => other.into(),
        })?;

    Ok(Json(medicine.into()))
}

/// Delete one of the caller's medicines
#[utoipa::path(
    delete,
    path = "/api/v1/medicines/{id}",
    tag = "medicines",
    params(("id" = String, Path, description = "Medicine ID")),
    responses(
        (status = 204, description = "Medicine deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such medicine for this user"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(medicine_id = %id))]
pub async fn delete_medicine(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<MedicineId>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Medicines::new(&mut conn).scoped_to(current_user.email).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
