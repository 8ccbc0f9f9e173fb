use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::users::{CurrentUser, UserResponse},
    db::handlers::{Repository, Users},
    errors::{Error, Result},
};

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/api/v1/users/current",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Account no longer exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // The token can outlive the account it was issued for
    let user = Users::new(&mut conn).get_by_id(current_user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: current_user.id.to_string(),
    })?;

    Ok(Json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session;
    use crate::db::models::users::UserCreateDBRequest;
    use crate::test_utils::{create_test_config, create_test_state, create_test_state_with_pool};
    use axum::{http::StatusCode, routing::get};
    use axum_test::TestServer;
    use sqlx::PgPool;

    fn router(state: AppState) -> axum::Router {
        axum::Router::new()
            .route("/api/v1/users/current", get(get_current_user))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let server = TestServer::new(router(create_test_state(create_test_config()))).unwrap();
        server.get("/api/v1/users/current").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[ignore = "requires PostgreSQL"]
    async fn test_returns_profile(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: "patient@example.com".to_string(),
                name: "Test Patient".to_string(),
                password_hash: "$argon2id$placeholder".to_string(),
            })
            .await
            .unwrap();
        drop(conn);

        let state = create_test_state_with_pool(create_test_config(), pool);
        let token = session::create_session_token(&UserResponse::from(user.clone()).into(), &state.config).unwrap();
        let server = TestServer::new(router(state)).unwrap();

        let response = server.get("/api/v1/users/current").authorization_bearer(token).await;
        response.assert_status_ok();
        let body: UserResponse = response.json();
        assert_eq!(body.id, user.id);
        assert_eq!(body.name, "Test Patient");
    }
}
