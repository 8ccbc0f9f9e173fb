//! OpenAPI documentation for the HTTP API, served with Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api::{
    handlers,
    models::{auth, medicines, uploads, users},
};

/// Registers the two ways a session token can be presented.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `/authentication/login`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("medscan_session"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MedScan API",
        description = "Upload prescription images, extract medicine candidates, and keep the reviewed list."
    ),
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::users::get_current_user,
        handlers::medicines::list_medicines,
        handlers::medicines::create_medicine,
        handlers::medicines::update_medicine,
        handlers::medicines::delete_medicine,
        handlers::upload::upload_prescription,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::AuthResponse,
        auth::AuthSuccessResponse,
        users::UserResponse,
        users::CurrentUser,
        medicines::MedicineCreate,
        medicines::MedicineUpdate,
        medicines::MedicineResponse,
        uploads::UploadResponse,
        uploads::MedicineCandidateResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "authentication", description = "Registration, login and logout"),
        (name = "users", description = "The caller's profile"),
        (name = "medicines", description = "Medicines saved after reviewing an upload"),
        (name = "upload", description = "Prescription image processing"),
    )
)]
pub struct ApiDoc;
