//! `POST /upload`: run one prescription image through the pipeline.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use bytes::BytesMut;
use tracing::{debug, instrument};

use crate::{
    AppState,
    api::models::{uploads::UploadResponse, users::CurrentUser},
    errors::{Error, Result},
    pipeline::{PipelineError, UploadRequest},
};

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// Room for multipart boundaries and part headers on top of the file itself.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Transport errors become 400, except the body limit which is reported like any oversized file.
fn multipart_error(e: MultipartError, bytes_read: u64, max_file_size: u64) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return PipelineError::PayloadTooLarge {
            size: bytes_read.max(max_file_size.saturating_add(1)),
            max: max_file_size,
        }
        .into();
    }

    Error::BadRequest {
        message: format!("Failed to parse multipart data: {e}"),
    }
}

/// Upload a prescription image and extract medicine candidates
#[utoipa::path(
    post,
    path = "/upload",
    tag = "upload",
    request_body(
        content_type = "multipart/form-data",
        description = "Prescription image in the `image` field"
    ),
    responses(
        (status = 200, description = "Text recognised and medicines extracted", body = UploadResponse),
        (status = 400, description = "No file uploaded"),
        (status = 401, description = "Not authenticated"),
        (status = 413, description = "File exceeds the upload size limit"),
        (status = 500, description = "OCR or extraction failed"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[instrument(skip_all, fields(owner = %current_user.email))]
pub async fn upload_prescription(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let max_file_size = state.pipeline.max_file_size();
    let mut image: Option<(BytesMut, Option<String>, Option<String>)> = None;
    let mut bytes_read = 0u64;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, bytes_read, max_file_size))?
    {
        if field.name() != Some(IMAGE_FIELD) || image.is_some() {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let mut buffer = BytesMut::new();

        // Stop reading as soon as the limit is crossed; nothing has been written yet
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, bytes_read, max_file_size))?
        {
            bytes_read += chunk.len() as u64;
            if bytes_read > max_file_size {
                return Err(PipelineError::PayloadTooLarge {
                    size: bytes_read,
                    max: max_file_size,
                }
                .into());
            }
            buffer.extend_from_slice(&chunk);
        }

        image = Some((buffer, filename, content_type));
    }

    let Some((bytes, filename, content_type)) = image else {
        return Err(PipelineError::NoFile.into());
    };

    let outcome = state
        .pipeline
        .process(UploadRequest {
            owner: current_user.email,
            bytes: bytes.freeze(),
            filename,
            content_type,
        })
        .await?;

    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session;
    use crate::api::models::uploads::MedicineCandidateResponse;
    use crate::test_utils::{create_test_config, create_test_state, upload_dir_entries};
    use axum::{extract::DefaultBodyLimit, routing::post};
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use uuid::Uuid;

    const PRESCRIPTION: &str = "1) TAB. DOLO 650 1 Morning, 1 Night 5 Days\n2) CAP AMOXY 500 1 Morning 3 Days";

    struct Harness {
        server: TestServer,
        token: String,
        upload_dir: tempfile::TempDir,
    }

    fn harness(max_file_size: u64) -> Harness {
        let upload_dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config();
        config.uploads.max_file_size = max_file_size;
        config.uploads.dir = upload_dir.path().to_path_buf();
        let state = create_test_state(config);

        let token = session::create_session_token(
            &CurrentUser {
                id: Uuid::new_v4(),
                email: "patient@example.com".to_string(),
                name: "Test Patient".to_string(),
            },
            &state.config,
        )
        .unwrap();

        let limit = max_file_size as usize + MULTIPART_OVERHEAD;
        let app = axum::Router::new()
            .route("/upload", post(upload_prescription).layer(DefaultBodyLimit::max(limit)))
            .with_state(state);

        Harness {
            server: TestServer::new(app).unwrap(),
            token,
            upload_dir,
        }
    }

    fn image_form(contents: &[u8]) -> MultipartForm {
        MultipartForm::new().add_part(IMAGE_FIELD, Part::bytes(contents.to_vec()).file_name("prescription.png").mime_type("image/png"))
    }

    #[tokio::test]
    async fn test_upload_success() {
        let h = harness(1024 * 1024);

        let response = h
            .server
            .post("/upload")
            .authorization_bearer(&h.token)
            .multipart(image_form(PRESCRIPTION.as_bytes()).add_text("comment", "ignored"))
            .await;

        response.assert_status_ok();
        let body: UploadResponse = response.json();
        assert_eq!(body.ocr_text, PRESCRIPTION);
        assert_eq!(
            body.cleaned_text,
            "1) TAB. DOLO 650 1 Morning, 1 Night 5 Days 2) CAP AMOXY 500 1 Morning 3 Days"
        );
        assert_eq!(body.medicines.len(), 2);
        assert_eq!(
            body.medicines[0],
            MedicineCandidateResponse {
                name: "TAB DOLO".to_string(),
                dosage: Some("1 Morning, 1 Night".to_string()),
                duration: Some("5 Days".to_string()),
                notification_id: None,
            }
        );
        assert!(upload_dir_entries(h.upload_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_upload_requires_authentication() {
        let h = harness(1024);
        h.server
            .post("/upload")
            .multipart(image_form(b"anything"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        assert!(upload_dir_entries(h.upload_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_image_field() {
        let h = harness(1024);

        let response = h
            .server
            .post("/upload")
            .authorization_bearer(&h.token)
            .multipart(MultipartForm::new().add_part("file", Part::bytes(b"wrong field".to_vec()).file_name("a.png")))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_text("No file uploaded");
    }

    #[tokio::test]
    async fn test_empty_image_field() {
        let h = harness(1024);

        let response = h
            .server
            .post("/upload")
            .authorization_bearer(&h.token)
            .multipart(image_form(b""))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_text("No file uploaded");
        assert!(upload_dir_entries(h.upload_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_oversized_image_rejected_without_write() {
        let h = harness(16);

        let response = h
            .server
            .post("/upload")
            .authorization_bearer(&h.token)
            .multipart(image_form(&[b'x'; 17]))
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        response.assert_text("File too large. Maximum upload size is 16 bytes");
        assert!(upload_dir_entries(h.upload_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_body_limit_maps_to_payload_too_large() {
        let h = harness(16);

        // Larger than the route body limit, so the transport rejects it mid-stream
        let huge = vec![b'x'; MULTIPART_OVERHEAD + 1024];
        let response = h
            .server
            .post("/upload")
            .authorization_bearer(&h.token)
            .multipart(MultipartForm::new().add_text("padding", String::from_utf8(huge).unwrap()).add_part(
                IMAGE_FIELD,
                Part::bytes(b"small".to_vec()).file_name("a.png"),
            ))
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
        assert!(upload_dir_entries(h.upload_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_exactly_at_limit_is_accepted() {
        let h = harness(PRESCRIPTION.len() as u64);

        h.server
            .post("/upload")
            .authorization_bearer(&h.token)
            .multipart(image_form(PRESCRIPTION.as_bytes()))
            .await
            .assert_status_ok();
    }
}
