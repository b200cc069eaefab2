//! HTTP surface: index page, recognition, registration, listing, health.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::attendance::{AttendanceError, AttendanceService, Sighting};

const INDEX_HTML: &str = include_str!("../static/index.html");

const MISSING_IMAGE: &str = "No image uploaded";
const MISSING_NAME_OR_IMAGE: &str = "Missing name or image";
const TOO_LARGE: &str = "Upload too large";
const NO_FACE: &str = "No face detected.";
const STORE_EMPTY: &str = "No registered faces found. Please register first.";

type AppState = Arc<AttendanceService>;

pub fn router(service: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index).post(recognize))
        .route("/register", post(register))
        .route("/faces", get(list_faces))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

impl IntoResponse for AttendanceError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::MissingInput(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::UploadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, TOO_LARGE.to_string()),
            Self::InvalidImage(_) => (
                StatusCode::BAD_REQUEST,
                "Uploaded file is not a readable image".to_string(),
            ),
            Self::NoFaceDetected => (StatusCode::OK, NO_FACE.to_string()),
            Self::StoreEmpty => (StatusCode::OK, STORE_EMPTY.to_string()),
            Self::Engine(err) => {
                tracing::error!(error = %err, "face engine failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Face processing failed".to_string(),
                )
            }
            Self::Store(err) => {
                tracing::error!(error = %err, "face store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Face store unavailable".to_string(),
                )
            }
        };
        (status, message).into_response()
    }
}

/// Fields of an upload form. Empty values count as absent.
#[derive(Default)]
struct UploadForm {
    name: Option<String>,
    image: Option<Vec<u8>>,
}

async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
    missing: &'static str,
) -> Result<UploadForm, AttendanceError> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(%rejection, "request is not a multipart form");
        AttendanceError::MissingInput(missing)
    })?;

    let mut form = UploadForm::default();
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| body_error(err, missing))?;
        let Some(field) = field else {
            break;
        };

        let field_name = field.name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|err| body_error(err, missing))?;

        match field_name.as_str() {
            "name" => {
                let name = String::from_utf8_lossy(&data).into_owned();
                form.name = Some(name).filter(|n| !n.is_empty());
            }
            "image" => form.image = Some(data.to_vec()).filter(|b| !b.is_empty()),
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }
    Ok(form)
}

/// An over-limit body is reported as such; any other broken body counts
/// as a missing field.
fn body_error(err: MultipartError, missing: &'static str) -> AttendanceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!(error = %err, "upload rejected by body limit");
        AttendanceError::UploadTooLarge
    } else {
        tracing::debug!(error = %err, "malformed multipart body");
        AttendanceError::MissingInput(missing)
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn recognize(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, AttendanceError> {
    let form = read_form(multipart, MISSING_IMAGE).await?;
    let image = form.image.ok_or(AttendanceError::MissingInput(MISSING_IMAGE))?;

    let sightings = service.recognize(image).await?;
    Ok(Html(render_sightings(&sightings)))
}

async fn register(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, AttendanceError> {
    let form = read_form(multipart, MISSING_NAME_OR_IMAGE).await?;
    let (Some(name), Some(image)) = (form.name, form.image) else {
        return Err(AttendanceError::MissingInput(MISSING_NAME_OR_IMAGE));
    };

    let face = service.register(&name, image).await?;
    Ok(Html(format!(
        "Face registered successfully for {}",
        escape_html(&face.name)
    )))
}

async fn list_faces(State(service): State<AppState>) -> Result<Json<Vec<String>>, AttendanceError> {
    Ok(Json(service.registered_names().await?))
}

async fn health(State(service): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "rollcalld",
        "version": env!("CARGO_PKG_VERSION"),
        "store": service.store_backend(),
        "match_policy": service.policy().to_string(),
        "similarity_threshold": service.threshold(),
    }))
}

/// One line per face, joined for display inside an HTML element.
fn render_sightings(sightings: &[Sighting]) -> String {
    sightings
        .iter()
        .map(|s| match &s.name {
            Some(name) => format!("Attendance marked for {}", escape_html(name)),
            None => "Unknown face".to_string(),
        })
        .collect::<Vec<_>>()
        .join("<br>")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use crate::testing::{tiles_png, TileEncoder, BLACK, BLUE, GREEN, RED};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use rollcall_core::MatchPolicy;
    use rollcall_store::MemoryFaceStore;
    use tower::ServiceExt;

    const BOUNDARY: &str = "rollcall-test-boundary";

    fn app() -> Router {
        app_with_limit(1024 * 1024)
    }

    fn app_with_limit(max_upload_bytes: usize) -> Router {
        let engine = spawn_engine(Box::new(TileEncoder)).unwrap();
        let store = Arc::new(MemoryFaceStore::new());
        let service = AttendanceService::new(engine, store, MatchPolicy::Nearest, 0.4);
        router(Arc::new(service), max_upload_bytes)
    }

    fn form(uri: &str, name: Option<&str>, image: Option<Vec<u8>>) -> Request<Body> {
        let mut body = Vec::new();
        if let Some(name) = name {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(image) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"capture.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(&image);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn register(app: &Router, name: &str, colors: &[[u8; 3]]) -> (StatusCode, String) {
        send(app, form("/register", Some(name), Some(tiles_png(colors)))).await
    }

    async fn recognize(app: &Router, colors: &[[u8; 3]]) -> (StatusCode, String) {
        send(app, form("/", None, Some(tiles_png(colors)))).await
    }

    #[tokio::test]
    async fn test_register_then_recognize_same_face() {
        let app = app();
        let (status, body) = register(&app, "alice", &[RED]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Face registered successfully for alice");

        let (status, body) = recognize(&app, &[RED]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Attendance marked for alice");
    }

    #[tokio::test]
    async fn test_recognize_before_any_registration() {
        let app = app();
        let (status, body) = recognize(&app, &[RED]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, STORE_EMPTY);
    }

    #[tokio::test]
    async fn test_no_face_on_both_endpoints() {
        let app = app();
        let (status, body) = register(&app, "alice", &[BLACK]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, NO_FACE);

        register(&app, "bob", &[BLUE]).await;
        let (status, body) = recognize(&app, &[BLACK, BLACK]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, NO_FACE);
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let app = app();
        register(&app, "alice", &[RED]).await;
        register(&app, "alice", &[GREEN]).await;

        assert_eq!(recognize(&app, &[RED]).await.1, "Unknown face");
        assert_eq!(recognize(&app, &[GREEN]).await.1, "Attendance marked for alice");

        let (_, names) = send(&app, Request::get("/faces").body(Body::empty()).unwrap()).await;
        assert_eq!(names, r#"["alice"]"#);
    }

    #[tokio::test]
    async fn test_register_requires_name_and_image() {
        let app = app();
        let (status, body) = send(&app, form("/register", None, Some(tiles_png(&[RED])))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, MISSING_NAME_OR_IMAGE);

        let (status, _) = send(&app, form("/register", Some("alice"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, form("/register", Some(""), Some(tiles_png(&[RED])))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let not_multipart = Request::post("/register").body(Body::from("name=alice")).unwrap();
        let (status, body) = send(&app, not_multipart).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, MISSING_NAME_OR_IMAGE);
    }

    #[tokio::test]
    async fn test_recognize_requires_image() {
        let app = app();
        let (status, body) = send(&app, form("/", Some("alice"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, MISSING_IMAGE);
    }

    #[tokio::test]
    async fn test_unknown_face_alongside_known_face() {
        let app = app();
        register(&app, "alice", &[RED]).await;

        let (status, body) = recognize(&app, &[BLUE, RED]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Unknown face<br>Attendance marked for alice");
    }

    #[tokio::test]
    async fn test_unreadable_upload_is_bad_request() {
        let app = app();
        let (status, _) = send(&app, form("/register", Some("alice"), Some(b"nope".to_vec()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_as_too_large() {
        let app = app_with_limit(1024);
        let (status, body) = send(&app, form("/register", Some("alice"), Some(vec![0xAB; 4096]))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, TOO_LARGE);

        let (status, body) = send(&app, form("/", None, Some(vec![0xAB; 4096]))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, TOO_LARGE);
    }

    #[tokio::test]
    async fn test_upload_under_limit_is_accepted() {
        let app = app_with_limit(1024);
        let (status, body) = register(&app, "alice", &[RED]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Face registered successfully for alice");
    }

    #[tokio::test]
    async fn test_names_are_escaped() {
        let app = app();
        let (_, body) = register(&app, "<b>eve</b>", &[RED]).await;
        assert_eq!(body, "Face registered successfully for &lt;b&gt;eve&lt;/b&gt;");

        let (_, body) = recognize(&app, &[RED]).await;
        assert_eq!(body, "Attendance marked for &lt;b&gt;eve&lt;/b&gt;");
    }

    #[tokio::test]
    async fn test_index_and_health() {
        let app = app();
        let (status, body) = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<form id=\"registerForm\""));

        let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["store"], "memory");
        assert_eq!(health["match_policy"], "nearest");
    }
}
