//! HTTP surface: catalog, shopping and admin routes.

pub mod admin;
pub mod catalog;
pub mod shopping;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, http::StatusCode, response::{IntoResponse, Response}, routing::{get, post, put}, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::admin::AdminSite;
use crate::config::Config;
use crate::imaging::{ImageError, ImageNormalizer, MAX_SIZE};
use crate::publisher::EventPublisher;
use crate::store::PgStore;
use crate::StorefrontError;

/// Request bodies on the upload route may exceed the image limit so that the
/// normalizer, not the body reader, reports oversized images.
pub const UPLOAD_BODY_LIMIT: usize = 2 * MAX_SIZE;

#[derive(Clone)]
pub struct AppState {
    pub store: PgStore,
    pub events: EventPublisher,
    pub normalizer: ImageNormalizer,
    pub admin: Arc<AdminSite>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, events: EventPublisher, config: Config) -> Self {
        Self {
            store: PgStore::new(db),
            events,
            normalizer: ImageNormalizer::strict(config.strict_image_bounds),
            admin: Arc::new(AdminSite::storefront()),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-catalog"})) }))
        .route("/api/v1/categories", get(catalog::category_sidebar).post(catalog::create_category))
        .route("/api/v1/products/latest", get(catalog::latest_products))
        .route("/api/v1/products/:kind", get(catalog::list_products).post(catalog::create_product))
        .route("/api/v1/products/:kind/:slug", get(catalog::get_product))
        .route(
            "/api/v1/products/:kind/:slug/image",
            get(catalog::get_image).put(catalog::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/v1/customers", post(shopping::create_customer))
        .route("/api/v1/customers/:id", get(shopping::get_customer))
        .route("/api/v1/carts", post(shopping::create_cart))
        .route("/api/v1/carts/:id", get(shopping::get_cart))
        .route("/api/v1/carts/:id/products", post(shopping::add_to_cart))
        .route("/api/v1/carts/:id/products/:line_id", put(shopping::update_cart_line).delete(shopping::remove_from_cart))
        .route("/api/v1/orders", post(shopping::create_order))
        .route("/api/v1/orders/:id", get(shopping::get_order))
        .route("/api/v1/orders/:id/status", put(shopping::update_order_status))
        .route("/admin", get(admin::index))
        .route("/admin/products/:kind/form", get(admin::product_form))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        use StorefrontError::*;
        let status = match &self {
            CategoryNotFound | ProductNotFound | ImageNotFound | CartNotFound | CartItemNotFound
            | CustomerNotFound | OrderNotFound => StatusCode::NOT_FOUND,
            Image(ImageError::MaxSize { .. }) | UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Image(ImageError::TimedOut(_)) => StatusCode::GATEWAY_TIMEOUT,
            Image(ImageError::Encode(_) | ImageError::Task(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Image(_) | Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BadRequest(_) => StatusCode::BAD_REQUEST,
            Conflict(_) => StatusCode::CONFLICT,
            Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;
    use tower::ServiceExt;

    // Every request below is answered before the store is touched, so the
    // pool never connects.
    fn app() -> Router {
        let pool = PgPoolOptions::new().connect_lazy("postgres://storefront@localhost/unused").unwrap();
        let config = Config {
            database_url: "postgres://storefront@localhost/unused".into(), port: 0, nats_url: None,
            db_max_connections: 1, currency: "MDL".into(), image_timeout: Duration::from_secs(30), strict_image_bounds: false,
        };
        router(AppState::new(pool, EventPublisher::disabled(), config))
    }

    fn upload(uri: &str, field: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "storefront-test-boundary";
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.jpg\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        ).into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_upload_rejects_non_image() {
        let response = app().oneshot(upload("/api/v1/products/shoes/boot/image", "image", b"plain text")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().starts_with("Unsupported or corrupt image"));
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_image() {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(600, 600)).write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Jpeg).unwrap();
        bytes.resize(4 * 1024 * 1024, 0);
        let response = app().oneshot(upload("/api/v1/products/shoes/boot/image", "image", &bytes)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_upload_requires_image_field() {
        let response = app().oneshot(upload("/api/v1/products/shoes/boot/image", "photo", b"x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_unknown_kind() {
        let response = app().oneshot(upload("/api/v1/products/hats/cap/image", "image", b"x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_create_product_rejects_unstorable_price() {
        let body = serde_json::json!({
            "category_id": "0190a0b4-7a1e-7c3d-9f00-000000000001",
            "title": "Tiara",
            "price": 10_000_000_000_i64,
            "details": {"gender": "female", "color": "gold"},
        });
        let request = Request::post("/api/v1/products/accessories")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json_body(response).await["error"].as_str().unwrap().contains("price"));
    }

    #[tokio::test]
    async fn test_admin_index() {
        let response = app().oneshot(Request::get("/admin").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let resources = body["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 8);
        assert_eq!(resources[1]["name"], "clothes");
        assert_eq!(resources[1]["category_slug"], "clothes");
        assert!(body["image_help_text"].as_str().unwrap().contains("800px"));
    }
}
