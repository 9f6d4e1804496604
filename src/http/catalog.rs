//! Category and product routes, including image upload.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::{AppState, PaginatedResponse};
use crate::domain::aggregates::{
    latest_for_main_page, Category, Product, ProductDetails, ProductKind, SidebarEntry, MAIN_PAGE_PER_KIND,
};
use crate::domain::value_objects::{Money, Slug};
use crate::imaging::RawImage;
use crate::{Result, StorefrontError};

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ImageView { pub filename: String, pub content_type: String, pub width: u32, pub height: u32, pub url: String }

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: String,
    pub kind: ProductKind,
    pub category_id: String,
    pub title: String,
    pub slug: String,
    pub url: String,
    pub display_name: String,
    pub description: Option<String>,
    pub price: Money,
    pub details: ProductDetails,
    pub image: Option<ImageView>,
    pub created_at: DateTime<Utc>,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        let url = p.absolute_url();
        Self {
            id: p.id().to_string(), kind: p.kind(), category_id: p.category_id().to_string(),
            title: p.title().to_string(), slug: p.slug().to_string(), display_name: p.display_name(),
            description: p.description().map(str::to_string), price: p.price().clone(), details: p.details().clone(),
            image: p.image().map(|i| ImageView {
                filename: i.filename.clone(), content_type: i.content_type.clone(), width: i.width, height: i.height,
                url: format!("/api/v1{url}/image"),
            }),
            created_at: p.created_at(), url,
        }
    }
}

// =============================================================================
// Categories
// =============================================================================

pub async fn category_sidebar(State(s): State<AppState>) -> Result<Json<Vec<SidebarEntry>>> {
    let counted = s.store.categories_with_counts().await?;
    Ok(Json(Category::sidebar(counted.iter().map(|(c, n)| (c, *n)))))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub slug: Option<String>,
}

pub async fn create_category(State(s): State<AppState>, Json(r): Json<CreateCategoryRequest>) -> Result<(StatusCode, Json<Category>)> {
    r.validate()?;
    let slug = match r.slug { Some(slug) => Slug::new(slug)?, None => Slug::from_title(&r.name)? };
    let category = Category::create(r.name, slug)?;
    s.store.insert_category(&category).await?;
    info!(category_id = %category.id(), slug = %category.slug(), "Created category");
    Ok((StatusCode::CREATED, Json(category)))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }

pub async fn list_products(State(s): State<AppState>, Path(kind): Path<String>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<ProductView>>> {
    let kind: ProductKind = kind.parse()?;
    let page = p.page.unwrap_or(1).max(1); let per_page = p.per_page.unwrap_or(20).clamp(1, 100);
    let (products, total) = s.store.products(kind, per_page as i64, ((page - 1) * per_page) as i64).await?;
    Ok(Json(PaginatedResponse { data: products.iter().map(ProductView::from).collect(), total, page }))
}

#[derive(Debug, Deserialize)] pub struct LatestParams { pub kinds: Option<String>, pub with_respect_to: Option<String> }

/// Main page feed. `kinds` is a comma separated list (default: every kind).
pub async fn latest_products(State(s): State<AppState>, Query(p): Query<LatestParams>) -> Result<Json<Vec<ProductView>>> {
    let kinds = match p.kinds.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(list) => list.split(',').map(|k| k.trim().parse::<ProductKind>()).collect::<std::result::Result<Vec<_>, _>>()?,
        None => ProductKind::ALL.to_vec(),
    };
    // An unknown `with_respect_to` only disables the reordering.
    let with_respect_to = p.with_respect_to.and_then(|k| k.parse::<ProductKind>().ok());
    let products = s.store.latest_products(&kinds, MAIN_PAGE_PER_KIND as i64).await?;
    let selected = latest_for_main_page(&products, &kinds, with_respect_to);
    Ok(Json(selected.into_iter().map(ProductView::from).collect()))
}

pub async fn get_product(State(s): State<AppState>, Path((kind, slug)): Path<(String, String)>) -> Result<Json<ProductView>> {
    let product = s.store.product(kind.parse()?, &slug).await?;
    Ok(Json(ProductView::from(&product)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    /// Whole currency units; the price columns hold up to 9 999 999 999.99.
    #[validate(range(min = 0, max = 9999999999))]
    pub price: i64,
    /// Kind-specific attributes; the kind comes from the path.
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

pub async fn create_product(State(s): State<AppState>, Path(kind): Path<String>, Json(r): Json<CreateProductRequest>) -> Result<(StatusCode, Json<ProductView>)> {
    let kind: ProductKind = kind.parse()?;
    r.validate()?;

    let mut details = r.details;
    details.insert("kind".into(), serde_json::Value::String(kind.as_str().into()));
    let details: ProductDetails = serde_json::from_value(serde_json::Value::Object(details))
        .map_err(|e| StorefrontError::Validation(format!("invalid {kind} details: {e}")))?;

    let category = s.store.category(&r.category_id.to_string()).await?;
    if let Some(editor) = s.admin.editor_for(kind) {
        if category.slug().as_str() != editor.category_slug() {
            return Err(StorefrontError::Validation(format!("{kind} must be filed under the `{}` category", editor.category_slug())));
        }
    }

    let slug = match r.slug { Some(slug) => Slug::new(slug)?, None => Slug::from_title(&r.title)? };
    let price = Money::new(Decimal::from(r.price), &s.config.currency);
    let mut product = Product::create(&category, r.title, slug, price, details)?;
    product.set_description(r.description);
    s.store.insert_product(&product).await?;
    s.events.publish(product.take_events()).await;
    info!(product_id = %product.id(), %kind, slug = %product.slug(), "Created product");
    Ok((StatusCode::CREATED, Json(ProductView::from(&product))))
}

// =============================================================================
// Images
// =============================================================================

fn multipart_error(e: MultipartError) -> StorefrontError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StorefrontError::UploadTooLarge
    } else {
        StorefrontError::BadRequest(e.body_text())
    }
}

/// Takes the `image` field of a multipart form.
async fn read_upload(mut multipart: Multipart) -> Result<RawImage> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") { continue; }
        let filename = field.file_name().unwrap_or("image").to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(RawImage::new(filename, bytes.to_vec()));
    }
    Err(StorefrontError::BadRequest("multipart field `image` is missing".into()))
}

/// Replaces a product's image. The upload is normalized before the product
/// is looked up, and nothing is written unless normalization succeeds.
pub async fn upload_image(
    State(s): State<AppState>,
    Path((kind, slug)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<Json<ProductView>> {
    let kind: ProductKind = kind.parse()?;
    let raw = read_upload(multipart).await?;
    let filename = raw.filename.clone();
    let normalized = s.normalizer.normalize_blocking(raw, s.config.image_timeout).await.map_err(|e| {
        warn!(%kind, %slug, %filename, error = %e, "Rejected product image");
        e
    })?;

    let mut product = s.store.product(kind, &slug).await?;
    product.set_image(normalized);
    s.store.save_product_image(&product).await?;
    s.events.publish(product.take_events()).await;
    Ok(Json(ProductView::from(&product)))
}

pub async fn get_image(State(s): State<AppState>, Path((kind, slug)): Path<(String, String)>) -> Result<impl IntoResponse> {
    let image = s.store.product_image(kind.parse()?, &slug).await?;
    let disposition = format!("inline; filename=\"{}\"", image.filename.replace('"', ""));
    Ok(([(header::CONTENT_TYPE, image.content_type), (header::CONTENT_DISPOSITION, disposition)], image.bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ShoesDetails;
    use crate::imaging::NormalizedImage;

    fn boot() -> Product {
        let category = Category::create("Shoes", Slug::new("shoes").unwrap()).unwrap();
        let details = ProductDetails::Shoes(ShoesDetails {
            model: "Chelsea".into(), gender: "male".into(), season: "winter".into(), size: Decimal::new(43, 0), color: "brown".into(),
        });
        Product::create(&category, "Chelsea Boot", Slug::new("chelsea-boot").unwrap(), Money::new(Decimal::new(2400, 0), "MDL"), details).unwrap()
    }

    #[test]
    fn test_product_view_without_image() {
        let view = ProductView::from(&boot());
        assert_eq!(view.url, "/products/shoes/chelsea-boot");
        assert_eq!(view.display_name, "Shoes : Chelsea Boot");
        assert!(view.image.is_none());
    }

    #[test]
    fn test_product_view_links_image() {
        let mut product = boot();
        product.set_image(NormalizedImage {
            filename: "boot.jpg".into(), content_type: "image/jpeg".into(), width: 800, height: 600, bytes: vec![],
        });
        let view = ProductView::from(&product);
        let image = view.image.unwrap();
        assert_eq!(image.url, "/api/v1/products/shoes/chelsea-boot/image");
        assert_eq!((image.width, image.height), (800, 600));

        let json = serde_json::to_value(&ProductView::from(&product)).unwrap();
        assert_eq!(json["details"]["kind"], "shoes");
        assert!(json["image"].get("bytes").is_none());
    }
}
