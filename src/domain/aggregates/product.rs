//! Product Aggregate
//!
//! Clothes, shoes and accessories share one base shape (category, title, slug,
//! image, description, price); what differs lives in [`ProductDetails`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};
use crate::domain::aggregates::Category;
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, Slug};
use crate::imaging::{ImageError, ImageNormalizer, NormalizedImage, RawImage};

/// How many of each kind the main page shows.
pub const MAIN_PAGE_PER_KIND: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind { Clothes, Shoes, Accessories }

impl ProductKind {
    pub const ALL: [ProductKind; 3] = [Self::Clothes, Self::Shoes, Self::Accessories];

    pub fn as_str(&self) -> &'static str {
        match self { Self::Clothes => "clothes", Self::Shoes => "shoes", Self::Accessories => "accessories" }
    }
}

impl FromStr for ProductKind {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|k| k.as_str() == s).ok_or_else(|| ProductError::UnknownKind(s.to_string()))
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct ClothesDetails {
    #[validate(length(max = 255))] pub model: String,
    #[validate(length(max = 255))] pub gender: String,
    #[validate(length(max = 255))] pub season: String,
    #[validate(length(max = 255))] pub style: String,
    #[validate(length(max = 5))] pub size: String,
    #[validate(length(max = 255))] pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct ShoesDetails {
    #[validate(length(max = 20))] pub model: String,
    #[validate(length(max = 20))] pub gender: String,
    #[validate(length(max = 20))] pub season: String,
    #[validate(custom = "validate_shoe_size")] pub size: Decimal,
    #[validate(length(max = 255))] pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct AccessoriesDetails {
    #[validate(length(max = 20))] pub gender: String,
    #[validate(length(max = 255))] pub color: String,
}

/// Sizes are stored with three digits, one of them after the point.
fn validate_shoe_size(size: &Decimal) -> Result<(), ValidationError> {
    if size.is_sign_negative() || size.scale() > 1 || *size >= Decimal::new(100, 0) {
        return Err(ValidationError::new("shoe_size"));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProductDetails {
    Clothes(ClothesDetails),
    Shoes(ShoesDetails),
    Accessories(AccessoriesDetails),
}

impl ProductDetails {
    pub fn kind(&self) -> ProductKind {
        match self {
            Self::Clothes(_) => ProductKind::Clothes,
            Self::Shoes(_) => ProductKind::Shoes,
            Self::Accessories(_) => ProductKind::Accessories,
        }
    }

    fn validate(&self) -> Result<(), ProductError> {
        let result = match self {
            Self::Clothes(d) => d.validate(),
            Self::Shoes(d) => d.validate(),
            Self::Accessories(d) => d.validate(),
        };
        result.map_err(|e| ProductError::InvalidDetails(e.to_string()))
    }
}

#[derive(Clone, Debug)]
pub struct Product {
    pub(crate) id: String,
    pub(crate) category_id: String,
    pub(crate) category_name: String,
    pub(crate) title: String,
    pub(crate) slug: Slug,
    pub(crate) image: Option<NormalizedImage>,
    pub(crate) description: Option<String>,
    pub(crate) price: Money,
    pub(crate) details: ProductDetails,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    pub(crate) events: Vec<DomainEvent>,
}

impl Product {
    pub fn create(
        category: &Category,
        title: impl Into<String>,
        slug: Slug,
        price: Money,
        details: ProductDetails,
    ) -> Result<Self, ProductError> {
        let title = title.into().trim().to_string();
        if title.is_empty() { return Err(ProductError::MissingTitle); }
        if title.chars().count() > 255 { return Err(ProductError::TitleTooLong); }
        check_price(&price)?;
        details.validate()?;

        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        let mut product = Self {
            id: id.clone(), category_id: category.id().to_string(), category_name: category.name().to_string(),
            title, slug: slug.clone(), image: None, description: None, price, details,
            created_at: now, updated_at: now, events: vec![],
        };
        let kind = product.kind().as_str().to_string();
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, kind, slug }));
        Ok(product)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn kind(&self) -> ProductKind { self.details.kind() }
    pub fn category_id(&self) -> &str { &self.category_id }
    pub fn title(&self) -> &str { &self.title }
    pub fn slug(&self) -> &Slug { &self.slug }
    pub fn image(&self) -> Option<&NormalizedImage> { self.image.as_ref() }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }
    pub fn price(&self) -> &Money { &self.price }
    pub fn details(&self) -> &ProductDetails { &self.details }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn display_name(&self) -> String { format!("{} : {}", self.category_name, self.title) }
    pub fn absolute_url(&self) -> String { format!("/products/{}/{}", self.kind(), self.slug) }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description.filter(|d| !d.trim().is_empty());
        self.touch();
    }

    pub fn update_price(&mut self, price: Money) -> Result<(), ProductError> {
        check_price(&price)?;
        self.price = price;
        self.touch();
        Ok(())
    }

    /// Replaces the kind-specific attributes. The kind itself cannot change.
    pub fn update_details(&mut self, details: ProductDetails) -> Result<(), ProductError> {
        if details.kind() != self.kind() { return Err(ProductError::KindMismatch); }
        details.validate()?;
        self.details = details;
        self.touch();
        Ok(())
    }

    /// Normalizes `raw` and stores the result. On failure the current image
    /// stays in place.
    pub fn attach_image(&mut self, raw: &RawImage, normalizer: &ImageNormalizer) -> Result<&NormalizedImage, ImageError> {
        let normalized = normalizer.normalize(raw)?;
        Ok(self.set_image(normalized))
    }

    /// Stores an image that already went through the normalizer.
    pub fn set_image(&mut self, image: NormalizedImage) -> &NormalizedImage {
        self.raise_event(DomainEvent::Product(ProductEvent::ImageNormalized {
            product_id: self.id.clone(), filename: image.filename.clone(),
            width: image.width, height: image.height, size: image.size(),
        }));
        self.touch();
        self.image.insert(image)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

fn check_price(price: &Money) -> Result<(), ProductError> {
    if price.amount().is_sign_negative() { return Err(ProductError::NegativePrice); }
    if price.exceeds_max() { return Err(ProductError::PriceTooLarge); }
    Ok(())
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.display_name()) }
}

/// Main page selection: up to [`MAIN_PAGE_PER_KIND`] newest products of each
/// requested kind, in request order. When `with_respect_to` is one of the
/// requested kinds its products move to the front; the rest keep their order.
pub fn latest_for_main_page<'a>(
    products: &'a [Product],
    requested: &[ProductKind],
    with_respect_to: Option<ProductKind>,
) -> Vec<&'a Product> {
    let mut selected: Vec<&Product> = requested
        .iter()
        .flat_map(|kind| {
            let mut of_kind: Vec<&Product> = products.iter().filter(|p| p.kind() == *kind).collect();
            of_kind.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
            of_kind.into_iter().take(MAIN_PAGE_PER_KIND)
        })
        .collect();

    if let Some(first) = with_respect_to.filter(|k| requested.contains(k)) {
        selected.sort_by_key(|p| p.kind() != first);
    }
    selected
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductError { MissingTitle, TitleTooLong, NegativePrice, PriceTooLarge, KindMismatch, UnknownKind(String), InvalidDetails(String) }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "Missing title"),
            Self::TitleTooLong => write!(f, "Title too long"),
            Self::NegativePrice => write!(f, "Price cannot be negative"),
            Self::PriceTooLarge => write!(f, "Price exceeds {}", Money::max_amount()),
            Self::KindMismatch => write!(f, "Details belong to a different product kind"),
            Self::UnknownKind(kind) => write!(f, "Unknown product kind: {kind}"),
            Self::InvalidDetails(reason) => write!(f, "Invalid product details: {reason}"),
        }
    }
}
