//! Storefront Catalog
//!
//! Data layer of a clothing storefront.
//!
//! ## Features
//! - Product catalog (clothes, shoes, accessories) with category sidebar
//! - Product image normalization (size limit, 400 to 800px band, RGB JPEG)
//! - Shopping cart and customer accounts
//! - Order management
//! - Admin registry with per-kind category scoping

pub mod admin;
pub mod config;
pub mod domain;
pub mod http;
pub mod imaging;
pub mod publisher;
pub mod store;

use thiserror::Error;

use crate::domain::aggregates::{CartError, CategoryError, CustomerError, OrderError, ProductError};
use crate::domain::value_objects::SlugError;
use crate::imaging::ImageError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("Category not found")]
    CategoryNotFound,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Product has no image")]
    ImageNotFound,

    #[error("Cart not found")]
    CartNotFound,

    #[error("Cart item not found")]
    CartItemNotFound,

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Order not found")]
    OrderNotFound,

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Upload exceeds the request body limit")]
    UploadTooLarge,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

macro_rules! validation_from {
    ($($err:ty),* $(,)?) => {
        $(impl From<$err> for StorefrontError {
            fn from(e: $err) -> Self { Self::Validation(e.to_string()) }
        })*
    };
}

validation_from!(CategoryError, ProductError, CustomerError, OrderError, SlugError, validator::ValidationErrors);

impl From<CartError> for StorefrontError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::ItemNotFound => Self::CartItemNotFound,
            other => Self::Validation(other.to_string()),
        }
    }
}
