//! Back-office descriptors: the registered resources and the product form
//! metadata for each kind.

use axum::{extract::{Path, State}, Json};
use serde::Serialize;

use super::AppState;
use crate::domain::aggregates::{Category, ProductKind};
use crate::imaging::{resolution_help_text, MAX_RESOLUTION, MAX_SIZE, MIN_RESOLUTION};
use crate::{Result, StorefrontError};

#[derive(Debug, Serialize)]
pub struct ResourceView {
    pub name: &'static str,
    pub product_kind: Option<ProductKind>,
    pub category_slug: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct AdminIndex { pub resources: Vec<ResourceView>, pub image_help_text: String }

pub async fn index(State(s): State<AppState>) -> Json<AdminIndex> {
    let resources = s.admin.resources().iter().map(|r| ResourceView {
        name: r.name,
        product_kind: r.editor.map(|e| e.kind()),
        category_slug: r.editor.map(|e| e.category_slug()),
    }).collect();
    Json(AdminIndex { resources, image_help_text: resolution_help_text() })
}

#[derive(Debug, Serialize)]
pub struct ProductForm {
    pub kind: ProductKind,
    pub category_choices: Vec<Category>,
    pub image_help_text: String,
    pub min_resolution: u32,
    pub max_resolution: u32,
    pub max_size: usize,
}

/// Form metadata for a product kind. The category choices are narrowed to
/// the kind's own category.
pub async fn product_form(State(s): State<AppState>, Path(kind): Path<String>) -> Result<Json<ProductForm>> {
    let kind: ProductKind = kind.parse()?;
    let editor = s.admin.editor_for(kind)
        .ok_or_else(|| StorefrontError::BadRequest(format!("no editor registered for {kind}")))?;
    let category_choices = s.store.categories_by_slug(editor.category_slug()).await?;
    Ok(Json(ProductForm {
        kind,
        category_choices,
        image_help_text: editor.image_help_text(),
        min_resolution: MIN_RESOLUTION,
        max_resolution: MAX_RESOLUTION,
        max_size: MAX_SIZE,
    }))
}
