//! Category Aggregate

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Slug;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) slug: Slug,
}

/// One row of the storefront's category sidebar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SidebarEntry {
    pub name: String,
    pub url: String,
    pub count: i64,
}

impl Category {
    pub fn create(name: impl Into<String>, slug: Slug) -> Result<Self, CategoryError> {
        let name = name.into().trim().to_string();
        if name.is_empty() { return Err(CategoryError::MissingName); }
        if name.chars().count() > 255 { return Err(CategoryError::NameTooLong); }
        Ok(Self { id: Uuid::now_v7().to_string(), name, slug })
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn slug(&self) -> &Slug { &self.slug }
    pub fn absolute_url(&self) -> String { format!("/category/{}", self.slug) }

    /// Sidebar listing from categories paired with their product counts.
    pub fn sidebar<'a>(counted: impl IntoIterator<Item = (&'a Category, i64)>) -> Vec<SidebarEntry> {
        counted
            .into_iter()
            .map(|(c, count)| SidebarEntry { name: c.name.clone(), url: c.absolute_url(), count })
            .collect()
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.name) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CategoryError { MissingName, NameTooLong }
impl std::error::Error for CategoryError {}
impl std::fmt::Display for CategoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::MissingName => write!(f, "Missing name"), Self::NameTooLong => write!(f, "Name too long") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_category_url() {
        let c = Category::create("Shoes", Slug::new("shoes").unwrap()).unwrap();
        assert_eq!(c.absolute_url(), "/category/shoes");
        assert_eq!(c.to_string(), "Shoes");
    }
    #[test]
    fn test_sidebar() {
        let clothes = Category::create("Clothes", Slug::new("clothes").unwrap()).unwrap();
        let shoes = Category::create("Shoes", Slug::new("shoes").unwrap()).unwrap();
        let entries = Category::sidebar([(&clothes, 3), (&shoes, 0)]);
        assert_eq!(entries, vec![
            SidebarEntry { name: "Clothes".into(), url: "/category/clothes".into(), count: 3 },
            SidebarEntry { name: "Shoes".into(), url: "/category/shoes".into(), count: 0 },
        ]);
    }
    #[test]
    fn test_missing_name() {
        assert_eq!(Category::create("  ", Slug::new("x").unwrap()), Err(CategoryError::MissingName));
    }
}
