//! Admin registry
//!
//! An explicit table of the resources the back office manages. Product kinds
//! get a [`CategoryScopedEditor`] which narrows the category choice list of
//! their form to a single category slug.

use crate::domain::aggregates::ProductKind;
use crate::imaging::resolution_help_text;

pub trait CategoryScopedEditor: Send + Sync {
    fn kind(&self) -> ProductKind;

    /// Only categories with this slug are offered in the product form.
    fn category_slug(&self) -> &'static str;

    fn image_help_text(&self) -> String {
        resolution_help_text()
    }
}

pub struct ClothesAdmin;
pub struct ShoesAdmin;
pub struct AccessoriesAdmin;

impl CategoryScopedEditor for ClothesAdmin {
    fn kind(&self) -> ProductKind { ProductKind::Clothes }
    fn category_slug(&self) -> &'static str { "clothes" }
}

impl CategoryScopedEditor for ShoesAdmin {
    fn kind(&self) -> ProductKind { ProductKind::Shoes }
    fn category_slug(&self) -> &'static str { "shoes" }
}

impl CategoryScopedEditor for AccessoriesAdmin {
    fn kind(&self) -> ProductKind { ProductKind::Accessories }
    fn category_slug(&self) -> &'static str { "accessories" }
}

static CLOTHES_ADMIN: ClothesAdmin = ClothesAdmin;
static SHOES_ADMIN: ShoesAdmin = ShoesAdmin;
static ACCESSORIES_ADMIN: AccessoriesAdmin = AccessoriesAdmin;

pub struct AdminResource {
    pub name: &'static str,
    pub editor: Option<&'static dyn CategoryScopedEditor>,
}

pub struct AdminSite {
    resources: Vec<AdminResource>,
}

impl AdminSite {
    pub fn storefront() -> Self {
        let plain = |name: &'static str| AdminResource { name, editor: None };
        Self {
            resources: vec![
                plain("category"),
                AdminResource { name: "clothes", editor: Some(&CLOTHES_ADMIN) },
                AdminResource { name: "shoes", editor: Some(&SHOES_ADMIN) },
                AdminResource { name: "accessories", editor: Some(&ACCESSORIES_ADMIN) },
                plain("cart-product"),
                plain("cart"),
                plain("customer"),
                plain("order"),
            ],
        }
    }

    pub fn resources(&self) -> &[AdminResource] {
        &self.resources
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r.name == name)
    }

    pub fn editor_for(&self, kind: ProductKind) -> Option<&'static dyn CategoryScopedEditor> {
        self.resources.iter().filter_map(|r| r.editor).find(|e| e.kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_an_editor() {
        let site = AdminSite::storefront();
        for kind in ProductKind::ALL {
            let editor = site.editor_for(kind).unwrap();
            assert_eq!(editor.kind(), kind);
            assert_eq!(editor.category_slug(), kind.as_str());
            assert!(editor.image_help_text().contains("400px"));
        }
    }

    #[test]
    fn test_registry() {
        let site = AdminSite::storefront();
        assert_eq!(site.resources().len(), 8);
        assert!(site.is_registered("order"));
        assert!(!site.is_registered("user"));
    }
}
