//! Aggregates module
pub mod category;
pub mod product;
pub mod cart;
pub mod customer;
pub mod order;

pub use category::{Category, CategoryError, SidebarEntry};
pub use product::{
    latest_for_main_page, AccessoriesDetails, ClothesDetails, Product, ProductDetails, ProductError,
    ProductKind, ShoesDetails, MAIN_PAGE_PER_KIND,
};
pub use cart::{Cart, CartError, CartProduct};
pub use customer::{Customer, CustomerError};
pub use order::{BuyingType, Checkout, Order, OrderError, OrderStatus};
