//! Cart Aggregate

use rust_decimal::Decimal;
use uuid::Uuid;
use crate::domain::aggregates::{Product, ProductKind};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug)]
pub struct Cart {
    pub(crate) id: String,
    pub(crate) owner_id: Option<String>,
    pub(crate) products: Vec<CartProduct>,
    pub(crate) total_products: u32,
    pub(crate) final_price: Money,
    pub(crate) in_order: bool,
    pub(crate) for_anonymous_user: bool,
    pub(crate) events: Vec<DomainEvent>,
}

/// A product placed in a cart. `final_price` is always `qty × unit_price`.
#[derive(Clone, Debug, PartialEq)]
pub struct CartProduct {
    pub(crate) id: String,
    pub(crate) customer_id: String,
    pub(crate) product_kind: ProductKind,
    pub(crate) product_id: String,
    pub(crate) title: String,
    pub(crate) qty: Quantity,
    pub(crate) unit_price: Money,
    pub(crate) final_price: Money,
}

impl CartProduct {
    pub fn new(customer_id: impl Into<String>, product: &Product, qty: u32) -> Self {
        let qty = Quantity::new(qty);
        Self {
            id: Uuid::now_v7().to_string(), customer_id: customer_id.into(),
            product_kind: product.kind(), product_id: product.id().to_string(), title: product.title().to_string(),
            qty, unit_price: product.price().clone(), final_price: product.price().multiply(qty.value()),
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn product_kind(&self) -> ProductKind { self.product_kind }
    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn qty(&self) -> u32 { self.qty.value() }
    pub fn final_price(&self) -> &Money { &self.final_price }

    pub fn set_qty(&mut self, qty: u32) {
        self.qty = Quantity::new(qty);
        self.final_price = self.unit_price.multiply(qty);
    }
}

impl std::fmt::Display for CartProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Product: {}", self.title) }
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(), owner_id: None, products: vec![], total_products: 0,
            final_price: Money::zero(currency), in_order: false, for_anonymous_user: false, events: vec![],
        }
    }

    pub fn for_customer(customer_id: impl Into<String>, currency: &str) -> Self {
        let mut cart = Self::new(currency);
        cart.owner_id = Some(customer_id.into());
        cart
    }

    pub fn anonymous(currency: &str) -> Self {
        let mut cart = Self::new(currency);
        cart.for_anonymous_user = true;
        cart
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn owner_id(&self) -> Option<&str> { self.owner_id.as_deref() }
    pub fn products(&self) -> &[CartProduct] { &self.products }
    pub fn total_products(&self) -> u32 { self.total_products }
    pub fn final_price(&self) -> &Money { &self.final_price }
    pub fn in_order(&self) -> bool { self.in_order }
    pub fn for_anonymous_user(&self) -> bool { self.for_anonymous_user }
    pub fn is_empty(&self) -> bool { self.products.is_empty() }

    /// Adds `qty` of `product`; a product already in the cart has its
    /// quantity increased instead of getting a second line.
    pub fn add_product(&mut self, customer_id: &str, product: &Product, qty: u32) -> Result<&CartProduct, CartError> {
        if self.in_order { return Err(CartError::AlreadyOrdered); }
        if qty == 0 { return Err(CartError::InvalidQuantity); }
        if product.price().currency() != self.final_price.currency() { return Err(CartError::CurrencyMismatch); }

        let mut products = self.products.clone();
        let index = match products.iter().position(|l| l.product_kind == product.kind() && l.product_id == product.id()) {
            Some(i) => {
                let merged = products[i].qty.add(qty).value();
                products[i].set_qty(merged);
                i
            }
            None => {
                products.push(CartProduct::new(customer_id, product, qty));
                products.len() - 1
            }
        };
        self.replace_products(products)?;
        self.events.push(DomainEvent::Cart(CartEvent::ProductAdded {
            cart_id: self.id.clone(), product_id: product.id().to_string(), qty,
        }));
        Ok(&self.products[index])
    }

    pub fn update_qty(&mut self, line_id: &str, qty: u32) -> Result<(), CartError> {
        if self.in_order { return Err(CartError::AlreadyOrdered); }
        if qty == 0 { return self.remove_product(line_id); }
        let mut products = self.products.clone();
        products.iter_mut().find(|l| l.id == line_id).ok_or(CartError::ItemNotFound)?.set_qty(qty);
        self.replace_products(products)
    }

    pub fn remove_product(&mut self, line_id: &str) -> Result<(), CartError> {
        if self.in_order { return Err(CartError::AlreadyOrdered); }
        let before = self.products.len();
        self.products.retain(|l| l.id != line_id);
        if self.products.len() == before { return Err(CartError::ItemNotFound); }
        self.events.push(DomainEvent::Cart(CartEvent::ProductRemoved { cart_id: self.id.clone(), line_id: line_id.to_string() }));
        self.recalculate();
        Ok(())
    }

    pub fn mark_in_order(&mut self) -> Result<(), CartError> {
        if self.in_order { return Err(CartError::AlreadyOrdered); }
        if self.products.is_empty() { return Err(CartError::Empty); }
        self.in_order = true;
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    /// Installs `products` only if every line and the cart total stay within
    /// what the price columns hold.
    fn replace_products(&mut self, products: Vec<CartProduct>) -> Result<(), CartError> {
        let total = products.iter().map(|l| l.final_price.amount()).sum::<Decimal>();
        if total > Money::max_amount() || products.iter().any(|l| l.final_price.exceeds_max()) {
            return Err(CartError::TotalTooLarge);
        }
        self.products = products;
        self.recalculate();
        Ok(())
    }

    pub(crate) fn recalculate(&mut self) {
        let currency = self.final_price.currency().to_string();
        self.total_products = self.products.len() as u32;
        self.final_price = self.products.iter().fold(Money::zero(&currency), |acc, l| acc.add(&l.final_price).unwrap_or(acc));
    }
}

impl std::fmt::Display for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.id) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound, InvalidQuantity, AlreadyOrdered, Empty, CurrencyMismatch, TotalTooLarge }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound => write!(f, "Item not found"),
            Self::InvalidQuantity => write!(f, "Quantity must be at least 1"),
            Self::AlreadyOrdered => write!(f, "Cart already belongs to an order"),
            Self::Empty => write!(f, "Cart is empty"),
            Self::CurrencyMismatch => write!(f, "Product is priced in a different currency"),
            Self::TotalTooLarge => write!(f, "Cart total exceeds {}", Money::max_amount()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{AccessoriesDetails, Category, ProductDetails};
    use crate::domain::value_objects::Slug;

    fn product(title: &str, price: i64) -> Product {
        let cat = Category::create("Accessories", Slug::new("accessories").unwrap()).unwrap();
        let details = ProductDetails::Accessories(AccessoriesDetails { gender: "f".into(), color: "green".into() });
        Product::create(&cat, title, Slug::from_title(title).unwrap(), Money::new(Decimal::new(price, 0), "MDL"), details).unwrap()
    }

    #[test]
    fn test_cart_operations() {
        let belt = product("Belt", 150);
        let hat = product("Hat", 200);
        let mut cart = Cart::for_customer("C1", "MDL");
        cart.add_product("C1", &belt, 2).unwrap();
        assert_eq!(cart.total_products(), 1);
        assert_eq!(cart.final_price().amount(), Decimal::new(300, 0));

        let line = cart.add_product("C1", &belt, 1).unwrap();
        assert_eq!(line.qty(), 3); // Merged
        assert_eq!(line.final_price().amount(), Decimal::new(450, 0));

        cart.add_product("C1", &hat, 1).unwrap();
        assert_eq!(cart.total_products(), 2);
        assert_eq!(cart.final_price().amount(), Decimal::new(650, 0));

        let hat_line = cart.products()[1].id().to_string();
        cart.remove_product(&hat_line).unwrap();
        assert_eq!(cart.final_price().amount(), Decimal::new(450, 0));
        assert_eq!(cart.remove_product(&hat_line), Err(CartError::ItemNotFound));
    }

    #[test]
    fn test_update_qty_to_zero_removes() {
        let mut cart = Cart::anonymous("MDL");
        let line = cart.add_product("C1", &product("Gloves", 90), 1).unwrap().id().to_string();
        cart.update_qty(&line, 4).unwrap();
        assert_eq!(cart.final_price().amount(), Decimal::new(360, 0));
        cart.update_qty(&line, 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.final_price().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_ordered_cart_is_frozen() {
        let mut cart = Cart::new("MDL");
        assert_eq!(cart.mark_in_order(), Err(CartError::Empty));
        cart.add_product("C1", &product("Ring", 1000), 1).unwrap();
        cart.mark_in_order().unwrap();
        assert_eq!(cart.add_product("C1", &product("Chain", 10), 1).unwrap_err(), CartError::AlreadyOrdered);
    }

    #[test]
    fn test_total_must_fit_storage() {
        let mut cart = Cart::new("MDL");
        let watch = product("Watch", 100_000);
        let line = cart.add_product("C1", &watch, 1).unwrap().id().to_string();
        assert_eq!(cart.add_product("C1", &watch, 1_000_000).unwrap_err(), CartError::TotalTooLarge);
        assert_eq!(cart.update_qty(&line, 100_000_000).unwrap_err(), CartError::TotalTooLarge);

        // The failed changes leave the cart as it was.
        assert_eq!(cart.products()[0].qty(), 1);
        assert_eq!(cart.final_price().amount(), Decimal::new(100_000, 0));

        let mut full = Cart::new("MDL");
        full.add_product("C1", &product("Crown", 9_000_000_000), 1).unwrap();
        assert_eq!(full.add_product("C1", &product("Sceptre", 1_000_000_000), 1).unwrap_err(), CartError::TotalTooLarge);
        assert_eq!(full.total_products(), 1);
    }

    #[test]
    fn test_rejects_other_currency() {
        let mut cart = Cart::new("EUR");
        assert_eq!(cart.add_product("C1", &product("Cap", 10), 1).unwrap_err(), CartError::CurrencyMismatch);
    }
}
