//! Order Aggregate
//!
//! Status is a plain field: any status can follow any other.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, Customer};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug)]
pub struct Order {
    pub(crate) id: String,
    pub(crate) customer_id: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) phone: String,
    pub(crate) cart_id: Option<String>,
    pub(crate) total: Money,
    pub(crate) address: Option<String>,
    pub(crate) status: OrderStatus,
    pub(crate) buying_type: BuyingType,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) order_date: NaiveDate,
    pub(crate) events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default] New,
    InProgress,
    #[serde(rename = "is_ready")] Ready,
    Completed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyingType {
    #[default]
    #[serde(rename = "self")]
    SelfPickup,
    Delivery,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [Self::New, Self::InProgress, Self::Ready, Self::Completed];
    pub fn as_str(&self) -> &'static str {
        match self { Self::New => "new", Self::InProgress => "in_progress", Self::Ready => "is_ready", Self::Completed => "completed" }
    }
    pub fn label(&self) -> &'static str {
        match self { Self::New => "New order", Self::InProgress => "Order in progress", Self::Ready => "Order out for delivery", Self::Completed => "Order completed" }
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

impl BuyingType {
    pub const ALL: [BuyingType; 2] = [Self::SelfPickup, Self::Delivery];
    pub fn as_str(&self) -> &'static str {
        match self { Self::SelfPickup => "self", Self::Delivery => "delivery" }
    }
}

impl FromStr for BuyingType {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| OrderError::UnknownBuyingType(s.to_string()))
    }
}

/// Contact details captured at checkout.
#[derive(Clone, Debug, Default)]
pub struct Checkout {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: Option<String>,
    pub buying_type: BuyingType,
    pub order_date: Option<NaiveDate>,
}

impl Order {
    /// Places an order for `cart`, freezing the cart and linking the order to
    /// the customer.
    pub fn place(customer: &mut Customer, cart: &mut Cart, checkout: Checkout) -> Result<Self, OrderError> {
        if checkout.first_name.trim().is_empty() || checkout.last_name.trim().is_empty() { return Err(OrderError::MissingName); }
        if checkout.phone.trim().is_empty() { return Err(OrderError::MissingPhone); }
        if checkout.phone.chars().count() > 20 { return Err(OrderError::PhoneTooLong); }
        let address = checkout.address.filter(|a| !a.trim().is_empty());
        if address.as_ref().is_some_and(|a| a.chars().count() > 1024) { return Err(OrderError::AddressTooLong); }
        if checkout.buying_type == BuyingType::Delivery && address.is_none() { return Err(OrderError::MissingAddress); }
        cart.mark_in_order().map_err(|e| OrderError::Cart(e.to_string()))?;

        let id = Uuid::now_v7().to_string();
        let now = Utc::now();
        let mut order = Self {
            id: id.clone(), customer_id: customer.id().to_string(),
            first_name: checkout.first_name.trim().to_string(), last_name: checkout.last_name.trim().to_string(),
            phone: checkout.phone.trim().to_string(), cart_id: Some(cart.id().to_string()), total: cart.final_price().clone(),
            address, status: OrderStatus::New, buying_type: checkout.buying_type,
            created_at: now, order_date: checkout.order_date.unwrap_or_else(|| now.date_naive()), events: vec![],
        };
        customer.add_order(&id);
        order.raise_event(DomainEvent::Order(OrderEvent::Created { order_id: id, customer_id: customer.id().to_string(), total: order.total.amount() }));
        Ok(order)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn customer_id(&self) -> &str { &self.customer_id }
    pub fn cart_id(&self) -> Option<&str> { self.cart_id.as_deref() }
    pub fn total(&self) -> &Money { &self.total }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn buying_type(&self) -> BuyingType { self.buying_type }
    pub fn order_date(&self) -> NaiveDate { self.order_date }

    pub fn set_status(&mut self, status: OrderStatus) {
        if status == self.status { return; }
        let from = self.status.as_str().to_string();
        self.status = status;
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id.clone(), from, to: status.as_str().to_string() }));
    }

    pub fn set_buying_type(&mut self, buying_type: BuyingType) { self.buying_type = buying_type; }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&self.id) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError { MissingName, MissingPhone, PhoneTooLong, AddressTooLong, MissingAddress, UnknownStatus(String), UnknownBuyingType(String), Cart(String) }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "First and last name are required"),
            Self::MissingPhone => write!(f, "Phone is required"),
            Self::PhoneTooLong => write!(f, "Phone too long"),
            Self::AddressTooLong => write!(f, "Address too long"),
            Self::MissingAddress => write!(f, "Delivery orders need an address"),
            Self::UnknownStatus(s) => write!(f, "Unknown order status: {s}"),
            Self::UnknownBuyingType(s) => write!(f, "Unknown buying type: {s}"),
            Self::Cart(reason) => write!(f, "Cart cannot be ordered: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use crate::domain::aggregates::{AccessoriesDetails, Category, Product, ProductDetails};
    use crate::domain::value_objects::Slug;

    fn filled_cart() -> Cart {
        let cat = Category::create("Accessories", Slug::new("accessories").unwrap()).unwrap();
        let details = ProductDetails::Accessories(AccessoriesDetails { gender: "u".into(), color: "black".into() });
        let bag = Product::create(&cat, "Bag", Slug::new("bag").unwrap(), Money::new(Decimal::new(500, 0), "MDL"), details).unwrap();
        let mut cart = Cart::new("MDL");
        cart.add_product("C1", &bag, 2).unwrap();
        cart
    }

    fn checkout() -> Checkout {
        Checkout { first_name: "Ana".into(), last_name: "Rusu".into(), phone: "069123456".into(), ..Default::default() }
    }

    #[test]
    fn test_order_workflow() {
        let mut customer = Customer::create("u-1", "Ana", "Rusu");
        let mut cart = filled_cart();
        let mut order = Order::place(&mut customer, &mut cart, checkout()).unwrap();
        assert!(cart.in_order());
        assert_eq!(order.status(), OrderStatus::New);
        assert_eq!(order.buying_type(), BuyingType::SelfPickup);
        assert_eq!(order.total().amount(), Decimal::new(1000, 0));
        assert_eq!(customer.order_ids(), [order.id().to_string()]);

        // No transition rules: completed can go straight back to new.
        order.set_status(OrderStatus::Completed);
        order.set_status(OrderStatus::New);
        let events = order.take_events();
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_delivery_needs_address() {
        let mut customer = Customer::create("u-1", "Ana", "Rusu");
        let mut cart = filled_cart();
        let err = Order::place(&mut customer, &mut cart, Checkout { buying_type: BuyingType::Delivery, ..checkout() }).unwrap_err();
        assert_eq!(err, OrderError::MissingAddress);
        assert!(!cart.in_order());
    }

    #[test]
    fn test_cart_used_once() {
        let mut customer = Customer::create("u-1", "Ana", "Rusu");
        let mut cart = filled_cart();
        Order::place(&mut customer, &mut cart, checkout()).unwrap();
        assert!(matches!(Order::place(&mut customer, &mut cart, checkout()), Err(OrderError::Cart(_))));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!("is_ready".parse::<OrderStatus>().unwrap(), OrderStatus::Ready);
        assert_eq!(serde_json::to_string(&OrderStatus::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(serde_json::to_string(&BuyingType::SelfPickup).unwrap(), "\"self\"");
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
