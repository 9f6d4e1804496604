//! Customer, cart and order routes.

use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::domain::aggregates::{BuyingType, Cart, CartProduct, Checkout, Customer, Order, OrderStatus, ProductKind};
use crate::domain::value_objects::Money;
use crate::{Result, StorefrontError};

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CustomerView { pub id: String, pub user_id: String, pub display_name: String, pub phone: Option<String>, pub address: Option<String>, pub orders: Vec<String> }

impl From<&Customer> for CustomerView {
    fn from(c: &Customer) -> Self {
        Self {
            id: c.id().to_string(), user_id: c.user_id().to_string(), display_name: c.display_name(),
            phone: c.phone().map(str::to_string), address: c.address().map(str::to_string), orders: c.order_ids().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartLineView { pub id: String, pub kind: ProductKind, pub product_id: String, pub label: String, pub qty: u32, pub final_price: Money }

#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: String,
    pub owner_id: Option<String>,
    pub products: Vec<CartLineView>,
    pub total_products: u32,
    pub final_price: Money,
    pub in_order: bool,
    pub for_anonymous_user: bool,
}

impl From<&CartProduct> for CartLineView {
    fn from(l: &CartProduct) -> Self {
        Self {
            id: l.id().to_string(), kind: l.product_kind(), product_id: l.product_id().to_string(),
            label: l.to_string(), qty: l.qty(), final_price: l.final_price().clone(),
        }
    }
}

impl From<&Cart> for CartView {
    fn from(c: &Cart) -> Self {
        Self {
            id: c.id().to_string(), owner_id: c.owner_id().map(str::to_string),
            products: c.products().iter().map(CartLineView::from).collect(),
            total_products: c.total_products(), final_price: c.final_price().clone(),
            in_order: c.in_order(), for_anonymous_user: c.for_anonymous_user(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: String,
    pub customer_id: String,
    pub cart_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: Option<String>,
    pub total: Money,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub buying_type: BuyingType,
    pub created_at: DateTime<Utc>,
    pub order_date: NaiveDate,
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id().to_string(), customer_id: o.customer_id().to_string(), cart_id: o.cart_id().map(str::to_string),
            first_name: o.first_name.clone(), last_name: o.last_name.clone(), phone: o.phone.clone(), address: o.address.clone(),
            total: o.total().clone(), status: o.status(), status_label: o.status().label(), buying_type: o.buying_type(),
            created_at: o.created_at, order_date: o.order_date(),
        }
    }
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 255))] pub user_id: String,
    #[validate(length(min = 1, max = 255))] pub first_name: String,
    #[validate(length(min = 1, max = 255))] pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

pub async fn create_customer(State(s): State<AppState>, Json(r): Json<CreateCustomerRequest>) -> Result<(StatusCode, Json<CustomerView>)> {
    r.validate()?;
    let mut customer = Customer::create(r.user_id, r.first_name, r.last_name);
    customer.set_contact(r.phone, r.address)?;
    s.store.insert_customer(&customer).await?;
    Ok((StatusCode::CREATED, Json(CustomerView::from(&customer))))
}

pub async fn get_customer(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CustomerView>> {
    let customer = s.store.customer(&id.to_string()).await?;
    Ok(Json(CustomerView::from(&customer)))
}

// =============================================================================
// Carts
// =============================================================================

#[derive(Debug, Default, Deserialize)] pub struct CreateCartRequest { pub owner_id: Option<Uuid> }

pub async fn create_cart(State(s): State<AppState>, Json(r): Json<CreateCartRequest>) -> Result<(StatusCode, Json<CartView>)> {
    let cart = match r.owner_id {
        Some(owner) => Cart::for_customer(s.store.customer(&owner.to_string()).await?.id(), &s.config.currency),
        None => Cart::anonymous(&s.config.currency),
    };
    s.store.insert_cart(&cart).await?;
    Ok((StatusCode::CREATED, Json(CartView::from(&cart))))
}

pub async fn get_cart(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CartView>> {
    let cart = s.store.cart(&id.to_string()).await?;
    Ok(Json(CartView::from(&cart)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub customer_id: Uuid,
    pub kind: ProductKind,
    pub slug: String,
    #[validate(range(min = 1, max = 1000))]
    pub qty: Option<u32>,
}

pub async fn add_to_cart(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<AddToCartRequest>) -> Result<Json<CartView>> {
    r.validate()?;
    let customer = s.store.customer(&r.customer_id.to_string()).await?;
    let product = s.store.product(r.kind, &r.slug).await?;
    let qty = r.qty.unwrap_or(1);
    let mut cart = s.store.update_cart(&id.to_string(), |cart| {
        cart.add_product(customer.id(), &product, qty)?;
        Ok(())
    }).await?;
    s.events.publish(cart.take_events()).await;
    Ok(Json(CartView::from(&cart)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartLineRequest {
    #[validate(range(max = 1000))]
    pub qty: u32,
}

/// A quantity of zero removes the line.
pub async fn update_cart_line(State(s): State<AppState>, Path((id, line_id)): Path<(Uuid, Uuid)>, Json(r): Json<UpdateCartLineRequest>) -> Result<Json<CartView>> {
    r.validate()?;
    let line_id = line_id.to_string();
    let mut cart = s.store.update_cart(&id.to_string(), |cart| Ok(cart.update_qty(&line_id, r.qty)?)).await?;
    s.events.publish(cart.take_events()).await;
    Ok(Json(CartView::from(&cart)))
}

pub async fn remove_from_cart(State(s): State<AppState>, Path((id, line_id)): Path<(Uuid, Uuid)>) -> Result<Json<CartView>> {
    let line_id = line_id.to_string();
    let mut cart = s.store.update_cart(&id.to_string(), |cart| Ok(cart.remove_product(&line_id)?)).await?;
    s.events.publish(cart.take_events()).await;
    Ok(Json(CartView::from(&cart)))
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub cart_id: Uuid,
    #[validate(length(min = 1, max = 255))] pub first_name: String,
    #[validate(length(min = 1, max = 255))] pub last_name: String,
    #[validate(length(min = 1, max = 20))] pub phone: String,
    #[validate(length(max = 1024))] pub address: Option<String>,
    #[serde(default)] pub buying_type: BuyingType,
    pub order_date: Option<NaiveDate>,
}

pub async fn create_order(State(s): State<AppState>, Json(r): Json<CreateOrderRequest>) -> Result<(StatusCode, Json<OrderView>)> {
    r.validate()?;
    let mut customer = s.store.customer(&r.customer_id.to_string()).await?;
    let checkout = Checkout {
        first_name: r.first_name, last_name: r.last_name, phone: r.phone, address: r.address,
        buying_type: r.buying_type, order_date: r.order_date,
    };
    let mut order = s.store.place_order(&r.cart_id.to_string(), |cart| {
        if cart.owner_id().is_some_and(|owner| owner != customer.id()) {
            return Err(StorefrontError::Validation("cart belongs to another customer".into()));
        }
        Ok(Order::place(&mut customer, cart, checkout)?)
    }).await?;
    s.events.publish(order.take_events()).await;
    info!(order_id = %order.id(), customer_id = %customer.id(), total = %order.total(), "Placed order");
    Ok((StatusCode::CREATED, Json(OrderView::from(&order))))
}

pub async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<OrderView>> {
    let order = s.store.order(&id.to_string()).await?;
    Ok(Json(OrderView::from(&order)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest { pub status: String, pub buying_type: Option<String> }

pub async fn update_order_status(State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<UpdateOrderStatusRequest>) -> Result<Json<OrderView>> {
    let status: OrderStatus = r.status.parse()?;
    let mut order = s.store.order(&id.to_string()).await?;
    order.set_status(status);
    if let Some(buying_type) = r.buying_type {
        order.set_buying_type(buying_type.parse()?);
    }
    s.store.save_order_status(&order).await?;
    s.events.publish(order.take_events()).await;
    Ok(Json(OrderView::from(&order)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{AccessoriesDetails, Category, Product, ProductDetails};
    use crate::domain::value_objects::Slug;
    use rust_decimal::Decimal;

    fn scarf() -> Product {
        let category = Category::create("Accessories", Slug::new("accessories").unwrap()).unwrap();
        let details = ProductDetails::Accessories(AccessoriesDetails { gender: "female".into(), color: "green".into() });
        Product::create(&category, "Scarf", Slug::new("scarf").unwrap(), Money::new(Decimal::new(150, 0), "MDL"), details).unwrap()
    }

    #[test]
    fn test_cart_view() {
        let mut cart = Cart::for_customer("c-1", "MDL");
        cart.add_product("c-1", &scarf(), 3).unwrap();
        let view = CartView::from(&cart);
        assert_eq!(view.owner_id.as_deref(), Some("c-1"));
        assert_eq!(view.total_products, 1);
        assert_eq!(view.final_price.amount(), Decimal::new(450, 0));
        assert_eq!(view.products[0].label, "Product: Scarf");
        assert_eq!(view.products[0].qty, 3);
        assert!(!view.for_anonymous_user);
    }

    #[test]
    fn test_order_view() {
        let mut customer = Customer::create("user-1", "Ana", "Rusu");
        let mut cart = Cart::for_customer(customer.id(), "MDL");
        cart.add_product(customer.id(), &scarf(), 1).unwrap();
        let checkout = Checkout {
            first_name: "Ana".into(), last_name: "Rusu".into(), phone: "+37369000000".into(),
            address: Some("Str. Stefan cel Mare 1".into()), buying_type: BuyingType::Delivery, order_date: None,
        };
        let order = Order::place(&mut customer, &mut cart, checkout).unwrap();

        let json = serde_json::to_value(OrderView::from(&order)).unwrap();
        assert_eq!(json["status"], "new");
        assert_eq!(json["status_label"], "New order");
        assert_eq!(json["buying_type"], "delivery");
        assert_eq!(CustomerView::from(&customer).orders, vec![order.id().to_string()]);
    }
}
