//! Domain events
use crate::domain::value_objects::Slug;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Cart(CartEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: String, kind: String, slug: Slug },
    ImageNormalized { product_id: String, filename: String, width: u32, height: u32, size: usize },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ProductAdded { cart_id: String, product_id: String, qty: u32 },
    ProductRemoved { cart_id: String, line_id: String },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: String, customer_id: String, total: Decimal },
    StatusChanged { order_id: String, from: String, to: String },
}

impl DomainEvent {
    /// NATS subject, e.g. `storefront.product.image_normalized`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(ProductEvent::Created { .. }) => ("product", "created"),
            Self::Product(ProductEvent::ImageNormalized { .. }) => ("product", "image_normalized"),
            Self::Cart(CartEvent::ProductAdded { .. }) => ("cart", "product_added"),
            Self::Cart(CartEvent::ProductRemoved { .. }) => ("cart", "product_removed"),
            Self::Order(OrderEvent::Created { .. }) => ("order", "created"),
            Self::Order(OrderEvent::StatusChanged { .. }) => ("order", "status_changed"),
        };
        format!("storefront.{aggregate}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_subject_and_payload() {
        let event = DomainEvent::Order(OrderEvent::StatusChanged { order_id: "7".into(), from: "new".into(), to: "completed".into() });
        assert_eq!(event.subject(), "storefront.order.status_changed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["aggregate"], "order");
        assert_eq!(json["event"]["type"], "status_changed");
        assert_eq!(json["event"]["to"], "completed");
    }
}
