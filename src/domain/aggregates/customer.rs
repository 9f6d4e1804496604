//! Customer Aggregate
//!
//! The authenticated user behind a customer is owned by the identity service;
//! only its id is kept here.

use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Customer {
    pub(crate) id: String,
    pub(crate) user_id: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) phone: Option<String>,
    pub(crate) address: Option<String>,
    pub(crate) order_ids: Vec<String>,
}

impl Customer {
    pub fn create(
        user_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(), user_id: user_id.into(),
            first_name: first_name.into(), last_name: last_name.into(),
            phone: None, address: None, order_ids: vec![],
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn phone(&self) -> Option<&str> { self.phone.as_deref() }
    pub fn address(&self) -> Option<&str> { self.address.as_deref() }
    pub fn order_ids(&self) -> &[String] { &self.order_ids }
    pub fn display_name(&self) -> String { format!("Customer: {} {}", self.first_name, self.last_name) }

    pub fn set_contact(&mut self, phone: Option<String>, address: Option<String>) -> Result<(), CustomerError> {
        let phone = phone.filter(|p| !p.trim().is_empty());
        let address = address.filter(|a| !a.trim().is_empty());
        if phone.as_ref().is_some_and(|p| p.chars().count() > 15) { return Err(CustomerError::PhoneTooLong); }
        if address.as_ref().is_some_and(|a| a.chars().count() > 255) { return Err(CustomerError::AddressTooLong); }
        self.phone = phone;
        self.address = address;
        Ok(())
    }

    pub fn add_order(&mut self, order_id: impl Into<String>) {
        let order_id = order_id.into();
        if !self.order_ids.contains(&order_id) { self.order_ids.push(order_id); }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CustomerError { PhoneTooLong, AddressTooLong }
impl std::error::Error for CustomerError {}
impl std::fmt::Display for CustomerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::PhoneTooLong => write!(f, "Phone too long"), Self::AddressTooLong => write!(f, "Address too long") }
    }
}
