//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// URL slug value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub const MAX_LEN: usize = 255;

    pub fn new(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into().trim().to_lowercase();
        if value.is_empty() { return Err(SlugError::Empty); }
        if value.len() > Self::MAX_LEN { return Err(SlugError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(SlugError::InvalidChar);
        }
        Ok(Self(value))
    }

    /// Builds a slug from free text: lowercased, whitespace collapsed to `-`,
    /// anything outside `[a-z0-9-_]` dropped.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let slug = title
            .split_whitespace()
            .map(|word| word.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_').collect::<String>())
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        Self::new(slug)
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self { slug.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SlugError { Empty, TooLong, InvalidChar }
impl std::error::Error for SlugError {}
impl fmt::Display for SlugError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Slug empty"),
            Self::TooLong => write!(f, "Slug too long"),
            Self::InvalidChar => write!(f, "Slug may only contain letters, digits, '-' and '_'"),
        }
    }
}

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_string() } }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// Largest amount a `NUMERIC(12, 2)` price column holds.
    pub fn max_amount() -> Decimal { Decimal::new(999_999_999_999, 2) }
    pub fn exceeds_max(&self) -> bool { self.amount > Self::max_amount() }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount.round_dp(2), self.currency) }
}

#[derive(Debug, Clone)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

/// Quantity value object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_slug() { let slug = Slug::new(" Winter-Coat ").unwrap(); assert_eq!(slug.as_str(), "winter-coat"); }
    #[test]
    fn test_slug_rejects_spaces() { assert_eq!(Slug::new("two words"), Err(SlugError::InvalidChar)); }
    #[test]
    fn test_slug_from_title() {
        assert_eq!(Slug::from_title("Leather  Boots, size 42").unwrap().as_str(), "leather-boots-size-42");
        assert_eq!(Slug::from_title("!!!"), Err(SlugError::Empty));
    }
    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(100, 0), "MDL");
        let b = Money::new(Decimal::new(50, 0), "MDL");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert!(a.add(&Money::zero("EUR")).is_err());
    }
    #[test]
    fn test_money_max_amount() {
        assert!(!Money::new(Decimal::new(9_999_999_999, 0), "MDL").exceeds_max());
        assert!(Money::new(Decimal::new(10_000_000_000, 0), "MDL").exceeds_max());
        assert_eq!(Money::max_amount().to_string(), "9999999999.99");
    }
    #[test]
    fn test_money_display() { assert_eq!(Money::new(Decimal::new(1999, 2), "MDL").to_string(), "19.99 MDL"); }
}
