//! PostgreSQL persistence for storefront aggregates.
//!
//! Queries are plain `sqlx::query_as` strings mapped through row structs; the
//! row structs convert into domain aggregates and never leave this module.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CartError, CartProduct, Category, Customer, Order, Product, ProductDetails, ProductKind,
};
use crate::domain::value_objects::{Money, Quantity, Slug};
use crate::imaging::NormalizedImage;
use crate::{Result, StorefrontError};

const PRODUCT_SELECT: &str = "SELECT p.id, p.category_id, c.name AS category_name, p.title, p.slug, \
     p.description, p.price, p.currency, p.details, p.image_filename, p.image_content_type, \
     p.image_width, p.image_height, p.created_at, p.updated_at \
     FROM products p JOIN categories c ON c.id = p.category_id";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

fn uuid(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| StorefrontError::Validation(format!("invalid id: {id}")))
}

/// Maps unique-key violations to `Conflict`, everything else to `Storage`.
fn conflict_on_duplicate(e: sqlx::Error, what: &str) -> StorefrontError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorefrontError::Conflict(format!("{what} already exists"))
        }
        _ => e.into(),
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct CategoryRow { id: Uuid, name: String, slug: String }

#[derive(sqlx::FromRow)]
struct CategoryCountRow { id: Uuid, name: String, slug: String, count: i64 }

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, category_id: Uuid, category_name: String, title: String, slug: String,
    description: Option<String>, price: Decimal, currency: String, details: Json<ProductDetails>,
    image_filename: Option<String>, image_content_type: Option<String>,
    image_width: Option<i32>, image_height: Option<i32>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    image_filename: Option<String>, image_content_type: Option<String>,
    image_width: Option<i32>, image_height: Option<i32>, image_data: Option<Vec<u8>>,
}

#[derive(sqlx::FromRow)]
struct CustomerRow { id: Uuid, user_id: String, first_name: String, last_name: String, phone: Option<String>, address: Option<String> }

#[derive(sqlx::FromRow)]
struct CartRow { id: Uuid, owner_id: Option<Uuid>, total_products: i32, final_price: Decimal, currency: String, in_order: bool, for_anonymous_user: bool }

#[derive(sqlx::FromRow)]
struct CartProductRow { id: Uuid, customer_id: Uuid, product_kind: String, product_id: Uuid, title: String, qty: i32, unit_price: Decimal, final_price: Decimal }

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, customer_id: Uuid, first_name: String, last_name: String, phone: String,
    cart_id: Option<Uuid>, total: Decimal, currency: String, address: Option<String>,
    status: String, buying_type: String, created_at: DateTime<Utc>, order_date: NaiveDate,
}

impl TryFrom<CategoryRow> for Category {
    type Error = StorefrontError;
    fn try_from(r: CategoryRow) -> Result<Self> {
        Ok(Category { id: r.id.to_string(), name: r.name, slug: Slug::new(r.slug)? })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StorefrontError;
    fn try_from(r: ProductRow) -> Result<Self> {
        // Image bytes are only read by `PgStore::product_image`.
        let image = match (r.image_filename, r.image_content_type, r.image_width, r.image_height) {
            (Some(filename), Some(content_type), Some(width), Some(height)) => Some(NormalizedImage {
                filename, content_type, width: width as u32, height: height as u32, bytes: Vec::new(),
            }),
            _ => None,
        };
        Ok(Product {
            id: r.id.to_string(), category_id: r.category_id.to_string(), category_name: r.category_name,
            title: r.title, slug: Slug::new(r.slug)?, image, description: r.description,
            price: Money::new(r.price, &r.currency), details: r.details.0,
            created_at: r.created_at, updated_at: r.updated_at, events: vec![],
        })
    }
}

impl CartProductRow {
    fn into_line(self, currency: &str) -> Result<CartProduct> {
        Ok(CartProduct {
            id: self.id.to_string(), customer_id: self.customer_id.to_string(),
            product_kind: self.product_kind.parse::<ProductKind>()?, product_id: self.product_id.to_string(),
            title: self.title, qty: Quantity::new(self.qty.max(0) as u32),
            unit_price: Money::new(self.unit_price, currency), final_price: Money::new(self.final_price, currency),
        })
    }
}

impl OrderRow {
    fn into_order(self) -> Result<Order> {
        Ok(Order {
            id: self.id.to_string(), customer_id: self.customer_id.to_string(),
            first_name: self.first_name, last_name: self.last_name, phone: self.phone,
            cart_id: self.cart_id.map(|id| id.to_string()), total: Money::new(self.total, &self.currency),
            address: self.address, status: self.status.parse()?, buying_type: self.buying_type.parse()?,
            created_at: self.created_at, order_date: self.order_date, events: vec![],
        })
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn insert_category(&self, category: &Category) -> Result<()> {
        sqlx::query("INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3)")
            .bind(uuid(category.id())?).bind(category.name()).bind(category.slug().as_str())
            .execute(&self.pool).await.map_err(|e| conflict_on_duplicate(e, "category slug"))?;
        Ok(())
    }

    pub async fn category(&self, id: &str) -> Result<Category> {
        sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug FROM categories WHERE id = $1")
            .bind(uuid(id)?).fetch_optional(&self.pool).await?
            .ok_or(StorefrontError::CategoryNotFound)?
            .try_into()
    }

    pub async fn categories_by_slug(&self, slug: &str) -> Result<Vec<Category>> {
        sqlx::query_as::<_, CategoryRow>("SELECT id, name, slug FROM categories WHERE slug = $1 ORDER BY name")
            .bind(slug).fetch_all(&self.pool).await?
            .into_iter().map(Category::try_from).collect()
    }

    /// Every category with the number of products filed under it.
    pub async fn categories_with_counts(&self) -> Result<Vec<(Category, i64)>> {
        let rows = sqlx::query_as::<_, CategoryCountRow>(
            "SELECT c.id, c.name, c.slug, COUNT(p.id) AS count FROM categories c \
             LEFT JOIN products p ON p.category_id = c.id GROUP BY c.id, c.name, c.slug ORDER BY c.name",
        ).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|r| -> Result<(Category, i64)> {
                let category = Category::try_from(CategoryRow { id: r.id, name: r.name, slug: r.slug })?;
                Ok((category, r.count))
            })
            .collect()
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, kind, category_id, title, slug, description, price, currency, details, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(uuid(product.id())?).bind(product.kind().as_str()).bind(uuid(product.category_id())?)
        .bind(product.title()).bind(product.slug().as_str()).bind(product.description())
        .bind(product.price().amount()).bind(product.price().currency()).bind(Json(product.details()))
        .bind(product.created_at).bind(product.updated_at)
        .execute(&self.pool).await.map_err(|e| conflict_on_duplicate(e, "product slug"))?;
        Ok(())
    }

    pub async fn product(&self, kind: ProductKind, slug: &str) -> Result<Product> {
        sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.kind = $1 AND p.slug = $2"))
            .bind(kind.as_str()).bind(slug).fetch_optional(&self.pool).await?
            .ok_or(StorefrontError::ProductNotFound)?
            .try_into()
    }

    pub async fn products(&self, kind: ProductKind, limit: i64, offset: i64) -> Result<(Vec<Product>, i64)> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{PRODUCT_SELECT} WHERE p.kind = $1 ORDER BY p.created_at DESC, p.id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(kind.as_str()).bind(limit).bind(offset).fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE kind = $1")
            .bind(kind.as_str()).fetch_one(&self.pool).await?;
        let products = rows.into_iter().map(Product::try_from).collect::<Result<Vec<_>>>()?;
        Ok((products, total.0))
    }

    /// The newest `per_kind` products of each kind.
    pub async fn latest_products(&self, kinds: &[ProductKind], per_kind: i64) -> Result<Vec<Product>> {
        let mut products = Vec::new();
        for kind in kinds {
            let rows = sqlx::query_as::<_, ProductRow>(&format!(
                "{PRODUCT_SELECT} WHERE p.kind = $1 ORDER BY p.created_at DESC, p.id DESC LIMIT $2"
            ))
            .bind(kind.as_str()).bind(per_kind).fetch_all(&self.pool).await?;
            for row in rows { products.push(Product::try_from(row)?); }
        }
        Ok(products)
    }

    pub async fn save_product_image(&self, product: &Product) -> Result<()> {
        let image = product.image().ok_or(StorefrontError::ImageNotFound)?;
        sqlx::query(
            "UPDATE products SET image_filename = $2, image_content_type = $3, image_width = $4, \
             image_height = $5, image_data = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(uuid(product.id())?).bind(&image.filename).bind(&image.content_type)
        .bind(image.width as i32).bind(image.height as i32).bind(&image.bytes).bind(product.updated_at)
        .execute(&self.pool).await?;
        Ok(())
    }

    pub async fn product_image(&self, kind: ProductKind, slug: &str) -> Result<NormalizedImage> {
        let row = sqlx::query_as::<_, ImageRow>(
            "SELECT image_filename, image_content_type, image_width, image_height, image_data \
             FROM products WHERE kind = $1 AND slug = $2",
        )
        .bind(kind.as_str()).bind(slug).fetch_optional(&self.pool).await?
        .ok_or(StorefrontError::ProductNotFound)?;
        match row {
            ImageRow {
                image_filename: Some(filename), image_content_type: Some(content_type),
                image_width: Some(width), image_height: Some(height), image_data: Some(bytes),
            } => Ok(NormalizedImage { filename, content_type, width: width as u32, height: height as u32, bytes }),
            _ => Err(StorefrontError::ImageNotFound),
        }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query("INSERT INTO customers (id, user_id, first_name, last_name, phone, address) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(uuid(customer.id())?).bind(customer.user_id()).bind(&customer.first_name).bind(&customer.last_name)
            .bind(customer.phone()).bind(customer.address())
            .execute(&self.pool).await?;
        Ok(())
    }

    pub async fn customer(&self, id: &str) -> Result<Customer> {
        let id = uuid(id)?;
        let row = sqlx::query_as::<_, CustomerRow>("SELECT id, user_id, first_name, last_name, phone, address FROM customers WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .ok_or(StorefrontError::CustomerNotFound)?;
        let orders: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE customer_id = $1 ORDER BY created_at")
            .bind(id).fetch_all(&self.pool).await?;
        Ok(Customer {
            id: row.id.to_string(), user_id: row.user_id, first_name: row.first_name, last_name: row.last_name,
            phone: row.phone, address: row.address, order_ids: orders.into_iter().map(|(id,)| id.to_string()).collect(),
        })
    }

    // =========================================================================
    // Carts
    // =========================================================================

    pub async fn insert_cart(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            "INSERT INTO carts (id, owner_id, total_products, final_price, currency, in_order, for_anonymous_user) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(uuid(cart.id())?).bind(cart.owner_id().map(uuid).transpose()?)
        .bind(cart.total_products() as i32).bind(cart.final_price().amount()).bind(cart.final_price().currency())
        .bind(cart.in_order()).bind(cart.for_anonymous_user())
        .execute(&self.pool).await?;
        Ok(())
    }

    pub async fn cart(&self, id: &str) -> Result<Cart> {
        let mut conn = self.pool.acquire().await?;
        load_cart(&mut conn, uuid(id)?, false).await
    }

    /// Applies `change` to the cart while holding its row lock and writes the
    /// result in the same transaction, so concurrent changes cannot overwrite
    /// each other or touch a cart that has been ordered.
    pub async fn update_cart<F>(&self, id: &str, change: F) -> Result<Cart>
    where
        F: FnOnce(&mut Cart) -> Result<()>,
    {
        let mut tx = self.pool.begin().await?;
        let mut cart = load_cart(&mut tx, uuid(id)?, true).await?;
        change(&mut cart)?;
        write_cart(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(cart)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Builds an order from the locked cart with `place`, inserts it and
    /// freezes the cart, atomically.
    pub async fn place_order<F>(&self, cart_id: &str, place: F) -> Result<Order>
    where
        F: FnOnce(&mut Cart) -> Result<Order>,
    {
        let mut tx = self.pool.begin().await?;
        let cart_id = uuid(cart_id)?;
        let mut cart = load_cart(&mut tx, cart_id, true).await?;
        let order = place(&mut cart)?;
        sqlx::query(
            "INSERT INTO orders (id, customer_id, first_name, last_name, phone, cart_id, total, currency, address, status, buying_type, created_at, order_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(uuid(order.id())?).bind(uuid(order.customer_id())?).bind(&order.first_name).bind(&order.last_name)
        .bind(&order.phone).bind(cart_id).bind(order.total().amount()).bind(order.total().currency())
        .bind(&order.address).bind(order.status().as_str()).bind(order.buying_type().as_str())
        .bind(order.created_at).bind(order.order_date())
        .execute(&mut *tx).await?;
        let frozen = sqlx::query("UPDATE carts SET in_order = TRUE WHERE id = $1 AND in_order = FALSE")
            .bind(cart_id).execute(&mut *tx).await?;
        if frozen.rows_affected() == 0 {
            return Err(CartError::AlreadyOrdered.into());
        }
        tx.commit().await?;
        Ok(order)
    }

    pub async fn order(&self, id: &str) -> Result<Order> {
        sqlx::query_as::<_, OrderRow>(
            "SELECT id, customer_id, first_name, last_name, phone, cart_id, total, currency, address, status, buying_type, created_at, order_date \
             FROM orders WHERE id = $1",
        )
        .bind(uuid(id)?).fetch_optional(&self.pool).await?
        .ok_or(StorefrontError::OrderNotFound)?
        .into_order()
    }

    pub async fn save_order_status(&self, order: &Order) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $2, buying_type = $3 WHERE id = $1")
            .bind(uuid(order.id())?).bind(order.status().as_str()).bind(order.buying_type().as_str())
            .execute(&self.pool).await?;
        Ok(())
    }
}

async fn load_cart(conn: &mut PgConnection, id: Uuid, lock: bool) -> Result<Cart> {
    let lock = if lock { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, CartRow>(&format!(
        "SELECT id, owner_id, total_products, final_price, currency, in_order, for_anonymous_user FROM carts WHERE id = $1{lock}"
    ))
    .bind(id).fetch_optional(&mut *conn).await?
    .ok_or(StorefrontError::CartNotFound)?;
    let lines = sqlx::query_as::<_, CartProductRow>(
        "SELECT id, customer_id, product_kind, product_id, title, qty, unit_price, final_price \
         FROM cart_products WHERE cart_id = $1 ORDER BY id",
    )
    .bind(id).fetch_all(&mut *conn).await?;

    Ok(Cart {
        id: row.id.to_string(), owner_id: row.owner_id.map(|o| o.to_string()),
        products: lines.into_iter().map(|l| l.into_line(&row.currency)).collect::<Result<_>>()?,
        total_products: row.total_products.max(0) as u32, final_price: Money::new(row.final_price, &row.currency),
        in_order: row.in_order, for_anonymous_user: row.for_anonymous_user, events: vec![],
    })
}

/// Writes the cart totals and replaces its lines. `in_order` is never written
/// from here, and an ordered cart is refused.
async fn write_cart(conn: &mut PgConnection, cart: &Cart) -> Result<()> {
    let cart_id = uuid(cart.id())?;
    let updated = sqlx::query("UPDATE carts SET total_products = $2, final_price = $3 WHERE id = $1 AND in_order = FALSE")
        .bind(cart_id).bind(cart.total_products() as i32).bind(cart.final_price().amount())
        .execute(&mut *conn).await?;
    if updated.rows_affected() == 0 {
        return Err(CartError::AlreadyOrdered.into());
    }
    sqlx::query("DELETE FROM cart_products WHERE cart_id = $1").bind(cart_id).execute(&mut *conn).await?;
    for line in cart.products() {
        sqlx::query(
            "INSERT INTO cart_products (id, cart_id, customer_id, product_kind, product_id, title, qty, unit_price, final_price) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(uuid(line.id())?).bind(cart_id).bind(uuid(&line.customer_id)?)
        .bind(line.product_kind().as_str()).bind(uuid(line.product_id())?).bind(&line.title)
        .bind(line.qty() as i32).bind(line.unit_price.amount()).bind(line.final_price().amount())
        .execute(&mut *conn).await?;
    }
    Ok(())
}
