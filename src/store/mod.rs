//! # Persistence
//!
//! [`MarketStore`] is the contract a storage backend has to honour for the marketplace engine. The engine APIs are
//! generic over it, so the same checkout and cart logic runs against MongoDB in production and against the
//! [`MemoryStore`] in tests.
//!
//! Identifiers are integers allocated by the backend. Emails are unique within each role (a seller and a user may
//! share an address).
//!
//! The only multi-statement operation is [`MarketStore::checkout`]: it must insert the order and detach the priced
//! cart rows as one all-or-nothing unit.
mod memory;
mod mongo;

use chrono::{DateTime, Utc};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
use thiserror::Error;

use crate::models::{
    CartItem,
    NewOrder,
    NewProduct,
    NewSeller,
    NewUser,
    Order,
    OrderStatus,
    Product,
    Seller,
    User,
};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {product_id} ({title}) does not have enough stock")]
    InsufficientStock { product_id: i64, title: String },
    #[error("The set of active cart items changed during checkout")]
    CartChanged,
    #[error("Could not serialize record: {0}")]
    Serialization(String),
}

#[allow(async_fn_in_trait)]
pub trait MarketStore {
    // ----------------------------------------   Accounts   ----------------------------------------
    /// Inserts a new user. Fails with [`StoreError::Duplicate`] if the email is already registered.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn fetch_user(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Inserts a new seller. Fails with [`StoreError::Duplicate`] if the email is already registered.
    async fn insert_seller(&self, seller: NewSeller) -> Result<Seller, StoreError>;
    async fn fetch_seller(&self, id: i64) -> Result<Option<Seller>, StoreError>;
    async fn fetch_seller_by_email(&self, email: &str) -> Result<Option<Seller>, StoreError>;

    // ----------------------------------------   Catalog   -----------------------------------------
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError>;
    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreError>;
    async fn fetch_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn fetch_products_for_seller(&self, seller_id: i64) -> Result<Vec<Product>, StoreError>;
    /// Sets the stock level of a product and returns the updated record, or `None` if the product does not exist.
    async fn update_stock(&self, product_id: i64, stock: i64) -> Result<Option<Product>, StoreError>;
    /// Returns true if a product was removed.
    async fn delete_product(&self, product_id: i64) -> Result<bool, StoreError>;

    // ----------------------------------------   Cart   --------------------------------------------
    /// Fetches the *active* cart item for the given user and product.
    async fn fetch_cart_item(&self, user_id: i64, product_id: i64) -> Result<Option<CartItem>, StoreError>;
    /// All active cart items for a user, in insertion order.
    async fn fetch_active_cart(&self, user_id: i64) -> Result<Vec<CartItem>, StoreError>;
    /// Sets the quantity of the active cart item for (user, product), creating the row if there is none.
    async fn upsert_cart_item(&self, user_id: i64, product_id: i64, quantity: i64) -> Result<CartItem, StoreError>;
    /// Removes the active cart item for (user, product). Returns true if a row was removed.
    async fn delete_cart_item(&self, user_id: i64, product_id: i64) -> Result<bool, StoreError>;

    // ----------------------------------------   Orders   ------------------------------------------
    /// Atomically inserts the order with status `PLACED` and attaches every cart row in `order.cart_items` to it,
    /// which removes them from the active cart.
    ///
    /// Only the priced rows are detached. A row the user adds while the order is being placed stays in the cart for
    /// the next order.
    ///
    /// Inside the same transaction the backend re-reads each line item's product and aborts with
    /// [`StoreError::InsufficientStock`] if it can no longer cover the quantity, or with [`StoreError::CartChanged`]
    /// if any priced row is no longer active or its quantity no longer matches the snapshot. On any error nothing is
    /// written.
    async fn checkout(&self, order: NewOrder) -> Result<Order, StoreError>;
    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, StoreError>;
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError>;
    /// Every order with at least one line item for the given product.
    async fn fetch_orders_for_product(&self, product_id: i64) -> Result<Vec<Order>, StoreError>;
    /// Compare-and-set on the order status. Returns the updated order, or `None` if the order does not exist or its
    /// status is no longer `from`.
    async fn update_order_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, StoreError>;

    // ----------------------------------------   Blacklist   ---------------------------------------
    /// Adds a token to the blacklist. Revoking an already revoked token is not an error.
    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, StoreError>;
}
