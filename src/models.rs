use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seller {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: String,
    pub store_name: String,
    pub store_category: String,
    pub created_at: DateTime<Utc>,
}

/// The shape of a user account that is safe to send back to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            address: user.address,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SellerProfile {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub store_name: String,
    pub store_category: String,
}

impl From<Seller> for SellerProfile {
    fn from(seller: Seller) -> Self {
        Self {
            id: seller.id,
            email: seller.email,
            first_name: seller.first_name,
            last_name: seller.last_name,
            phone: seller.phone,
            address: seller.address,
            store_name: seller.store_name,
            store_category: seller.store_category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub image_url: String,
    pub price: f64,
    pub stock: i64,
    pub overview: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// `None` while the item sits in the user's active cart.
    pub order_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Accepted,
    Declined,
    Completed,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Placed, OrderStatus::Accepted)
                | (OrderStatus::Placed, OrderStatus::Declined)
                | (OrderStatus::Accepted, OrderStatus::Completed)
        )
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Declined => "DECLINED",
            OrderStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub product_id: i64,
    pub seller_id: i64,
    pub title: String,
    pub quantity: i64,
    pub unit_price: f64,
}

impl LineItem {
    pub fn subtotal(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub items: Vec<LineItem>,
    pub total: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn involves_seller(&self, seller_id: i64) -> bool {
        self.items.iter().any(|item| item.seller_id == seller_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlacklistedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: DateTime<Utc>,
}

// ---------------------------------------------   Store inputs   ------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct NewSeller {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: String,
    pub store_name: String,
    pub store_category: String,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub seller_id: i64,
    pub title: String,
    pub image_url: String,
    pub price: f64,
    pub stock: i64,
    pub overview: String,
    pub description: String,
    pub active: bool,
}

/// An order that has been priced but not yet written.
///
/// `cart_items` is the snapshot of active cart rows the order was priced from. The store must detach exactly these
/// rows in the same transaction that inserts the order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub items: Vec<LineItem>,
    pub total: f64,
    pub cart_items: Vec<CartItem>,
}

// ---------------------------------------------   Request bodies   ----------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SignUpUserInput {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SignUpSellerInput {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub store_category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshInput {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogoutInput {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub title: String,
    #[serde(default)]
    pub image_url: String,
    pub price: f64,
    #[serde(alias = "quantity")]
    pub stock: i64,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockInput {
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartInput {
    pub product_id: i64,
    pub quantity: i64,
}

// ---------------------------------------------   Responses   ---------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub cart_id: i64,
    pub product: Product,
    pub quantity: i64,
    pub subtotal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartView {
    pub cart: Vec<CartLine>,
    pub total: f64,
}
