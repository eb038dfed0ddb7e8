use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use log::trace;

use super::{MarketStore, StoreError};
use crate::models::{
    BlacklistedToken,
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

/// A process-local store. All tables live behind one mutex, so every trait method, `checkout` included, runs as a
/// single critical section.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Default)]
struct Tables {
    last_id: i64,
    users: BTreeMap<i64, User>,
    sellers: BTreeMap<i64, Seller>,
    products: BTreeMap<i64, Product>,
    cart_items: BTreeMap<i64, CartItem>,
    orders: BTreeMap<i64, Order>,
    blacklist: HashMap<String, BlacklistedToken>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn active_item_mut(&mut self, user_id: i64, product_id: i64) -> Option<&mut CartItem> {
        self.cart_items
            .values_mut()
            .find(|c| c.user_id == user_id && c.product_id == product_id && c.order_id.is_none())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryStore")
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|e| StoreError::Database(format!("memory store lock poisoned: {e}")))
    }
}

impl MarketStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("User with email {}", user.email)));
        }
        let id = t.next_id();
        let user = User {
            id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            address: user.address,
            created_at: Utc::now(),
        };
        t.users.insert(id, user.clone());
        Ok(user)
    }

    async fn fetch_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_seller(&self, seller: NewSeller) -> Result<Seller, StoreError> {
        let mut t = self.lock()?;
        if t.sellers.values().any(|s| s.email == seller.email) {
            return Err(StoreError::Duplicate(format!("Seller with email {}", seller.email)));
        }
        let id = t.next_id();
        let seller = Seller {
            id,
            email: seller.email,
            password_hash: seller.password_hash,
            first_name: seller.first_name,
            last_name: seller.last_name,
            phone: seller.phone,
            address: seller.address,
            date_of_birth: seller.date_of_birth,
            store_name: seller.store_name,
            store_category: seller.store_category,
            created_at: Utc::now(),
        };
        t.sellers.insert(id, seller.clone());
        Ok(seller)
    }

    async fn fetch_seller(&self, id: i64) -> Result<Option<Seller>, StoreError> {
        Ok(self.lock()?.sellers.get(&id).cloned())
    }

    async fn fetch_seller_by_email(&self, email: &str) -> Result<Option<Seller>, StoreError> {
        Ok(self.lock()?.sellers.values().find(|s| s.email == email).cloned())
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut t = self.lock()?;
        let id = t.next_id();
        let product = Product {
            id,
            seller_id: product.seller_id,
            title: product.title,
            image_url: product.image_url,
            price: product.price,
            stock: product.stock,
            overview: product.overview,
            description: product.description,
            active: product.active,
            created_at: Utc::now(),
        };
        t.products.insert(id, product.clone());
        Ok(product)
    }

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        Ok(self.lock()?.products.get(&id).cloned())
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.lock()?.products.values().cloned().collect())
    }

    async fn fetch_products_for_seller(&self, seller_id: i64) -> Result<Vec<Product>, StoreError> {
        Ok(self.lock()?.products.values().filter(|p| p.seller_id == seller_id).cloned().collect())
    }

    async fn update_stock(&self, product_id: i64, stock: i64) -> Result<Option<Product>, StoreError> {
        let mut t = self.lock()?;
        Ok(t.products.get_mut(&product_id).map(|p| {
            p.stock = stock;
            p.clone()
        }))
    }

    async fn delete_product(&self, product_id: i64) -> Result<bool, StoreError> {
        Ok(self.lock()?.products.remove(&product_id).is_some())
    }

    async fn fetch_cart_item(&self, user_id: i64, product_id: i64) -> Result<Option<CartItem>, StoreError> {
        let mut t = self.lock()?;
        Ok(t.active_item_mut(user_id, product_id).map(|c| c.clone()))
    }

    async fn fetch_active_cart(&self, user_id: i64) -> Result<Vec<CartItem>, StoreError> {
        let t = self.lock()?;
        Ok(t.cart_items.values().filter(|c| c.user_id == user_id && c.order_id.is_none()).cloned().collect())
    }

    async fn upsert_cart_item(&self, user_id: i64, product_id: i64, quantity: i64) -> Result<CartItem, StoreError> {
        let mut t = self.lock()?;
        if let Some(item) = t.active_item_mut(user_id, product_id) {
            item.quantity = quantity;
            return Ok(item.clone());
        }
        let id = t.next_id();
        let item = CartItem { id, user_id, product_id, quantity, order_id: None };
        t.cart_items.insert(id, item.clone());
        Ok(item)
    }

    async fn delete_cart_item(&self, user_id: i64, product_id: i64) -> Result<bool, StoreError> {
        let mut t = self.lock()?;
        let id = t.active_item_mut(user_id, product_id).map(|c| c.id);
        Ok(id.and_then(|id| t.cart_items.remove(&id)).is_some())
    }

    async fn checkout(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut t = self.lock()?;
        // Validate everything before touching any table
        for item in &order.items {
            let product = t.products.get(&item.product_id).ok_or(StoreError::ProductNotFound(item.product_id))?;
            if product.stock < item.quantity {
                return Err(StoreError::InsufficientStock { product_id: product.id, title: product.title.clone() });
            }
        }
        let unchanged = order.cart_items.iter().all(|priced| {
            t.cart_items
                .get(&priced.id)
                .map(|c| c.user_id == order.user_id && c.order_id.is_none() && c.quantity == priced.quantity)
                .unwrap_or(false)
        });
        if !unchanged {
            return Err(StoreError::CartChanged);
        }
        let id = t.next_id();
        let now = Utc::now();
        let new_order = Order {
            id,
            user_id: order.user_id,
            items: order.items,
            total: order.total,
            status: OrderStatus::Placed,
            created_at: now,
            updated_at: now,
        };
        for priced in &order.cart_items {
            if let Some(item) = t.cart_items.get_mut(&priced.id) {
                item.order_id = Some(id);
            }
        }
        t.orders.insert(id, new_order.clone());
        trace!("Memory store checked out order {id} with {} cart items", order.cart_items.len());
        Ok(new_order)
    }

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.lock()?.orders.get(&id).cloned())
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        Ok(self.lock()?.orders.values().filter(|o| o.user_id == user_id).cloned().collect())
    }

    async fn fetch_orders_for_product(&self, product_id: i64) -> Result<Vec<Order>, StoreError> {
        let t = self.lock()?;
        Ok(t.orders.values().filter(|o| o.items.iter().any(|i| i.product_id == product_id)).cloned().collect())
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, StoreError> {
        let mut t = self.lock()?;
        Ok(t.orders.get_mut(&order_id).filter(|o| o.status == from).map(|o| {
            o.status = to;
            o.updated_at = Utc::now();
            o.clone()
        }))
    }

    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut t = self.lock()?;
        t.blacklist.entry(token.to_string()).or_insert_with(|| BlacklistedToken {
            token: token.to_string(),
            expires_at,
            revoked_at: Utc::now(),
        });
        Ok(())
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.blacklist.contains_key(token))
    }
}
