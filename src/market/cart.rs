use log::{debug, info};

use crate::{
    errors::MarketError,
    models::{CartItem, CartLine, CartView, Product},
    store::MarketStore,
};

/// Per-user shopping carts.
///
/// Adding a product that is already in the cart accumulates: the new quantity is the existing one plus the requested
/// amount. [`CartApi::edit`] overwrites it instead. Either way the resulting quantity must be covered by the
/// product's current stock.
#[derive(Clone, Debug)]
pub struct CartApi<B> {
    db: B,
}

impl<B> CartApi<B>
where B: MarketStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    async fn product_with_stock_for(&self, product_id: i64, quantity: i64) -> Result<Product, MarketError> {
        if quantity <= 0 {
            return Err(MarketError::Validation(format!("Quantity must be positive (got {quantity})")));
        }
        let product = self
            .db
            .fetch_product(product_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Product {product_id}")))?;
        if quantity > product.stock {
            debug!("Cart rejected {quantity} x product {product_id}, only {} in stock", product.stock);
            return Err(MarketError::InsufficientStock { product_id, requested: quantity, available: product.stock });
        }
        Ok(product)
    }

    pub async fn add(&self, user_id: i64, product_id: i64, quantity: i64) -> Result<CartItem, MarketError> {
        if quantity <= 0 {
            return Err(MarketError::Validation(format!("Quantity must be positive (got {quantity})")));
        }
        let existing = self.db.fetch_cart_item(user_id, product_id).await?.map(|c| c.quantity).unwrap_or(0);
        let total = existing
            .checked_add(quantity)
            .ok_or_else(|| MarketError::Validation(format!("Quantity {quantity} is too large")))?;
        self.product_with_stock_for(product_id, total).await?;
        let item = self.db.upsert_cart_item(user_id, product_id, total).await?;
        info!("User {user_id} now has {total} x product {product_id} in their cart");
        Ok(item)
    }

    pub async fn edit(&self, user_id: i64, product_id: i64, quantity: i64) -> Result<CartItem, MarketError> {
        if self.db.fetch_cart_item(user_id, product_id).await?.is_none() {
            return Err(MarketError::NotFound(format!("Product {product_id} in cart")));
        }
        self.product_with_stock_for(product_id, quantity).await?;
        let item = self.db.upsert_cart_item(user_id, product_id, quantity).await?;
        info!("User {user_id} changed product {product_id} in their cart to {quantity}");
        Ok(item)
    }

    pub async fn remove(&self, user_id: i64, product_id: i64) -> Result<(), MarketError> {
        if !self.db.delete_cart_item(user_id, product_id).await? {
            return Err(MarketError::NotFound(format!("Product {product_id} in cart")));
        }
        info!("User {user_id} removed product {product_id} from their cart");
        Ok(())
    }

    /// The active cart joined with current product data. Fails with [`MarketError::EmptyCart`] if there is nothing in
    /// it.
    pub async fn view(&self, user_id: i64) -> Result<CartView, MarketError> {
        let items = self.db.fetch_active_cart(user_id).await?;
        if items.is_empty() {
            return Err(MarketError::EmptyCart);
        }
        let mut cart = Vec::with_capacity(items.len());
        for item in items {
            let product = self.db.fetch_product(item.product_id).await?.ok_or_else(|| {
                MarketError::NotFound(format!("Product {} (in cart item {})", item.product_id, item.id))
            })?;
            let subtotal = item.quantity as f64 * product.price;
            cart.push(CartLine { cart_id: item.id, product, quantity: item.quantity, subtotal });
        }
        let total = cart.iter().map(|line| line.subtotal).sum();
        Ok(CartView { cart, total })
    }
}
