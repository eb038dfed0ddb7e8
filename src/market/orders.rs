//! Order placement and the seller side of the order lifecycle.
//!
//! ```text
//!   PLACED ──accept──▶ ACCEPTED ──complete──▶ COMPLETED
//!      └────decline──▶ DECLINED
//! ```
//!
//! Stock is validated when an order is placed but is not decremented.
use std::collections::HashSet;

use log::{debug, info, warn};

use crate::{
    errors::MarketError,
    models::{LineItem, NewOrder, Order, OrderStatus},
    store::MarketStore,
};

#[derive(Clone, Debug)]
pub struct OrderFlowApi<B> {
    db: B,
}

impl<B> OrderFlowApi<B>
where B: MarketStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Converts the user's active cart into a `PLACED` order.
    ///
    /// Every item is priced at the product's current price. If any product has vanished or cannot cover the
    /// quantity, the call fails and neither the cart nor the orders are touched. Otherwise the order is inserted and
    /// the cart emptied in a single store transaction.
    pub async fn place_order(&self, user_id: i64) -> Result<Order, MarketError> {
        let cart = self.db.fetch_active_cart(user_id).await?;
        if cart.is_empty() {
            return Err(MarketError::EmptyCart);
        }
        let mut items = Vec::with_capacity(cart.len());
        for cart_item in &cart {
            let product = self
                .db
                .fetch_product(cart_item.product_id)
                .await?
                .ok_or_else(|| MarketError::NotFound(format!("Product {}", cart_item.product_id)))?;
            if cart_item.quantity > product.stock {
                warn!(
                    "Order for user {user_id} rejected: {} x product {} requested, {} in stock",
                    cart_item.quantity, product.id, product.stock
                );
                return Err(MarketError::OutOfStock { product_id: product.id, title: product.title });
            }
            items.push(LineItem {
                product_id: product.id,
                seller_id: product.seller_id,
                title: product.title,
                quantity: cart_item.quantity,
                unit_price: product.price,
            });
        }
        let total = items.iter().map(LineItem::subtotal).sum();
        let new_order = NewOrder { user_id, items, total, cart_items: cart };
        let order = self.db.checkout(new_order).await?;
        info!("User {user_id} placed order {} for {:.2} ({} items)", order.id, order.total, order.items.len());
        Ok(order)
    }

    pub async fn accept_order(&self, seller_id: i64, order_id: i64) -> Result<Order, MarketError> {
        self.transition(seller_id, order_id, OrderStatus::Accepted).await
    }

    pub async fn decline_order(&self, seller_id: i64, order_id: i64) -> Result<Order, MarketError> {
        self.transition(seller_id, order_id, OrderStatus::Declined).await
    }

    pub async fn complete_order(&self, seller_id: i64, order_id: i64) -> Result<Order, MarketError> {
        self.transition(seller_id, order_id, OrderStatus::Completed).await
    }

    async fn transition(&self, seller_id: i64, order_id: i64, to: OrderStatus) -> Result<Order, MarketError> {
        let order =
            self.db.fetch_order(order_id).await?.ok_or_else(|| MarketError::NotFound(format!("Order {order_id}")))?;
        if !order.involves_seller(seller_id) {
            debug!("Seller {seller_id} has no products in order {order_id}");
            return Err(MarketError::Forbidden("Order does not contain any of your products".into()));
        }
        let from = order.status;
        if !from.can_transition_to(to) {
            return Err(MarketError::InvalidTransition { order_id, from, to });
        }
        match self.db.update_order_status(order_id, from, to).await? {
            Some(order) => {
                info!("Seller {seller_id} moved order {order_id} from {from} to {to}");
                Ok(order)
            },
            // Somebody else changed the status between our read and the write
            None => {
                let current = self.db.fetch_order(order_id).await?.map(|o| o.status).unwrap_or(from);
                Err(MarketError::InvalidTransition { order_id, from: current, to })
            },
        }
    }

    /// Every order that contains at least one of the seller's products, each listed once.
    pub async fn list_orders(&self, seller_id: i64) -> Result<Vec<Order>, MarketError> {
        let products = self.db.fetch_products_for_seller(seller_id).await?;
        let mut seen = HashSet::new();
        let mut orders = Vec::new();
        for product in products {
            for order in self.db.fetch_orders_for_product(product.id).await? {
                if seen.insert(order.id) {
                    orders.push(order);
                }
            }
        }
        Ok(orders)
    }

    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, MarketError> {
        Ok(self.db.fetch_orders_for_user(user_id).await?)
    }
}
