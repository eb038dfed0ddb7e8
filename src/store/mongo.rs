use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use log::{debug, error, info, warn};
use mongodb::{
    bson::{doc, to_bson, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    ClientSession,
    Client,
    Collection,
    Database,
    IndexModel,
};
use serde::{Deserialize, Serialize};

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

const USERS: &str = "users";
const SELLERS: &str = "sellers";
const PRODUCTS: &str = "products";
const CART_ITEMS: &str = "cart_items";
const ORDERS: &str = "orders";
const BLACKLIST: &str = "blacklisted_tokens";
const COUNTERS: &str = "counters";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Serialize, Deserialize, Debug)]
struct Counter {
    #[serde(rename = "_id")]
    name: String,
    seq: i64,
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        if is_duplicate_key(&e) {
            return StoreError::Duplicate(e.to_string());
        }
        StoreError::Database(e.to_string())
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(&*e.kind, ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY)
}

/// Matches the priced cart rows that are still active and still hold the quantity they were priced at.
fn priced_rows_filter(user_id: i64, rows: &[CartItem]) -> Document {
    let rows: Vec<Document> = rows.iter().map(|c| doc! { "id": c.id, "quantity": c.quantity }).collect();
    doc! { "user_id": user_id, "order_id": Bson::Null, "$or": rows }
}

/// Enforces at most one active row per (user, product). Rows attached to an order fall outside the filter.
fn active_cart_index() -> IndexModel {
    let options = IndexOptions::builder()
        .unique(true)
        .partial_filter_expression(doc! { "order_id": { "$type": "null" } })
        .build();
    IndexModel::builder().keys(doc! { "user_id": 1, "product_id": 1 }).options(options).build()
}

fn status_bson(status: OrderStatus) -> Result<Bson, StoreError> {
    to_bson(&status).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn now_bson() -> Result<Bson, StoreError> {
    to_bson(&Utc::now()).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// MongoDB backend.
///
/// Records keep their integer `id` in a uniquely-indexed field next to Mongo's own `_id`. Checkout runs in a
/// multi-document transaction, so the server must be a replica set (a single-node replica set is enough).
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub async fn connect(database_url: &str, database_name: &str) -> Result<Self, StoreError> {
        let client_options = ClientOptions::parse(database_url).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(database_name);
        let store = Self { client, db };
        store.ensure_indexes().await?;
        info!("Connected to MongoDB database '{database_name}'");
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = || IndexOptions::builder().unique(true).build();
        for name in [USERS, SELLERS] {
            let coll = self.db.collection::<Document>(name);
            coll.create_index(IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build(), None).await?;
        }
        for name in [USERS, SELLERS, PRODUCTS, CART_ITEMS, ORDERS] {
            let coll = self.db.collection::<Document>(name);
            coll.create_index(IndexModel::builder().keys(doc! { "id": 1 }).options(unique()).build(), None).await?;
        }
        self.db
            .collection::<Document>(CART_ITEMS)
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1, "order_id": 1 }).build(), None)
            .await?;
        self.db.collection::<Document>(CART_ITEMS).create_index(active_cart_index(), None).await?;
        self.db
            .collection::<Document>(ORDERS)
            .create_index(IndexModel::builder().keys(doc! { "items.product_id": 1 }).build(), None)
            .await?;
        self.db
            .collection::<Document>(BLACKLIST)
            .create_index(IndexModel::builder().keys(doc! { "token": 1 }).options(unique()).build(), None)
            .await?;
        debug!("MongoDB indexes are in place");
        Ok(())
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    fn sellers(&self) -> Collection<Seller> {
        self.db.collection(SELLERS)
    }

    fn products(&self) -> Collection<Product> {
        self.db.collection(PRODUCTS)
    }

    fn cart_items(&self) -> Collection<CartItem> {
        self.db.collection(CART_ITEMS)
    }

    fn orders(&self) -> Collection<Order> {
        self.db.collection(ORDERS)
    }

    fn blacklist(&self) -> Collection<BlacklistedToken> {
        self.db.collection(BLACKLIST)
    }

    async fn set_cart_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<Option<CartItem>, StoreError> {
        let filter = doc! { "user_id": user_id, "product_id": product_id, "order_id": Bson::Null };
        let options = FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();
        Ok(self.cart_items().find_one_and_update(filter, doc! { "$set": { "quantity": quantity } }, options).await?)
    }

    /// Allocates the next integer id for the named sequence.
    async fn next_id(&self, seq_name: &str) -> Result<i64, StoreError> {
        let counters = self.db.collection::<Counter>(COUNTERS);
        let filter = doc! { "_id": seq_name };
        let update = doc! { "$inc": { "seq": 1_i64 } };
        let options =
            FindOneAndUpdateOptions::builder().upsert(true).return_document(ReturnDocument::After).build();
        let counter = counters.find_one_and_update(filter, update, options).await?;
        counter.map(|c| c.seq).ok_or_else(|| StoreError::Database(format!("Failed to generate {seq_name} id")))
    }

    async fn run_checkout(&self, session: &mut ClientSession, order: NewOrder) -> Result<Order, StoreError> {
        for item in &order.items {
            let product = self
                .products()
                .find_one_with_session(doc! { "id": item.product_id }, None, session)
                .await?
                .ok_or(StoreError::ProductNotFound(item.product_id))?;
            if product.stock < item.quantity {
                return Err(StoreError::InsufficientStock { product_id: product.id, title: product.title });
            }
        }
        let id = self.next_id(ORDERS).await?;
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
        self.orders().insert_one_with_session(&new_order, None, session).await?;
        let filter = priced_rows_filter(order.user_id, &order.cart_items);
        let update = doc! { "$set": { "order_id": id } };
        let result = self.cart_items().update_many_with_session(filter, update, None, session).await?;
        if result.modified_count != order.cart_items.len() as u64 {
            warn!(
                "Checkout for user {} expected to detach {} cart items but matched {}",
                order.user_id,
                order.cart_items.len(),
                result.modified_count
            );
            return Err(StoreError::CartChanged);
        }
        Ok(new_order)
    }
}

impl MarketStore for MongoStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let id = self.next_id(USERS).await?;
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
        self.users().insert_one(&user, None).await.map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate(_) => StoreError::Duplicate(format!("User with email {}", user.email)),
            e => e,
        })?;
        Ok(user)
    }

    async fn fetch_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "id": id }, None).await?)
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn insert_seller(&self, seller: NewSeller) -> Result<Seller, StoreError> {
        let id = self.next_id(SELLERS).await?;
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
        self.sellers().insert_one(&seller, None).await.map_err(|e| match StoreError::from(e) {
            StoreError::Duplicate(_) => StoreError::Duplicate(format!("Seller with email {}", seller.email)),
            e => e,
        })?;
        Ok(seller)
    }

    async fn fetch_seller(&self, id: i64) -> Result<Option<Seller>, StoreError> {
        Ok(self.sellers().find_one(doc! { "id": id }, None).await?)
    }

    async fn fetch_seller_by_email(&self, email: &str) -> Result<Option<Seller>, StoreError> {
        Ok(self.sellers().find_one(doc! { "email": email }, None).await?)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let id = self.next_id(PRODUCTS).await?;
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
        self.products().insert_one(&product, None).await?;
        Ok(product)
    }

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        Ok(self.products().find_one(doc! { "id": id }, None).await?)
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, StoreError> {
        let cursor = self.products().find(doc! {}, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn fetch_products_for_seller(&self, seller_id: i64) -> Result<Vec<Product>, StoreError> {
        let cursor = self.products().find(doc! { "seller_id": seller_id }, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_stock(&self, product_id: i64, stock: i64) -> Result<Option<Product>, StoreError> {
        let options = FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();
        let product = self
            .products()
            .find_one_and_update(doc! { "id": product_id }, doc! { "$set": { "stock": stock } }, options)
            .await?;
        Ok(product)
    }

    async fn delete_product(&self, product_id: i64) -> Result<bool, StoreError> {
        let result = self.products().delete_one(doc! { "id": product_id }, None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn fetch_cart_item(&self, user_id: i64, product_id: i64) -> Result<Option<CartItem>, StoreError> {
        let filter = doc! { "user_id": user_id, "product_id": product_id, "order_id": Bson::Null };
        Ok(self.cart_items().find_one(filter, None).await?)
    }

    async fn fetch_active_cart(&self, user_id: i64) -> Result<Vec<CartItem>, StoreError> {
        let filter = doc! { "user_id": user_id, "order_id": Bson::Null };
        let cursor = self.cart_items().find(filter, None).await?;
        let mut items: Vec<CartItem> = cursor.try_collect().await?;
        items.sort_by_key(|c| c.id);
        Ok(items)
    }

    async fn upsert_cart_item(&self, user_id: i64, product_id: i64, quantity: i64) -> Result<CartItem, StoreError> {
        if let Some(item) = self.set_cart_quantity(user_id, product_id, quantity).await? {
            return Ok(item);
        }
        let id = self.next_id(CART_ITEMS).await?;
        let item = CartItem { id, user_id, product_id, quantity, order_id: None };
        match self.cart_items().insert_one(&item, None).await {
            Ok(_) => Ok(item),
            // A concurrent request created the active row first; update that one instead
            Err(e) if is_duplicate_key(&e) => {
                debug!("Active cart row for user {user_id}, product {product_id} appeared concurrently");
                self.set_cart_quantity(user_id, product_id, quantity)
                    .await?
                    .ok_or_else(|| StoreError::Database(format!("Cart row for product {product_id} vanished")))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_cart_item(&self, user_id: i64, product_id: i64) -> Result<bool, StoreError> {
        let filter = doc! { "user_id": user_id, "product_id": product_id, "order_id": Bson::Null };
        let result = self.cart_items().delete_one(filter, None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn checkout(&self, order: NewOrder) -> Result<Order, StoreError> {
        let user_id = order.user_id;
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        match self.run_checkout(&mut session, order).await {
            Ok(order) => {
                session.commit_transaction().await?;
                debug!("Committed checkout transaction for order {}", order.id);
                Ok(order)
            },
            Err(e) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    error!("Could not abort checkout transaction for user {user_id}: {abort_err}");
                }
                Err(e)
            },
        }
    }

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        Ok(self.orders().find_one(doc! { "id": id }, None).await?)
    }

    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, StoreError> {
        let cursor = self.orders().find(doc! { "user_id": user_id }, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn fetch_orders_for_product(&self, product_id: i64) -> Result<Vec<Order>, StoreError> {
        let cursor = self.orders().find(doc! { "items.product_id": product_id }, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, StoreError> {
        let filter = doc! { "id": order_id, "status": status_bson(from)? };
        let update = doc! { "$set": { "status": status_bson(to)?, "updated_at": now_bson()? } };
        let options = FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();
        Ok(self.orders().find_one_and_update(filter, update, options).await?)
    }

    async fn blacklist_token(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        let entry = BlacklistedToken { token: token.to_string(), expires_at, revoked_at: Utc::now() };
        match self.blacklist().insert_one(&entry, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_token_blacklisted(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.blacklist().find_one(doc! { "token": token }, None).await?.is_some())
    }
}
