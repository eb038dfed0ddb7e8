use log::{debug, info};

use crate::{
    errors::MarketError,
    models::{NewProduct, Product, ProductInput},
    store::MarketStore,
};

#[derive(Clone, Debug)]
pub struct CatalogApi<B> {
    db: B,
}

fn check_stock(stock: i64) -> Result<(), MarketError> {
    if stock < 0 {
        return Err(MarketError::Validation(format!("Stock cannot be negative (got {stock})")));
    }
    Ok(())
}

impl<B> CatalogApi<B>
where B: MarketStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_product(&self, seller_id: i64, input: ProductInput) -> Result<Product, MarketError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(MarketError::Validation("Product title must not be empty".into()));
        }
        if !input.price.is_finite() || input.price < 0.0 {
            return Err(MarketError::Validation(format!("Invalid price {}", input.price)));
        }
        check_stock(input.stock)?;
        let product = self
            .db
            .insert_product(NewProduct {
                seller_id,
                title,
                image_url: input.image_url,
                price: input.price,
                stock: input.stock,
                overview: input.overview,
                description: input.description,
                active: input.active,
            })
            .await?;
        info!("Seller {seller_id} created product {} ({})", product.id, product.title);
        Ok(product)
    }

    pub async fn product_by_id(&self, product_id: i64) -> Result<Product, MarketError> {
        self.db.fetch_product(product_id).await?.ok_or_else(|| MarketError::NotFound(format!("Product {product_id}")))
    }

    pub async fn all_products(&self) -> Result<Vec<Product>, MarketError> {
        Ok(self.db.fetch_products().await?)
    }

    pub async fn products_for_seller(&self, seller_id: i64) -> Result<Vec<Product>, MarketError> {
        Ok(self.db.fetch_products_for_seller(seller_id).await?)
    }

    /// Loads a product and checks that `seller_id` owns it.
    async fn owned_product(&self, seller_id: i64, product_id: i64) -> Result<Product, MarketError> {
        let product = self.product_by_id(product_id).await?;
        if product.seller_id != seller_id {
            debug!("Seller {seller_id} tried to modify product {product_id} owned by {}", product.seller_id);
            return Err(MarketError::Forbidden("Product does not belong to seller".into()));
        }
        Ok(product)
    }

    pub async fn adjust_stock(&self, seller_id: i64, product_id: i64, stock: i64) -> Result<Product, MarketError> {
        check_stock(stock)?;
        self.owned_product(seller_id, product_id).await?;
        let product = self
            .db
            .update_stock(product_id, stock)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("Product {product_id}")))?;
        info!("Seller {seller_id} set stock of product {product_id} to {stock}");
        Ok(product)
    }

    pub async fn delete_product(&self, seller_id: i64, product_id: i64) -> Result<(), MarketError> {
        self.owned_product(seller_id, product_id).await?;
        if !self.db.delete_product(product_id).await? {
            return Err(MarketError::NotFound(format!("Product {product_id}")));
        }
        info!("Seller {seller_id} deleted product {product_id}");
        Ok(())
    }
}
