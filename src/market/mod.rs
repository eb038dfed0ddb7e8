//! The marketplace engine. Each API is generic over a [`MarketStore`] backend and knows nothing about HTTP.
mod accounts;
mod cart;
mod catalog;
mod orders;

pub use accounts::{AccountApi, Login};
pub use cart::CartApi;
pub use catalog::CatalogApi;
pub use orders::OrderFlowApi;

use crate::{
    auth::{AccessControl, HashConfig, TokenService},
    config::AuthConfig,
    store::MarketStore,
};

/// Everything a worker needs to serve requests, built over one store handle.
#[derive(Clone, Debug)]
pub struct MarketContext<B> {
    pub accounts: AccountApi<B>,
    pub catalog: CatalogApi<B>,
    pub carts: CartApi<B>,
    pub orders: OrderFlowApi<B>,
    pub access: AccessControl<B>,
}

impl<B> MarketContext<B>
where B: MarketStore + Clone
{
    pub fn new(db: B, auth: &AuthConfig, hashing: HashConfig) -> Self {
        let tokens = TokenService::new(db.clone(), auth);
        Self {
            accounts: AccountApi::new(db.clone(), tokens.clone(), hashing),
            catalog: CatalogApi::new(db.clone()),
            carts: CartApi::new(db.clone()),
            orders: OrderFlowApi::new(db.clone()),
            access: AccessControl::new(db, tokens),
        }
    }
}
