//! # E-Market
//!
//! A two-sided marketplace backend. Sellers publish products and act on incoming orders; users browse the catalog,
//! fill a cart and place orders from it.
//!
//! The crate is split the same way requests flow through it:
//! * [`routes`] and [`server`] are the HTTP surface. Every response is wrapped in the [`response::Envelope`].
//! * [`middleware`] guards the `/user` and `/seller` scopes with the bearer-token checks in [`auth`].
//! * [`market`] holds the marketplace engine: accounts, catalog, carts and the order lifecycle.
//! * [`store`] is the persistence seam, with a MongoDB backend and an in-memory one.
pub mod auth;
pub mod config;
pub mod errors;
pub mod market;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod server;
pub mod store;

#[cfg(test)]
mod endpoint_tests;
