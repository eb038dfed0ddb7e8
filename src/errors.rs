use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use log::error;
use thiserror::Error;

use crate::{
    auth::{AuthError, HashError},
    models::OrderStatus,
    response,
    store::StoreError,
};

/// Errors that stop the server from booting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Could not initialize the store. {0}")]
    StoreError(#[from] StoreError),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
}

/// Every failure a marketplace operation can report back to a caller.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Requested quantity {requested} of product {product_id} exceeds the {available} in stock")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("Product {product_id} ({title}) is out of stock")]
    OutOfStock { product_id: i64, title: String },
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: i64, from: OrderStatus, to: OrderStatus },
    #[error("Internal server error. {0}")]
    Internal(String),
}

impl MarketError {
    fn headline(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid request",
            Self::NotFound(_) => "Not found",
            Self::Conflict(_) => "Conflict",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::InsufficientStock { .. } => "Product quantity is less",
            Self::OutOfStock { .. } => "Product out of stock",
            Self::EmptyCart => "Your cart is empty",
            Self::InvalidTransition { .. } => "Invalid order status change",
            Self::Internal(_) => "Internal server error",
        }
    }
}

impl ResponseError for MarketError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InsufficientStock { .. } => StatusCode::BAD_REQUEST,
            Self::OutOfStock { .. } => StatusCode::BAD_REQUEST,
            Self::EmptyCart => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            Self::Internal(e) => {
                error!("Request failed with an internal error: {e}");
                "An internal error occurred".to_string()
            },
            _ => self.to_string(),
        };
        response::error(self.status_code(), self.headline(), detail)
    }
}

impl From<StoreError> for MarketError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => Self::Conflict(format!("{what} already exists")),
            StoreError::InsufficientStock { product_id, title } => Self::OutOfStock { product_id, title },
            StoreError::CartChanged => Self::Conflict("The cart changed while the order was being placed".into()),
            StoreError::ProductNotFound(id) => Self::NotFound(format!("Product {id}")),
            e => Self::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for MarketError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Signing(_) | AuthError::Store(_) => Self::Internal(e.to_string()),
            e => Self::Unauthorized(e.to_string()),
        }
    }
}

impl From<HashError> for MarketError {
    fn from(e: HashError) -> Self {
        Self::Internal(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use actix_web::body::MessageBody;

    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(MarketError::EmptyCart.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(MarketError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        let e = MarketError::InvalidTransition { order_id: 1, from: OrderStatus::Accepted, to: OrderStatus::Accepted };
        assert_eq!(e.status_code(), StatusCode::CONFLICT);
        assert_eq!(e.to_string(), "Order 1 cannot move from ACCEPTED to ACCEPTED");
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let res = MarketError::Internal("connection refused on 10.0.0.3".into()).error_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = res.into_body().try_into_bytes().unwrap();
        let body = String::from_utf8_lossy(&body);
        assert!(!body.contains("10.0.0.3"));
        assert!(body.contains("\"status\":\"Internal Server Error\""));
    }

    #[test]
    fn store_errors_map_to_domain_errors() {
        let e: MarketError = StoreError::Duplicate("Email a@b.c".into()).into();
        assert!(matches!(e, MarketError::Conflict(_)));
        let e: MarketError = StoreError::Database("boom".into()).into();
        assert!(matches!(e, MarketError::Internal(_)));
    }
}
