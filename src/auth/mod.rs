//! Authentication: password hashing, JWT issuance and verification, and resolution of the calling principal.
mod access;
mod credentials;
mod tokens;

pub use access::{AccessControl, AuthenticatedSeller, AuthenticatedUser, BearerToken, Principal};
pub use credentials::{hash_password, verify_password, HashConfig, HashError};
use thiserror::Error;
pub use tokens::{JwtClaims, Role, TokenKind, TokenPair, TokenService};

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Authorization header missing")]
    MissingToken,
    #[error("Invalid authorization scheme")]
    InvalidScheme,
    #[error("Token has expired")]
    Expired,
    #[error("Token signature is invalid")]
    BadSignature,
    #[error("Token has been revoked")]
    Revoked,
    #[error("Token is not in the correct format. {0}")]
    Malformed(String),
    #[error("Expected a {0:?} token")]
    WrongKind(TokenKind),
    #[error("This route requires a {0:?} account")]
    WrongRole(Role),
    #[error("Account for this token no longer exists")]
    AccountNotFound,
    #[error("Could not sign token. {0}")]
    Signing(String),
    #[error("Could not check token against the blacklist. {0}")]
    Store(String),
}
