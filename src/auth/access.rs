use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, Ready};
use log::debug;

use super::{AuthError, Role, TokenKind, TokenService};
use crate::{
    errors::MarketError,
    models::{Seller, User},
    store::MarketStore,
};

/// The authenticated caller of a protected route.
#[derive(Debug, Clone)]
pub enum Principal {
    User(User),
    Seller(Seller),
}

impl Principal {
    pub fn role(&self) -> Role {
        match self {
            Principal::User(_) => Role::User,
            Principal::Seller(_) => Role::Seller,
        }
    }
}

/// Resolves bearer tokens into principals. Both guards share this one verification path and differ only in the role
/// they demand.
#[derive(Clone, Debug)]
pub struct AccessControl<B> {
    db: B,
    tokens: TokenService<B>,
}

impl<B> AccessControl<B>
where B: MarketStore + Clone
{
    pub fn new(db: B, tokens: TokenService<B>) -> Self {
        Self { db, tokens }
    }

    /// Strips the `Bearer ` prefix off an `Authorization` header value.
    pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty()).ok_or(AuthError::InvalidScheme)
    }

    /// Verifies `token` as an access token for `role` and loads the account it names.
    pub async fn authorize(&self, token: &str, role: Role) -> Result<Principal, AuthError> {
        let claims = self.tokens.verify(token).await?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::WrongKind(TokenKind::Access));
        }
        if claims.role != role {
            debug!("{:?} token presented to a {role:?} route", claims.role);
            return Err(AuthError::WrongRole(role));
        }
        let id = claims.subject_id()?;
        let store_err = |e: crate::store::StoreError| AuthError::Store(e.to_string());
        let principal = match role {
            Role::User => self.db.fetch_user(id).await.map_err(store_err)?.map(Principal::User),
            Role::Seller => self.db.fetch_seller(id).await.map_err(store_err)?.map(Principal::Seller),
        };
        principal.ok_or(AuthError::AccountNotFound)
    }
}

/// The raw bearer token of an authenticated request, used to revoke it on logout.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

#[derive(Debug, Clone)]
pub struct AuthenticatedSeller(pub Seller);

impl FromRequest for AuthenticatedUser {
    type Error = MarketError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = match req.extensions().get::<Principal>() {
            Some(Principal::User(user)) => Ok(AuthenticatedUser(user.clone())),
            _ => Err(MarketError::Unauthorized("A user login is required".into())),
        };
        ready(result)
    }
}

impl FromRequest for AuthenticatedSeller {
    type Error = MarketError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = match req.extensions().get::<Principal>() {
            Some(Principal::Seller(seller)) => Ok(AuthenticatedSeller(seller.clone())),
            _ => Err(MarketError::Unauthorized("A seller login is required".into())),
        };
        ready(result)
    }
}

impl FromRequest for BearerToken {
    type Error = MarketError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = req
            .extensions()
            .get::<BearerToken>()
            .cloned()
            .ok_or_else(|| MarketError::Unauthorized(AuthError::MissingToken.to_string()));
        ready(result)
    }
}
