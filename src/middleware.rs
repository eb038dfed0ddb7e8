use actix_service::{forward_ready, Service};
use actix_web::dev::{ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use futures::future::{ok, LocalBoxFuture, Ready};
use log::debug;
use std::rc::Rc;

use crate::auth::{AccessControl, BearerToken, Role};
use crate::errors::MarketError;
use crate::store::MarketStore;

/// Middleware factory guarding a scope for a single role.
///
/// On success the resolved [`crate::auth::Principal`] and the [`BearerToken`] are placed in the request extensions.
/// On failure the request is answered with 401 and the wrapped service never runs.
pub struct RoleGuard<B> {
    access: AccessControl<B>,
    role: Role,
}

impl<B> RoleGuard<B> {
    pub fn new(access: AccessControl<B>, role: Role) -> Self {
        RoleGuard { access, role }
    }
}

impl<S, B, Body> Transform<S, ServiceRequest> for RoleGuard<B>
where
    S: Service<ServiceRequest, Response = ServiceResponse<Body>, Error = Error> + 'static,
    S::Future: 'static,
    B: MarketStore + Clone + 'static,
    Body: 'static,
{
    type Response = ServiceResponse<Body>;
    type Error = Error;
    type Transform = RoleGuardMiddleware<S, B>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RoleGuardMiddleware { service: Rc::new(service), access: self.access.clone(), role: self.role })
    }
}

pub struct RoleGuardMiddleware<S, B> {
    service: Rc<S>,
    access: AccessControl<B>,
    role: Role,
}

impl<S, B, Body> Service<ServiceRequest> for RoleGuardMiddleware<S, B>
where
    S: Service<ServiceRequest, Response = ServiceResponse<Body>, Error = Error> + 'static,
    S::Future: 'static,
    B: MarketStore + Clone + 'static,
    Body: 'static,
{
    type Response = ServiceResponse<Body>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let access = self.access.clone();
        let role = self.role;

        Box::pin(async move {
            let header = req.headers().get("Authorization").and_then(|h| h.to_str().ok()).map(str::to_string);
            let token = AccessControl::<B>::bearer_token(header.as_deref()).map_err(MarketError::from)?.to_string();
            let principal = access.authorize(&token, role).await.map_err(|e| {
                debug!("Rejected request to {}: {e}", req.path());
                MarketError::from(e)
            })?;
            req.extensions_mut().insert(principal);
            req.extensions_mut().insert(BearerToken(token));
            service.call(req).await
        })
    }
}
