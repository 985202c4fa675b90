//! Access control list middleware for the AgroMart server.
//! This middleware can be placed on any route or service.
//!
//! It checks the [`UserIdentity`] that [`crate::auth::IdentityMiddlewareFactory`] attached to the request against the
//! roles allowed on the route. If the caller holds any of the allowed roles, the request continues. Anonymous
//! callers get a 401 Unauthorized response and callers with another role get a 403 Forbidden response.

use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorForbidden, ErrorUnauthorized},
    Error,
    HttpMessage,
};
use futures::future::{ok, Ready};
use log::warn;

use crate::auth::{Role, UserIdentity};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let identity = req.extensions().get::<UserIdentity>().cloned().ok_or_else(|| {
                warn!("🔐️ No user identity on request to {}", req.path());
                ErrorUnauthorized("No user identity was provided")
            })?;
            if allowed_roles.contains(&identity.role) {
                service.call(req).await
            } else {
                warn!("🔐️ {} ({}) may not access {}", identity.email, identity.role, req.path());
                Err(ErrorForbidden("Insufficient permissions"))
            }
        })
    }
}
