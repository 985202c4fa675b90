//! Caller identity.
//!
//! Authentication happens upstream of this server. The gateway in front of it forwards the authenticated user as two
//! headers, [`USER_EMAIL_HEADER`] and [`USER_ROLE_HEADER`]. [`IdentityMiddlewareFactory`] reads them into a
//! [`UserIdentity`] request extension, where the ACL middleware and route handlers pick it up.
//!
//! Requests without the headers pass through without an identity. Routes that need one are guarded by
//! [`crate::middleware::AclMiddlewareFactory`], and the [`UserIdentity`] extractor refuses such requests.
use std::{
    fmt::Display,
    future::{ready, Ready},
    rc::Rc,
    str::FromStr,
};

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorUnauthorized},
    Error,
    FromRequest,
    HttpMessage,
    HttpRequest,
};
use agromart_engine::db_types::ListingKind;
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

pub const USER_EMAIL_HEADER: &str = "ams_user_email";
pub const USER_ROLE_HEADER: &str = "ams_user_role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Farmer,
    Supplier,
    Admin,
}

impl Role {
    /// The kind of listing a user with this role may sell, if any. Farmers sell produce, suppliers sell agri-inputs.
    pub fn sells(&self) -> Option<ListingKind> {
        match self {
            Role::Farmer => Some(ListingKind::Product),
            Role::Supplier => Some(ListingKind::AgriInput),
            Role::Buyer | Role::Admin => None,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "buyer"),
            Role::Farmer => write!(f, "farmer"),
            Role::Supplier => write!(f, "supplier"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" => Ok(Role::Buyer),
            "farmer" => Ok(Role::Farmer),
            "supplier" => Ok(Role::Supplier),
            "admin" => Ok(Role::Admin),
            other => Err(AuthError::UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub email: String,
    pub role: Role,
}

impl UserIdentity {
    pub fn new<S: Into<String>>(email: S, role: Role) -> Self {
        Self { email: email.into(), role }
    }

    /// Reads the identity headers. Returns `Ok(None)` if no email header is present.
    pub fn from_headers(req: &HttpRequest) -> Result<Option<Self>, AuthError> {
        let header = |name: &str| -> Result<Option<String>, AuthError> {
            req.headers()
                .get(name)
                .map(|v| v.to_str().map(|s| s.trim().to_string()).map_err(|_| AuthError::MalformedHeader(name.into())))
                .transpose()
        };
        let Some(email) = header(USER_EMAIL_HEADER)?.filter(|e| !e.is_empty()) else {
            return Ok(None);
        };
        let role = header(USER_ROLE_HEADER)?.ok_or(AuthError::MissingRole)?.parse::<Role>()?;
        Ok(Some(Self { email, role }))
    }
}

impl FromRequest for UserIdentity {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let identity = req.extensions().get::<UserIdentity>().cloned();
        ready(identity.ok_or_else(|| ErrorUnauthorized("No user identity was provided")))
    }
}

pub struct IdentityMiddlewareFactory;

impl<S, B> Transform<S, ServiceRequest> for IdentityMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = IdentityMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IdentityMiddlewareService { service: Rc::new(service) }))
    }
}

pub struct IdentityMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for IdentityMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            match UserIdentity::from_headers(req.request()) {
                Ok(Some(identity)) => {
                    trace!("🔐️ Request from {} ({})", identity.email, identity.role);
                    req.extensions_mut().insert(identity);
                },
                Ok(None) => trace!("🔐️ Anonymous request to {}", req.path()),
                Err(e) => {
                    warn!("🔐️ Rejecting request to {} with bad identity headers. {e}", req.path());
                    return Err(ErrorBadRequest(e.to_string()));
                },
            }
            service.call(req).await
        })
    }
}
