/// Bearer Access-Token Middleware
///
/// Validates the access token from the Authorization header and injects
/// its claims into request extensions for route handlers. Refresh tokens
/// are rejected here because they are signed with a different secret.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{TokenIssuer, TokenKind};
use crate::error::{AppError, AuthError};

/// Guard for routes that require an authenticated user
pub struct JwtMiddleware {
    tokens: TokenIssuer,
}

impl JwtMiddleware {
    pub fn new(tokens: TokenIssuer) -> Self {
        Self { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    tokens: TokenIssuer,
}

fn reject<B>(error: AuthError) -> LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>
where
    B: 'static,
{
    let err: Error = AppError::from(error).into();
    Box::pin(async move { Err::<ServiceResponse<B>, Error>(err) })
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = match bearer_token(&req) {
            Some(token) => token,
            None => {
                tracing::warn!("Missing or invalid Authorization header");
                return reject(AuthError::MissingToken);
            }
        };

        match self.tokens.verify(TokenKind::Access, &token) {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.sub, "Access token validated");
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(_) => reject(AuthError::InvalidAccessToken),
        }
    }
}
