/// Authentication Routes
///
/// Thin HTTP layer over `AuthService`: input validation, JSON binding and
/// status codes. All credential logic lives in the service.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::Claims;
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::logger::request_id;
use crate::service::{AuthService, TokenPair};
use crate::validators::{is_valid_email, is_valid_password};

/// User registration request
#[derive(Deserialize, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// User login request
#[derive(Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Authentication response with access and refresh tokens
#[derive(Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
}

impl From<TokenPair> for AuthResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /auth/register
///
/// Register a new user with email and password. No tokens are issued.
///
/// # Errors
/// - 400: Invalid email or password not meeting complexity rules
/// - 409: Email already registered
/// - 500: Internal server error
pub async fn register(
    req: HttpRequest,
    form: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration").with_request_id(request_id(&req));

    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;

    let user_id = service.register(&email, &form.password).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        user_id = %user_id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(MessageResponse {
        message: "User registered successfully".to_string(),
    }))
}

/// POST /auth/login
///
/// Authenticate with email and password; returns a token pair.
///
/// # Errors
/// - 400: Malformed email
/// - 401: Invalid credentials (unknown email and wrong password look the same)
/// - 500: Internal server error
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login").with_request_id(request_id(&req));

    let email = is_valid_email(&form.email)?;
    if form.password.is_empty() {
        return Err(ValidationError::EmptyField("password").into());
    }

    let pair = service.login(&email, &form.password).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::from(pair)))
}

/// POST /auth/refresh
///
/// Exchange a refresh token for a new pair. The presented token is revoked;
/// presenting it again fails.
///
/// # Errors
/// - 400: Missing token
/// - 401: Invalid, expired, revoked or already used refresh token
/// - 500: Internal server error
pub async fn refresh(
    req: HttpRequest,
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh").with_request_id(request_id(&req));

    let refresh_token = form.refresh_token.trim();
    if refresh_token.is_empty() {
        return Err(ValidationError::EmptyField("refresh_token").into());
    }

    let pair = service.refresh(refresh_token).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        "Token refreshed successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::from(pair)))
}

/// POST /auth/logout
///
/// **Requires a valid access token** (`Authorization: Bearer <token>`).
/// Revokes all refresh tokens of the caller. Access tokens stay valid until
/// they expire.
///
/// # Errors
/// - 401: Missing or invalid access token (handled by middleware)
/// - 500: Internal server error
pub async fn logout(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id().ok_or(AuthError::InvalidAccessToken)?;
    let context = ErrorContext::new("user_logout")
        .with_request_id(request_id(&req))
        .with_user_id(user_id);

    service.logout(user_id).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        user_id = ?context.user_id,
        "User logged out successfully"
    );

    Ok(HttpResponse::NoContent().finish())
}
