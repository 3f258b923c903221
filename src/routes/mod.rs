mod auth;
mod health_check;

pub use auth::{login, logout, refresh, register};
pub use auth::{AuthResponse, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest};
pub use health_check::health_check;
