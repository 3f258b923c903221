use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{PasswordHasher, TokenError, TokenIssuer};
use crate::configuration::{Settings, StorageBackend};
use crate::error::AppError;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{health_check, login, logout, refresh, register};
use crate::service::{AuthService, FlowPolicy};
use crate::store::{
    InMemoryRefreshTokenStore, InMemoryUserStore, PgRefreshTokenStore, PgUserStore,
    RefreshTokenStore, UserStore,
};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("token issuer misconfigured: {0}")]
    Tokens(#[from] TokenError),
    #[error("password hasher misconfigured: {0}")]
    Passwords(#[from] AppError),
}

/// Assemble the service around the given stores
pub fn build_auth_service(
    settings: &Settings,
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
) -> Result<AuthService, StartupError> {
    let tokens = TokenIssuer::new(&settings.jwt)?;
    let passwords = PasswordHasher::new(settings.security.bcrypt_cost)?;

    Ok(AuthService::new(
        users,
        refresh_tokens,
        tokens,
        passwords,
        FlowPolicy::from(&settings.security),
    ))
}

/// Connect the configured backend and assemble the service
pub async fn build_from_settings(settings: &Settings) -> Result<AuthService, StartupError> {
    match settings.database.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory stores; all credentials are lost on restart");
            build_auth_service(
                settings,
                Arc::new(InMemoryUserStore::new()),
                Arc::new(InMemoryRefreshTokenStore::new()),
            )
        }
        StorageBackend::Postgres => {
            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(settings.database.max_connections)
                .acquire_timeout(settings.security.store_timeout())
                .connect(&settings.database.connection_string())
                .await?;
            tracing::info!("Database connection pool created successfully");

            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Database migrations applied");

            build_auth_service(
                settings,
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgRefreshTokenStore::new(pool)),
            )
        }
    }
}

pub fn run(listener: TcpListener, service: AuthService) -> Result<Server, std::io::Error> {
    let tokens = service.tokens().clone();
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(service.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))

            // Routes requiring an access token
            .service(
                web::scope("/auth/logout")
                    .wrap(JwtMiddleware::new(tokens.clone()))
                    .route("", web::post().to(logout)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
