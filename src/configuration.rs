use std::time::Duration;

use config::ConfigError;

const MIN_PRODUCTION_SECRET_LENGTH: usize = 32;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub security: SecuritySettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub environment: Environment,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Production,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing settings.
///
/// Access and refresh tokens are signed with different secrets.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64,  // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
    pub audience: String,
}

/// What to do when the refresh-token record cannot be written after a
/// Login or Refresh has already minted the token pair.
#[derive(serde::Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPersistence {
    /// Log and still hand out the pair; that refresh token cannot be rotated.
    #[default]
    BestEffort,
    /// Fail the whole operation with an internal error.
    Required,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct SecuritySettings {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default)]
    pub refresh_persistence: RefreshPersistence,
    /// Revoke every refresh token of a user when an already-rotated one is
    /// presented again.
    #[serde(default = "default_reuse_detection")]
    pub reuse_detection: bool,
}

impl SecuritySettings {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
            store_timeout_ms: default_store_timeout_ms(),
            refresh_persistence: RefreshPersistence::default(),
            reuse_detection: default_reuse_detection(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_access_token_expiry() -> i64 {
    900
}
fn default_refresh_token_expiry() -> i64 {
    604_800
}
fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}
fn default_store_timeout_ms() -> u64 {
    5_000
}
fn default_reuse_detection() -> bool {
    true
}

impl Settings {
    /// Reject settings the service must not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let jwt = &self.jwt;

        if jwt.access_secret.is_empty() || jwt.refresh_secret.is_empty() {
            return Err(invalid("jwt secrets must not be empty"));
        }
        if jwt.access_secret == jwt.refresh_secret {
            return Err(invalid("jwt.access_secret and jwt.refresh_secret must differ"));
        }
        if jwt.access_token_expiry <= 0 || jwt.refresh_token_expiry <= 0 {
            return Err(invalid("token lifetimes must be positive"));
        }
        if jwt.refresh_token_expiry <= jwt.access_token_expiry {
            return Err(invalid(
                "jwt.refresh_token_expiry must be longer than jwt.access_token_expiry",
            ));
        }
        if !(4..=31).contains(&self.security.bcrypt_cost) {
            return Err(invalid("security.bcrypt_cost must be between 4 and 31"));
        }
        if self.security.store_timeout_ms == 0 {
            return Err(invalid("security.store_timeout_ms must be positive"));
        }
        if self.application.environment == Environment::Production
            && (jwt.access_secret.len() < MIN_PRODUCTION_SECRET_LENGTH
                || jwt.refresh_secret.len() < MIN_PRODUCTION_SECRET_LENGTH)
        {
            return Err(invalid(
                "jwt secrets must be at least 32 bytes in production",
            ));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Message(msg.to_string())
}

/// Load `configuration.{yaml,toml,json}` (optional) overlaid with
/// `APP__SECTION__KEY` environment variables, then validate.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
