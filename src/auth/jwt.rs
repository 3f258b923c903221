/// JWT Token Issuance and Validation
///
/// Access and refresh tokens are HS256 JWTs with identical claims, signed
/// with two different secrets. Verification pins the algorithm, issuer and
/// audience, so a token of one kind never validates as the other.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Why a token was rejected.
///
/// For logging only: callers must collapse every variant into one
/// "invalid token" outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed")]
    Malformed,
    #[error("token signature invalid")]
    BadSignature,
    #[error("token algorithm not accepted")]
    WrongAlgorithm,
    #[error("token claims rejected")]
    WrongClaims,
    #[error("token encoding failed: {0}")]
    Encoding(String),
    #[error("invalid token settings: {0}")]
    Settings(&'static str),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::WrongAlgorithm
            }
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => TokenError::WrongClaims,
            _ => TokenError::Malformed,
        }
    }
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: i64,
}

impl SigningKeys {
    fn new(secret: &str, lifetime: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }
}

/// Mints and verifies self-contained tokens; holds no mutable state and
/// can be shared freely across workers.
#[derive(Clone)]
pub struct TokenIssuer {
    access: SigningKeys,
    refresh: SigningKeys,
    issuer: String,
    audience: String,
}

impl TokenIssuer {
    /// Build an issuer from configuration
    ///
    /// # Errors
    /// Returns `TokenError::Settings` if the secrets are empty or equal, or
    /// if a lifetime is not positive.
    pub fn new(config: &JwtSettings) -> Result<Self, TokenError> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err(TokenError::Settings("secrets must not be empty"));
        }
        if config.access_secret == config.refresh_secret {
            return Err(TokenError::Settings("access and refresh secrets must differ"));
        }
        if config.access_token_expiry <= 0 || config.refresh_token_expiry <= 0 {
            return Err(TokenError::Settings("lifetimes must be positive"));
        }

        Ok(Self {
            access: SigningKeys::new(&config.access_secret, config.access_token_expiry),
            refresh: SigningKeys::new(&config.refresh_secret, config.refresh_token_expiry),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
        })
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Access-token lifetime in seconds
    pub fn access_lifetime(&self) -> i64 {
        self.access.lifetime
    }

    pub fn refresh_lifetime(&self) -> i64 {
        self.refresh.lifetime
    }

    pub fn issue(&self, kind: TokenKind, user_id: Uuid) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let claims = Claims::new(user_id, &self.issuer, &self.audience, keys.lifetime);

        encode(&Header::new(ALGORITHM), &claims, &keys.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn issue_access(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(TokenKind::Access, user_id)
    }

    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(TokenKind::Refresh, user_id)
    }

    /// Verify a token of the given kind and return its claims
    ///
    /// # Errors
    /// Returns the internal rejection reason; log it, never show it.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let result = decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map_err(TokenError::from)
            .and_then(|data| {
                let claims = data.claims;
                if claims.exp <= claims.iat || claims.user_id().is_none() {
                    return Err(TokenError::WrongClaims);
                }
                Ok(claims)
            });

        if let Err(e) = &result {
            tracing::warn!(kind = %kind, reason = %e, "JWT validation failed");
        }
        result
    }

    /// Validate an access token and return its subject
    pub fn validate_access(&self, token: &str) -> Result<Uuid, TokenError> {
        self.validate(TokenKind::Access, token)
    }

    /// Validate a refresh token and return its subject
    pub fn validate_refresh(&self, token: &str) -> Result<Uuid, TokenError> {
        self.validate(TokenKind::Refresh, token)
    }

    fn validate(&self, kind: TokenKind, token: &str) -> Result<Uuid, TokenError> {
        self.verify(kind, token)?
            .user_id()
            .ok_or(TokenError::WrongClaims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // {"alg":"none"} header, claims for the test issuer/audience, no signature
    const UNSIGNED_TOKEN: &str = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJzdWIiOiI2N2U1NTA0NC0xMGIxLTQyNmYtOTI0Ny1iYjY4MGU1ZmUwYzgiLCJpc3MiOiJ0ZXN0IiwiYXVkIjoidGVzdC1jbGllbnRzIiwiaWF0IjoxNzAwMDAwMDAwLCJleHAiOjQxMDI0NDQ4MDAsImp0aSI6IngifQ.";

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "test-access-secret-at-least-32-characters".to_string(),
            refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
            audience: "test-clients".to_string(),
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&get_test_config()).expect("Failed to build issuer")
    }

    fn sign_with(claims: &Claims, algorithm: Algorithm, secret: &str) -> String {
        encode(
            &Header::new(algorithm),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("Failed to sign claims")
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();

        let token = issuer.issue_access(user_id).expect("Failed to generate token");
        let claims = issuer.verify(TokenKind::Access, &token).expect("Failed to validate token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.aud, "test-clients");
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(issuer.validate_access(&token), Ok(user_id));
    }

    #[test]
    fn test_refresh_token_has_longer_lifetime() {
        let issuer = issuer();
        let token = issuer.issue_refresh(Uuid::new_v4()).unwrap();
        let claims = issuer.verify(TokenKind::Refresh, &token).unwrap();

        assert_eq!(claims.exp - claims.iat, 604800);
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();
        let access = issuer.issue_access(user_id).unwrap();
        let refresh = issuer.issue_refresh(user_id).unwrap();

        assert_eq!(issuer.validate_refresh(&access), Err(TokenError::BadSignature));
        assert_eq!(issuer.validate_access(&refresh), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_invalid_token() {
        assert_eq!(issuer().validate_access("invalid.token.here"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_tampered_token() {
        let issuer = issuer();
        let token = issuer.issue_access(Uuid::new_v4()).unwrap();

        let tampered = format!("{}X", token);
        assert!(issuer.validate_access(&tampered).is_err());
    }

    #[test]
    fn test_expired_token() {
        let config = get_test_config();
        let mut claims = Claims::new(Uuid::new_v4(), &config.issuer, &config.audience, 60);
        claims.iat -= 120;
        claims.exp -= 120;
        let token = sign_with(&claims, Algorithm::HS256, &config.access_secret);

        assert_eq!(issuer().validate_access(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_other_hmac_algorithm_is_rejected() {
        let config = get_test_config();
        let claims = Claims::new(Uuid::new_v4(), &config.issuer, &config.audience, 60);
        let token = sign_with(&claims, Algorithm::HS512, &config.access_secret);

        assert_eq!(issuer().validate_access(&token), Err(TokenError::WrongAlgorithm));
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        assert!(issuer().validate_access(UNSIGNED_TOKEN).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let token = issuer().issue_access(Uuid::new_v4()).unwrap();

        config.issuer = "wrong-issuer".to_string();
        let other = TokenIssuer::new(&config).unwrap();
        assert_eq!(other.validate_access(&token), Err(TokenError::WrongClaims));
    }

    #[test]
    fn test_wrong_audience() {
        let mut config = get_test_config();
        let token = issuer().issue_access(Uuid::new_v4()).unwrap();

        config.audience = "someone-else".to_string();
        let other = TokenIssuer::new(&config).unwrap();
        assert_eq!(other.validate_access(&token), Err(TokenError::WrongClaims));
    }

    #[test]
    fn test_non_uuid_subject_is_rejected() {
        let config = get_test_config();
        let mut claims = Claims::new(Uuid::new_v4(), &config.issuer, &config.audience, 60);
        claims.sub = "admin".to_string();
        let token = sign_with(&claims, Algorithm::HS256, &config.access_secret);

        assert_eq!(issuer().validate_access(&token), Err(TokenError::WrongClaims));
    }

    #[test]
    fn test_equal_secrets_are_refused() {
        let mut config = get_test_config();
        config.refresh_secret = config.access_secret.clone();

        assert!(TokenIssuer::new(&config).is_err());
    }
}
