/// Authentication module
///
/// Password hashing, JWT issuance/validation for both token kinds,
/// and the digest used to key stored refresh tokens.

mod claims;
mod jwt;
mod password;
mod token_hash;

pub use claims::Claims;
pub use claims::TokenKind;
pub use jwt::TokenError;
pub use jwt::TokenIssuer;
pub use password::PasswordHasher;
pub use token_hash::hash_token;
