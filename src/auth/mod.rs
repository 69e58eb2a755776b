/// Authentication module
///
/// Token signing/verification, password hashing, and the session/token
/// engine that ties them to the stores.

mod claims;
mod jwt;
mod password;
mod service;

pub use claims::Claims;
pub use claims::TokenClaims;
pub use jwt::JwtSigner;
pub use jwt::TokenSigner;
pub use password::validate_password_strength;
pub use password::BcryptHasher;
pub use password::PasswordHasher;
pub use service::AuthService;
pub use service::RegisterUser;
pub use service::TokenPair;
pub use service::TokenTtl;
pub use service::UserInfo;
