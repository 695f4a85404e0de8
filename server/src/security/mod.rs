/// Security primitives for authentication
///
/// - Password hashing and verification (Argon2id)
/// - JWT token generation and validation (HS256)
pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtManager, TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};
pub use password::{hash_password, verify_password};
