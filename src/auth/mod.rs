//! Authentication and authorization for POLLX
//!
//! Provides:
//! - JWT session token generation and validation
//! - Role levels for admin-only operations
//! - Password hashing with Argon2

pub mod jwt;
pub mod password;
pub mod permissions;

pub use jwt::{extract_token, extract_token_from_cookie, extract_token_from_header, Claims, JwtValidator};
pub use password::{hash_password, verify_password};
pub use permissions::Role;
