//! bcrypt digests for protected share links.
//!
//! Digests use the modular crypt format (`$2b$12$...`), so hashes written by
//! the CRM backend's `bcrypt.hash(password, 12)` verify unchanged.

pub use bcrypt::BcryptError;

/// Work factor for new digests.
pub const PASSWORD_COST: u32 = 12;

pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    bcrypt::hash(password, PASSWORD_COST)
}

/// Check `password` against a stored digest. Unparseable digests never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}
