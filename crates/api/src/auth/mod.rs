//! Credentials and tokens.
//!
//! - [`password`]: Argon2id hashing plus the password policy.
//! - [`jwt`]: signed access tokens and opaque, hash-stored refresh tokens.

pub mod jwt;
pub mod password;
