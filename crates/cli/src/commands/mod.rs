//! Subcommand implementations.

pub mod migrate;
pub mod product;
pub mod user;

use secrecy::SecretString;

/// Read the gallery database URL, falling back to `DATABASE_URL`.
pub(crate) fn database_url() -> Option<SecretString> {
    std::env::var("GALLERY_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
