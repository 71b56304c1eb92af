//! Live database re-verification.
//!
//! The GC cycle's last line of defense: before an object is touched, every
//! watched column is queried for the key. A hit at this point wins over
//! whatever the registry believed.

mod memory;
mod mysql;
mod postgres;

pub use memory::MemoryVerifier;
pub use mysql::MySqlVerifier;
pub use postgres::PgVerifier;

use s3gc_core::errors::VerifierError;

/// Table/column names get spliced into SQL; only plain identifiers pass.
pub(crate) fn check_ident(ident: &str) -> Result<&str, VerifierError> {
    let mut chars = ident.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(ident)
    } else {
        Err(VerifierError::UnsafeIdentifier {
            ident: ident.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::check_ident;

    #[test]
    fn identifiers_are_vetted() {
        assert!(check_ident("users").is_ok());
        assert!(check_ident("avatar_url2").is_ok());
        assert!(check_ident("_private").is_ok());
        assert!(check_ident("").is_err());
        assert!(check_ident("2fast").is_err());
        assert!(check_ident("users; DROP TABLE users").is_err());
        assert!(check_ident("a-b").is_err());
    }
}
