//! Route alias generation.
//!
//! An alias names a route's backing directory. It is minted once, when the
//! route is created: a short hash of the collection identifier keeps aliases
//! recognisable, and a token from an [`AliasGenerator`] keeps two routes for
//! the same identifier (e.g. after a delete) from reusing a directory.

use sha2::{Digest, Sha256};

/// Hex digits of the identifier hash kept in an alias.
const HASH_PREFIX_LEN: usize = 8;

/// Length of the random token from [`RandomAlias`].
const RANDOM_TOKEN_LEN: usize = 12;

/// Source of opaque alias tokens.
pub trait AliasGenerator {
    /// Produce the next token.
    fn generate(&self) -> String;
}

/// Random tokens from UUID v4. The default generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomAlias;

impl AliasGenerator for RandomAlias {
    fn generate(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        id[..RANDOM_TOKEN_LEN].to_string()
    }
}

/// Derive a fresh, filesystem-safe alias for a collection identifier.
///
/// Not a pure function of `identifier`: every call draws a new token.
pub fn normalize(identifier: &str, tokens: &dyn AliasGenerator) -> String {
    let digest = Sha256::digest(identifier.as_bytes());
    let hash: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let token = sanitize(&tokens.generate());
    format!("{}-{token}", &hash[..HASH_PREFIX_LEN])
}

/// Keep `[a-z0-9-]`, lowercase ASCII letters, replace the rest with `-`.
fn sanitize(token: &str) -> String {
    token
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '-') => c,
            _ => '-',
        })
        .collect()
}
