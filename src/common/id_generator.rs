// src/common/id_generator.rs
//! Opaque identifiers for users and stored tokens.
//!
//! Format: `PREFIX_` followed by Crockford Base32 characters (no I, L, O, U).
//! Ids are never parsed back; only equality matters.

use rand::Rng;

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// 32^16 = 2^80 combinations per entity type
const ID_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy)]
pub enum EntityPrefix {
    /// User account (U_)
    User,
    /// Persisted token row (K_)
    Token,
}

impl EntityPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityPrefix::User => "U",
            EntityPrefix::Token => "K",
        }
    }
}

fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CROCKFORD_ALPHABET[rng.gen_range(0..32)] as char)
        .collect()
}

pub fn generate_id(prefix: EntityPrefix) -> String {
    format!("{}_{}", prefix.as_str(), generate_crockford_string(ID_LENGTH))
}

pub fn generate_user_id() -> String {
    generate_id(EntityPrefix::User)
}

pub fn generate_token_id() -> String {
    generate_id(EntityPrefix::Token)
}
