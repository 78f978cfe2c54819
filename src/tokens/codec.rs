//! Signing and parsing of compact bearer tokens (HS256 JWT).
//!
//! The codec is pure: it never reads the clock and never touches storage.
//! Expiry is deliberately not enforced here so callers can report it as its
//! own failure instead of folding it into a signature error.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::models::TokenKind;

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token is malformed")]
    Malformed,

    #[error("token could not be signed: {0}")]
    Encoding(String),
}

/// Claims shared by access, refresh, reset-password and verify-email tokens
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Random nonce so two tokens minted in the same second never share a string
    pub jti: String,
}

impl Claims {
    pub fn new(sub: impl Into<String>, iat: i64, exp: i64, kind: TokenKind) -> Self {
        Self {
            sub: sub.into(),
            iat,
            exp,
            kind,
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// Claims of the pre-account set-password token. The identity travels inside the token;
/// no credential material does.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PasswordClaims {
    pub name: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub jti: String,
}

impl PasswordClaims {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        iat: i64,
        exp: i64,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            iat,
            exp,
            kind: TokenKind::SetPassword,
            jti: Uuid::new_v4().to_string(),
        }
    }
}

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, CodecError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| CodecError::Encoding(e.to_string()))
    }

    pub fn parse<T: DeserializeOwned>(&self, token: &str) -> Result<T, CodecError> {
        decode::<T>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => CodecError::InvalidSignature,
                _ => CodecError::Malformed,
            })
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key";

    #[test]
    fn test_sign_then_parse_returns_same_claims() {
        let codec = TokenCodec::new(SECRET);
        for kind in [
            TokenKind::Access,
            TokenKind::Refresh,
            TokenKind::ResetPassword,
            TokenKind::VerifyEmail,
        ] {
            let claims = Claims::new("U_0000000000000001", 1_700_000_000, 1_700_001_800, kind);
            let token = codec.sign(&claims).unwrap();
            let parsed: Claims = codec.parse(&token).unwrap();
            assert_eq!(parsed, claims);
        }
    }

    #[test]
    fn test_signing_is_deterministic() {
        let codec = TokenCodec::new(SECRET);
        let claims = Claims::new("U_1", 100, 200, TokenKind::Refresh);
        assert_eq!(codec.sign(&claims).unwrap(), codec.sign(&claims).unwrap());
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let codec = TokenCodec::new(SECRET);
        let a = codec.sign(&Claims::new("U_1", 100, 200, TokenKind::Refresh)).unwrap();
        let b = codec.sign(&Claims::new("U_1", 100, 200, TokenKind::Refresh)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = TokenCodec::new(SECRET)
            .sign(&Claims::new("U_1", 100, 9_999_999_999, TokenKind::Access))
            .unwrap();
        let result = TokenCodec::new("wrong_secret_key").parse::<Claims>(&token);
        assert_eq!(result.unwrap_err(), CodecError::InvalidSignature);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = TokenCodec::new(SECRET);
        assert_eq!(codec.parse::<Claims>("invalidToken").unwrap_err(), CodecError::Malformed);
        assert_eq!(codec.parse::<Claims>("a.b.c").unwrap_err(), CodecError::Malformed);
    }

    #[test]
    fn test_expired_token_still_parses() {
        let codec = TokenCodec::new(SECRET);
        let claims = Claims::new("U_1", 100, 200, TokenKind::Access);
        let parsed: Claims = codec.parse(&codec.sign(&claims).unwrap()).unwrap();
        assert_eq!(parsed.exp, 200);
    }

    #[test]
    fn test_password_claims_round_trip() {
        let codec = TokenCodec::new(SECRET);
        let claims = PasswordClaims::new("Ann", "a@x.com", 100, 200);
        let parsed: PasswordClaims = codec.parse(&codec.sign(&claims).unwrap()).unwrap();
        assert_eq!(parsed, claims);
        assert_eq!(parsed.kind, TokenKind::SetPassword);
    }

    #[test]
    fn test_password_claims_are_not_subject_claims() {
        let codec = TokenCodec::new(SECRET);
        let token = codec
            .sign(&PasswordClaims::new("Ann", "a@x.com", 100, 200))
            .unwrap();
        assert_eq!(codec.parse::<Claims>(&token).unwrap_err(), CodecError::Malformed);
    }
}
