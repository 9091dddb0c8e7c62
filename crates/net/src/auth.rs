//! Identity token verification
//!
//! Tokens are JWTs minted by the external session issuer. The verifier
//! checks the signature and expiry and extracts the `username` claim; it
//! never trusts a username found in event payloads.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Claims carried by an identity token.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub username: String,
    pub exp: usize,
}

/// Verifies signed identity tokens against fixed trust material.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Trust an RS256 public key in PEM form (the issuer's native scheme).
    pub fn rs256_from_pem(pem: &[u8]) -> Result<Self> {
        Ok(Self {
            key: DecodingKey::from_rsa_pem(pem)?,
            validation: Validation::new(Algorithm::RS256),
        })
    }

    /// Trust an HS256 shared secret.
    pub fn hs256_from_secret(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Check the token signature and extract the username claim.
    pub fn verify(&self, token: &str) -> Result<String> {
        let data = decode::<IdentityClaims>(token, &self.key, &self.validation)?;
        Ok(data.claims.username)
    }
}
