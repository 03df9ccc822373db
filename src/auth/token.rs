use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{
    digest::{KeyInit, Mac},
    Hmac,
};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

use crate::store::AccountIdentity;

pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
pub const ISSUER: &str = "panelgate";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub account: AccountIdentity,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl SessionClaims {
    #[must_use]
    pub fn new(account: AccountIdentity, now_unix_seconds: i64) -> Self {
        Self {
            account,
            iat: now_unix_seconds,
            exp: now_unix_seconds + TOKEN_TTL_SECONDS,
            iss: ISSUER.to_string(),
            nbf: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    InvalidKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("unexpected issuer: {0}")]
    Issuer(String),
}

#[derive(Debug, Clone, Copy)]
enum HmacAlg {
    Hs256,
    Hs384,
    Hs512,
}

impl HmacAlg {
    fn from_header(alg: &str) -> Result<Self, TokenError> {
        match alg {
            "HS256" => Ok(Self::Hs256),
            "HS384" => Ok(Self::Hs384),
            "HS512" => Ok(Self::Hs512),
            other => Err(TokenError::UnsupportedAlg(other.to_string())),
        }
    }

    fn verify(self, secret: &[u8], input: &[u8], signature: &[u8]) -> Result<(), TokenError> {
        match self {
            Self::Hs256 => verify_mac::<Hmac<Sha256>>(secret, input, signature),
            Self::Hs384 => verify_mac::<Hmac<Sha384>>(secret, input, signature),
            Self::Hs512 => verify_mac::<Hmac<Sha512>>(secret, input, signature),
        }
    }
}

fn keyed<M: Mac + KeyInit>(secret: &[u8], input: &[u8]) -> Result<M, TokenError> {
    let mut mac = <M as Mac>::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;
    mac.update(input);
    Ok(mac)
}

fn verify_mac<M: Mac + KeyInit>(
    secret: &[u8],
    input: &[u8],
    signature: &[u8],
) -> Result<(), TokenError> {
    keyed::<M>(secret, input)?
        .verify_slice(signature)
        .map_err(|_| TokenError::InvalidSignature)
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Sign `claims` as a compact HS256 token.
///
/// # Errors
///
/// Returns an error if the header or claims cannot be encoded as JSON.
pub fn sign_hs256(secret: &[u8], claims: &SessionClaims) -> Result<String, TokenError> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let tag = keyed::<Hmac<Sha256>>(secret, signing_input.as_bytes())?
        .finalize()
        .into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&tag);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HMAC-signed token and return its claims.
///
/// Checks run in order: structure, algorithm, signature, claims decoding,
/// issuer, expiry and not-before. The signature is always checked before any claim
/// is trusted.
///
/// # Errors
///
/// Returns an error if:
/// - the token is not three base64url segments of valid JSON,
/// - the header names anything but HS256, HS384 or HS512,
/// - the signature does not match `secret`,
/// - `iss` is not [`ISSUER`],
/// - `exp` is at or before `now_unix_seconds`, or `nbf` is after it.
pub fn verify_hmac(
    token: &str,
    secret: &[u8],
    now_unix_seconds: i64,
) -> Result<SessionClaims, TokenError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(TokenError::Format)?;
    let claims_b64 = parts.next().ok_or(TokenError::Format)?;
    let sig_b64 = parts.next().ok_or(TokenError::Format)?;
    if parts.next().is_some() {
        return Err(TokenError::Format);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    let alg = HmacAlg::from_header(&header.alg)?;

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
    alg.verify(secret, signing_input.as_bytes(), &signature)?;

    let claims: SessionClaims = b64d_json(claims_b64)?;
    if claims.iss != ISSUER {
        return Err(TokenError::Issuer(claims.iss));
    }
    if claims.exp <= now_unix_seconds {
        return Err(TokenError::Expired);
    }
    if claims.nbf.is_some_and(|nbf| nbf > now_unix_seconds) {
        return Err(TokenError::NotYetValid);
    }

    Ok(claims)
}
