use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub const ACCESS_TOKEN_ISSUER: &str = "chirpy";
pub const DEFAULT_EXPIRES_IN_SECONDS: i64 = 1800;
pub const MAX_EXPIRES_IN_SECONDS: i64 = 86_400;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenError {
    MalformedJwt,
    InvalidHeader,
    InvalidClaims,
    InvalidSignature,
    InvalidSecret,
    IssuerMismatch,
    InvalidSubject,
    Expired,
}

impl std::fmt::Display for AccessTokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedJwt => write!(f, "access token is malformed"),
            Self::InvalidHeader => write!(f, "access token header is invalid"),
            Self::InvalidClaims => write!(f, "access token claims are invalid"),
            Self::InvalidSignature => write!(f, "access token signature is invalid"),
            Self::InvalidSecret => write!(f, "access token signing secret is invalid"),
            Self::IssuerMismatch => write!(f, "access token issuer mismatch"),
            Self::InvalidSubject => write!(f, "access token subject is invalid"),
            Self::Expired => write!(f, "access token is expired"),
        }
    }
}

impl std::error::Error for AccessTokenError {}

#[derive(Serialize)]
struct JwtHeader<'a> {
    typ: &'a str,
    alg: &'a str,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<u64, AccessTokenError> {
        self.sub
            .parse::<u64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(AccessTokenError::InvalidSubject)
    }
}

/// Absent or non-positive requests get the default; anything longer than a
/// day is clamped.
pub fn resolve_expires_in(requested: Option<i64>) -> i64 {
    match requested {
        Some(secs) if secs > 0 => secs.min(MAX_EXPIRES_IN_SECONDS),
        _ => DEFAULT_EXPIRES_IN_SECONDS,
    }
}

fn mac_for(secret: &str) -> Result<HmacSha256, AccessTokenError> {
    if secret.is_empty() {
        return Err(AccessTokenError::InvalidSecret);
    }
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AccessTokenError::InvalidSecret)
}

pub fn issue_access_token(
    user_id: u64,
    now: DateTime<Utc>,
    expires_in_seconds: i64,
    secret: &str,
) -> Result<String, AccessTokenError> {
    let header = JwtHeader {
        typ: "JWT",
        alg: "HS256",
    };
    let iat = now.timestamp();
    let claims = AccessTokenClaims {
        iss: ACCESS_TOKEN_ISSUER.to_string(),
        sub: user_id.to_string(),
        iat,
        exp: iat + expires_in_seconds,
    };

    let header_json = serde_json::to_vec(&header).map_err(|_| AccessTokenError::InvalidHeader)?;
    let claims_json = serde_json::to_vec(&claims).map_err(|_| AccessTokenError::InvalidClaims)?;

    let header_b64 = URL_SAFE_NO_PAD.encode(header_json);
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json);
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = mac_for(secret)?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{sig_b64}"))
}

pub fn decode_and_validate_access_token(
    token: &str,
    now: DateTime<Utc>,
    secret: &str,
) -> Result<AccessTokenClaims, AccessTokenError> {
    let (header_b64, claims_b64, sig_b64) = token
        .split_once('.')
        .and_then(|(a, rest)| rest.split_once('.').map(|(b, c)| (a, b, c)))
        .ok_or(AccessTokenError::MalformedJwt)?;

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64.as_bytes())
        .map_err(|_| AccessTokenError::InvalidHeader)?;
    let header: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AccessTokenError::InvalidHeader)?;
    if header.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
        return Err(AccessTokenError::InvalidHeader);
    }

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64.as_bytes())
        .map_err(|_| AccessTokenError::MalformedJwt)?;
    let mut mac = mac_for(secret)?;
    mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AccessTokenError::InvalidSignature)?;

    let claims_bytes = URL_SAFE_NO_PAD
        .decode(claims_b64.as_bytes())
        .map_err(|_| AccessTokenError::InvalidClaims)?;
    let claims: AccessTokenClaims =
        serde_json::from_slice(&claims_bytes).map_err(|_| AccessTokenError::InvalidClaims)?;

    if claims.iss != ACCESS_TOKEN_ISSUER {
        return Err(AccessTokenError::IssuerMismatch);
    }
    if claims.exp <= now.timestamp() {
        return Err(AccessTokenError::Expired);
    }

    Ok(claims)
}
