//! Issuing and verifying HMAC-signed bearer tokens.
//!
//! Verification is a pure function of the token, the configured secret and the supplied
//! time: no I/O, no shared mutable state, no locking.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use uuid::Uuid;

use super::claims::{Claims, RefreshClaims};
use crate::config::AuthSettings;
use crate::error::{AppResult, AuthError};

/// Algorithm used for every token this service signs.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// HMAC family accepted on verification. Anything else in the header is refused before
/// the signature is looked at.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Immutable token settings.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub token_lifetime: Duration,
    pub refresh_lifetime: Duration,
    pub issuer: String,
    pub audience: Vec<String>,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("TokenConfig")
            .field("token_lifetime", &self.token_lifetime)
            .field("refresh_lifetime", &self.refresh_lifetime)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl From<&AuthSettings> for TokenConfig {
    fn from(s: &AuthSettings) -> Self {
        Self {
            secret: s.secret.clone(),
            token_lifetime: Duration::from_secs(s.token_lifetime_secs),
            refresh_lifetime: Duration::from_secs(s.refresh_lifetime_secs),
            issuer: s.issuer.clone(),
            audience: s.audience.clone(),
        }
    }
}

/// Verifies access and refresh tokens and issues new ones.
///
/// Cheap to clone; all clones share the same configuration and keys.
#[derive(Clone)]
pub struct TokenAuthenticator {
    config: Arc<TokenConfig>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_validation: Validation,
    refresh_validation: Validation,
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator").field("config", &self.config).finish_non_exhaustive()
    }
}

impl TokenAuthenticator {
    pub fn new(config: TokenConfig) -> Self {
        let secret = config.secret.as_bytes();

        let mut access_validation = Validation::new(SIGNING_ALGORITHM);
        access_validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        access_validation.leeway = 0;
        // Expiry is checked against the caller-supplied time in `verify_at`
        access_validation.validate_exp = false;
        access_validation.set_issuer(&[config.issuer.as_str()]);
        access_validation.set_audience(config.audience.as_slice());
        access_validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let mut refresh_validation = access_validation.clone();
        refresh_validation.validate_aud = false;
        refresh_validation.aud = None;
        refresh_validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            config: Arc::new(config),
            access_validation,
            refresh_validation,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Verifies a raw `Authorization` header value at the current time.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        self.authenticate_at(header, Utc::now())
    }

    pub fn authenticate_at(&self, header: Option<&str>, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let token = parse_bearer(header)?;
        self.verify_at(token, now)
    }

    /// Verifies an access token at the current time.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies an access token as of `now`.
    ///
    /// Checks, in order: token shape and header algorithm, signature, issuer / audience /
    /// required claims, and finally that `exp` is strictly after `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        check_header_algorithm(token)?;
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.access_validation)
            .map_err(|e| classify(&e))?
            .claims;

        if claims.expires_at <= now.timestamp() {
            return Err(AuthError::Expired);
        }
        if claims.subject_id.trim().is_empty() {
            return Err(AuthError::MalformedCredential);
        }
        Ok(claims)
    }

    /// Verifies a refresh token at the current time.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        self.verify_refresh_at(token, Utc::now())
    }

    pub fn verify_refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<RefreshClaims, AuthError> {
        check_header_algorithm(token)?;
        let claims = jsonwebtoken::decode::<RefreshClaims>(token, &self.decoding_key, &self.refresh_validation)
            .map_err(|e| classify(&e))?
            .claims;

        if claims.expires_at <= now.timestamp() {
            return Err(AuthError::Expired);
        }
        if claims.subject_id.trim().is_empty() || claims.token_id.is_empty() {
            return Err(AuthError::MalformedCredential);
        }
        Ok(claims)
    }

    /// Issues an access token valid for `token_lifetime` from now.
    pub fn issue(&self, subject_id: &str, role: &str) -> AppResult<String> {
        self.issue_at(subject_id, role, Utc::now())
    }

    pub fn issue_at(&self, subject_id: &str, role: &str, now: DateTime<Utc>) -> AppResult<String> {
        let issued_at = now.timestamp();
        let claims = Claims {
            subject_id: subject_id.to_owned(),
            role: role.to_owned(),
            issuer: self.config.issuer.clone(),
            audience: self.config.audience.clone(),
            issued_at,
            expires_at: expiry(issued_at, self.config.token_lifetime),
        };
        Ok(jsonwebtoken::encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)?)
    }

    /// Issues a refresh token valid for `refresh_lifetime` from now. It carries no role.
    pub fn issue_refresh(&self, subject_id: &str) -> AppResult<String> {
        self.issue_refresh_at(subject_id, Utc::now())
    }

    pub fn issue_refresh_at(&self, subject_id: &str, now: DateTime<Utc>) -> AppResult<String> {
        let issued_at = now.timestamp();
        let claims = RefreshClaims {
            subject_id: subject_id.to_owned(),
            issuer: self.config.issuer.clone(),
            issued_at,
            expires_at: expiry(issued_at, self.config.refresh_lifetime),
            token_id: Uuid::new_v4().to_string(),
        };
        Ok(jsonwebtoken::encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)?)
    }
}

fn expiry(issued_at: i64, lifetime: Duration) -> i64 {
    issued_at.saturating_add(i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX))
}

/// Extracts the token from an `Authorization` header value.
///
/// The value must be exactly `<scheme> <token>` with a `Bearer` scheme (ASCII
/// case-insensitive).
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MalformedCredential)?;
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(AuthError::MalformedCredential),
    }
}

#[derive(Deserialize)]
struct JoseHeader {
    #[serde(default)]
    alg: Option<String>,
}

/// Rejects tokens that are not three segments, or whose header names anything but HMAC.
///
/// Done by hand so that `none` and unknown algorithm names are reported as
/// `UnsupportedAlgorithm` rather than as a header parse failure.
fn check_header_algorithm(token: &str) -> Result<(), AuthError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) = (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(AuthError::MalformedCredential);
    };

    let raw = URL_SAFE_NO_PAD.decode(header).map_err(|_| AuthError::MalformedCredential)?;
    let header: JoseHeader = serde_json::from_slice(&raw).map_err(|_| AuthError::MalformedCredential)?;

    match header.alg.as_deref() {
        Some("HS256" | "HS384" | "HS512") => Ok(()),
        _ => Err(AuthError::UnsupportedAlgorithm),
    }
}

fn classify(err: &jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidAlgorithm => AuthError::UnsupportedAlgorithm,
        // Bad encoding, missing claims, foreign issuer or audience
        _ => AuthError::MalformedCredential,
    }
}
