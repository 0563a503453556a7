use serde::{Deserialize, Deserializer, Serialize};

/// Claims carried by an access token.
///
/// A value of this type only leaves the authenticator after the signature, issuer,
/// audience and expiry have all been checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject_id: String,
    pub role: String,
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "aud", deserialize_with = "one_or_many")]
    pub audience: Vec<String>,
    /// Unix seconds.
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Unix seconds.
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

/// Claims carried by a refresh token: identity only, plus a unique id for revocation
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(rename = "sub")]
    pub subject_id: String,
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "jti")]
    pub token_id: String,
}

// `aud` may legally be a single string or an array
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// The verified identity attached to a request.
///
/// The auth middleware stores it in the request extensions; handlers read it through
/// [`crate::middleware::auth::AuthUser`]. A request without one was never authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    claims: Claims,
}

impl AuthContext {
    pub fn new(claims: Claims) -> Self {
        Self { claims }
    }

    pub fn subject_id(&self) -> &str {
        &self.claims.subject_id
    }

    pub fn role(&self) -> &str {
        &self.claims.role
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}
