use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{SecurityConfig, MAX_JWT_EXPIRY_HOURS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id.
    pub sub: i32,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: i32, username: impl Into<String>, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            username: username.into(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidSecret,
    InvalidExpiry(u64),
    Expired,
    Invalid(String),
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
            JwtError::InvalidExpiry(hours) => {
                write!(f, "JWT lifetime of {} hours is outside 1..={}", hours, MAX_JWT_EXPIRY_HOURS)
            }
            JwtError::Expired => write!(f, "JWT has expired"),
            JwtError::Invalid(msg) => write!(f, "Invalid JWT token: {}", msg),
        }
    }
}

impl std::error::Error for JwtError {}

/// Signs and verifies HS256 bearer tokens carrying a principal id.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("lifetime", &self.lifetime).finish_non_exhaustive()
    }
}

fn lifetime(hours: u64) -> Result<Duration, JwtError> {
    if !(1..=MAX_JWT_EXPIRY_HOURS).contains(&hours) {
        return Err(JwtError::InvalidExpiry(hours));
    }
    i64::try_from(hours)
        .ok()
        .and_then(Duration::try_hours)
        .ok_or(JwtError::InvalidExpiry(hours))
}

impl TokenCodec {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: lifetime(expiry_hours)?,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, JwtError> {
        Self::new(&security.jwt_secret, security.jwt_expiry_hours)
    }

    pub fn issue(&self, user_id: i32, username: &str) -> Result<String, JwtError> {
        self.sign(&Claims::new(user_id, username, self.lifetime))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    /// Checks signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let codec = TokenCodec::new("test-secret", 1).unwrap();
        let token = codec.issue(7, "ann").unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "ann");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = TokenCodec::new("test-secret", 1).unwrap();
        let token = codec.sign(&Claims::new(7, "ann", Duration::hours(-2))).unwrap();
        assert!(matches!(codec.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let ours = TokenCodec::new("test-secret", 1).unwrap();
        let theirs = TokenCodec::new("other-secret", 1).unwrap();
        let token = theirs.issue(7, "ann").unwrap();
        assert!(matches!(ours.verify(&token), Err(JwtError::Invalid(_))));
        assert!(matches!(ours.verify("not-a-jwt"), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(TokenCodec::new("", 1), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn out_of_range_lifetime_is_refused() {
        for hours in [0, MAX_JWT_EXPIRY_HOURS + 1, 10_u64.pow(16), u64::MAX] {
            assert!(
                matches!(TokenCodec::new("test-secret", hours), Err(JwtError::InvalidExpiry(h)) if h == hours),
                "{} hours",
                hours
            );
        }
    }

    #[test]
    fn longest_lifetime_still_verifies() {
        let codec = TokenCodec::new("test-secret", MAX_JWT_EXPIRY_HOURS).unwrap();
        let claims = codec.verify(&codec.issue(7, "ann").unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_JWT_EXPIRY_HOURS as i64 * 3600);
    }
}
