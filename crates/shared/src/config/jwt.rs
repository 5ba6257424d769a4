use crate::{abstract_trait::IdentityProviderTrait, domain::Subject, errors::AuthError};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
}

impl From<Claims> for Subject {
    fn from(claims: Claims) -> Self {
        Subject {
            id: claims.sub,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

/// HS256 token issuer and verifier. Revocations are kept in memory by token
/// id until the revoked token would have expired anyway.
pub struct JwtConfig {
    jwt_secret: String,
    ttl: Duration,
    revoked: DashMap<String, usize>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("jwt_secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("revoked", &self.revoked.len())
            .finish()
    }
}

impl JwtConfig {
    pub fn new(jwt_secret: &str) -> Self {
        JwtConfig {
            jwt_secret: jwt_secret.to_string(),
            ttl: Duration::minutes(60),
            revoked: DashMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());
        let mut validation = Validation::default();
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }

    pub fn issue_token(&self, subject: &Subject) -> Result<String, AuthError> {
        let now = Utc::now();

        let claims = Claims {
            sub: subject.id.clone(),
            email: subject.email.clone(),
            roles: subject.roles.clone(),
            exp: (now + self.ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(AuthError::from)
    }

    /// Rejects the token until its own expiry. Expired revocations are dropped
    /// on every call.
    pub fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.decode_claims(token)?;
        self.prune_revoked(Utc::now().timestamp() as usize);
        self.revoked.insert(claims.jti, claims.exp);
        Ok(())
    }

    /// Drops revocations whose token expired at or before `now` (unix seconds).
    pub fn prune_revoked(&self, now: usize) -> usize {
        let before = self.revoked.len();
        self.revoked.retain(|_, exp| *exp > now);
        before.saturating_sub(self.revoked.len())
    }

    pub fn revoked_count(&self) -> usize {
        self.revoked.len()
    }
}

impl IdentityProviderTrait for JwtConfig {
    fn verify_token(&self, token: &str) -> Result<Subject, AuthError> {
        let claims = self.decode_claims(token)?;

        if self.revoked.contains_key(&claims.jti) {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims.into())
    }
}
