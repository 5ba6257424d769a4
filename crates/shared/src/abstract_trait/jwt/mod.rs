use crate::{domain::Subject, errors::AuthError};
use std::sync::Arc;

pub type DynIdentityProvider = Arc<dyn IdentityProviderTrait + Send + Sync>;

/// What the gateway needs from an identity provider: turning a bearer token
/// into a subject.
pub trait IdentityProviderTrait: Send + Sync + std::fmt::Debug {
    fn verify_token(&self, token: &str) -> Result<Subject, AuthError>;
}
