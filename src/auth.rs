use thiserror::Error;

use crate::core::task::OwnerId;

/// An authenticated principal as reported by the auth provider. Only a
/// verified identity may read or write tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub owner: OwnerId,
    pub email: String,
    pub verified: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("email address is not verified")]
    Unverified,
}

impl Identity {
    pub fn new(owner: impl Into<String>, email: impl Into<String>, verified: bool) -> Self {
        Self {
            owner: OwnerId(owner.into()),
            email: email.into(),
            verified,
        }
    }

    /// Gate for all task access: not verified means no access.
    pub fn require_verified(&self) -> Result<&OwnerId, AuthError> {
        if self.verified {
            Ok(&self.owner)
        } else {
            Err(AuthError::Unverified)
        }
    }
}
