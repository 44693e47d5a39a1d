/// Identity resolution
///
/// Maps the subject claim of a verified token to the caller's full identity
/// record. This is a read-only lookup; no authorization decision is made
/// here.

use std::sync::Arc;

use crate::models::user::Identity;
use crate::store::{IdentityStore, StoreError};

/// Error type for identity resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No identity exists for the subject
    #[error("User not found: {0}")]
    NotFound(String),

    /// The identity store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves token subjects to identities through an [`IdentityStore`]
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Looks up the identity for a unique subject (email)
    ///
    /// One store call, no retries.
    ///
    /// # Errors
    ///
    /// - `ResolveError::NotFound` if no user has this subject
    /// - `ResolveError::Store` if the lookup itself failed
    pub async fn resolve_by_subject(&self, subject: &str) -> Result<Identity, ResolveError> {
        self.store
            .find_by_subject(subject)
            .await?
            .map(|user| user.identity())
            .ok_or_else(|| ResolveError::NotFound(subject.to_string()))
    }
}
