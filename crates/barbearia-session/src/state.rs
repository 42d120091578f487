//! Read-through session facts derived from the token store.

use std::collections::BTreeSet;

use crate::codec::{Claims, decode_claims, is_expired};
use crate::store::TokenStore;

/// Current time in seconds since the Unix epoch.
pub fn now_epoch_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Queryable view over the stored access token.
///
/// Holds no cached copy: every call re-reads the store and re-decodes, so
/// guards always see the result of the latest login or refresh.
#[derive(Debug, Clone)]
pub struct SessionState {
    store: TokenStore,
}

impl SessionState {
    pub fn new(store: TokenStore) -> Self {
        Self { store }
    }

    /// Whether an access token is stored, regardless of expiry.
    pub fn has_token(&self) -> bool {
        self.store.get_access().is_some()
    }

    /// Whether an access token is stored and not expired.
    pub fn has_session(&self) -> bool {
        self.has_session_at(now_epoch_seconds())
    }

    pub fn has_session_at(&self, now: i64) -> bool {
        match self.store.get_access() {
            Some(token) => !is_expired(decode_claims(&token).as_ref(), now),
            None => false,
        }
    }

    pub fn current_roles(&self) -> BTreeSet<String> {
        self.claims().map(|c| c.roles).unwrap_or_default()
    }

    pub fn current_subject(&self) -> Option<String> {
        self.claims().and_then(|c| c.sub)
    }

    /// Expiry of the stored access token, if it carries one.
    pub fn expires_at(&self) -> Option<i64> {
        self.claims().and_then(|c| c.exp)
    }

    /// Decoded claims of the stored access token.
    pub fn claims(&self) -> Option<Claims> {
        self.store.get_access().as_deref().and_then(decode_claims)
    }
}
