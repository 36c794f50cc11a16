use std::sync::Arc;

use crate::storage::KeyValueStore;

use super::{Navigator, RedirectGuard, TokenStore};

/// Everything the HTTP client and session store share about the signed-in user.
///
/// Independent contexts never observe each other's tokens or redirect latch.
#[derive(Clone)]
pub struct SessionContext {
    storage: Arc<dyn KeyValueStore>,
    tokens: TokenStore,
    redirect: RedirectGuard,
}

impl SessionContext {
    pub fn new(storage: Arc<dyn KeyValueStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            tokens: TokenStore::new(storage.clone()),
            redirect: RedirectGuard::new(navigator),
            storage,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn redirect(&self) -> &RedirectGuard {
        &self.redirect
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    /// Treat the session as irrecoverably expired: drop tokens and send the user to login.
    pub fn expire(&self) {
        self.tokens.clear_tokens();
        self.redirect.trigger_redirect_if_needed();
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("redirect", &self.redirect)
            .finish_non_exhaustive()
    }
}
