use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::auth::SessionContext;
use crate::http::{ApiClient, HttpError};
use crate::services::{AuthPayload, AuthService, ProfileUpdate, RegisterRequest};
use crate::storage::SESSION_KEY;

use super::state::SessionEnvelope;
use super::{PersistedSession, Session, TransientSession, UserRecord};

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";
const RESET_FAILED: &str = "Failed to send reset email";

const SESSION_VERSION: u32 = 0;

/// Application-facing authentication state and the operations that change it.
///
/// Operations never return errors: failures are reported as `false` and, where
/// a message is useful, through [`Session::error`].
pub struct SessionStore {
    auth: AuthService,
    context: SessionContext,
    persisted: RwLock<PersistedSession>,
    transient: RwLock<TransientSession>,
}

impl SessionStore {
    /// Build a store over `client`, restoring the persisted part of the session.
    pub fn new(client: ApiClient) -> Self {
        let context = client.context().clone();
        let persisted = restore(&context);
        Self {
            auth: AuthService::new(client),
            context,
            persisted: RwLock::new(persisted),
            transient: RwLock::new(TransientSession::default()),
        }
    }

    pub fn session(&self) -> Session {
        Session::compose(&self.persisted(), &self.transient())
    }

    pub fn is_authenticated(&self) -> bool {
        self.persisted().is_authenticated()
    }

    pub fn user(&self) -> Option<UserRecord> {
        self.persisted().user().cloned()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Client sharing this store's tokens, for calls outside the auth endpoints.
    pub fn client(&self) -> &ApiClient {
        self.auth.client()
    }

    pub async fn login(&self, email: &str, password: &str) -> bool {
        let _loading = self.begin();
        match self.auth.login(email, password).await {
            Ok(envelope) if envelope.success => match envelope.data {
                Some(payload) => self.accept_auth_payload(payload, LOGIN_FAILED),
                None => self.fail(envelope.message, LOGIN_FAILED),
            },
            Ok(envelope) => self.fail(envelope.message, LOGIN_FAILED),
            Err(err) => self.fail_with(&err, LOGIN_FAILED),
        }
    }

    /// Register an account; signs the user in only when the backend returns tokens.
    pub async fn register(&self, request: &RegisterRequest) -> bool {
        let _loading = self.begin();
        match self.auth.register(request).await {
            Ok(envelope) if envelope.success => match envelope.data {
                Some(payload) if payload.tokens.is_some() => {
                    self.accept_auth_payload(payload, REGISTRATION_FAILED)
                }
                _ => {
                    tracing::info!(email = %request.email, "registered without auto-login");
                    true
                }
            },
            Ok(envelope) => self.fail(envelope.message, REGISTRATION_FAILED),
            Err(err) => self.fail_with(&err, REGISTRATION_FAILED),
        }
    }

    pub async fn logout(&self) {
        let _loading = self.begin();
        if self.context.tokens().access_token().is_some() {
            if let Err(err) = self.auth.logout().await {
                tracing::warn!(error = %err, "logout request failed, clearing session locally");
            }
        }
        self.context.tokens().clear_tokens();
        self.set_persisted(PersistedSession::logged_out());
        tracing::info!("logged out");
    }

    /// Re-fetch the profile for the stored token; any failure ends the session.
    pub async fn load_user(&self) {
        if self.context.tokens().access_token().is_none() {
            return;
        }
        let _loading = self.begin();
        let user = match self.auth.profile().await {
            Ok(envelope) if envelope.success => match envelope.data.map(UserRecord::try_from) {
                Some(Ok(user)) => Some(user),
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "profile response carried an unusable user");
                    None
                }
                None => None,
            },
            Ok(_) => None,
            Err(err) => {
                tracing::info!(error = %err, "stored session is no longer valid");
                None
            }
        };

        match user {
            Some(user) => self.set_persisted(PersistedSession::authenticated(user)),
            None => {
                self.context.tokens().clear_tokens();
                self.set_persisted(PersistedSession::logged_out());
            }
        }
    }

    /// Confirm the restored session with the backend before relying on it.
    ///
    /// A persisted sign-in without a stored access token is stale (another
    /// process expired it) and is discarded without a network call.
    pub async fn verify(&self) -> bool {
        if self.context.tokens().access_token().is_none() {
            if self.is_authenticated() {
                tracing::info!("discarding persisted session without an access token");
                self.set_persisted(PersistedSession::logged_out());
            }
            return false;
        }
        self.load_user().await;
        self.is_authenticated()
    }

    /// Push profile changes and mirror them into the local user on success.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> bool {
        let _loading = self.begin();
        match self.auth.update_profile(update).await {
            Ok(envelope) if envelope.success => {
                let mut persisted = self.persisted().clone();
                if let Some(user) = persisted.user_mut() {
                    if let Some(first_name) = &update.first_name {
                        user.first_name = first_name.clone();
                    }
                    if let Some(last_name) = &update.last_name {
                        user.last_name = last_name.clone();
                    }
                }
                self.set_persisted(persisted);
                true
            }
            Ok(_) => false,
            Err(err) => {
                tracing::warn!(error = %err, "profile update failed");
                false
            }
        }
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> bool {
        let _loading = self.begin();
        match self.auth.change_password(current_password, new_password).await {
            Ok(envelope) => envelope.success,
            Err(err) => {
                tracing::warn!(error = %err, "password change failed");
                false
            }
        }
    }

    pub async fn forgot_password(&self, email: &str) -> bool {
        let _loading = self.begin();
        match self.auth.request_password_reset(email).await {
            Ok(envelope) if envelope.success => true,
            Ok(envelope) => self.fail(envelope.message, RESET_FAILED),
            Err(err) => self.fail_with(&err, RESET_FAILED),
        }
    }

    pub fn clear_error(&self) {
        self.transient_mut().error = None;
    }

    fn accept_auth_payload(&self, payload: AuthPayload, fallback: &str) -> bool {
        let AuthPayload { user, tokens } = payload;
        let (Some(raw), Some(tokens)) = (user, tokens) else {
            tracing::warn!("auth response missing user or tokens");
            return self.fail(None, fallback);
        };
        let user = match UserRecord::try_from(raw) {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(error = %err, "auth response carried an unusable user");
                return self.fail(None, fallback);
            }
        };

        self.context
            .tokens()
            .set_tokens(&tokens.access_token, &tokens.refresh_token);
        tracing::info!(user_id = %user.id, role = %user.role, "signed in");
        self.set_persisted(PersistedSession::authenticated(user));
        true
    }

    fn begin(&self) -> LoadingGuard<'_> {
        let mut transient = self.transient_mut();
        transient.is_loading = true;
        transient.error = None;
        LoadingGuard {
            transient: &self.transient,
        }
    }

    fn fail(&self, message: Option<String>, fallback: &str) -> bool {
        let message = message
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| fallback.to_owned());
        self.transient_mut().error = Some(message);
        false
    }

    fn fail_with(&self, err: &HttpError, fallback: &str) -> bool {
        tracing::debug!(error = %err, "session operation failed");
        self.fail(err.server_message().map(str::to_owned), fallback)
    }

    fn set_persisted(&self, next: PersistedSession) {
        persist(&self.context, &next);
        *self.persisted.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn persisted(&self) -> RwLockReadGuard<'_, PersistedSession> {
        self.persisted.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn transient(&self) -> RwLockReadGuard<'_, TransientSession> {
        self.transient.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn transient_mut(&self) -> RwLockWriteGuard<'_, TransientSession> {
        self.transient.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the loading flag on every exit path of an operation.
struct LoadingGuard<'a> {
    transient: &'a RwLock<TransientSession>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.transient
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .is_loading = false;
    }
}

fn restore(context: &SessionContext) -> PersistedSession {
    let raw = match context.storage().get(SESSION_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return PersistedSession::logged_out(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to read persisted session");
            return PersistedSession::logged_out();
        }
    };
    match serde_json::from_str::<SessionEnvelope>(&raw) {
        Ok(envelope) => envelope.state.sanitized(),
        Err(err) => {
            tracing::warn!(error = %err, "discarding unreadable persisted session");
            PersistedSession::logged_out()
        }
    }
}

fn persist(context: &SessionContext, state: &PersistedSession) {
    let envelope = SessionEnvelope {
        state: state.clone(),
        version: SESSION_VERSION,
    };
    let result = serde_json::to_string(&envelope)
        .map_err(crate::storage::StorageError::from)
        .and_then(|payload| context.storage().set(SESSION_KEY, &payload));
    if let Err(err) = result {
        tracing::warn!(error = %err, "failed to persist session");
    }
}
