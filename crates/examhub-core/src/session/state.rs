use serde::{Deserialize, Serialize};

use super::UserRecord;

/// The part of the session that survives restarts.
///
/// Only constructible as logged-out or authenticated-with-user, so a user is
/// present exactly when the session is authenticated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedSession {
    user: Option<UserRecord>,
    is_authenticated: bool,
}

impl PersistedSession {
    pub fn logged_out() -> Self {
        Self::default()
    }

    pub fn authenticated(user: UserRecord) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
        }
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub(crate) fn user_mut(&mut self) -> Option<&mut UserRecord> {
        self.user.as_mut()
    }

    /// Records read back from storage may be hand-edited or stale.
    pub(crate) fn sanitized(self) -> Self {
        match self.user {
            Some(user) if self.is_authenticated => Self::authenticated(user),
            _ => Self::logged_out(),
        }
    }
}

/// In-memory status flags, reset on every start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransientSession {
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Snapshot handed to UI code.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: Option<UserRecord>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Session {
    pub fn compose(persisted: &PersistedSession, transient: &TransientSession) -> Self {
        Self {
            user: persisted.user.clone(),
            is_authenticated: persisted.is_authenticated,
            is_loading: transient.is_loading,
            error: transient.error.clone(),
        }
    }
}

/// On-disk wrapper of [`PersistedSession`] under the `auth-storage` key.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SessionEnvelope {
    pub(crate) state: PersistedSession,
    #[serde(default)]
    pub(crate) version: u32,
}
