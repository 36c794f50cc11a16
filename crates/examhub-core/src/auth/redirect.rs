use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Location of the sign-in screen.
pub const LOGIN_LOCATION: &str = "/login";

/// The seam between the session layer and whatever presents screens to the user.
pub trait Navigator: Send + Sync {
    fn current_location(&self) -> String;
    fn navigate(&self, location: &str);
}

/// Collapses any number of authorization failures into a single trip to the login screen.
///
/// The latch is never reset; a new guard (a fresh process) starts unlatched.
#[derive(Clone)]
pub struct RedirectGuard {
    latched: Arc<AtomicBool>,
    navigator: Arc<dyn Navigator>,
}

impl RedirectGuard {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            latched: Arc::new(AtomicBool::new(false)),
            navigator,
        }
    }

    /// Whether a redirect has already been started.
    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::Acquire)
    }

    /// Navigate to the login screen unless a redirect already happened or the
    /// user is already there. Returns `true` when this call navigated.
    pub fn trigger_redirect_if_needed(&self) -> bool {
        if self.is_latched() {
            return false;
        }
        if self.navigator.current_location() == LOGIN_LOCATION {
            tracing::debug!("already on the login screen, skipping redirect");
            return false;
        }
        if self
            .latched
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        tracing::info!("session expired, redirecting to login");
        self.navigator.navigate(LOGIN_LOCATION);
        true
    }
}

impl std::fmt::Debug for RedirectGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectGuard")
            .field("latched", &self.is_latched())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingNavigator;

    #[test]
    fn redirects_only_once() {
        let navigator = Arc::new(RecordingNavigator::at("/dashboard"));
        let guard = RedirectGuard::new(navigator.clone());

        assert!(guard.trigger_redirect_if_needed());
        assert!(guard.is_latched());
        assert!(!guard.trigger_redirect_if_needed());
        assert_eq!(navigator.visits(), vec![LOGIN_LOCATION.to_string()]);
    }

    #[test]
    fn stays_put_on_login_screen() {
        let navigator = Arc::new(RecordingNavigator::at(LOGIN_LOCATION));
        let guard = RedirectGuard::new(navigator.clone());

        assert!(!guard.trigger_redirect_if_needed());
        assert!(!guard.is_latched());
        assert!(navigator.visits().is_empty());
    }

    #[test]
    fn concurrent_triggers_navigate_once() {
        let navigator = Arc::new(RecordingNavigator::at("/exams"));
        let guard = RedirectGuard::new(navigator.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || guard.trigger_redirect_if_needed())
            })
            .collect();
        let navigated = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|navigated| *navigated)
            .count();

        assert_eq!(navigated, 1);
        assert_eq!(navigator.visits().len(), 1);
    }
}
