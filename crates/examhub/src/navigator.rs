use std::sync::Mutex;

use examhub_core::{Navigator, LOGIN_LOCATION};

/// Terminal stand-in for browser navigation.
///
/// Each command runs at its own pseudo-location; being sent to the login
/// screen prints how to sign in again.
pub struct TerminalNavigator {
    location: Mutex<String>,
}

impl TerminalNavigator {
    pub fn at(location: &str) -> Self {
        Self {
            location: Mutex::new(location.to_owned()),
        }
    }
}

impl Navigator for TerminalNavigator {
    fn current_location(&self) -> String {
        match self.location.lock() {
            Ok(location) => location.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn navigate(&self, location: &str) {
        if location == LOGIN_LOCATION {
            eprintln!("Your session has expired. Run `examhub auth login` to sign in again.");
        }
        match self.location.lock() {
            Ok(mut current) => *current = location.to_owned(),
            Err(poisoned) => *poisoned.into_inner() = location.to_owned(),
        }
    }
}
