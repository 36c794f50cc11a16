use std::sync::{Arc, Mutex};

use crate::auth::{Navigator, SessionContext};
use crate::config::ApiConfig;
use crate::http::ApiClient;
use crate::storage::MemoryKeyValueStore;

/// Navigator that remembers where it was sent.
pub(crate) struct RecordingNavigator {
    location: Mutex<String>,
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub(crate) fn at(location: &str) -> Self {
        Self {
            location: Mutex::new(location.to_owned()),
            visits: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> String {
        self.location.lock().unwrap().clone()
    }

    fn navigate(&self, location: &str) {
        *self.location.lock().unwrap() = location.to_owned();
        self.visits.lock().unwrap().push(location.to_owned());
    }
}

pub(crate) struct Harness {
    pub(crate) storage: Arc<MemoryKeyValueStore>,
    pub(crate) navigator: Arc<RecordingNavigator>,
    pub(crate) context: SessionContext,
    pub(crate) client: ApiClient,
}

/// Wire an in-memory context and client to `base_url` for both origins.
pub(crate) fn harness(base_url: &str) -> Harness {
    harness_at(base_url, "/dashboard")
}

/// Like [`harness`], with the navigator starting at `location`.
pub(crate) fn harness_at(base_url: &str, location: &str) -> Harness {
    let storage = Arc::new(MemoryKeyValueStore::new());
    let navigator = Arc::new(RecordingNavigator::at(location));
    let context = SessionContext::new(storage.clone(), navigator.clone());
    let config = ApiConfig::new(base_url, base_url).unwrap();
    let client = ApiClient::new(config, context.clone()).unwrap();
    Harness {
        storage,
        navigator,
        context,
        client,
    }
}
