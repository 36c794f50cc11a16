use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use crate::config::{ApiConfig, ANALYTICS_TIMEOUT, API_TIMEOUT};

/// Which backend a request is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOrigin {
    Primary,
    Analytics,
}

impl ApiOrigin {
    pub fn timeout(self) -> Duration {
        match self {
            ApiOrigin::Primary => API_TIMEOUT,
            ApiOrigin::Analytics => ANALYTICS_TIMEOUT,
        }
    }

    pub(crate) fn base_url(self, config: &ApiConfig) -> &str {
        match self {
            ApiOrigin::Primary => config.api_base_url.as_str(),
            ApiOrigin::Analytics => config.analytics_base_url.as_str(),
        }
    }
}

/// Everything needed to issue (or re-issue) one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub origin: ApiOrigin,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: Method, origin: ApiOrigin, path: impl Into<String>) -> Self {
        Self {
            method,
            origin,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// Copy of `original` authorized with `token`; the original is left untouched.
pub fn replay(original: &RequestDescriptor, token: &str) -> RequestDescriptor {
    RequestDescriptor {
        bearer: Some(token.to_owned()),
        ..original.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replay_swaps_only_the_token() {
        let original = RequestDescriptor::new(Method::PATCH, ApiOrigin::Primary, "/auth/profile")
            .with_body(json!({ "firstName": "Ada" }))
            .with_bearer(Some("old".into()));

        let replayed = replay(&original, "new");

        assert_eq!(replayed.bearer.as_deref(), Some("new"));
        assert_eq!(replayed.method, Method::PATCH);
        assert_eq!(replayed.path, "/auth/profile");
        assert_eq!(replayed.body, original.body);
        assert_eq!(original.bearer.as_deref(), Some("old"));
    }

    #[test]
    fn analytics_gets_longer_timeout() {
        assert_eq!(ApiOrigin::Primary.timeout(), Duration::from_secs(30));
        assert_eq!(ApiOrigin::Analytics.timeout(), Duration::from_secs(60));
    }
}
