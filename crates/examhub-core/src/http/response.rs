use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::HttpResult;

/// Successful (2xx) response with its JSON body; an empty body reads as `null`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Value,
}

impl ApiResponse {
    pub(crate) fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    pub fn json<T: DeserializeOwned>(self) -> HttpResult<T> {
        Ok(serde_json::from_value(self.body)?)
    }
}

/// `{success, data?, message?}` wrapper used by every backend endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

/// The `message` (or `error`) field of a JSON error body.
///
/// Plain-text and HTML bodies from proxies are not messages meant for users.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    ["message", "error"].iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_owned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_prefers_json_field() {
        let message = error_message(r#"{"success":false,"message":"Email already registered"}"#);
        assert_eq!(message.as_deref(), Some("Email already registered"));
        assert_eq!(
            error_message(r#"{"error":"Forbidden for role"}"#).as_deref(),
            Some("Forbidden for role")
        );
    }

    #[test]
    fn non_json_or_empty_bodies_carry_no_message() {
        assert_eq!(error_message(""), None);
        assert_eq!(error_message("{}"), None);
        assert_eq!(error_message(r#"{"message":"  "}"#), None);
        assert_eq!(error_message("upstream down"), None);
        assert_eq!(
            error_message("<html><body>Bad Gateway nginx</body></html>"),
            None
        );
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let envelope: ApiEnvelope<Value> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(envelope.success);
        assert!(envelope.data.is_none());
        assert!(envelope.message.is_none());
    }
}
