//! Session and API client library shared by ExamHub front-ends.
//!
//! [`SessionContext`] owns the token store and redirect latch, [`ApiClient`]
//! talks to the primary and analytics APIs on its behalf, and
//! [`SessionStore`] is the only surface UI code is expected to drive.

pub mod auth;
pub mod config;
pub mod http;
pub mod services;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{Navigator, SessionContext, LOGIN_LOCATION};
pub use http::ApiClient;
pub use session::SessionStore;
