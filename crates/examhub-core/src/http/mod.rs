mod client;
mod error;
mod request;
mod response;

pub use client::{ApiClient, REFRESH_PATH};
pub use error::{HttpError, HttpResult};
pub use request::{replay, ApiOrigin, RequestDescriptor};
pub use response::{ApiEnvelope, ApiResponse};
pub use reqwest::Method;
