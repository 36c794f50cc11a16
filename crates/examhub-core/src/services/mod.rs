pub mod auth;

pub use auth::{AuthPayload, AuthService, ProfileUpdate, RegisterRequest, TokenPair};
