mod context;
mod redirect;
mod token_store;

pub use context::SessionContext;
pub use redirect::{Navigator, RedirectGuard, LOGIN_LOCATION};
pub use token_store::TokenStore;
