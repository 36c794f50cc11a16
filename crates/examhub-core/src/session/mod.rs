mod state;
mod store;
mod user;

pub use state::{PersistedSession, Session, TransientSession};
pub use store::SessionStore;
pub use user::{MalformedUser, RawUser, Role, UserRecord};
