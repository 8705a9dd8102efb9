pub mod models;
pub mod pool;
pub mod repository;

pub use models::{Participant, Session, SessionData};
pub use pool::DbPool;
pub use repository::{PgSessionStore, SessionStore, StoreError};

#[cfg(test)]
pub use repository::MockSessionStore;
