pub mod cookie;
pub mod flash;
pub mod manager;
pub mod model;
pub mod sqlite;
pub mod store;

pub use cookie::SessionCookie;
pub use flash::{flash_middleware, FlashKind, FlashMessages, PendingFlash, FLASH_KEY};
pub use manager::{session_middleware, SessionManager};
pub use model::{Session, SessionId, SessionRecord, SessionStatus};
pub use sqlite::SqliteSessionStore;
pub use store::{SessionStore, StoreError};
