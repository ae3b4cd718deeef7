//! Best-effort message persistence.
//!
//! The pipeline only ever talks to `Arc<dyn MessageStore>`. Which implementation sits
//! behind it is decided once at startup by `create_message_store()`:
//!
//! - `PostgresMessageStore`: appends to the `messages` table
//! - `MemoryMessageStore`: keeps records in process (tests, local development)
//! - `NoopMessageStore`: persistence disabled or unreachable at startup

mod backend;
mod factory;
mod memory_backend;
mod noop_backend;
mod postgres_backend;

pub use backend::{MessageStore, PersistenceError, RecordId, StoredRecord};
pub use factory::create_message_store;
pub use memory_backend::MemoryMessageStore;
pub use noop_backend::NoopMessageStore;
pub use postgres_backend::PostgresMessageStore;
