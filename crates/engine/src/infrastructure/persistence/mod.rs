//! Character store adapters.

mod memory;
mod sqlite;

pub use memory::InMemoryCharacterStore;
pub use sqlite::SqliteCharacterStore;
