pub mod cache;
pub mod json;
pub mod mirror;
pub mod seed;

pub use cache::ResponseCache;
pub use json::{FileStore, KeyValueStore, MemoryStore};
pub use mirror::{Collection, PersistentMirror};
