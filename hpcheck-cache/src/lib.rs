pub mod cache;
pub mod file;

pub use cache::{CacheError, MemoryStorage, ProgressCache, SessionStorage};
pub use file::FileStorage;
