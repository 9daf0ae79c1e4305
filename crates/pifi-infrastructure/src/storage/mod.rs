//! Key-value storage adapters.

mod atomic_file;
mod file_storage;
mod memory_storage;

pub use atomic_file::AtomicFile;
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
