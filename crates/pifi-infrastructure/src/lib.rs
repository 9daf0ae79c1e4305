pub mod config;
pub mod logging;
pub mod paths;
pub mod storage;

pub use crate::config::PifiConfig;
pub use crate::storage::{FileStorage, MemoryStorage};
