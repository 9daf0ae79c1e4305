//! Application layer: the composition root and the chat use case.

pub mod bootstrap;
pub mod chat_usecase;

pub use bootstrap::AppContext;
pub use chat_usecase::ChatUseCase;
