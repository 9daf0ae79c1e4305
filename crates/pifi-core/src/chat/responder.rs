//! Assistant collaborator trait.

use async_trait::async_trait;

use super::model::ChatSession;
use crate::error::Result;

/// Produces assistant replies for questions asked in a chat session.
///
/// The production implementation calls the PiFi backend; tests provide
/// scripted responders.
#[async_trait]
pub trait AssistantResponder: Send + Sync {
    /// Answers `question` in the context of `session`.
    ///
    /// `session` already contains the user's question as its last message.
    async fn respond(&self, session: &ChatSession, question: &str) -> Result<String>;
}
