//! docvox Session crate - the turn-taking conversation loop.
//!
//! [`ConversationLoop::step`] executes exactly one transition per call against
//! a [`SessionState`]: speak a pending answer, listen for one utterance, or
//! answer a pending query. Callers re-invoke it (the rerun trigger) for as
//! long as they want the conversation to continue.

pub mod conversation;
pub mod error;
pub mod log;
pub mod session;
pub mod state;

pub use conversation::{ConversationLoop, RetrieverLoader, StepReport};
pub use error::SessionError;
pub use log::ChatLog;
pub use session::SessionState;
pub use state::LoopState;
