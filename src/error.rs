//! Error taxonomy shared by the session, its collaborators, and the console.
//!
//! Every collaborator call returns [`Result`]; the console is the single place
//! where these errors are turned into user-visible messages.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FormError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// The uploaded source produced no usable rows.
    #[error("the input has no usable rows")]
    EmptyInput,

    /// An edit targeted a row that does not exist.
    #[error("row {} does not exist (session has {len} rows)", .index + 1)]
    IndexOutOfRange { index: usize, len: usize },

    /// An edit targeted an entry that is frozen until it is unlocked.
    #[error("{0} is locked; unlock it before editing")]
    Locked(String),

    /// A transition whose precondition does not hold yet.
    #[error("not permitted: {0}")]
    NotPermitted(String),

    /// The text generation service failed (auth, rate limit, network, bad reply).
    #[error("generation service failed: {0}")]
    Gateway(String),

    /// Summary generation failed; the slot may hold the fallback text now.
    #[error("summary generation failed: {reason}")]
    GenerationFailed {
        reason: String,
        fallback_applied: bool,
    },

    /// Template fill or document serialization failed.
    #[error("document rendering failed: {0}")]
    Render(String),

    /// The spreadsheet collaborator could not produce rows.
    #[error("spreadsheet error: {0}")]
    Sheet(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl FormError {
    pub fn render(err: impl std::fmt::Display) -> Self {
        Self::Render(err.to_string())
    }

    pub fn gateway(err: impl std::fmt::Display) -> Self {
        Self::Gateway(err.to_string())
    }
}
