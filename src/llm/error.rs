use thiserror::Error;

/// Errors returned by language-model calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider call failed.
    #[error("provider call failed: {message}")]
    Provider {
        /// Error message from the provider client.
        message: String,
    },

    /// The model returned output that could not be parsed as expected.
    #[error("unparseable model output: {message}")]
    Parse {
        /// What went wrong.
        message: String,
    },
}
