use bridge_traits::BridgeError;
use thiserror::Error;

/// Failures while assembling the runtime, before any pull starts
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A required host adapter was never supplied to the builder
    #[error("No {collaborator} available: {hint}")]
    MissingCollaborator {
        collaborator: &'static str,
        hint: String,
    },

    #[error("Default adapter failed to start: {0}")]
    Adapter(#[from] BridgeError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
