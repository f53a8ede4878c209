use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Recoverable engine errors.
///
/// Frame-stack and render-state misuse is not represented here: those are
/// programming errors and abort through assertions.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("signal handler error: {0}")]
    Signal(String),

    #[error("engine error: {0}")]
    Other(String),
}

impl From<ctrlc::Error> for EngineError {
    fn from(e: ctrlc::Error) -> Self {
        Self::Signal(e.to_string())
    }
}
