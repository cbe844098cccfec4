pub type ScrollPhaseResult<T> = Result<T, ScrollPhaseError>;

#[derive(thiserror::Error, Debug)]
pub enum ScrollPhaseError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScrollPhaseError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
