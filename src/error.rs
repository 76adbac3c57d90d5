use thiserror::Error;

pub type Result<T> = std::result::Result<T, GradeError>;

#[derive(Debug, Error)]
pub enum GradeError {
    /// The sheet could not be read or one of its cells is malformed.
    #[error("load error: {message}")]
    Load {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The header rows do not describe a marks sheet we understand.
    #[error("schema error: {0}")]
    Schema(String),

    /// An average or percentage would divide by zero.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("config error: {0}")]
    Config(String),
}

impl GradeError {
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
            source: None,
        }
    }

    pub fn load_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Load {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn insufficient(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
