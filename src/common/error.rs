use thiserror::Error;

/// Result type for jretro operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the jretro patcher
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed class file: {message}")]
    ClassFormat { message: String },

    #[error("Unsupported construct in {context}: {message}")]
    Unsupported { context: String, message: String },

    #[error("Class generation error: {message}")]
    CodeGen { message: String },

    #[error("Invalid target version: {version}")]
    InvalidTargetVersion { version: String },
}

impl Error {
    /// Create a class-format error
    pub fn class_format(message: impl Into<String>) -> Self {
        Self::ClassFormat { message: message.into() }
    }

    /// Create an unsupported-construct error
    pub fn unsupported(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported { context: context.into(), message: message.into() }
    }

    /// Create a class generation error
    pub fn codegen(message: impl Into<String>) -> Self {
        Self::CodeGen { message: message.into() }
    }

    /// Attach surrounding context (class or method name) to a class-format error
    pub fn in_context(self, context: &str) -> Self {
        match self {
            Self::ClassFormat { message } => Self::ClassFormat {
                message: format!("{} (in {})", message, context),
            },
            other => other,
        }
    }
}
