use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing configuration field: {0}")]
    MissingField(String),

    #[error("Invalid port name: {0}")]
    InvalidPort(String),

    // Buffer errors
    #[error("Buffer underflow: requested {requested} bytes, {remaining} remaining")]
    BufferUnderflow { requested: usize, remaining: usize },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::configuration("bad baud").to_string(),
            "Configuration error: bad baud"
        );
        assert_eq!(
            Error::missing_field("host").to_string(),
            "Missing configuration field: host"
        );
        assert_eq!(
            Error::BufferUnderflow {
                requested: 4,
                remaining: 1
            }
            .to_string(),
            "Buffer underflow: requested 4 bytes, 1 remaining"
        );
    }
}
