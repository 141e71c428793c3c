//! Protocol error types.

use thiserror::Error;

/// Errors produced while decoding or encoding relay messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The inbound payload was not a well-formed message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A binary frame did not contain UTF-8 text.
    #[error("binary frame is not valid UTF-8 ({len} bytes)")]
    NotUtf8 {
        /// Frame length in bytes.
        len: usize,
    },
    /// An outbound message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = ProtocolError::from(json_err);
        assert!(err.to_string().starts_with("malformed message:"));
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn not_utf8_display() {
        let err = ProtocolError::NotUtf8 { len: 3 };
        assert_eq!(err.to_string(), "binary frame is not valid UTF-8 (3 bytes)");
    }
}
