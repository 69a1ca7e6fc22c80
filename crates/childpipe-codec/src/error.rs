/// Errors that can occur while encoding or decoding documents.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An I/O error occurred while reading or writing a document.
    #[error("codec I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a document.
    #[error("stream ended mid-document")]
    Truncated,

    /// The bytes on the wire are not a valid document.
    #[error("malformed document: {0}")]
    Decode(String),

    /// The value could not be serialized into a document.
    #[error("failed to encode document: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
