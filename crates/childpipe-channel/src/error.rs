/// Errors that can occur while creating or resolving pipe channels.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Failed to create an anonymous pipe pair.
    #[error("failed to create pipe: {0}")]
    Create(#[source] std::io::Error),

    /// The endpoint token does not name a handle this process inherited.
    #[error("invalid endpoint token {token:?}: {reason}")]
    InvalidEndpoint { token: String, reason: String },

    /// An I/O error occurred on the channel.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
