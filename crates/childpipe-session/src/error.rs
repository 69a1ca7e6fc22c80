/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Channel-level error.
    #[error("channel error: {0}")]
    Channel(#[from] childpipe_channel::ChannelError),

    /// Codec-level error.
    #[error("codec error: {0}")]
    Codec(#[from] childpipe_codec::CodecError),

    /// The child process could not be started.
    #[error("failed to spawn child process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The cancellation channel carried a discriminant we do not know.
    #[error("unknown exit reason {0} on cancellation channel")]
    UnknownExitReason(u32),

    /// An I/O error occurred in the session layer.
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;
