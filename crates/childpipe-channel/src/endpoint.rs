use std::fmt;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use tracing::debug;

use crate::error::{ChannelError, Result};
use crate::stream::PipeStream;

/// Opaque token naming one end of an inherited anonymous pipe.
///
/// The token is environment-variable-safe and one-shot: it identifies a
/// handle inside exactly one child process, the one that inherited it at
/// spawn time, and it is consumed when the endpoint is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointId(String);

impl EndpointId {
    /// Wrap a token received from the environment.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub(crate) fn from_raw(fd: RawFd) -> Self {
        Self(fd.to_string())
    }

    /// The raw token, suitable for injection into a child environment.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the token into the inherited pipe end.
    ///
    /// Consumes the id: each endpoint is opened exactly once, and the
    /// returned stream takes sole ownership of the handle. Fails with
    /// [`ChannelError::InvalidEndpoint`] when the token does not name an
    /// open descriptor in this process.
    pub fn open(self) -> Result<PipeStream> {
        let fd: RawFd = self.0.parse().map_err(|_| ChannelError::InvalidEndpoint {
            token: self.0.clone(),
            reason: "not a descriptor number".to_string(),
        })?;
        if fd < 0 {
            return Err(ChannelError::InvalidEndpoint {
                token: self.0,
                reason: "negative descriptor".to_string(),
            });
        }

        // Probe that the descriptor was actually inherited before claiming it.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        if flags == -1 {
            return Err(ChannelError::InvalidEndpoint {
                token: self.0,
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
        // Restore close-on-exec so the handle does not leak into grandchildren.
        if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } == -1 {
            return Err(ChannelError::Io(std::io::Error::last_os_error()));
        }

        debug!(token = %self.0, "opened inherited pipe endpoint");
        // SAFETY: the descriptor is open (probed above) and nothing else in
        // this process owns it; the token was handed to us for consumption.
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(PipeStream::from_fd(owned))
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
