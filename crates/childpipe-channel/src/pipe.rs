use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use tracing::debug;

use crate::endpoint::EndpointId;
use crate::error::{ChannelError, Result};
use crate::stream::PipeStream;

/// One unidirectional anonymous pipe with an inheritable child end.
///
/// The local end carries close-on-exec and never leaves this process. The
/// child end is left inheritable so it survives spawn; its [`EndpointId`] is
/// what the child uses to claim it.
///
/// After spawning, the parent must call [`release_child_handle`]: as long as
/// the parent holds its duplicate of the child end, the pipe can never report
/// disconnect, and reads or writes on the local end block forever once the
/// child exits.
///
/// [`release_child_handle`]: InheritablePipe::release_child_handle
pub struct InheritablePipe {
    local: OwnedFd,
    child: Option<OwnedFd>,
    id: EndpointId,
}

impl InheritablePipe {
    /// Create a pipe the child writes to and the parent reads from.
    pub fn child_writes() -> Result<Self> {
        let (read, write) = create_pair()?;
        Self::assemble(read, write)
    }

    /// Create a pipe the parent writes to and the child reads from.
    pub fn child_reads() -> Result<Self> {
        let (read, write) = create_pair()?;
        Self::assemble(write, read)
    }

    fn assemble(local: OwnedFd, child: OwnedFd) -> Result<Self> {
        set_cloexec(local.as_raw_fd(), true)?;
        set_cloexec(child.as_raw_fd(), false)?;
        let id = EndpointId::from_raw(child.as_raw_fd());
        debug!(endpoint = %id, "created inheritable pipe");
        Ok(Self {
            local,
            child: Some(child),
            id,
        })
    }

    /// Token the child resolves into its end of this pipe.
    pub fn endpoint_id(&self) -> &EndpointId {
        &self.id
    }

    /// Drop the parent's duplicate of the child end. Idempotent.
    ///
    /// Must run after the child is spawned; see the type-level contract.
    pub fn release_child_handle(&mut self) {
        if let Some(fd) = self.child.take() {
            debug!(endpoint = %self.id, "released local copy of child handle");
            drop(fd);
        }
    }

    /// Take the child end as a stream, for driving both ends in one process.
    pub fn take_child_stream(&mut self) -> Option<PipeStream> {
        self.child.take().map(PipeStream::from_fd)
    }

    /// Convert into the local-end stream, releasing the child handle first.
    pub fn into_stream(mut self) -> PipeStream {
        self.release_child_handle();
        PipeStream::from_fd(self.local)
    }
}

impl std::fmt::Debug for InheritablePipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InheritablePipe")
            .field("endpoint", &self.id)
            .field("child_released", &self.child.is_none())
            .finish()
    }
}

fn create_pair() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(ChannelError::Create(std::io::Error::last_os_error()));
    }
    // SAFETY: pipe(2) succeeded and returned two freshly opened descriptors
    // that nothing else owns.
    let read = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    Ok((read, write))
}

fn set_cloexec(fd: RawFd, on: bool) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(ChannelError::Create(std::io::Error::last_os_error()));
    }
    let flags = if on {
        flags | libc::FD_CLOEXEC
    } else {
        flags & !libc::FD_CLOEXEC
    };
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags) } == -1 {
        return Err(ChannelError::Create(std::io::Error::last_os_error()));
    }
    Ok(())
}
