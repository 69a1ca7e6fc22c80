use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};

/// One end of an anonymous pipe — implements Read + Write.
///
/// A pipe end is unidirectional; callers use whichever half of the contract
/// matches the direction the pipe was created with. The underlying descriptor
/// is closed when the stream is dropped.
pub struct PipeStream {
    inner: File,
}

impl PipeStream {
    pub(crate) fn from_fd(fd: OwnedFd) -> Self {
        Self {
            inner: File::from(fd),
        }
    }
}

impl Read for PipeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for PipeStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // Pipe writes are not buffered by the kernel beyond the pipe itself,
        // but the Write contract is honored for wrappers stacked on top.
        self.inner.flush()
    }
}

impl AsRawFd for PipeStream {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.inner.as_raw_fd()
    }
}

impl std::fmt::Debug for PipeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeStream")
            .field("fd", &self.inner.as_raw_fd())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use crate::pipe::InheritablePipe;

    #[test]
    fn write_end_to_read_end() {
        let mut pipe = InheritablePipe::child_writes().unwrap();
        let mut writer = pipe.take_child_stream().expect("child end available");
        let mut reader = pipe.into_stream();

        writer.write_all(b"over the pipe").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let mut received = Vec::new();
        reader.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"over the pipe");
    }

    #[test]
    fn debug_does_not_expose_payload() {
        let mut pipe = InheritablePipe::child_writes().unwrap();
        let stream = pipe.take_child_stream().expect("child end available");
        let rendered = format!("{stream:?}");
        assert!(rendered.starts_with("PipeStream"));
    }
}
