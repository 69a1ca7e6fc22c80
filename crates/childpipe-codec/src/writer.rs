use std::io::Write;

use serde::Serialize;

use crate::error::{CodecError, Result};

/// Writes self-delimiting documents to any `Write` stream.
///
/// Each call produces exactly one document and flushes the underlying stream,
/// so a successful return means the transport accepted the whole frame.
pub struct DocumentWriter<W> {
    inner: W,
}

impl<W: Write> DocumentWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Serialize one value as one document and flush (blocking).
    pub fn write_document<T: Serialize>(&mut self, value: &T) -> Result<()> {
        ciborium::into_writer(value, &mut self.inner).map_err(encode_error)?;
        self.inner.flush()?;
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn encode_error(err: ciborium::ser::Error<std::io::Error>) -> CodecError {
    match err {
        ciborium::ser::Error::Io(io) => CodecError::Io(io),
        ciborium::ser::Error::Value(msg) => CodecError::Encode(msg),
    }
}
