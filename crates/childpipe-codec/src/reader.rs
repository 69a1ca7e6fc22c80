use std::io::{ErrorKind, Read};

use serde::de::DeserializeOwned;

use crate::error::{CodecError, Result};

/// Reads self-delimiting documents from any `Read` stream.
///
/// Each call consumes exactly one document's worth of bytes. Clean EOF at a
/// document boundary yields `Ok(None)`; EOF inside a document is
/// [`CodecError::Truncated`].
pub struct DocumentReader<R> {
    inner: R,
}

impl<R: Read> DocumentReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next document (blocking).
    pub fn read_document<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        // One probe byte decides between clean termination and a document.
        let mut first = [0u8; 1];
        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CodecError::Io(err)),
            }
        }

        let chained = first.as_slice().chain(&mut self.inner);
        match ciborium::from_reader(chained) {
            Ok(value) => Ok(Some(value)),
            Err(err) => Err(decode_error(err)),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn decode_error(err: ciborium::de::Error<std::io::Error>) -> CodecError {
    match err {
        ciborium::de::Error::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
            CodecError::Truncated
        }
        ciborium::de::Error::Io(io) => CodecError::Io(io),
        other => CodecError::Decode(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::writer::DocumentWriter;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Progress {
        step: u32,
        detail: String,
    }

    fn encode_all(values: &[Progress]) -> Vec<u8> {
        let mut writer = DocumentWriter::new(Vec::new());
        for value in values {
            writer.write_document(value).unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn reads_single_document() {
        let wire = encode_all(&[Progress {
            step: 1,
            detail: "starting".to_string(),
        }]);
        let mut reader = DocumentReader::new(Cursor::new(wire));

        let doc: Progress = reader.read_document().unwrap().unwrap();
        assert_eq!(doc.step, 1);
        assert_eq!(doc.detail, "starting");
    }

    #[test]
    fn reads_documents_in_order() {
        let sent: Vec<Progress> = (0..8)
            .map(|step| Progress {
                step,
                detail: format!("step-{step}"),
            })
            .collect();
        let mut reader = DocumentReader::new(Cursor::new(encode_all(&sent)));

        let mut received = Vec::new();
        while let Some(doc) = reader.read_document::<Progress>().unwrap() {
            received.push(doc);
        }
        assert_eq!(received, sent);
    }

    #[test]
    fn clean_eof_is_none() {
        let mut reader = DocumentReader::new(Cursor::new(Vec::<u8>::new()));
        let doc: Option<Progress> = reader.read_document().unwrap();
        assert!(doc.is_none());
    }

    #[test]
    fn eof_after_full_document_is_none() {
        let wire = encode_all(&[Progress {
            step: 2,
            detail: "only".to_string(),
        }]);
        let mut reader = DocumentReader::new(Cursor::new(wire));

        assert!(reader.read_document::<Progress>().unwrap().is_some());
        assert!(reader.read_document::<Progress>().unwrap().is_none());
    }

    #[test]
    fn truncated_document_is_distinct_from_eof() {
        let mut wire = encode_all(&[Progress {
            step: 3,
            detail: "cut short".to_string(),
        }]);
        wire.truncate(wire.len() - 4);

        let mut reader = DocumentReader::new(Cursor::new(wire));
        let err = reader.read_document::<Progress>().unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        // 0xff is a CBOR "break" with no enclosing indefinite item.
        let mut reader = DocumentReader::new(Cursor::new(vec![0xffu8]));
        let err = reader.read_document::<Progress>().unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn wrong_shape_is_a_decode_error() {
        let mut writer = DocumentWriter::new(Vec::new());
        writer.write_document(&"just a string").unwrap();
        let mut reader = DocumentReader::new(Cursor::new(writer.into_inner()));

        let err = reader.read_document::<Progress>().unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn interrupted_read_retries() {
        struct InterruptedThenData {
            interrupted: bool,
            inner: Cursor<Vec<u8>>,
        }

        impl Read for InterruptedThenData {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if !self.interrupted {
                    self.interrupted = true;
                    return Err(std::io::Error::from(ErrorKind::Interrupted));
                }
                self.inner.read(buf)
            }
        }

        let wire = encode_all(&[Progress {
            step: 4,
            detail: "retry".to_string(),
        }]);
        let mut reader = DocumentReader::new(InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire),
        });

        let doc: Progress = reader.read_document().unwrap().unwrap();
        assert_eq!(doc.step, 4);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = DocumentReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }
}
