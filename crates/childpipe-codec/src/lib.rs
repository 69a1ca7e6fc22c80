//! Self-delimiting binary document framing.
//!
//! Every message is one CBOR document. Documents delimit themselves on the
//! wire — there is no external length prefix and no sync marker — so a data
//! channel is simply a concatenation of documents, read back one at a time.
//!
//! End-of-stream is only clean at a document boundary. A stream that ends
//! mid-document is reported as [`CodecError::Truncated`], distinct from both
//! clean termination and malformed input.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{CodecError, Result};
pub use reader::DocumentReader;
pub use writer::DocumentWriter;
