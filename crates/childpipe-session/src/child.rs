use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use childpipe_channel::{EndpointId, PipeStream};
use childpipe_codec::{CodecError, DocumentWriter};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::reason::ExitReason;
use crate::signal::{spawn_exit_listener, ExitCallbacks};

/// Environment variable carrying the data-channel endpoint token.
pub const DATA_ENDPOINT_ENV: &str = "CHILDPIPE_DATA_ENDPOINT";
/// Environment variable carrying the cancellation-channel endpoint token.
pub const CANCEL_ENDPOINT_ENV: &str = "CHILDPIPE_CANCEL_ENDPOINT";

/// Child-side capability over the channel pair.
///
/// Obtained with [`try_connect`] in a process launched by a coordinator.
/// Exposes [`send`] on the data channel and [`register_exit_callback`] for
/// cancellation notification; without a cancellation endpoint the capability
/// silently lacks the latter.
///
/// [`try_connect`]: ChildChannel::try_connect
/// [`send`]: ChildChannel::send
/// [`register_exit_callback`]: ChildChannel::register_exit_callback
pub struct ChildChannel {
    writer: Mutex<DocumentWriter<PipeStream>>,
    callbacks: ExitCallbacks,
    listener: Option<JoinHandle<()>>,
}

impl ChildChannel {
    /// Discover the channel pair from the environment.
    ///
    /// Returns `Ok(None)` when no data endpoint is present — the process was
    /// not launched by a coordinator and may run standalone. A present but
    /// unresolvable endpoint is an error: the environment claims a
    /// coordinator that cannot be reached.
    pub fn try_connect() -> Result<Option<Self>> {
        let Ok(data_token) = std::env::var(DATA_ENDPOINT_ENV) else {
            debug!("no data endpoint in environment; running standalone");
            return Ok(None);
        };
        let data = EndpointId::from_token(data_token);
        let cancel = std::env::var(CANCEL_ENDPOINT_ENV)
            .ok()
            .map(EndpointId::from_token);
        Self::from_endpoints(data, cancel).map(Some)
    }

    /// Open the channel pair from explicit endpoint tokens.
    ///
    /// Each endpoint is consumed here; the tokens cannot be reused.
    pub fn from_endpoints(data: EndpointId, cancel: Option<EndpointId>) -> Result<Self> {
        let data_stream = data.open()?;
        let cancel_stream = cancel.map(EndpointId::open).transpose()?;
        Self::from_streams(data_stream, cancel_stream)
    }

    /// Assemble the capability from already-opened channel ends.
    pub fn from_streams(data: PipeStream, cancel: Option<PipeStream>) -> Result<Self> {
        let callbacks: ExitCallbacks = Arc::default();
        let listener = match cancel {
            Some(stream) => Some(spawn_exit_listener(stream, Arc::clone(&callbacks))?),
            None => None,
        };
        info!(
            cancellation = listener.is_some(),
            "connected to coordinator channels"
        );
        Ok(Self {
            writer: Mutex::new(DocumentWriter::new(data)),
            callbacks,
            listener,
        })
    }

    /// Publish one message to the parent.
    ///
    /// The value is serialized into exactly one document and the call blocks
    /// until the transport accepts it. Concurrent senders are serialized by a
    /// per-channel lock, so frames never interleave. A disconnected parent is
    /// "no one listening": the message is silently dropped.
    pub fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match writer.write_document(message) {
            Ok(()) => Ok(()),
            Err(CodecError::Io(err)) => {
                debug!(%err, "parent disconnected; message dropped");
                Ok(())
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Register a callback for the exit reason, after any already registered.
    ///
    /// Delivery is single-shot: a callback registered after the reason
    /// arrived misses it — there is no buffering or replay.
    pub fn register_exit_callback(&self, callback: impl FnMut(ExitReason) + Send + 'static) {
        self.callbacks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::new(callback));
    }

    /// Whether this capability can receive cancellation notifications.
    pub fn has_cancellation(&self) -> bool {
        self.listener.is_some()
    }
}

impl std::fmt::Debug for ChildChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildChannel")
            .field("cancellation", &self.listener.is_some())
            .finish()
    }
}
