//! Process lifecycle coordination over one-shot pipe channel pairs.
//!
//! This is the "just works" layer of childpipe. A parent spawns a child with
//! [`PipeProcess::spawn`] and blocks in [`PipeProcess::wait_for_exit`],
//! receiving every document the child publishes. The child connects back with
//! [`ChildChannel::try_connect`] and publishes with [`ChildChannel::send`].
//!
//! Two channels per child, nothing shared between children:
//! - the *data* channel carries messages child → parent;
//! - the *cancellation* channel carries one [`ExitReason`] parent → child.
//!
//! Cancellation is cooperative. Firing a [`CancelToken`] pushes a reason to
//! the child and the read loop observes the token between frames; killing the
//! child's process tree is an explicit opt-in fallback behind a timeout.

pub mod cancel;
pub mod error;
pub mod reason;

#[cfg(unix)]
pub mod child;
#[cfg(unix)]
pub mod coordinator;
#[cfg(unix)]
pub mod signal;

pub use cancel::{CancelRegistration, CancelToken};
pub use error::{Result, SessionError};
pub use reason::ExitReason;

#[cfg(unix)]
pub use child::{ChildChannel, CANCEL_ENDPOINT_ENV, DATA_ENDPOINT_ENV};
#[cfg(unix)]
pub use coordinator::PipeProcess;
#[cfg(unix)]
pub use signal::SignalSender;
