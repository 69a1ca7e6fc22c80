//! One-shot inheritable anonymous pipe channels.
//!
//! This is the lowest layer of childpipe. A parent process creates
//! unidirectional [`InheritablePipe`]s whose child ends survive `exec`, passes
//! their [`EndpointId`] tokens to a spawned child through its environment, and
//! keeps the local ends for itself. The child resolves each token exactly once
//! into a [`PipeStream`].
//!
//! An endpoint token is only meaningful inside the single process that
//! inherited the underlying handle at spawn time. It is not a connection
//! string; there is nothing to rendezvous with out-of-band.

pub mod error;

#[cfg(unix)]
pub mod endpoint;
#[cfg(unix)]
pub mod pipe;
#[cfg(unix)]
pub mod stream;

pub use error::{ChannelError, Result};

#[cfg(unix)]
pub use endpoint::EndpointId;
#[cfg(unix)]
pub use pipe::InheritablePipe;
#[cfg(unix)]
pub use stream::PipeStream;
