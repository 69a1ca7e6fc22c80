use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use childpipe_channel::PipeStream;
use tracing::{debug, warn};

use crate::error::Result;
use crate::reason::ExitReason;

/// Ordered list of exit callbacks shared with the listener thread.
pub(crate) type ExitCallbacks = Arc<Mutex<Vec<Box<dyn FnMut(ExitReason) + Send>>>>;

/// Writer half of the cancellation channel, held by the coordinator.
pub struct SignalSender {
    stream: Mutex<PipeStream>,
}

impl SignalSender {
    pub fn new(stream: PipeStream) -> Self {
        Self {
            stream: Mutex::new(stream),
        }
    }

    /// Push one exit reason to the child and wait for the flush.
    ///
    /// A child that already closed its end is not a fault: the write is
    /// skipped and the reason silently dropped.
    pub fn notify(&self, reason: ExitReason) -> Result<()> {
        let mut stream = self
            .stream
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let outcome = stream
            .write_all(&reason.to_wire())
            .and_then(|()| stream.flush());
        match outcome {
            Ok(()) => {
                debug!(%reason, "sent exit reason to child");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                debug!(%reason, "child already disconnected; exit reason dropped");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for SignalSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSender").finish_non_exhaustive()
    }
}

/// Start the child-side cancellation listener on its own thread.
///
/// The thread owns the reader half exclusively. It blocks on a single 4-byte
/// read; on success it invokes every registered callback in registration
/// order, then closes its end of the channel and exits. One reason is acted
/// upon per child lifetime; after that there is no delivery path.
pub(crate) fn spawn_exit_listener(
    mut stream: PipeStream,
    callbacks: ExitCallbacks,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("childpipe-exit-listener".to_string())
        .spawn(move || {
            let mut wire = [0u8; ExitReason::WIRE_SIZE];
            match stream.read_exact(&mut wire) {
                Ok(()) => match ExitReason::from_wire(wire) {
                    Ok(reason) => {
                        debug!(%reason, "exit reason received");
                        let mut callbacks = callbacks
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner());
                        for callback in callbacks.iter_mut() {
                            callback(reason);
                        }
                    }
                    Err(err) => warn!(%err, "ignoring undecodable exit signal"),
                },
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    debug!("cancellation channel closed without a signal");
                }
                Err(err) => debug!(%err, "cancellation listener stopped"),
            }
            // `stream` drops here: the channel end closes after first delivery.
        })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use childpipe_channel::InheritablePipe;

    use super::*;

    fn wait_until(predicate: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !predicate() {
            assert!(Instant::now() < deadline, "timed out waiting for listener");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn notify_writes_one_wire_reason() {
        let mut pipe = InheritablePipe::child_reads().unwrap();
        let mut child_end = pipe.take_child_stream().unwrap();
        let sender = SignalSender::new(pipe.into_stream());

        sender.notify(ExitReason::Shutdown).unwrap();

        let mut wire = [0u8; ExitReason::WIRE_SIZE];
        child_end.read_exact(&mut wire).unwrap();
        assert_eq!(ExitReason::from_wire(wire).unwrap(), ExitReason::Shutdown);
    }

    #[test]
    fn notify_after_disconnect_is_suppressed() {
        let mut pipe = InheritablePipe::child_reads().unwrap();
        drop(pipe.take_child_stream());
        let sender = SignalSender::new(pipe.into_stream());

        // SIGPIPE must be off for this process; write_all reports BrokenPipe.
        sender.notify(ExitReason::Cancel).unwrap();
    }

    #[test]
    fn listener_delivers_exactly_one_reason_in_order() {
        let mut pipe = InheritablePipe::child_reads().unwrap();
        let child_end = pipe.take_child_stream().unwrap();
        let sender = SignalSender::new(pipe.into_stream());

        let delivered: Arc<Mutex<Vec<(u8, ExitReason)>>> = Arc::default();
        let callbacks: ExitCallbacks = Arc::default();
        for tag in [1u8, 2, 3] {
            let sink = Arc::clone(&delivered);
            callbacks
                .lock()
                .unwrap()
                .push(Box::new(move |reason| sink.lock().unwrap().push((tag, reason))));
        }

        let listener = spawn_exit_listener(child_end, Arc::clone(&callbacks)).unwrap();

        sender.notify(ExitReason::Cancel).unwrap();
        wait_until(|| !delivered.lock().unwrap().is_empty());
        listener.join().unwrap();

        assert_eq!(
            *delivered.lock().unwrap(),
            vec![
                (1, ExitReason::Cancel),
                (2, ExitReason::Cancel),
                (3, ExitReason::Cancel)
            ]
        );

        // The listener closed its end; a second reason has nowhere to go.
        sender.notify(ExitReason::Shutdown).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(delivered.lock().unwrap().len(), 3);
    }

    #[test]
    fn listener_exits_quietly_on_eof() {
        let mut pipe = InheritablePipe::child_reads().unwrap();
        let child_end = pipe.take_child_stream().unwrap();
        let callbacks: ExitCallbacks = Arc::default();
        let listener = spawn_exit_listener(child_end, Arc::clone(&callbacks)).unwrap();

        // Dropping the writer half closes the channel without a signal.
        drop(pipe.into_stream());
        listener.join().unwrap();
    }
}
