use std::process::{Child, Command, ExitStatus};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use childpipe_channel::{InheritablePipe, PipeStream};
use childpipe_codec::DocumentReader;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::cancel::{CancelRegistration, CancelToken};
use crate::child::{CANCEL_ENDPOINT_ENV, DATA_ENDPOINT_ENV};
use crate::error::{Result, SessionError};
use crate::reason::ExitReason;
use crate::signal::SignalSender;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Parent-side coordinator for one spawned child.
///
/// Owns the channel pair, the process handle, and the whole-lifetime shutdown
/// registration. Created by [`spawn`], consumed by [`wait_for_exit`]; because
/// the wait consumes the coordinator, every exit path — normal completion,
/// cancellation, or error — releases the registrations and channel resources.
///
/// [`spawn`]: PipeProcess::spawn
/// [`wait_for_exit`]: PipeProcess::wait_for_exit
pub struct PipeProcess {
    child: Arc<Mutex<Child>>,
    pid: u32,
    reader: DocumentReader<PipeStream>,
    signal: Arc<SignalSender>,
    _shutdown_registration: CancelRegistration,
}

impl PipeProcess {
    /// Spawn `command` wired to a fresh channel pair.
    ///
    /// Both endpoint tokens are injected into the child's environment and the
    /// child is started without shell interpretation, in its own process
    /// group so a forced kill can take its whole descendant tree down. If
    /// `shutdown` fires at any point in the coordinator's lifetime,
    /// [`ExitReason::Shutdown`] is pushed to the child.
    ///
    /// The parent's duplicates of the child-side handles are released before
    /// this returns; holding them would keep the channels from ever
    /// reporting disconnect.
    pub fn spawn(mut command: Command, shutdown: &CancelToken) -> Result<Self> {
        let mut data = InheritablePipe::child_writes()?;
        let mut cancel = InheritablePipe::child_reads()?;

        command.env(DATA_ENDPOINT_ENV, data.endpoint_id().as_str());
        command.env(CANCEL_ENDPOINT_ENV, cancel.endpoint_id().as_str());
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: setpgid is async-signal-safe and touches no locks or
            // allocations in the forked child.
            unsafe {
                command.pre_exec(|| {
                    if libc::setpgid(0, 0) != 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let child = command.spawn().map_err(SessionError::Spawn)?;
        let pid = child.id();
        info!(pid, "spawned coordinated child");

        data.release_child_handle();
        cancel.release_child_handle();

        let signal = Arc::new(SignalSender::new(cancel.into_stream()));
        let shutdown_signal = Arc::clone(&signal);
        let registration = shutdown.on_cancel(move || {
            let _ = shutdown_signal.notify(ExitReason::Shutdown);
        });

        Ok(Self {
            child: Arc::new(Mutex::new(child)),
            pid,
            reader: DocumentReader::new(data.into_stream()),
            signal,
            _shutdown_registration: registration,
        })
    }

    /// OS process id of the child.
    pub fn id(&self) -> u32 {
        self.pid
    }

    /// Best-effort forced termination of the child and its descendant tree.
    pub fn kill_tree(&self) {
        kill_process_group(self.pid);
    }

    /// Block until the child exits, forwarding each received message.
    ///
    /// If `cancel` fires, [`ExitReason::Cancel`] is pushed to the child, the
    /// canceller's thread waits up to `timeout` (`None` waits indefinitely)
    /// for the child to exit, and — when `force_kill_on_cancel` is set and
    /// the child is still alive — the process tree is killed.
    ///
    /// The read loop observes `cancel` only between frames; a frame already
    /// being read is not preempted. A clean end of stream, a cancellation, or
    /// child exit all conclude by reaping the process; the reap polls rather
    /// than blocking on the handle, so a late cancellation can still reach
    /// its timeout deadline and force a kill.
    ///
    /// Returns the child's OS exit code, or 0 when it was terminated by a
    /// signal. Corrupt or truncated stream data surfaces as an error after
    /// the child is killed and reaped; the channel pair is torn down
    /// regardless of the path taken out.
    pub fn wait_for_exit<T, F>(
        mut self,
        mut on_message: F,
        cancel: &CancelToken,
        force_kill_on_cancel: bool,
        timeout: Option<Duration>,
    ) -> Result<i32>
    where
        T: DeserializeOwned,
        F: FnMut(T),
    {
        let child = Arc::clone(&self.child);
        let signal = Arc::clone(&self.signal);
        let pid = self.pid;
        let _cancel_registration = cancel.on_cancel(move || {
            let _ = signal.notify(ExitReason::Cancel);
            if wait_for_exit_within(&child, timeout) {
                return;
            }
            if force_kill_on_cancel {
                warn!(pid, "child ignored cancellation; killing process tree");
                kill_process_group(pid);
            }
        });

        let outcome = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }
            match self.reader.read_document::<T>() {
                Ok(Some(message)) => on_message(message),
                Ok(None) => {
                    debug!(pid = self.pid, "data channel reached end of stream");
                    break Ok(());
                }
                Err(err) => break Err(err),
            }
        };

        if let Err(err) = outcome {
            warn!(pid = self.pid, %err, "data channel unreadable; killing child");
            kill_process_group(self.pid);
            let _ = reap_child(&self.child);
            return Err(err.into());
        }

        let status = reap_child(&self.child)?;
        info!(pid = self.pid, %status, "coordinated child exited");
        Ok(status.code().unwrap_or(0))
    }
}

impl std::fmt::Debug for PipeProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeProcess").field("pid", &self.pid).finish()
    }
}

/// Reap the child, releasing its lock between polls. A cancellation callback
/// on another thread polls the same handle; a blocking `wait` held under the
/// lock would starve it past its deadline.
fn reap_child(child: &Mutex<Child>) -> std::io::Result<ExitStatus> {
    loop {
        let polled = child
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .try_wait()?;
        if let Some(status) = polled {
            return Ok(status);
        }
        std::thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Poll for child exit until `timeout` elapses; `None` polls forever.
fn wait_for_exit_within(child: &Mutex<Child>, timeout: Option<Duration>) -> bool {
    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    loop {
        let exited = {
            let mut child = child.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match child.try_wait() {
                Ok(status) => status.is_some(),
                Err(err) => {
                    debug!(%err, "failed to poll child status");
                    return false;
                }
            }
        };
        if exited {
            return true;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return false;
            }
        }
        std::thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// SIGKILL the child's process group; fall back to the child alone.
fn kill_process_group(pid: u32) {
    let pid = pid as libc::pid_t;
    if unsafe { libc::kill(-pid, libc::SIGKILL) } != 0 {
        debug!(pid, "process group kill failed; killing child directly");
        let _ = unsafe { libc::kill(pid, libc::SIGKILL) };
    }
}
