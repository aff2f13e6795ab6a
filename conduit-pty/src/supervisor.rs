//! Relay supervisor: pipe plumbing, the worker thread, and the one-shot
//! completion notification.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::error::{PtyError, RelayError};
use crate::fd;
use crate::relay::Relay;
use crate::types::PtyMaster;

/// Host-visible ends of a relay. `read` yields everything the child wrote to
/// the terminal, `write` accepts input for it. Both descriptors are
/// non-blocking and close-on-exec, and belong to the caller.
///
/// Dropping both ends is the cancellation path: the worker observes the
/// hang-up and terminates in an orderly fashion within the poll timeout.
#[derive(Debug)]
pub struct IoChannels {
    pub read: OwnedFd,
    pub write: OwnedFd,
}

/// Handle on a running relay worker.
///
/// The worker signals completion exactly once, after it has released every
/// descriptor it owned. [`RelayHandle::completion_fd`] becomes readable at
/// that point, so the handle plugs into any readiness-driven event loop;
/// [`RelayHandle::try_complete`] and [`RelayHandle::wait`] receive the status
/// and join the worker on the calling thread. Dropping the handle detaches
/// the worker, which still exits on its own once the host-side descriptors
/// close.
#[derive(Debug)]
pub struct RelayHandle {
    worker: Option<JoinHandle<()>>,
    status: mpsc::Receiver<Result<(), RelayError>>,
    wake: OwnedFd,
}

impl RelayHandle {
    /// Descriptor that becomes readable once the worker has exited.
    pub fn completion_fd(&self) -> BorrowedFd<'_> {
        self.wake.as_fd()
    }

    /// Non-blocking completion check. Once the worker has signalled, joins
    /// it and returns the relay status; `None` while it is still running.
    pub fn try_complete(&mut self) -> Option<Result<(), RelayError>> {
        match self.status.try_recv() {
            Ok(status) => {
                self.join();
                Some(status)
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.join();
                Some(Err(RelayError::Vanished))
            }
        }
    }

    /// Block until the worker has exited, join it, and return its status.
    pub fn wait(mut self) -> Result<(), RelayError> {
        let status = self.status.recv().unwrap_or(Err(RelayError::Vanished));
        self.join();
        status
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Spawn the relay worker for `master` and hand back the host-visible pipe
/// ends together with the completion handle.
///
/// Ownership of the master transfers into the worker, which closes it on
/// exit. The returned descriptors belong to the caller.
pub fn attach_io_channels(master: PtyMaster) -> Result<(IoChannels, RelayHandle), PtyError> {
    // Output pipe: relay writes, host reads.
    let (host_read, relay_write) = fd::pipe()?;
    // Input pipe: host writes, relay reads.
    let (relay_read, host_write) = fd::pipe()?;
    // Completion wake-up, readable on the host side once the worker is done.
    let (wake_read, wake_write) = fd::pipe()?;

    let (status_tx, status_rx) = mpsc::channel();

    let mut relay = Relay::new(master.into_inner(), relay_read, relay_write);
    let worker = thread::Builder::new()
        .name("pty-relay".into())
        .spawn(move || {
            let status = relay.run();
            if let Err(err) = &status {
                tracing::error!("relay worker failed: {err}");
            }
            // Release the master and both pipe ends before signalling, so
            // the host always reclaims a fully shut-down worker.
            drop(relay);
            let _ = status_tx.send(status);
            let _ = fd::write(wake_write.as_raw_fd(), &[0]);
        })
        .map_err(PtyError::Worker)?;

    tracing::debug!(
        read = host_read.as_raw_fd(),
        write = host_write.as_raw_fd(),
        "relay attached"
    );

    Ok((
        IoChannels {
            read: host_read,
            write: host_write,
        },
        RelayHandle {
            worker: Some(worker),
            status: status_rx,
            wake: wake_read,
        },
    ))
}
