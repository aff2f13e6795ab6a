//! Error types.

use std::io;

/// Errors from the PTY primitives and from relay setup.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// posix_openpt() failed.
    #[error("PTY allocation failed: {0}")]
    Open(#[source] io::Error),

    /// grantpt() failed.
    #[error("grantpt failed: {0}")]
    Grant(#[source] io::Error),

    /// unlockpt() failed.
    #[error("unlockpt failed: {0}")]
    Unlock(#[source] io::Error),

    /// The slave device path could not be resolved.
    #[error("failed to resolve slave name: {0}")]
    SlaveName(#[source] io::Error),

    /// Opening the slave device failed.
    #[error("failed to open slave: {0}")]
    OpenSlave(#[source] io::Error),

    /// TIOCGWINSZ / TIOCSWINSZ ioctl failed.
    #[error("window size ioctl failed: {0}")]
    WindowSize(#[source] io::Error),

    /// fcntl() on descriptor flags failed.
    #[error("fcntl failed: {0}")]
    FdFlags(#[source] io::Error),

    /// pipe() failed.
    #[error("pipe creation failed: {0}")]
    Pipe(#[source] io::Error),

    /// TIOCSCTTY ioctl failed.
    #[error("failed to set controlling terminal: {0}")]
    ControllingTerminal(#[source] io::Error),

    /// Pushing the STREAMS terminal modules failed.
    #[error("failed to load STREAMS modules: {0}")]
    StreamModules(#[source] io::Error),

    /// setsid() failed.
    #[error("setsid failed: {0}")]
    Session(#[source] io::Error),

    /// dup2() failed.
    #[error("dup2 failed: {0}")]
    Dup(#[source] io::Error),

    /// The relay worker thread could not be started.
    #[error("failed to start relay worker: {0}")]
    Worker(#[source] io::Error),

    /// Bad parameter (zero window size, embedded NUL in a path, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Fatal conditions that abort the relay worker.
///
/// These are surfaced through the completion notification only; the worker
/// never raises them asynchronously. End of stream on any sub-channel is a
/// normal termination signal, not an error.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// poll() failed with something other than EINTR.
    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),

    /// poll() reported POLLERR or POLLNVAL on a descriptor.
    #[error("poll reported error condition {revents:#06x} on the {role}")]
    Device {
        /// Which descriptor misbehaved.
        role: &'static str,
        /// The offending revents bits.
        revents: i16,
    },

    /// The worker thread died without reporting a status.
    #[error("relay worker terminated without reporting a status")]
    Vanished,
}
