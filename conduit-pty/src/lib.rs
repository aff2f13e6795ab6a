//! PTY handling for conduit.
//!
//! This crate opens pseudo-terminal devices and bridges the duplex master
//! descriptor onto two plain byte pipes, so a host process can read child
//! output and write input as ordinary non-blocking streams. A dedicated
//! worker thread drives the master and both pipes through one poll set,
//! handling backpressure, partial writes and the platform quirks of PTY
//! hang-up in one place; output a child produced just before exiting is
//! drained in full before the read pipe reports end of stream.
//!
//! # Example
//!
//! ```no_run
//! use conduit_pty::{attach_io_channels, open_pty, WindowSize};
//!
//! let pty = open_pty(WindowSize::default()).unwrap();
//! // Spawn a child on `pty.slave` (e.g. through the conduit-helper
//! // binary), then wire up the byte pipes:
//! let (channels, handle) = attach_io_channels(pty.master).unwrap();
//! // `channels.read` yields the child's output, `channels.write` feeds it;
//! // `handle` reports when the relay has wound down.
//! ```
//!
//! Process spawning and reaping stay with the caller. The `conduit-helper`
//! binary turns a freshly spawned child into the session leader on the
//! slave before exec; [`login_tty`] does the same for callers that fork
//! themselves.

mod error;
mod fd;
mod fifo;
mod platform;
mod pty;
mod relay;
mod supervisor;
mod types;

pub use error::{PtyError, RelayError};
pub use fd::{set_cloexec, set_nonblocking};
pub use pty::{
    get_window_size, grant, load_stream_modules, login_tty, open_master, open_pty, open_slave,
    set_controlling_terminal, set_window_size, slave_name, unlock,
};
pub use relay::{BUF_SIZE, FIFO_SLOTS, POLL_TIMEOUT_MS};
pub use supervisor::{attach_io_channels, IoChannels, RelayHandle};
pub use types::{PtyMaster, PtyPair, PtySlave, WindowSize};
