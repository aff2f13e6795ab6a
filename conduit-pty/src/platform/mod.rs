//! Platform-specific PTY pieces: slave-name resolution, the
//! controlling-terminal ioctl, and the Solaris STREAMS module push.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub(crate) use linux::{load_stream_modules, set_controlling_terminal, slave_name};

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub(crate) use macos::{load_stream_modules, set_controlling_terminal, slave_name};

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
mod solaris;
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub(crate) use solaris::{load_stream_modules, set_controlling_terminal, slave_name};
