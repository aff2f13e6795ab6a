//! Solaris/illumos PTY implementation.
//!
//! A pty here is a STREAMS clone device; terminal semantics only exist once
//! the ptem, ldterm and ttcompat modules have been pushed onto the slave
//! stream. Size and termios state live in those modules and are lost when
//! the last slave closes, so callers reopening a slave must push again.

use std::ffi::CStr;
use std::io;
use std::os::fd::RawFd;
use std::path::PathBuf;

use crate::error::PtyError;

const PTEM: &[u8] = b"ptem\0";
const LDTERM: &[u8] = b"ldterm\0";
const TTCOMPAT: &[u8] = b"ttcompat\0";

/// Resolve the slave device path.
pub(crate) fn slave_name(fd: RawFd) -> Result<PathBuf, PtyError> {
    let name = unsafe { libc::ptsname(fd) };
    if name.is_null() {
        return Err(PtyError::SlaveName(io::Error::last_os_error()));
    }
    let name = unsafe { CStr::from_ptr(name) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}

/// There is no TIOCSCTTY: a session leader acquires the controlling terminal
/// by opening the slave without O_NOCTTY. Children prepared by the helper
/// get terminal semantics from the STREAMS modules instead.
pub(crate) fn set_controlling_terminal(_fd: RawFd) -> Result<(), PtyError> {
    Ok(())
}

/// Push ptem, ldterm and ttcompat onto the slave stream unless ldterm is
/// already there.
pub(crate) fn load_stream_modules(fd: RawFd) -> Result<(), PtyError> {
    let found = unsafe { libc::ioctl(fd, libc::I_FIND, LDTERM.as_ptr() as *const libc::c_char) };
    if found < 0 {
        return Err(PtyError::StreamModules(io::Error::last_os_error()));
    }
    if found > 0 {
        return Ok(());
    }
    for module in [PTEM, LDTERM, TTCOMPAT] {
        let ret = unsafe { libc::ioctl(fd, libc::I_PUSH, module.as_ptr() as *const libc::c_char) };
        if ret < 0 {
            return Err(PtyError::StreamModules(io::Error::last_os_error()));
        }
    }
    Ok(())
}
