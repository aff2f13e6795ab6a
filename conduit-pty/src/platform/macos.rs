//! macOS PTY implementation.

use std::ffi::CStr;
use std::io;
use std::os::fd::RawFd;
use std::path::PathBuf;

use crate::error::PtyError;

// TIOCSCTTY is not in libc for macOS, define it ourselves.
// From sys/ttycom.h: #define TIOCSCTTY _IO('t', 97)
const TIOCSCTTY: libc::c_ulong = 0x20007461;

/// Resolve the slave device path via the TIOCPTYGNAME ioctl, which is
/// reentrant unlike ptsname(3).
pub(crate) fn slave_name(fd: RawFd) -> Result<PathBuf, PtyError> {
    // TIOCPTYGNAME copies out at most 128 bytes (sys/ttycom.h).
    let mut buf = [0 as libc::c_char; 128];
    let ret = unsafe { libc::ioctl(fd, libc::TIOCPTYGNAME as libc::c_ulong, buf.as_mut_ptr()) };
    if ret != 0 {
        return Err(PtyError::SlaveName(io::Error::last_os_error()));
    }
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}

/// Make the terminal on `fd` the controlling terminal of this process.
/// The caller must be a session leader.
pub(crate) fn set_controlling_terminal(fd: RawFd) -> Result<(), PtyError> {
    let ret = unsafe { libc::ioctl(fd, TIOCSCTTY, 0 as libc::c_int) };
    if ret != 0 {
        return Err(PtyError::ControllingTerminal(io::Error::last_os_error()));
    }
    Ok(())
}

/// macOS ptys carry terminal semantics natively; nothing to push.
pub(crate) fn load_stream_modules(_fd: RawFd) -> Result<(), PtyError> {
    Ok(())
}
