//! Linux PTY implementation.

use std::ffi::CStr;
use std::io;
use std::os::fd::RawFd;
use std::path::PathBuf;

use crate::error::PtyError;

/// Resolve the slave device path with the reentrant ptsname variant.
pub(crate) fn slave_name(fd: RawFd) -> Result<PathBuf, PtyError> {
    let mut buf = [0 as libc::c_char; 128];
    let ret = unsafe { libc::ptsname_r(fd, buf.as_mut_ptr(), buf.len()) };
    if ret != 0 {
        return Err(PtyError::SlaveName(io::Error::from_raw_os_error(ret)));
    }
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}

/// Make the terminal on `fd` the controlling terminal of this process.
/// The caller must be a session leader.
pub(crate) fn set_controlling_terminal(fd: RawFd) -> Result<(), PtyError> {
    let ret = unsafe { libc::ioctl(fd, libc::TIOCSCTTY as libc::c_ulong, 0 as libc::c_int) };
    if ret != 0 {
        return Err(PtyError::ControllingTerminal(io::Error::last_os_error()));
    }
    Ok(())
}

/// Linux ptys carry terminal semantics natively; nothing to push.
pub(crate) fn load_stream_modules(_fd: RawFd) -> Result<(), PtyError> {
    Ok(())
}
