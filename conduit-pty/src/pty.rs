//! PTY primitives.
//!
//! Thin synchronous wrappers over the pseudo-terminal syscalls. The opening
//! discipline is allocate, grant, unlock, open slave, then (on Solaris) load
//! the STREAMS modules; [`open_pty`] runs the whole sequence.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::error::PtyError;
use crate::fd;
use crate::platform;
use crate::types::{PtyMaster, PtyPair, PtySlave, WindowSize};

/// Allocate a new PTY master.
///
/// The descriptor is configured non-blocking and close-on-exec before it is
/// returned.
pub fn open_master() -> Result<PtyMaster, PtyError> {
    let raw = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
    if raw < 0 {
        return Err(PtyError::Open(io::Error::last_os_error()));
    }
    let master = unsafe { PtyMaster::from_raw_fd(raw) };
    fd::set_nonblocking(raw)?;
    fd::set_cloexec(raw)?;
    Ok(master)
}

/// Change ownership and permissions of the slave side.
pub fn grant(master: &PtyMaster) -> Result<(), PtyError> {
    if unsafe { libc::grantpt(master.as_raw_fd()) } != 0 {
        return Err(PtyError::Grant(io::Error::last_os_error()));
    }
    Ok(())
}

/// Clear the slave lock.
pub fn unlock(master: &PtyMaster) -> Result<(), PtyError> {
    if unsafe { libc::unlockpt(master.as_raw_fd()) } != 0 {
        return Err(PtyError::Unlock(io::Error::last_os_error()));
    }
    Ok(())
}

/// Path of the slave device belonging to `master`.
pub fn slave_name(master: &PtyMaster) -> Result<PathBuf, PtyError> {
    platform::slave_name(master.as_raw_fd())
}

/// Open the slave device at `path`.
pub fn open_slave(path: &Path) -> Result<PtySlave, PtyError> {
    let cpath = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| PtyError::InvalidArgument(e.to_string()))?;
    let raw = unsafe { libc::open(cpath.as_ptr(), libc::O_RDWR | libc::O_NOCTTY) };
    if raw < 0 {
        return Err(PtyError::OpenSlave(io::Error::last_os_error()));
    }
    Ok(unsafe { PtySlave::from_raw_fd(raw) })
}

/// Read the window size of the terminal on `fd`.
pub fn get_window_size(fd: RawFd) -> Result<WindowSize, PtyError> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ as libc::c_ulong, &mut ws) } != 0 {
        return Err(PtyError::WindowSize(io::Error::last_os_error()));
    }
    Ok(WindowSize::from_libc(ws))
}

/// Set the window size of the terminal on `fd`.
///
/// Returns the size read back from the terminal, so callers observe the
/// effective values. Zero columns or rows are rejected.
pub fn set_window_size(fd: RawFd, size: WindowSize) -> Result<WindowSize, PtyError> {
    if size.cols == 0 || size.rows == 0 {
        return Err(PtyError::InvalidArgument(
            "cols and rows must be greater than 0".into(),
        ));
    }
    let ws = size.to_libc();
    if unsafe { libc::ioctl(fd, libc::TIOCSWINSZ as libc::c_ulong, &ws) } != 0 {
        return Err(PtyError::WindowSize(io::Error::last_os_error()));
    }
    get_window_size(fd)
}

/// Push the terminal STREAMS modules onto `fd` where the platform needs
/// them. A no-op elsewhere, and idempotent where it is not.
pub fn load_stream_modules(fd: RawFd) -> Result<(), PtyError> {
    platform::load_stream_modules(fd)
}

/// Make the terminal on `fd` the controlling terminal of this process.
///
/// The caller must already be a session leader.
pub fn set_controlling_terminal(fd: RawFd) -> Result<(), PtyError> {
    platform::set_controlling_terminal(fd)
}

/// Prepare a freshly forked child for life on the terminal at `fd`: start a
/// new session, acquire `fd` as the controlling terminal, and make it stdin,
/// stdout and stderr. `fd` is closed afterwards if it is not one of those.
pub fn login_tty(fd: RawFd) -> Result<(), PtyError> {
    if unsafe { libc::setsid() } < 0 {
        return Err(PtyError::Session(io::Error::last_os_error()));
    }
    platform::set_controlling_terminal(fd)?;
    for stdio in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        if unsafe { libc::dup2(fd, stdio) } < 0 {
            return Err(PtyError::Dup(io::Error::last_os_error()));
        }
    }
    if fd > libc::STDERR_FILENO {
        unsafe { libc::close(fd) };
    }
    Ok(())
}

/// Open a complete pseudo-terminal with the given initial window size:
/// allocate the master, grant and unlock the slave side, open one slave
/// descriptor, load the STREAMS modules where needed, and set the size.
pub fn open_pty(size: WindowSize) -> Result<PtyPair, PtyError> {
    let master = open_master()?;
    grant(&master)?;
    unlock(&master)?;
    let slave_path = slave_name(&master)?;
    let slave = open_slave(&slave_path)?;
    load_stream_modules(slave.as_raw_fd())?;
    set_window_size(master.as_raw_fd(), size)?;
    Ok(PtyPair {
        master,
        slave,
        slave_path,
    })
}
