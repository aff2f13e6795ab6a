//! File-descriptor flag utilities and raw read/write/pipe plumbing.

use std::io;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use crate::error::PtyError;

/// Set `O_NONBLOCK` on a descriptor, keeping the other status flags.
pub fn set_nonblocking(fd: RawFd) -> Result<(), PtyError> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(PtyError::FdFlags(io::Error::last_os_error()));
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(PtyError::FdFlags(io::Error::last_os_error()));
    }
    Ok(())
}

/// Set `FD_CLOEXEC` on a descriptor, keeping the other descriptor flags.
pub fn set_cloexec(fd: RawFd) -> Result<(), PtyError> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(PtyError::FdFlags(io::Error::last_os_error()));
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(PtyError::FdFlags(io::Error::last_os_error()));
    }
    Ok(())
}

/// Create a pipe with both ends non-blocking and close-on-exec.
///
/// Returns `(read, write)`.
pub(crate) fn pipe() -> Result<(OwnedFd, OwnedFd), PtyError> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(PtyError::Pipe(io::Error::last_os_error()));
    }
    let read = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    for fd in fds {
        set_nonblocking(fd)?;
        set_cloexec(fd)?;
    }
    Ok((read, write))
}

/// Read into `buf`, reporting the raw OS error on failure.
pub(crate) fn read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Write from `buf`, reporting the raw OS error on failure.
pub(crate) fn write(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    let n = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::AsRawFd;

    use super::*;

    #[test]
    fn pipe_ends_are_nonblocking_and_cloexec() {
        let (r, w) = pipe().unwrap();
        for fd in [r.as_raw_fd(), w.as_raw_fd()] {
            let status = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            assert!(status >= 0);
            assert!(status & libc::O_NONBLOCK != 0);
            let desc = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert!(desc >= 0);
            assert!(desc & libc::FD_CLOEXEC != 0);
        }
    }

    #[test]
    fn pipe_transfers_bytes() {
        let (r, w) = pipe().unwrap();
        assert_eq!(write(w.as_raw_fd(), b"ping").unwrap(), 4);
        let mut buf = [0u8; 8];
        assert_eq!(read(r.as_raw_fd(), &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ping".as_slice());
    }

    #[test]
    fn flag_setters_reject_bad_fd() {
        match set_nonblocking(-1) {
            Err(PtyError::FdFlags(err)) => assert_eq!(err.raw_os_error(), Some(libc::EBADF)),
            other => panic!("expected FdFlags error, got {other:?}"),
        }
        match set_cloexec(-1) {
            Err(PtyError::FdFlags(err)) => assert_eq!(err.raw_os_error(), Some(libc::EBADF)),
            other => panic!("expected FdFlags error, got {other:?}"),
        }
    }
}
