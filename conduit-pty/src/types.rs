//! Core types.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

/// Terminal window size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl WindowSize {
    /// Create a new window size.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Convert to the libc winsize struct.
    pub(crate) fn to_libc(self) -> libc::winsize {
        libc::winsize {
            ws_row: self.rows,
            ws_col: self.cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        }
    }

    pub(crate) fn from_libc(ws: libc::winsize) -> Self {
        Self {
            cols: ws.ws_col,
            rows: ws.ws_row,
        }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

/// The master end of a pseudo-terminal.
///
/// Handing a master to [`crate::attach_io_channels`] transfers ownership into
/// the relay worker, which closes it when it terminates.
#[derive(Debug)]
pub struct PtyMaster(OwnedFd);

impl PtyMaster {
    /// Create from a raw file descriptor.
    ///
    /// # Safety
    /// The fd must be a valid, open file descriptor that the caller owns.
    pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self(OwnedFd::from_raw_fd(fd))
    }

    /// Give up the wrapper and take the underlying descriptor.
    pub fn into_inner(self) -> OwnedFd {
        self.0
    }
}

impl AsRawFd for PtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl AsFd for PtyMaster {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

/// The slave end of a pseudo-terminal, used as the child's controlling
/// terminal.
///
/// The slave side may be opened any number of times across processes; the
/// master hang-up only fires once the last slave descriptor is closed.
#[derive(Debug)]
pub struct PtySlave(OwnedFd);

impl PtySlave {
    /// Create from a raw file descriptor.
    ///
    /// # Safety
    /// The fd must be a valid, open file descriptor that the caller owns.
    pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self(OwnedFd::from_raw_fd(fd))
    }

    /// Give up the wrapper and take the underlying descriptor.
    pub fn into_inner(self) -> OwnedFd {
        self.0
    }
}

impl AsRawFd for PtySlave {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl AsFd for PtySlave {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

/// A freshly opened pseudo-terminal: master, one slave descriptor, and the
/// slave device path for opening further slaves.
#[derive(Debug)]
pub struct PtyPair {
    pub master: PtyMaster,
    pub slave: PtySlave,
    pub slave_path: PathBuf,
}
