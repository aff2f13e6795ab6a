//! Controlling-terminal prelude for PTY children.
//!
//! Invoked as `conduit-helper <cmd> [args…]` as the very first step of a
//! child whose stdin is a PTY slave: acquires the controlling terminal (or
//! loads the STREAMS terminal modules where that ioctl does not exist) and
//! execs the command vector verbatim. It never touches the byte streams.
//!
//! Exit codes: 1 when no command is given, 255 when the terminal cannot be
//! acquired, the errno of a failed exec otherwise. On success exec does not
//! return.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::process;

use conduit_pty::PtyError;

/// Claim the terminal on stdin.
#[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
fn prepare_terminal() -> Result<(), PtyError> {
    conduit_pty::set_controlling_terminal(libc::STDIN_FILENO)
}

/// No TIOCSCTTY here; terminal semantics come from the STREAMS modules.
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
fn prepare_terminal() -> Result<(), PtyError> {
    conduit_pty::load_stream_modules(libc::STDIN_FILENO)
}

fn main() {
    let args: Vec<CString> = std::env::args_os()
        .skip(1)
        .filter_map(|arg| CString::new(arg.as_bytes()).ok())
        .collect();
    if args.is_empty() {
        process::exit(1);
    }

    if prepare_terminal().is_err() {
        process::exit(255);
    }

    let mut argv: Vec<*const libc::c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
    argv.push(std::ptr::null());
    unsafe { libc::execvp(argv[0], argv.as_ptr()) };

    process::exit(std::io::Error::last_os_error().raw_os_error().unwrap_or(1));
}
