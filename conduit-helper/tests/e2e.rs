//! End-to-end tests: real children on the PTY slave, spawned through the
//! conduit-helper binary, with the relay carrying both byte streams.
//!
//! The parent puts the child into a fresh session in `pre_exec`; the helper
//! then acquires the slave on stdin as the controlling terminal and execs
//! the command, exactly as a shell-spawning host would use this library.

use std::io::ErrorKind;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use conduit_pty::{
    attach_io_channels, get_window_size, open_pty, set_window_size, PtyError, PtyPair, WindowSize,
    POLL_TIMEOUT_MS,
};

const HELPER: &str = env!("CARGO_BIN_EXE_conduit-helper");

fn set_raw(fd: RawFd) {
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        assert_eq!(libc::tcgetattr(fd, &mut termios), 0);
        libc::cfmakeraw(&mut termios);
        assert_eq!(libc::tcsetattr(fd, libc::TCSANOW, &termios), 0);
    }
}

/// Canonical mode with echo, newline expansion on output, no input mangling.
fn set_echo_canonical(fd: RawFd) {
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        assert_eq!(libc::tcgetattr(fd, &mut termios), 0);
        termios.c_iflag = 0;
        termios.c_oflag = libc::OPOST | libc::ONLCR;
        termios.c_lflag = libc::ICANON | libc::ECHO;
        assert_eq!(libc::tcsetattr(fd, libc::TCSANOW, &termios), 0);
    }
}

/// Spawn `cmd` through the helper with the slave as its stdio. The child is
/// made a session leader first so the helper can claim the terminal.
fn spawn_on_slave(pty: &PtyPair, cmd: &[&str]) -> Child {
    let stdin = pty.slave.as_fd().try_clone_to_owned().unwrap();
    let stdout = pty.slave.as_fd().try_clone_to_owned().unwrap();
    let stderr = pty.slave.as_fd().try_clone_to_owned().unwrap();

    let mut command = Command::new(HELPER);
    command
        .args(cmd)
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
    command.spawn().expect("failed to spawn child via helper")
}

fn await_readable(fd: BorrowedFd<'_>, timeout: Duration) -> bool {
    let mut pfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    unsafe { libc::poll(&mut pfd, 1, timeout.as_millis() as libc::c_int) > 0 }
}

fn write_all(fd: &OwnedFd, mut data: &[u8]) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !data.is_empty() {
        assert!(Instant::now() < deadline, "write stalled");
        let n = unsafe {
            libc::write(
                fd.as_raw_fd(),
                data.as_ptr() as *const libc::c_void,
                data.len(),
            )
        };
        if n >= 0 {
            data = &data[n as usize..];
            continue;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::WouldBlock {
            let mut pfd = libc::pollfd {
                fd: fd.as_raw_fd(),
                events: libc::POLLOUT,
                revents: 0,
            };
            unsafe { libc::poll(&mut pfd, 1, 100) };
        } else {
            panic!("write failed: {err}");
        }
    }
}

fn read_exact(fd: &OwnedFd, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut buf = [0u8; 4096];
    let deadline = Instant::now() + Duration::from_secs(10);
    while out.len() < len {
        assert!(
            Instant::now() < deadline,
            "read stalled after {} of {len} bytes",
            out.len()
        );
        let want = buf.len().min(len - out.len());
        let n = unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, want) };
        if n > 0 {
            out.extend_from_slice(&buf[..n as usize]);
            continue;
        }
        if n == 0 {
            panic!("unexpected end of stream after {} bytes", out.len());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::WouldBlock {
            await_readable(fd.as_fd(), Duration::from_millis(100));
        } else {
            panic!("read failed: {err}");
        }
    }
    out
}

fn read_to_eof(fd: &OwnedFd) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        assert!(
            Instant::now() < deadline,
            "no end of stream after {} bytes",
            out.len()
        );
        let n = unsafe {
            libc::read(
                fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n > 0 {
            out.extend_from_slice(&buf[..n as usize]);
            continue;
        }
        if n == 0 {
            return out;
        }
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::WouldBlock {
            await_readable(fd.as_fd(), Duration::from_millis(100));
        } else {
            panic!("read failed: {err}");
        }
    }
}

#[test]
fn cat_round_trip_raw() {
    let pty = open_pty(WindowSize::default()).unwrap();
    set_raw(pty.slave.as_raw_fd());
    let mut child = spawn_on_slave(&pty, &["cat"]);
    let PtyPair { master, slave, .. } = pty;
    drop(slave);

    let (channels, handle) = attach_io_channels(master).unwrap();
    write_all(&channels.write, b"hello\n");
    let got = read_exact(&channels.read, 6);
    assert_eq!(got, b"hello\n".to_vec());

    child.kill().unwrap();
    child.wait().unwrap();
    drop(channels);
    handle.wait().unwrap();
}

#[test]
fn cat_round_trip_with_echo() {
    let pty = open_pty(WindowSize::default()).unwrap();
    set_echo_canonical(pty.slave.as_raw_fd());
    let mut child = spawn_on_slave(&pty, &["cat"]);
    let PtyPair { master, slave, .. } = pty;
    drop(slave);

    let (channels, handle) = attach_io_channels(master).unwrap();
    write_all(&channels.write, b"hello\n");
    // the echo comes first (emitted at input time), then cat's copy; ONLCR
    // expands both newlines
    let got = read_exact(&channels.read, 14);
    assert_eq!(got, b"hello\r\nhello\r\n".to_vec());

    // VEOF ends cat normally, which hangs up the master
    write_all(&channels.write, b"\x04");
    assert_eq!(read_to_eof(&channels.read), Vec::<u8>::new());
    let status = child.wait().unwrap();
    assert!(status.success());

    drop(channels);
    handle.wait().unwrap();
}

#[test]
fn trailing_bytes_after_exit() {
    let pty = open_pty(WindowSize::default()).unwrap();
    let mut child = spawn_on_slave(&pty, &["sh", "-c", "printf done"]);
    let PtyPair { master, slave, .. } = pty;
    drop(slave);

    let (channels, handle) = attach_io_channels(master).unwrap();
    let got = read_to_eof(&channels.read);
    assert_eq!(got, b"done".to_vec());

    let status = child.wait().unwrap();
    assert!(status.success());
    drop(channels);
    handle.wait().unwrap();
}

#[test]
fn large_transfer_through_cat() {
    let pty = open_pty(WindowSize::default()).unwrap();
    set_raw(pty.slave.as_raw_fd());
    let mut child = spawn_on_slave(&pty, &["cat"]);
    let PtyPair { master, slave, .. } = pty;
    drop(slave);

    let (channels, handle) = attach_io_channels(master).unwrap();
    let payload = vec![0u8; 1024 * 1024];
    let write_fd = channels.write;
    let read_fd = channels.read;

    let start = Instant::now();
    let feeder = {
        let payload = payload.clone();
        thread::spawn(move || write_all(&write_fd, &payload))
    };
    let got = read_exact(&read_fd, payload.len());
    feeder.join().unwrap();
    assert!(
        start.elapsed() < Duration::from_secs(10),
        "transfer took {:?}",
        start.elapsed()
    );
    assert_eq!(got, payload);

    child.kill().unwrap();
    child.wait().unwrap();
    drop(read_fd);
    handle.wait().unwrap();
}

#[test]
fn host_close_fires_completion() {
    let pty = open_pty(WindowSize::default()).unwrap();
    let mut child = spawn_on_slave(&pty, &["sleep", "60"]);
    let PtyPair { master, slave, .. } = pty;
    drop(slave);

    let (channels, handle) = attach_io_channels(master).unwrap();
    drop(channels);

    let start = Instant::now();
    handle.wait().unwrap();
    let bound = Duration::from_millis(2 * POLL_TIMEOUT_MS as u64 + 500);
    assert!(
        start.elapsed() < bound,
        "completion took {:?}",
        start.elapsed()
    );

    child.kill().unwrap();
    child.wait().unwrap();
}

#[test]
fn window_resize_round_trip_while_running() {
    let pty = open_pty(WindowSize::default()).unwrap();
    set_raw(pty.slave.as_raw_fd());
    let mut child = spawn_on_slave(&pty, &["cat"]);

    let echoed = set_window_size(pty.master.as_raw_fd(), WindowSize::new(132, 40)).unwrap();
    assert_eq!(echoed, WindowSize::new(132, 40));
    assert_eq!(
        get_window_size(pty.master.as_raw_fd()).unwrap(),
        WindowSize::new(132, 40)
    );

    child.kill().unwrap();
    child.wait().unwrap();
}

#[test]
fn bad_fd_does_not_disturb_a_running_relay() {
    let pty = open_pty(WindowSize::default()).unwrap();
    set_raw(pty.slave.as_raw_fd());
    let mut child = spawn_on_slave(&pty, &["cat"]);
    let PtyPair { master, slave, .. } = pty;
    drop(slave);

    let (channels, handle) = attach_io_channels(master).unwrap();

    match get_window_size(-1) {
        Err(PtyError::WindowSize(err)) => assert_eq!(err.raw_os_error(), Some(libc::EBADF)),
        other => panic!("expected WindowSize error, got {other:?}"),
    }

    // the relay is unimpressed
    write_all(&channels.write, b"ping\n");
    assert_eq!(read_exact(&channels.read, 5), b"ping\n".to_vec());

    child.kill().unwrap();
    child.wait().unwrap();
    drop(channels);
    handle.wait().unwrap();
}

#[test]
fn helper_requires_a_command() {
    let status = Command::new(HELPER)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

#[test]
fn helper_reports_exec_errno() {
    let pty = open_pty(WindowSize::default()).unwrap();
    let mut child = spawn_on_slave(&pty, &["/nonexistent/definitely-not-a-command"]);
    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(libc::ENOENT));
}

#[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
#[test]
fn helper_fails_without_a_terminal() {
    let mut command = Command::new(HELPER);
    command
        .arg("true")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
    let status = command.spawn().unwrap().wait().unwrap();
    assert_eq!(status.code(), Some(255));
}
