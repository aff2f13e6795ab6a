//! The relay engine: a poll-driven worker bridging one PTY master to a pair
//! of host-visible pipes.
//!
//! Four sub-channels share one poll set of three descriptors:
//!
//! | sub-channel  | reads from    | writes to     |
//! |--------------|---------------|---------------|
//! | master-read  | pty master    | outbound FIFO |
//! | host-write   | outbound FIFO | output pipe   |
//! | host-read    | input pipe    | inbound FIFO  |
//! | master-write | inbound FIFO  | pty master    |
//!
//! The FIFOs decouple read readiness from write readiness on each direction,
//! so a slow consumer never stalls the producer within one poll cycle.
//!
//! Hang-up on the master is the subtle part: `POLLHUP` there only means that
//! every slave descriptor has been closed, while the kernel may still hold
//! unread child output. Reading continues as long as `POLLHUP` arrives
//! together with `POLLIN`; only a `POLLHUP` without `POLLIN` ends the read
//! side. Descriptors that can no longer make progress are presented to poll
//! as `-1`, since Linux keeps reporting `POLLHUP` forever and the loop would
//! otherwise spin at 100% CPU.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd};

use crate::error::RelayError;
use crate::fd;
use crate::fifo::ByteFifo;

/// Size of one FIFO buffer slot.
pub const BUF_SIZE: usize = 16 * 1024;

/// Slots per FIFO.
pub const FIFO_SLOTS: usize = 4;

/// Upper bound on one blocking poll. This also bounds how late the worker
/// notices a termination condition that no readiness event announces.
pub const POLL_TIMEOUT_MS: i32 = 100;

/// Work-phase iterations between polls. The cap forces a return to poll so
/// the worker stays responsive to remote closures during long bursts.
const PUMP_CAP: usize = 2 * FIFO_SLOTS;

const MASTER: usize = 0;
const WRITER: usize = 1;
const READER: usize = 2;

/// Progress flags of one sub-channel.
#[derive(Default)]
struct Gate {
    /// No progress possible until the next readiness indication.
    blocked: bool,
    /// End of stream reached or failed; never cleared.
    closed: bool,
}

impl Gate {
    fn open(&self) -> bool {
        !self.closed && !self.blocked
    }

    /// Mark the sub-channel dead. A closed channel counts as blocked too.
    fn close(&mut self) {
        self.closed = true;
        self.blocked = true;
    }
}

/// Classify a failed sub-channel syscall: `EAGAIN` blocks the channel until
/// the next readiness indication, `EINTR` is retried on the next pump
/// iteration, anything else (EOF-like errors such as `EIO` included) closes
/// the channel.
fn fail(gate: &mut Gate, err: io::Error, role: &'static str) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        gate.blocked = true;
    } else if err.kind() != io::ErrorKind::Interrupted {
        tracing::trace!("{role}: {err}");
        gate.close();
    }
    false
}

/// One relay worker's entire state. Owned exclusively by the worker thread
/// after construction; every descriptor in here is closed when the value
/// drops on worker exit.
pub(crate) struct Relay {
    /// The PTY master.
    master: OwnedFd,
    /// Read end of the host-to-master pipe.
    reader: OwnedFd,
    /// Write end of the master-to-host pipe.
    writer: OwnedFd,
    /// master-read -> host-write
    outbound: ByteFifo,
    /// host-read -> master-write
    inbound: ByteFifo,
    master_read: Gate,
    master_write: Gate,
    host_read: Gate,
    host_write: Gate,
}

impl Relay {
    pub(crate) fn new(master: OwnedFd, reader: OwnedFd, writer: OwnedFd) -> Self {
        Self {
            master,
            reader,
            writer,
            outbound: ByteFifo::new(FIFO_SLOTS, BUF_SIZE),
            inbound: ByteFifo::new(FIFO_SLOTS, BUF_SIZE),
            master_read: Gate::default(),
            master_write: Gate::default(),
            host_read: Gate::default(),
            host_write: Gate::default(),
        }
    }

    /// Drive all four sub-channels until a termination predicate holds.
    pub(crate) fn run(&mut self) -> Result<(), RelayError> {
        tracing::debug!(master = self.master.as_raw_fd(), "relay worker running");
        loop {
            if self.finished() {
                tracing::debug!(master = self.master.as_raw_fd(), "relay worker done");
                return Ok(());
            }

            let mut fds = self.poll_set();
            let ready = loop {
                let n = unsafe {
                    libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, POLL_TIMEOUT_MS)
                };
                if n >= 0 {
                    break n;
                }
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    tracing::error!("relay poll failed: {err}");
                    return Err(RelayError::Poll(err));
                }
            };
            if ready == 0 {
                // timed out; re-evaluate the termination predicates
                continue;
            }

            self.apply_revents(&fds)?;
            self.pump();
        }
    }

    /// Termination predicates, evaluated before each poll.
    fn finished(&self) -> bool {
        // Both host-facing ends of the output direction are dead.
        if self.host_write.closed && self.master_read.closed {
            return true;
        }
        // No more child output can arrive or is waiting to be delivered.
        if self.master_read.closed && self.outbound.is_empty() {
            return true;
        }
        // The host sends nothing more, nothing pushable is left, and the
        // host is not consuming either. Input that can never reach a
        // hung-up master counts as drained, or the worker would idle
        // forever on it.
        let inbound_spent = self.inbound.is_empty() || self.master_write.closed;
        if self.host_read.closed && self.host_write.closed && inbound_spent {
            return true;
        }
        false
    }

    /// Build the poll set. Exhausted descriptors are presented as `-1` so
    /// the kernel cannot wedge the poll into a permanent `POLLHUP`.
    fn poll_set(&self) -> [libc::pollfd; 3] {
        let mut fds = [libc::pollfd {
            fd: -1,
            events: 0,
            revents: 0,
        }; 3];

        // A hung-up master reports POLLHUP on every poll whether or not any
        // event was requested; once the outbound FIFO has no room to read
        // into, keeping it in the set would spin. It comes back as soon as
        // a slot frees up.
        let master_spent =
            self.master_read.closed || (self.master_write.closed && self.outbound.is_full());
        if !master_spent {
            fds[MASTER].fd = self.master.as_raw_fd();
            if !self.outbound.is_full() {
                fds[MASTER].events = libc::POLLIN;
            }
            if !self.master_write.closed && !self.inbound.is_empty() {
                fds[MASTER].events |= libc::POLLOUT;
            }
        }

        if !self.host_write.closed {
            // Even with nothing to flush the fd stays in the set, so a host
            // that dropped its read end is noticed without waiting for data.
            fds[WRITER].fd = self.writer.as_raw_fd();
            if !self.outbound.is_empty() {
                fds[WRITER].events = libc::POLLOUT;
            }
        }

        // The input pipe leaves the set while the inbound FIFO is full: a
        // host hang-up would be re-reported on every poll, and nothing can
        // be done about it before there is room to drain the pipe anyway.
        if !self.host_read.closed && !self.inbound.is_full() {
            fds[READER].fd = self.reader.as_raw_fd();
            fds[READER].events = libc::POLLIN;
        }

        fds
    }

    /// Fold one poll result into the sub-channel gates.
    fn apply_revents(&mut self, fds: &[libc::pollfd; 3]) -> Result<(), RelayError> {
        let revents = fds[MASTER].revents;
        if revents & (libc::POLLNVAL | libc::POLLERR) != 0 {
            tracing::error!("fatal poll condition on the pty master: revents={revents:#06x}");
            return Err(RelayError::Device {
                role: "pty master",
                revents,
            });
        }
        if revents & libc::POLLHUP != 0 {
            // Every slave descriptor is gone, so no byte written to the
            // master will ever be read again. Output may still be buffered:
            // the read side stays open until POLLHUP arrives without
            // POLLIN. Absent POLLIN only counts when it was requested, or a
            // full FIFO would be mistaken for a drained master.
            self.master_write.close();
            if fds[MASTER].events & libc::POLLIN != 0 && revents & libc::POLLIN == 0 {
                tracing::debug!("pty master drained after hang-up");
                self.master_read.close();
            }
        }
        if revents & libc::POLLIN != 0 {
            self.master_read.blocked = false;
        }
        if revents & libc::POLLOUT != 0 {
            self.master_write.blocked = false;
        }

        let revents = fds[WRITER].revents;
        if revents & libc::POLLNVAL != 0 {
            return Err(RelayError::Device {
                role: "output pipe",
                revents,
            });
        }
        // A pipe whose read end is gone shows POLLERR on Linux and POLLHUP
        // on the BSDs; either way the host dropped its read end.
        if revents & (libc::POLLERR | libc::POLLHUP) != 0 {
            self.host_write.close();
        }
        if revents & libc::POLLOUT != 0 {
            self.host_write.blocked = false;
        }

        let revents = fds[READER].revents;
        if revents & (libc::POLLNVAL | libc::POLLERR) != 0 {
            return Err(RelayError::Device {
                role: "input pipe",
                revents,
            });
        }
        if revents & libc::POLLHUP != 0 && revents & libc::POLLIN == 0 {
            // host closed its write end and the pipe is drained
            self.host_read.close();
        }
        if revents & libc::POLLIN != 0 {
            self.host_read.blocked = false;
        }

        Ok(())
    }

    /// Work phase: move bytes until every sub-channel is stuck or the
    /// iteration cap sends us back to poll.
    fn pump(&mut self) {
        for _ in 0..PUMP_CAP {
            let mut progress = false;
            progress |= self.pump_master_read();
            progress |= self.pump_host_write();
            progress |= self.pump_host_read();
            progress |= self.pump_master_write();
            if !progress {
                break;
            }
        }
    }

    /// master -> outbound FIFO.
    fn pump_master_read(&mut self) -> bool {
        if !self.master_read.open() {
            return false;
        }
        let Some(slot) = self.outbound.push_slot() else {
            return false;
        };
        match fd::read(self.master.as_raw_fd(), slot.buf_mut()) {
            Ok(0) => {
                self.master_read.close();
                false
            }
            Ok(n) => {
                slot.fill(n);
                self.outbound.commit_push();
                true
            }
            Err(err) => fail(&mut self.master_read, err, "read from pty master"),
        }
    }

    /// outbound FIFO -> output pipe.
    fn pump_host_write(&mut self) -> bool {
        if !self.host_write.open() {
            return false;
        }
        let Some(slot) = self.outbound.pop_slot() else {
            return false;
        };
        match fd::write(self.writer.as_raw_fd(), slot.pending()) {
            Ok(n) => {
                slot.consume(n);
                if slot.is_drained() {
                    self.outbound.commit_pop();
                } else {
                    // short write: the pipe is full, wait for POLLOUT
                    self.host_write.blocked = true;
                }
                true
            }
            Err(err) => fail(&mut self.host_write, err, "write to output pipe"),
        }
    }

    /// input pipe -> inbound FIFO.
    fn pump_host_read(&mut self) -> bool {
        if !self.host_read.open() {
            return false;
        }
        let Some(slot) = self.inbound.push_slot() else {
            return false;
        };
        match fd::read(self.reader.as_raw_fd(), slot.buf_mut()) {
            Ok(0) => {
                self.host_read.close();
                false
            }
            Ok(n) => {
                slot.fill(n);
                self.inbound.commit_push();
                true
            }
            Err(err) => fail(&mut self.host_read, err, "read from input pipe"),
        }
    }

    /// inbound FIFO -> master.
    fn pump_master_write(&mut self) -> bool {
        if !self.master_write.open() {
            return false;
        }
        let Some(slot) = self.inbound.pop_slot() else {
            return false;
        };
        match fd::write(self.master.as_raw_fd(), slot.pending()) {
            Ok(n) => {
                slot.consume(n);
                if slot.is_drained() {
                    self.inbound.commit_pop();
                } else {
                    self.master_write.blocked = true;
                }
                true
            }
            Err(err) => fail(&mut self.master_write, err, "write to pty master"),
        }
    }
}
