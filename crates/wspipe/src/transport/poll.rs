//! Bounded readiness wait on the connection socket.

use std::io;
use std::net::TcpStream;
use std::time::Duration;

/// Socket readiness observed by [`wait`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct Readiness {
    pub(super) readable: bool,
    pub(super) writable: bool,
}

/// Blocks for at most `timeout` until the socket is readable, or writable
/// when `want_write` is set.
///
/// Hang-ups and socket errors are reported as readable so the caller's next
/// read surfaces the condition.
#[cfg(unix)]
pub(super) fn wait(stream: &TcpStream, want_write: bool, timeout: Duration) -> io::Result<Readiness> {
    use std::os::fd::AsRawFd;

    let mut events = libc::POLLIN;
    if want_write {
        events |= libc::POLLOUT;
    }
    let mut descriptor = libc::pollfd {
        fd: stream.as_raw_fd(),
        events,
        revents: 0,
    };
    let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    // SAFETY: `descriptor` is a single initialised `pollfd` that outlives the call.
    let rc = unsafe { libc::poll(&raw mut descriptor, 1, timeout_ms) };
    if rc < 0 {
        let error = io::Error::last_os_error();
        if error.kind() == io::ErrorKind::Interrupted {
            return Ok(Readiness::default());
        }
        return Err(error);
    }

    let revents = descriptor.revents;
    let failed = revents & (libc::POLLHUP | libc::POLLERR) != 0;
    Ok(Readiness {
        readable: failed || revents & libc::POLLIN != 0,
        writable: revents & libc::POLLOUT != 0,
    })
}

/// Portable fallback: sleeps briefly and lets non-blocking IO decide.
#[cfg(not(unix))]
pub(super) fn wait(_stream: &TcpStream, want_write: bool, timeout: Duration) -> io::Result<Readiness> {
    const FALLBACK_TICK: Duration = Duration::from_millis(10);

    if !want_write {
        std::thread::sleep(timeout.min(FALLBACK_TICK));
    }
    Ok(Readiness {
        readable: true,
        writable: want_write,
    })
}
