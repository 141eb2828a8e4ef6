//! Signal bridge: turns asynchronous signal delivery into values read from a
//! pipe by the main loop.
//!
//! The handler only copies the signal number into the write end of a
//! non-blocking pipe. Nothing in it allocates, locks, or calls back into the
//! playback or mixer libraries; all interpretation happens in the dispatcher
//! after [`SignalSource::try_recv`].

use std::fmt;
use std::io;
use std::mem;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

use libc::c_int;
use thiserror::Error;
use tracing::{debug, trace};

use crate::signal::Signal;

/// Write end of the live bridge, or -1. Read from signal context.
static WRITE_FD: AtomicI32 = AtomicI32::new(-1);

const SIGNAL_WIDTH: usize = mem::size_of::<c_int>();

extern "C" fn on_signal(signo: c_int) {
    let fd = WRITE_FD.load(Ordering::Relaxed);
    if fd < 0 {
        return;
    }

    let bytes = signo.to_ne_bytes();
    // SAFETY: write(2) and errno access are async-signal-safe; `bytes` lives
    // on this stack frame for the duration of the call.
    unsafe {
        let errno = libc::__errno_location();
        let saved = *errno;
        libc::write(fd, bytes.as_ptr().cast(), bytes.len());
        *errno = saved;
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to create signal channel: {0}")]
    Channel(#[source] io::Error),

    #[error("A signal bridge is already active in this process")]
    AlreadyActive,

    #[error("Failed to install handler for {signal}: {source}")]
    Install {
        signal: Signal,
        #[source]
        source: io::Error,
    },

    #[error("Failed to change the signal mask: {0}")]
    Mask(#[source] io::Error),
}

/// A set of signal numbers, used for handler installation and masking.
#[derive(Clone, Copy)]
pub struct SigSet(libc::sigset_t);

impl SigSet {
    pub fn empty() -> Self {
        // SAFETY: sigemptyset fully initializes the set.
        unsafe {
            let mut set = mem::zeroed::<libc::sigset_t>();
            libc::sigemptyset(&mut set);
            SigSet(set)
        }
    }

    pub fn from_signals<I: IntoIterator<Item = Signal>>(signals: I) -> Self {
        let mut set = Self::empty();
        for signal in signals {
            set.add(signal);
        }
        set
    }

    pub fn add(&mut self, signal: Signal) {
        // SAFETY: the set is initialized; invalid numbers only return EINVAL.
        unsafe {
            libc::sigaddset(&mut self.0, signal.as_raw());
        }
    }

    pub fn remove(&mut self, signal: Signal) {
        // SAFETY: as above.
        unsafe {
            libc::sigdelset(&mut self.0, signal.as_raw());
        }
    }

    pub fn contains(&self, signal: Signal) -> bool {
        // SAFETY: as above.
        unsafe { libc::sigismember(&self.0, signal.as_raw()) == 1 }
    }

    fn as_ptr(&self) -> *const libc::sigset_t {
        &self.0
    }
}

impl fmt::Debug for SigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries((1..32).map(Signal::from_raw).filter(|s| self.contains(*s)))
            .finish()
    }
}

fn change_mask(how: c_int, set: &SigSet) -> io::Result<()> {
    // SAFETY: `set` is a valid sigset_t; the old mask is not requested.
    let rc = unsafe { libc::pthread_sigmask(how, set.as_ptr(), ptr::null_mut()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(rc))
    }
}

/// Hold `set` back from delivery on the calling thread. Threads spawned
/// afterwards inherit the mask.
pub fn mask_block(set: &SigSet) -> io::Result<()> {
    change_mask(libc::SIG_BLOCK, set)
}

/// Release `set` for delivery; pending members are handled before this returns.
pub fn mask_unblock(set: &SigSet) -> io::Result<()> {
    change_mask(libc::SIG_UNBLOCK, set)
}

/// Where the dispatcher gets its signals from.
pub trait SignalSource {
    /// Take the next pending signal without blocking.
    fn try_recv(&mut self) -> io::Result<Option<Signal>>;

    /// Block until a signal is pending.
    fn wait(&mut self) -> io::Result<()>;

    /// Descriptor that becomes readable when a signal is pending, so other
    /// waits can wake up for it.
    fn wake_fd(&self) -> Option<BorrowedFd<'_>>;

    /// Narrow delivery to [`Signal::ABORT`] for the rest of the process.
    fn begin_drain(&mut self) -> io::Result<()>;
}

impl<T: SignalSource + ?Sized> SignalSource for Box<T> {
    fn try_recv(&mut self) -> io::Result<Option<Signal>> {
        (**self).try_recv()
    }

    fn wait(&mut self) -> io::Result<()> {
        (**self).wait()
    }

    fn wake_fd(&self) -> Option<BorrowedFd<'_>> {
        (**self).wake_fd()
    }

    fn begin_drain(&mut self) -> io::Result<()> {
        (**self).begin_drain()
    }
}

/// The notification channel plus the handlers that feed it.
///
/// Only one bridge can be live per process, since the handler reaches the
/// channel through a process-wide descriptor.
pub struct SignalBridge {
    read: OwnedFd,
    write: OwnedFd,
    installed: SigSet,
}

impl SignalBridge {
    pub fn new() -> Result<Self, BridgeError> {
        let mut fds = [-1 as c_int; 2];
        // SAFETY: `fds` has room for both ends.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
        if rc != 0 {
            return Err(BridgeError::Channel(io::Error::last_os_error()));
        }
        // SAFETY: pipe2 succeeded, so both descriptors are open and ours.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        WRITE_FD
            .compare_exchange(-1, write.as_raw_fd(), Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| BridgeError::AlreadyActive)?;

        Ok(Self {
            read,
            write,
            installed: SigSet::empty(),
        })
    }

    /// Route each of `signals` into the channel.
    ///
    /// While a handler runs every other signal is held back, so the handler
    /// never interleaves with itself or with another one.
    pub fn install(&mut self, signals: &[Signal]) -> Result<(), BridgeError> {
        for &signal in signals {
            // SAFETY: a zeroed sigaction is a valid starting point; every
            // field the kernel reads is set below.
            let rc = unsafe {
                let mut action = mem::zeroed::<libc::sigaction>();
                action.sa_sigaction = on_signal as extern "C" fn(c_int) as libc::sighandler_t;
                libc::sigfillset(&mut action.sa_mask);
                libc::sigdelset(&mut action.sa_mask, signal.as_raw());
                action.sa_flags = 0;
                libc::sigaction(signal.as_raw(), &action, ptr::null_mut())
            };
            if rc != 0 {
                return Err(BridgeError::Install {
                    signal,
                    source: io::Error::last_os_error(),
                });
            }
            self.installed.add(signal);
            trace!(%signal, "handler installed");
        }
        Ok(())
    }

    /// Signals currently routed into the channel.
    pub fn installed(&self) -> SigSet {
        self.installed
    }
}

impl SignalSource for SignalBridge {
    fn try_recv(&mut self) -> io::Result<Option<Signal>> {
        let mut buf = [0u8; SIGNAL_WIDTH];
        loop {
            // SAFETY: `buf` is writable for its full length.
            let n = unsafe { libc::read(self.read.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
            if n == SIGNAL_WIDTH as isize {
                return Ok(Some(Signal::from_raw(c_int::from_ne_bytes(buf))));
            }
            if n >= 0 {
                // Writes below PIPE_BUF are atomic, so this means the write end is gone
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "short read from signal channel",
                ));
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => return Ok(None),
                _ => return Err(err),
            }
        }
    }

    fn wait(&mut self) -> io::Result<()> {
        let mut pfd = libc::pollfd {
            fd: self.read.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: one valid pollfd.
        let rc = unsafe { libc::poll(&mut pfd, 1, -1) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            // The handler has already written by the time poll returns EINTR
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
        Ok(())
    }

    fn wake_fd(&self) -> Option<BorrowedFd<'_>> {
        Some(self.read.as_fd())
    }

    fn begin_drain(&mut self) -> io::Result<()> {
        let mut held = self.installed;
        held.remove(Signal::ABORT);
        mask_block(&held)?;
        debug!(signal = %Signal::ABORT, "signal delivery narrowed");
        Ok(())
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        // Handlers stay installed but turn into no-ops once the channel is gone
        let _ = WRITE_FD.compare_exchange(
            self.write.as_raw_fd(),
            -1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}
