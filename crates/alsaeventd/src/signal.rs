//! Signals the daemon listens for, and what each one means to it.

use std::fmt;

use libc::c_int;

/// A signal delivered through the notification channel.
///
/// The three notification signals are never used for process control, so
/// the dispatcher can tell a directory change from a shutdown request by
/// number alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `SIGUSR1`: an entry appeared in the storage topology directory
    DeviceAdded,
    /// `SIGUSR2`: an entry vanished from the storage topology directory
    DeviceRemoved,
    /// `SIGIO`: an entry appeared in the screenshot directory
    DirectoryChanged,
    /// `SIGALRM`
    Alarm,
    /// `SIGINT`: leave now. Also the abort raised once the logout cue ends.
    Interrupt,
    /// `SIGHUP`
    Hangup,
    /// `SIGTERM`
    Terminate,
    /// Anything else that made it into the channel
    Other(c_int),
}

impl Signal {
    /// Every signal the daemon installs a handler for.
    pub const HANDLED: [Signal; 7] = [
        Signal::Hangup,
        Signal::Interrupt,
        Signal::DeviceAdded,
        Signal::DeviceRemoved,
        Signal::Alarm,
        Signal::Terminate,
        Signal::DirectoryChanged,
    ];

    /// The signal left deliverable while draining.
    pub const ABORT: Signal = Signal::Interrupt;

    pub fn from_raw(signo: c_int) -> Self {
        match signo {
            libc::SIGUSR1 => Signal::DeviceAdded,
            libc::SIGUSR2 => Signal::DeviceRemoved,
            libc::SIGIO => Signal::DirectoryChanged,
            libc::SIGALRM => Signal::Alarm,
            libc::SIGINT => Signal::Interrupt,
            libc::SIGHUP => Signal::Hangup,
            libc::SIGTERM => Signal::Terminate,
            other => Signal::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Signal::DeviceAdded => libc::SIGUSR1,
            Signal::DeviceRemoved => libc::SIGUSR2,
            Signal::DirectoryChanged => libc::SIGIO,
            Signal::Alarm => libc::SIGALRM,
            Signal::Interrupt => libc::SIGINT,
            Signal::Hangup => libc::SIGHUP,
            Signal::Terminate => libc::SIGTERM,
            Signal::Other(signo) => signo,
        }
    }

    /// Signals that start the logout sequence.
    pub fn is_termination(self) -> bool {
        matches!(self, Signal::Hangup | Signal::Terminate)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::DeviceAdded => "SIGUSR1",
            Signal::DeviceRemoved => "SIGUSR2",
            Signal::DirectoryChanged => "SIGIO",
            Signal::Alarm => "SIGALRM",
            Signal::Interrupt => "SIGINT",
            Signal::Hangup => "SIGHUP",
            Signal::Terminate => "SIGTERM",
            Signal::Other(signo) => return write!(f, "signal {}", signo),
        };
        f.write_str(name)
    }
}
