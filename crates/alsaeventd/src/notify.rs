//! Directory change notifications delivered as signals (Linux dnotify).
//!
//! Each watch keeps a directory descriptor open with `F_NOTIFY` armed and
//! `F_SETSIG` pointing at one of the bridge's notification signals, so
//! directory changes arrive through the same channel as every other signal.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use libc::c_int;
use tracing::{debug, warn};

use crate::signal::Signal;

// From <linux/fcntl.h>
const F_SETSIG: c_int = 10;
const F_NOTIFY: c_int = 1024 + 2;
const DN_CREATE: c_int = 0x0000_0004;
const DN_DELETE: c_int = 0x0000_0008;
const DN_MULTISHOT: c_int = 0x8000_0000_u32 as c_int;

/// Kind of directory change to be notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirChange {
    Created,
    Removed,
}

impl DirChange {
    fn dnotify_mask(self) -> c_int {
        let event = match self {
            DirChange::Created => DN_CREATE,
            DirChange::Removed => DN_DELETE,
        };
        event | DN_MULTISHOT
    }
}

/// An armed watch. Notifications stop when it is dropped.
#[derive(Debug)]
pub struct DirWatch {
    signal: Signal,
    _fd: OwnedFd,
}

impl DirWatch {
    pub fn signal(&self) -> Signal {
        self.signal
    }
}

fn fcntl(fd: &OwnedFd, cmd: c_int, arg: c_int) -> io::Result<()> {
    // SAFETY: `fd` is open for the duration of the call; both commands take an int.
    let rc = unsafe { libc::fcntl(fd.as_raw_fd(), cmd, arg) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Raise `signal` whenever `change` happens in the directory at `path`.
pub fn watch(path: &Path, change: DirChange, signal: Signal) -> io::Result<DirWatch> {
    let dir = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_DIRECTORY | libc::O_CLOEXEC)
        .open(path)?;
    let fd = OwnedFd::from(dir);

    // Signal first, so the first notification already uses it
    fcntl(&fd, F_SETSIG, signal.as_raw())?;
    fcntl(&fd, F_NOTIFY, change.dnotify_mask())?;

    Ok(DirWatch {
        signal,
        _fd: fd,
    })
}

/// The set of watches held for the life of the daemon.
#[derive(Debug, Default)]
pub struct Registrar {
    watches: Vec<DirWatch>,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a watch, or log why not. A missing directory only means its
    /// events never fire.
    pub fn add(&mut self, path: &Path, change: DirChange, signal: Signal) -> bool {
        match watch(path, change, signal) {
            Ok(w) => {
                debug!(path = %path.display(), ?change, %signal, "watching directory");
                self.watches.push(w);
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot watch directory");
                false
            }
        }
    }

    /// New files in the screenshot directory announce a screen capture.
    pub fn watch_screenshots(&mut self, dir: &Path) -> bool {
        self.add(dir, DirChange::Created, Signal::DirectoryChanged)
    }

    /// Entries appearing and vanishing in the storage topology directory
    /// announce device hotplug.
    pub fn watch_devices(&mut self, dir: &Path) -> bool {
        let added = self.add(dir, DirChange::Created, Signal::DeviceAdded);
        let removed = self.add(dir, DirChange::Removed, Signal::DeviceRemoved);
        added && removed
    }

    pub fn watches(&self) -> &[DirWatch] {
        &self.watches
    }
}
