//! Shutdown coordination: the abort raised after the logout cue, and the
//! optional hangup of the process group the daemon was started from.

use std::io;

use libc::pid_t;
use tracing::{debug, warn};

use crate::playback::Completion;
use crate::signal::Signal;

/// Raise the abort signal at the main thread of process `pid`.
///
/// Only makes a raw syscall, so it is safe from signal handlers and from
/// threads owned by other libraries.
pub fn raise_abort(pid: pid_t) {
    // SAFETY: tgkill takes plain integers; with tgid == tid it targets the
    // main thread, which is where the daemon's signals are unblocked.
    unsafe {
        libc::syscall(
            libc::SYS_tgkill,
            pid as libc::c_long,
            pid as libc::c_long,
            Signal::ABORT.as_raw() as libc::c_long,
        );
    }
}

/// Process-level signalling used during shutdown.
pub trait ProcessSignaller {
    /// Raise the abort signal at `pid`.
    fn raise_abort(&self, pid: pid_t);

    /// Send `SIGHUP` to every process in group `pgid`.
    fn hangup_group(&self, pgid: pid_t) -> io::Result<()>;
}

/// The real thing.
#[derive(Debug, Default)]
pub struct OsSignaller;

impl ProcessSignaller for OsSignaller {
    fn raise_abort(&self, pid: pid_t) {
        raise_abort(pid);
    }

    fn hangup_group(&self, pgid: pid_t) -> io::Result<()> {
        // SAFETY: killpg takes plain integers.
        if unsafe { libc::killpg(pgid, libc::SIGHUP) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Process group of our parent, or `None` if there is no usable one.
pub fn parent_process_group() -> Option<pid_t> {
    // SAFETY: getppid cannot fail; getpgid returns -1 on error.
    let pgid = unsafe { libc::getpgid(libc::getppid()) };
    valid_group(pgid)
}

/// Groups 0 and 1 would hit ourselves or init's session; never signal them.
fn valid_group(pgid: pid_t) -> Option<pid_t> {
    (pgid > 1).then_some(pgid)
}

pub struct ShutdownCoordinator {
    pid: pid_t,
    parent_group: Option<pid_t>,
    signaller: Box<dyn ProcessSignaller>,
}

impl ShutdownCoordinator {
    /// Coordinator for this process. With `propagate_kill`, the parent's
    /// process group is captured now, while the parent is still around.
    pub fn new(propagate_kill: bool) -> Self {
        let parent_group = if propagate_kill {
            let group = parent_process_group();
            if group.is_none() {
                warn!("no usable parent process group; kill propagation disabled");
            }
            group
        } else {
            None
        };
        // SAFETY: getpid cannot fail.
        let pid = unsafe { libc::getpid() };
        Self::with_signaller(pid, parent_group, Box::new(OsSignaller))
    }

    pub fn with_signaller(
        pid: pid_t,
        parent_group: Option<pid_t>,
        signaller: Box<dyn ProcessSignaller>,
    ) -> Self {
        Self {
            pid,
            parent_group: parent_group.and_then(valid_group),
            signaller,
        }
    }

    pub fn pid(&self) -> pid_t {
        self.pid
    }

    pub fn parent_group(&self) -> Option<pid_t> {
        self.parent_group
    }

    /// Completion to attach to the logout cue.
    pub fn completion(&self) -> Completion {
        Completion { target: self.pid }
    }

    /// Raise the abort ourselves, for when no completion is coming.
    pub fn abort_now(&self) {
        self.signaller.raise_abort(self.pid);
    }

    /// Hang up the captured parent group, if any. Returns whether a signal
    /// was sent.
    pub fn propagate(&self) -> bool {
        let Some(pgid) = self.parent_group else {
            return false;
        };
        match self.signaller.hangup_group(pgid) {
            Ok(()) => {
                debug!(pgid, "sent SIGHUP to parent process group");
                true
            }
            Err(e) => {
                warn!(pgid, error = %e, "failed to hang up parent process group");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        aborts: RefCell<Vec<pid_t>>,
        hangups: RefCell<Vec<pid_t>>,
    }

    impl ProcessSignaller for Rc<Recorder> {
        fn raise_abort(&self, pid: pid_t) {
            self.aborts.borrow_mut().push(pid);
        }

        fn hangup_group(&self, pgid: pid_t) -> io::Result<()> {
            self.hangups.borrow_mut().push(pgid);
            Ok(())
        }
    }

    #[test]
    fn test_invalid_groups_are_dropped() {
        assert_eq!(valid_group(-1), None);
        assert_eq!(valid_group(0), None);
        assert_eq!(valid_group(1), None);
        assert_eq!(valid_group(4242), Some(4242));
    }

    #[test]
    fn test_propagate_without_group_sends_nothing() {
        let recorder = Rc::new(Recorder::default());
        let coordinator = ShutdownCoordinator::with_signaller(100, None, Box::new(recorder.clone()));
        assert!(!coordinator.propagate());
        assert!(recorder.hangups.borrow().is_empty());
    }

    #[test]
    fn test_propagate_hangs_up_captured_group() {
        let recorder = Rc::new(Recorder::default());
        let coordinator =
            ShutdownCoordinator::with_signaller(100, Some(4242), Box::new(recorder.clone()));
        assert!(coordinator.propagate());
        assert_eq!(*recorder.hangups.borrow(), vec![4242]);
    }

    #[test]
    fn test_abort_targets_own_pid() {
        let recorder = Rc::new(Recorder::default());
        let coordinator = ShutdownCoordinator::with_signaller(100, None, Box::new(recorder.clone()));
        assert_eq!(coordinator.completion(), Completion { target: 100 });
        coordinator.abort_now();
        assert_eq!(*recorder.aborts.borrow(), vec![100]);
    }

    #[test]
    fn test_new_without_propagation_has_no_group() {
        let coordinator = ShutdownCoordinator::new(false);
        assert!(coordinator.parent_group().is_none());
        assert!(coordinator.pid() > 0);
    }
}
