//! Mixer control events.
//!
//! The ALSA control API only offers a wait/read pair. The wait here polls the
//! control descriptors together with the signal channel's wake descriptor, so
//! a signal that lands while the loop is parked on the mixer is seen at once.

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use thiserror::Error;

/// `SND_CTL_EVENT_MASK_VALUE`
pub const MASK_VALUE: u32 = 1 << 0;
/// `SND_CTL_EVENT_MASK_REMOVE`
pub const MASK_REMOVE: u32 = !0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `SND_CTL_EVENT_ELEM`
    Element,
    Other(u32),
}

/// Interface an element belongs to. Only the mixer interface matters here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    Mixer,
    Other,
}

/// One event read from the control device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    pub kind: EventKind,
    pub interface: Interface,
    pub mask: u32,
}

impl ControlEvent {
    /// A mixer element whose value, and only its value, changed.
    pub fn is_volume_change(&self) -> bool {
        self.kind == EventKind::Element
            && self.interface == Interface::Mixer
            && self.mask == MASK_VALUE
    }
}

/// Outcome of [`ControlSource::wait`].
#[derive(Debug)]
pub enum WaitStatus {
    /// A control event or a signal is pending
    Ready,
    Timeout,
    Error(io::Error),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Control support not enabled (compile with --features alsa)")]
    NotAvailable,

    #[error("Failed to open control device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to subscribe to control events: {0}")]
    Subscribe(#[source] io::Error),
}

/// A blocking source of control events.
pub trait ControlSource {
    /// Block until an event is pending, `wake` becomes readable, or
    /// `timeout` elapses (`None` waits forever).
    fn wait(&mut self, timeout: Option<Duration>, wake: Option<BorrowedFd<'_>>) -> WaitStatus;

    /// Take exactly one pending event, if there is one.
    fn read_event(&mut self) -> io::Result<Option<ControlEvent>>;
}

impl<T: ControlSource + ?Sized> ControlSource for Box<T> {
    fn wait(&mut self, timeout: Option<Duration>, wake: Option<BorrowedFd<'_>>) -> WaitStatus {
        (**self).wait(timeout, wake)
    }

    fn read_event(&mut self) -> io::Result<Option<ControlEvent>> {
        (**self).read_event()
    }
}

fn timeout_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(t) => t.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
    }
}

/// poll(2) over `fds`, mapping the result onto [`WaitStatus`].
fn poll_fds(fds: &mut [libc::pollfd], timeout: Option<Duration>) -> WaitStatus {
    // SAFETY: `fds` is a valid, exclusively borrowed slice of pollfd.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms(timeout)) };
    match rc {
        rc if rc < 0 => WaitStatus::Error(io::Error::last_os_error()),
        0 => WaitStatus::Timeout,
        _ => WaitStatus::Ready,
    }
}

fn wake_pollfd(wake: BorrowedFd<'_>) -> libc::pollfd {
    libc::pollfd {
        fd: wake.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    }
}

/// Stand-in used when no control device is available: waits on the wake
/// descriptor alone and never produces events.
#[derive(Debug, Default)]
pub struct NoControl;

impl ControlSource for NoControl {
    fn wait(&mut self, timeout: Option<Duration>, wake: Option<BorrowedFd<'_>>) -> WaitStatus {
        let mut fds: Vec<libc::pollfd> = wake.into_iter().map(wake_pollfd).collect();
        poll_fds(&mut fds, timeout)
    }

    fn read_event(&mut self) -> io::Result<Option<ControlEvent>> {
        Ok(None)
    }
}

#[cfg(feature = "alsa")]
pub use self::mixer::MixerControl;

#[cfg(feature = "alsa")]
mod mixer {
    use super::*;

    use alsa::ctl::{Ctl, ElemIface};
    use alsa::poll::Descriptors;

    fn to_io(e: alsa::Error) -> io::Error {
        io::Error::from_raw_os_error(e.errno())
    }

    /// Read-side connection to an ALSA control device.
    pub struct MixerControl {
        ctl: Ctl,
    }

    impl MixerControl {
        /// Open `device` non-blocking and subscribe to its events.
        pub fn open(device: &str) -> Result<Self, ControlError> {
            let ctl = Ctl::new(device, true).map_err(|e| ControlError::Open {
                device: device.to_string(),
                source: to_io(e),
            })?;
            ctl.subscribe_events(true)
                .map_err(|e| ControlError::Subscribe(to_io(e)))?;

            Ok(Self { ctl })
        }
    }

    impl ControlSource for MixerControl {
        fn wait(&mut self, timeout: Option<Duration>, wake: Option<BorrowedFd<'_>>) -> WaitStatus {
            let mut fds = match Descriptors::get(&self.ctl) {
                Ok(fds) => fds,
                Err(e) => return WaitStatus::Error(to_io(e)),
            };
            fds.extend(wake.map(wake_pollfd));
            poll_fds(&mut fds, timeout)
        }

        fn read_event(&mut self) -> io::Result<Option<ControlEvent>> {
            loop {
                match self.ctl.read() {
                    Ok(Some(event)) => {
                        let interface = match event.get_id().get_interface() {
                            ElemIface::Mixer => Interface::Mixer,
                            _ => Interface::Other,
                        };
                        // alsa-lib only defines element events
                        return Ok(Some(ControlEvent {
                            kind: EventKind::Element,
                            interface,
                            mask: event.get_mask().0,
                        }));
                    }
                    Ok(None) => return Ok(None),
                    Err(e) => {
                        let err = to_io(e);
                        match err.kind() {
                            io::ErrorKind::Interrupted => continue,
                            io::ErrorKind::WouldBlock => return Ok(None),
                            _ => return Err(err),
                        }
                    }
                }
            }
        }
    }
}

/// Open the named control device, when support is compiled in.
pub fn open_control(device: &str) -> Result<Box<dyn ControlSource>, ControlError> {
    #[cfg(feature = "alsa")]
    {
        Ok(Box::new(MixerControl::open(device)?))
    }
    #[cfg(not(feature = "alsa"))]
    {
        let _ = device;
        Err(ControlError::NotAvailable)
    }
}
