//! Shared fakes for driving the dispatcher without real signals, mixer
//! devices or sound output.
//!
//! Everything here shares one signal queue, so a fake completion or a fake
//! abort shows up as the next signal the dispatcher reads, the same way the
//! real ones come back through the notification channel.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::os::fd::BorrowedFd;
use std::rc::Rc;
use std::time::Duration;

use alsaeventd::control::{EventKind, Interface, MASK_VALUE};
use alsaeventd::{
    Completion, ControlEvent, ControlSource, Dispatcher, PlaybackError, Player, ProcessSignaller,
    ShutdownCoordinator, Signal, SignalSource, SoundEvent, WaitStatus,
};
use libc::pid_t;

pub const PID: pid_t = 4000;

pub type SignalQueue = Rc<RefCell<VecDeque<Signal>>>;

pub struct FakeSignals {
    queue: SignalQueue,
    drains: Rc<Cell<usize>>,
}

impl SignalSource for FakeSignals {
    fn try_recv(&mut self) -> io::Result<Option<Signal>> {
        Ok(self.queue.borrow_mut().pop_front())
    }

    fn wait(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn wake_fd(&self) -> Option<BorrowedFd<'_>> {
        None
    }

    fn begin_drain(&mut self) -> io::Result<()> {
        self.drains.set(self.drains.get() + 1);
        Ok(())
    }
}

pub struct FakeControl {
    events: Rc<RefCell<VecDeque<ControlEvent>>>,
    failure: Rc<Cell<Option<io::ErrorKind>>>,
    waits: Rc<Cell<usize>>,
}

impl ControlSource for FakeControl {
    fn wait(&mut self, _timeout: Option<Duration>, _wake: Option<BorrowedFd<'_>>) -> WaitStatus {
        self.waits.set(self.waits.get() + 1);
        if let Some(kind) = self.failure.get() {
            return WaitStatus::Error(io::Error::from(kind));
        }
        if self.events.borrow().is_empty() {
            WaitStatus::Timeout
        } else {
            WaitStatus::Ready
        }
    }

    fn read_event(&mut self) -> io::Result<Option<ControlEvent>> {
        Ok(self.events.borrow_mut().pop_front())
    }
}

/// What the recording player does with a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completes {
    /// Fires during `play`, like a player with nothing to wait for.
    Immediately,
    /// Holds it until the test calls [`Harness::finish_playback`].
    Later,
    /// Refuses every request.
    Never,
}

pub struct RecordingPlayer {
    mode: Completes,
    queue: SignalQueue,
    played: Rc<RefCell<Vec<SoundEvent>>>,
    pending: Rc<RefCell<Vec<Completion>>>,
}

impl Player for RecordingPlayer {
    fn play(&mut self, event: &SoundEvent) -> Result<(), PlaybackError> {
        if self.mode == Completes::Never {
            return Err(PlaybackError::NotAvailable);
        }
        self.played.borrow_mut().push(*event);
        if let Some(completion) = event.on_complete {
            match self.mode {
                Completes::Immediately => self.queue.borrow_mut().push_back(Signal::ABORT),
                _ => self.pending.borrow_mut().push(completion),
            }
        }
        Ok(())
    }
}

pub struct RecordingSignaller {
    queue: SignalQueue,
    aborts: Rc<RefCell<Vec<pid_t>>>,
    hangups: Rc<RefCell<Vec<pid_t>>>,
}

impl ProcessSignaller for RecordingSignaller {
    fn raise_abort(&self, pid: pid_t) {
        self.aborts.borrow_mut().push(pid);
        self.queue.borrow_mut().push_back(Signal::ABORT);
    }

    fn hangup_group(&self, pgid: pid_t) -> io::Result<()> {
        self.hangups.borrow_mut().push(pgid);
        Ok(())
    }
}

pub type TestDispatcher = Dispatcher<FakeSignals, FakeControl, RecordingPlayer>;

/// Handles onto the fakes inside a dispatcher.
#[derive(Clone)]
pub struct Harness {
    pub queue: SignalQueue,
    pub events: Rc<RefCell<VecDeque<ControlEvent>>>,
    pub control_failure: Rc<Cell<Option<io::ErrorKind>>>,
    pub control_waits: Rc<Cell<usize>>,
    pub drains: Rc<Cell<usize>>,
    pub played: Rc<RefCell<Vec<SoundEvent>>>,
    pub pending: Rc<RefCell<Vec<Completion>>>,
    pub aborts: Rc<RefCell<Vec<pid_t>>>,
    pub hangups: Rc<RefCell<Vec<pid_t>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            queue: Rc::default(),
            events: Rc::default(),
            control_failure: Rc::default(),
            control_waits: Rc::default(),
            drains: Rc::default(),
            played: Rc::default(),
            pending: Rc::default(),
            aborts: Rc::default(),
            hangups: Rc::default(),
        }
    }

    /// A dispatcher wired to this harness. `parent_group` is what kill
    /// propagation would have captured at startup.
    pub fn dispatcher(&self, mode: Completes, parent_group: Option<pid_t>) -> TestDispatcher {
        let signals = FakeSignals {
            queue: self.queue.clone(),
            drains: self.drains.clone(),
        };
        let control = FakeControl {
            events: self.events.clone(),
            failure: self.control_failure.clone(),
            waits: self.control_waits.clone(),
        };
        let player = RecordingPlayer {
            mode,
            queue: self.queue.clone(),
            played: self.played.clone(),
            pending: self.pending.clone(),
        };
        let signaller = RecordingSignaller {
            queue: self.queue.clone(),
            aborts: self.aborts.clone(),
            hangups: self.hangups.clone(),
        };
        let shutdown = ShutdownCoordinator::with_signaller(PID, parent_group, Box::new(signaller));
        Dispatcher::new(signals, control, player, shutdown)
    }

    pub fn send(&self, signal: Signal) {
        self.queue.borrow_mut().push_back(signal);
    }

    pub fn send_control(&self, event: ControlEvent) {
        self.events.borrow_mut().push_back(event);
    }

    /// Fire every held completion, as libcanberra would once the cue ends.
    pub fn finish_playback(&self) {
        for completion in self.pending.borrow_mut().drain(..) {
            assert_eq!(completion.target, PID);
            self.queue.borrow_mut().push_back(Signal::ABORT);
        }
    }

    /// Names of every cue played so far, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.played.borrow().iter().map(|e| e.name()).collect()
    }
}

pub fn volume_change() -> ControlEvent {
    ControlEvent {
        kind: EventKind::Element,
        interface: Interface::Mixer,
        mask: MASK_VALUE,
    }
}
