//! The event loop.
//!
//! Each turn takes one stimulus, either a signal from the channel or a
//! control event, runs it through [`transition`], and acts on the result.
//! Signals always win over control events: the channel is drained before
//! the loop parks on the mixer.

use std::io;
use std::process::ExitCode;

use tracing::{debug, trace, warn};

use crate::bridge::SignalSource;
use crate::control::{ControlEvent, ControlSource, WaitStatus};
use crate::playback::{Player, SoundCue, SoundEvent};
use crate::shutdown::ShutdownCoordinator;
use crate::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    /// Logout cue in flight; waiting for the abort signal.
    Draining,
    Terminated,
}

/// Something that happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stimulus {
    Signal(Signal),
    Control(ControlEvent),
}

/// Result of feeding a stimulus to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: State,
    pub cue: Option<SoundCue>,
}

impl Transition {
    fn stay(state: State) -> Self {
        Self { next: state, cue: None }
    }

    fn play(state: State, cue: SoundCue) -> Self {
        Self {
            next: state,
            cue: Some(cue),
        }
    }
}

/// The dispatch table.
pub fn transition(state: State, stimulus: &Stimulus) -> Transition {
    use State::*;

    match (state, stimulus) {
        (Running, Stimulus::Signal(signal)) => match signal {
            Signal::DeviceAdded => Transition::play(Running, SoundCue::DeviceAdded),
            Signal::DeviceRemoved => Transition::play(Running, SoundCue::DeviceRemoved),
            Signal::DirectoryChanged => Transition::play(Running, SoundCue::ScreenCapture),
            Signal::Alarm => Transition::play(Running, SoundCue::AlarmClockElapsed),
            Signal::Interrupt => Transition::stay(Terminated),
            Signal::Hangup | Signal::Terminate => Transition::play(Draining, SoundCue::ServiceLogout),
            Signal::Other(_) => Transition::stay(Running),
        },
        (Running, Stimulus::Control(event)) if event.is_volume_change() => {
            Transition::play(Running, SoundCue::AudioVolumeChange)
        }
        (Running, Stimulus::Control(_)) => Transition::stay(Running),

        (Draining, Stimulus::Signal(Signal::Interrupt)) => Transition::stay(Terminated),
        (Draining, _) => Transition::stay(Draining),

        (Terminated, _) => Transition::stay(Terminated),
    }
}

/// How the daemon leaves the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    Failure,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        match exit {
            Exit::Success => ExitCode::SUCCESS,
            Exit::Failure => ExitCode::FAILURE,
        }
    }
}

/// Whether the loop keeps going after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(Exit),
}

/// Owns every collaborator. Fields drop in reverse order of construction, so
/// playback goes first and the signal channel last.
pub struct Dispatcher<S, C, P> {
    player: P,
    control: C,
    shutdown: ShutdownCoordinator,
    signals: S,
    state: State,
    control_healthy: bool,
}

impl<S, C, P> Dispatcher<S, C, P>
where
    S: SignalSource,
    C: ControlSource,
    P: Player,
{
    pub fn new(signals: S, control: C, player: P, shutdown: ShutdownCoordinator) -> Self {
        Self {
            signals,
            control,
            player,
            shutdown,
            state: State::Running,
            control_healthy: true,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Announce the session. Called once, before the first step.
    pub fn start(&mut self) {
        self.play(SoundEvent::new(SoundCue::ServiceLogin));
    }

    /// Run until one of the termination paths is taken.
    pub fn run(&mut self) -> Exit {
        loop {
            match self.step() {
                Flow::Continue => {}
                Flow::Exit(exit) => return exit,
            }
        }
    }

    /// Wait for and handle one stimulus.
    pub fn step(&mut self) -> Flow {
        match self.next_stimulus() {
            Some(stimulus) => self.dispatch(stimulus),
            None => Flow::Continue,
        }
    }

    fn next_stimulus(&mut self) -> Option<Stimulus> {
        match self.signals.try_recv() {
            Ok(Some(signal)) => return Some(Stimulus::Signal(signal)),
            Ok(None) => {}
            Err(e) => {
                trace!(error = %e, "signal channel read failed");
                return None;
            }
        }

        if !self.control_healthy {
            if let Err(e) = self.signals.wait() {
                trace!(error = %e, "signal wait failed");
            }
            return None;
        }

        match self.control.wait(None, self.signals.wake_fd()) {
            WaitStatus::Ready => {}
            WaitStatus::Timeout => return None,
            WaitStatus::Error(e) if is_transient(&e) => {
                trace!(error = %e, "control wait interrupted");
                return None;
            }
            WaitStatus::Error(e) => {
                self.disable_control(e);
                return None;
            }
        }

        match self.control.read_event() {
            Ok(event) => event.map(Stimulus::Control),
            Err(e) if is_transient(&e) => None,
            Err(e) => {
                self.disable_control(e);
                None
            }
        }
    }

    fn disable_control(&mut self, error: io::Error) {
        warn!(%error, "mixer control failed, volume changes will not be announced");
        self.control_healthy = false;
    }

    /// Apply one stimulus.
    pub fn dispatch(&mut self, stimulus: Stimulus) -> Flow {
        let previous = self.state;
        let Transition { next, cue } = transition(previous, &stimulus);
        self.state = next;

        match (previous, next) {
            (State::Running, State::Draining) => {
                debug!(?stimulus, "draining");
                self.begin_drain(cue.unwrap_or(SoundCue::ServiceLogout));
                Flow::Continue
            }
            (_, State::Terminated) => {
                debug!(?stimulus, "terminated");
                if previous == State::Draining {
                    self.shutdown.propagate();
                }
                Flow::Exit(Exit::Success)
            }
            _ => {
                match cue {
                    Some(cue) => self.play(SoundEvent::new(cue)),
                    None => trace!(?stimulus, "ignored"),
                }
                Flow::Continue
            }
        }
    }

    /// Hold back everything but the abort signal, then play the logout cue
    /// with the abort as its completion.
    fn begin_drain(&mut self, cue: SoundCue) {
        if let Err(e) = self.signals.begin_drain() {
            warn!(error = %e, "failed to narrow signal delivery");
        }

        let event = SoundEvent::with_completion(cue, self.shutdown.completion());
        debug!(%cue, "playing");
        if let Err(e) = self.player.play(&event) {
            // No callback is coming, so don't wait for one
            warn!(%cue, error = %e, "failed to play");
            self.shutdown.abort_now();
        }
    }

    fn play(&mut self, event: SoundEvent) {
        debug!(cue = %event.cue, "playing");
        if let Err(e) = self.player.play(&event) {
            warn!(cue = %event.cue, error = %e, "failed to play");
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}
