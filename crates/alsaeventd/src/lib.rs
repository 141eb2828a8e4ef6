//! alsaeventd - themed sound cues for a desktop session
//!
//! Signals, directory change notifications and mixer events come in; named
//! freedesktop sound events go out through libcanberra. `SIGHUP` and
//! `SIGTERM` play the logout cue and hold the process until it has finished.

pub mod bridge;
pub mod control;
pub mod daemon;
pub mod dispatch;
pub mod notify;
pub mod playback;
pub mod shutdown;
pub mod signal;
pub mod telemetry;

pub use bridge::{BridgeError, SignalBridge, SignalSource};
pub use control::{ControlError, ControlEvent, ControlSource, NoControl, WaitStatus};
pub use dispatch::{transition, Dispatcher, Exit, Flow, State, Stimulus, Transition};
pub use playback::{Completion, NullPlayer, PlaybackError, Player, SoundCue, SoundEvent};
pub use shutdown::{ProcessSignaller, ShutdownCoordinator};
pub use signal::Signal;
