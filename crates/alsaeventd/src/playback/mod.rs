//! Sound cue playback.
//!
//! Cues use the freedesktop sound naming scheme, so any
//! XDG sound theme can resolve them.

#[cfg(feature = "canberra")]
pub mod canberra;

use std::fmt;

use libc::pid_t;
use thiserror::Error;
use tracing::debug;

#[cfg(feature = "canberra")]
pub use self::canberra::CanberraPlayer;

/// Sound events the daemon can announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCue {
    ServiceLogin,
    ServiceLogout,
    DeviceAdded,
    DeviceRemoved,
    ScreenCapture,
    AlarmClockElapsed,
    AudioVolumeChange,
}

impl SoundCue {
    /// Event id as understood by the sound theme.
    pub fn as_str(self) -> &'static str {
        match self {
            SoundCue::ServiceLogin => "service-login",
            SoundCue::ServiceLogout => "service-logout",
            SoundCue::DeviceAdded => "device-added",
            SoundCue::DeviceRemoved => "device-removed",
            SoundCue::ScreenCapture => "screen-capture",
            SoundCue::AlarmClockElapsed => "alarm-clock-elapsed",
            SoundCue::AudioVolumeChange => "audio-volume-change",
        }
    }
}

impl fmt::Display for SoundCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do once a cue has finished playing: raise the abort signal at
/// `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub target: pid_t,
}

impl Completion {
    /// Raise the abort signal now. Safe from any thread.
    pub fn fire(&self) {
        crate::shutdown::raise_abort(self.target);
    }
}

/// A single playback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundEvent {
    pub cue: SoundCue,
    pub on_complete: Option<Completion>,
}

impl SoundEvent {
    pub fn new(cue: SoundCue) -> Self {
        Self {
            cue,
            on_complete: None,
        }
    }

    pub fn with_completion(cue: SoundCue, completion: Completion) -> Self {
        Self {
            cue,
            on_complete: Some(completion),
        }
    }

    pub fn name(&self) -> &'static str {
        self.cue.as_str()
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Playback support not enabled (compile with --features canberra)")]
    NotAvailable,

    #[error("Failed in {op}: {message} ({code})")]
    Canberra {
        op: &'static str,
        code: i32,
        message: String,
    },

    #[error("Invalid playback setting {0:?}")]
    InvalidSetting(String),
}

/// Fire-and-forget playback. When the request carries a completion, the
/// player fires it once the cue is done, from whatever context it likes.
/// An `Err` means the completion will never fire.
pub trait Player {
    fn play(&mut self, event: &SoundEvent) -> Result<(), PlaybackError>;
}

impl<T: Player + ?Sized> Player for Box<T> {
    fn play(&mut self, event: &SoundEvent) -> Result<(), PlaybackError> {
        (**self).play(event)
    }
}

/// Plays nothing. Completions fire right away since there is nothing to
/// wait for.
#[derive(Debug, Default)]
pub struct NullPlayer;

impl Player for NullPlayer {
    fn play(&mut self, event: &SoundEvent) -> Result<(), PlaybackError> {
        debug!(cue = %event.cue, "silent playback");
        if let Some(completion) = event.on_complete {
            completion.fire();
        }
        Ok(())
    }
}

/// Build the libcanberra player, when support is compiled in.
pub fn open_player(theme: &str, driver: &str) -> Result<Box<dyn Player>, PlaybackError> {
    #[cfg(feature = "canberra")]
    {
        Ok(Box::new(CanberraPlayer::new(theme, driver)?))
    }
    #[cfg(not(feature = "canberra"))]
    {
        let _ = (theme, driver);
        Err(PlaybackError::NotAvailable)
    }
}
