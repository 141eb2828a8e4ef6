//! Process wiring: build every component in the order the signal handling
//! needs, then hand over to the dispatcher.

use eventdconf::EventdConfig;
use tracing::{info, warn};

use crate::bridge::{mask_block, mask_unblock, BridgeError, SignalBridge};
use crate::control::{open_control, ControlSource, NoControl};
use crate::dispatch::{Dispatcher, Exit};
use crate::notify::Registrar;
use crate::playback::{open_player, NullPlayer, Player};
use crate::shutdown::ShutdownCoordinator;
use crate::signal::Signal;

/// Run the daemon until it terminates.
///
/// Handled signals stay blocked from handler installation until the login
/// cue has been requested. Threads started by the mixer and playback
/// libraries inherit that mask, so every signal lands on this thread.
pub fn run(config: &EventdConfig) -> Result<Exit, BridgeError> {
    let mut bridge = SignalBridge::new()?;
    bridge.install(&Signal::HANDLED)?;

    let held = bridge.installed();
    mask_block(&held).map_err(BridgeError::Mask)?;

    // Watches must outlive the loop or their descriptors close
    let mut watches = Registrar::new();
    match &config.watch.screenshot_dir {
        Some(dir) => {
            watches.watch_screenshots(dir);
        }
        None => info!("no screenshot directory configured"),
    }
    watches.watch_devices(&config.watch.device_dir);

    let shutdown = ShutdownCoordinator::new(config.shutdown.propagate_kill);

    let control: Box<dyn ControlSource> = match open_control(&config.control.device) {
        Ok(control) => control,
        Err(e) => {
            warn!(error = %e, "mixer control unavailable; volume changes will not be announced");
            Box::new(NoControl)
        }
    };

    let player: Box<dyn Player> = match open_player(&config.sound.theme, &config.sound.driver) {
        Ok(player) => player,
        Err(e) => {
            warn!(error = %e, "playback unavailable; running silent");
            Box::new(NullPlayer)
        }
    };

    let mut dispatcher = Dispatcher::new(bridge, control, player, shutdown);
    dispatcher.start();

    mask_unblock(&held).map_err(BridgeError::Mask)?;
    info!(watches = watches.watches().len(), "alsaeventd running");

    let exit = dispatcher.run();
    drop(watches);
    Ok(exit)
}
