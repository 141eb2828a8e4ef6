//! The real signal bridge against real signals.
//!
//! The bridge is process-wide, so every test here is serialized. Only
//! signals whose handler is installed are ever raised.

use std::fs::File;
use std::time::Duration;

use alsaeventd::bridge::{mask_block, mask_unblock, BridgeError, SignalBridge, SignalSource};
use alsaeventd::control::{ControlSource, NoControl, WaitStatus};
use alsaeventd::notify::Registrar;
use alsaeventd::Signal;
use serial_test::serial;

fn raise(signal: Signal) {
    // SAFETY: a handler is installed for every signal these tests raise.
    assert_eq!(unsafe { libc::raise(signal.as_raw()) }, 0);
}

fn bridge_for(signals: &[Signal]) -> SignalBridge {
    let mut bridge = SignalBridge::new().unwrap();
    bridge.install(signals).unwrap();
    bridge
}

#[test]
#[serial]
fn test_signals_arrive_in_order() {
    let mut bridge = bridge_for(&[Signal::DeviceAdded, Signal::DeviceRemoved, Signal::Alarm]);
    assert_eq!(bridge.try_recv().unwrap(), None);

    raise(Signal::DeviceAdded);
    raise(Signal::Alarm);
    raise(Signal::DeviceRemoved);

    assert_eq!(bridge.try_recv().unwrap(), Some(Signal::DeviceAdded));
    assert_eq!(bridge.try_recv().unwrap(), Some(Signal::Alarm));
    assert_eq!(bridge.try_recv().unwrap(), Some(Signal::DeviceRemoved));
    assert_eq!(bridge.try_recv().unwrap(), None);
}

#[test]
#[serial]
fn test_blocked_signals_are_deferred_not_lost() {
    let mut bridge = bridge_for(&[Signal::DeviceRemoved]);
    let held = bridge.installed();

    mask_block(&held).unwrap();
    raise(Signal::DeviceRemoved);
    assert_eq!(bridge.try_recv().unwrap(), None);

    mask_unblock(&held).unwrap();
    assert_eq!(bridge.try_recv().unwrap(), Some(Signal::DeviceRemoved));
}

#[test]
#[serial]
fn test_drain_leaves_only_abort_deliverable() {
    let mut bridge = bridge_for(&[Signal::DeviceAdded, Signal::Alarm, Signal::Interrupt]);

    bridge.begin_drain().unwrap();
    raise(Signal::DeviceAdded);
    raise(Signal::Alarm);
    assert_eq!(bridge.try_recv().unwrap(), None);

    raise(Signal::Interrupt);
    assert_eq!(bridge.try_recv().unwrap(), Some(Signal::Interrupt));
    assert_eq!(bridge.try_recv().unwrap(), None);

    // Restore this thread's mask; the held signals come through now
    mask_unblock(&bridge.installed()).unwrap();
    let mut late = vec![
        bridge.try_recv().unwrap().unwrap(),
        bridge.try_recv().unwrap().unwrap(),
    ];
    late.sort_by_key(|s| s.as_raw());
    let mut expected = vec![Signal::DeviceAdded, Signal::Alarm];
    expected.sort_by_key(|s| s.as_raw());
    assert_eq!(late, expected);
}

#[test]
#[serial]
fn test_only_one_bridge_at_a_time() {
    let first = SignalBridge::new().unwrap();
    assert!(matches!(SignalBridge::new(), Err(BridgeError::AlreadyActive)));

    drop(first);
    assert!(SignalBridge::new().is_ok());
}

#[test]
#[serial]
fn test_wake_fd_interrupts_control_wait() {
    let mut bridge = bridge_for(&[Signal::Alarm]);
    let mut control = NoControl;

    assert!(matches!(
        control.wait(Some(Duration::from_millis(10)), bridge.wake_fd()),
        WaitStatus::Timeout
    ));

    raise(Signal::Alarm);
    assert!(matches!(
        control.wait(Some(Duration::from_secs(5)), bridge.wake_fd()),
        WaitStatus::Ready
    ));
    bridge.wait().unwrap();
    assert_eq!(bridge.try_recv().unwrap(), Some(Signal::Alarm));
}

#[test]
#[serial]
fn test_new_screenshot_raises_directory_signal() {
    let mut bridge = bridge_for(&[Signal::DirectoryChanged]);
    let shots = tempfile::tempdir().unwrap();

    let mut watches = Registrar::new();
    assert!(watches.watch_screenshots(shots.path()));
    assert_eq!(watches.watches().len(), 1);
    assert_eq!(watches.watches()[0].signal(), Signal::DirectoryChanged);

    File::create(shots.path().join("shot.png")).unwrap();

    let mut control = NoControl;
    assert!(matches!(
        control.wait(Some(Duration::from_secs(5)), bridge.wake_fd()),
        WaitStatus::Ready
    ));
    assert_eq!(bridge.try_recv().unwrap(), Some(Signal::DirectoryChanged));
}
