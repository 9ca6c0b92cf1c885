mod common;

use std::error::Error as _;

use ble_bridge::{ErrorKind, ReadOutcome, WriteOutcome};
use common::*;

#[test]
fn read_decodes_the_value() {
    let mut script = Script::default();
    script
        .reads
        .insert(BATTERY_LEVEL, ReadOutcome::Success(vec![87]));
    let (bridge, log) = spawn(script);

    let level: u8 = bridge.read(BATTERY_LEVEL).unwrap();
    assert_eq!(level, 87);
    assert_eq!(ops(&log), [Op::Read(BATTERY_LEVEL)]);
}

#[test]
fn read_cancelled_by_device() {
    let (bridge, _log) = spawn(Script::default());

    let err = bridge.read::<u8>(BATTERY_LEVEL).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn read_failure_wraps_transport_error() {
    let mut script = Script::default();
    script.reads.insert(
        BATTERY_LEVEL,
        ReadOutcome::Failure(failure("GATT_INSUFFICIENT_AUTHENTICATION")),
    );
    let (bridge, _log) = spawn(script);

    let err = bridge.read::<u8>(BATTERY_LEVEL).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(
        err.source().unwrap().to_string(),
        "GATT_INSUFFICIENT_AUTHENTICATION"
    );
}

#[test]
fn read_with_wrong_length_fails_to_decode() {
    let mut script = Script::default();
    script
        .reads
        .insert(BATTERY_LEVEL, ReadOutcome::Success(vec![1, 2, 3]));
    let (bridge, _log) = spawn(script);

    let err = bridge.read::<u16>(BATTERY_LEVEL).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadFailed);
}

#[test]
fn write_sends_encoded_bytes() {
    let (bridge, log) = spawn(Script::default());

    bridge.write(CONTROL_POINT, &0x0102u16).unwrap();
    bridge.write(CONTROL_POINT, "go").unwrap();
    assert_eq!(
        ops(&log),
        [
            Op::Write(CONTROL_POINT, vec![0x02, 0x01]),
            Op::Write(CONTROL_POINT, b"go".to_vec()),
        ]
    );
}

#[test]
fn write_failure_and_cancellation() {
    let mut script = Script::default();
    script
        .writes
        .insert(CONTROL_POINT, WriteOutcome::Failure(failure("busy")));
    script.writes.insert(RESPONSE, WriteOutcome::Cancelled);
    let (bridge, _log) = spawn(script);

    let err = bridge.write(CONTROL_POINT, &[1u8]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    let err = bridge.write(RESPONSE, &[1u8]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn concurrent_callers_get_their_own_results() {
    let mut script = Script::default();
    script
        .reads
        .insert(BATTERY_LEVEL, ReadOutcome::Success(vec![50]));
    script
        .reads
        .insert(HEART_RATE, ReadOutcome::Success(vec![72]));
    let (bridge, _log) = spawn(script);

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let bridge = bridge.clone();
            std::thread::spawn(move || {
                let target = if i % 2 == 0 { BATTERY_LEVEL } else { HEART_RATE };
                (i, bridge.read::<u8>(target).unwrap())
            })
        })
        .collect();
    for worker in workers {
        let (i, value) = worker.join().unwrap();
        assert_eq!(value, if i % 2 == 0 { 50 } else { 72 });
    }
}

#[test]
fn calls_after_shutdown_fail() {
    let (bridge, _log) = spawn(Script::default());
    bridge.shutdown();

    let err = bridge.read::<u8>(BATTERY_LEVEL).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotRunning);
    let err = bridge.is_subscribed(HEART_RATE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotRunning);
}
