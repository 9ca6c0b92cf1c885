#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ble_bridge::{
    Bridge, BridgeConfig, Characteristic, DeviceInterface, Dispatcher, NotifyCallback,
    ReadCallback, ReadOutcome, TransportError, WriteCallback, WriteOutcome,
};

pub const BATTERY_LEVEL: Characteristic = Characteristic::from_short(0x180f, 0x2a19);
pub const HEART_RATE: Characteristic = Characteristic::from_short(0x180d, 0x2a37);
pub const CONTROL_POINT: Characteristic = Characteristic::from_short(0xfff0, 0xfff1);
pub const RESPONSE: Characteristic = Characteristic::from_short(0xfff0, 0xfff2);

/// Operations the fake device has seen, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Read(Characteristic),
    Write(Characteristic, Vec<u8>),
    Listen(Characteristic),
    Unsubscribe(Characteristic),
}

pub type Log = Arc<Mutex<Vec<Op>>>;

/// Something the fake pushes to a subscriber.
#[derive(Debug, Clone)]
pub enum Push {
    Notify(ReadOutcome<Vec<u8>>),
    /// The link drops: the subscriber gets `Cancelled` and the subscription is gone.
    Disconnect,
}

pub fn bytes(b: &[u8]) -> Push {
    Push::Notify(ReadOutcome::Success(b.to_vec()))
}

pub fn failure(msg: &str) -> TransportError {
    TransportError::new(msg.to_string())
}

/// How the fake answers.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Read results; unscripted reads are cancelled.
    pub reads: HashMap<Characteristic, ReadOutcome<Vec<u8>>>,
    /// Write results; unscripted writes succeed.
    pub writes: HashMap<Characteristic, WriteOutcome>,
    /// Pushed as separate jobs right after a subscription is made.
    pub on_listen: HashMap<Characteristic, Vec<(Characteristic, Push)>>,
    /// Pushed when a write arrives, keyed by the written characteristic.
    pub on_write: HashMap<Characteristic, Vec<(Characteristic, Push)>>,
    /// Deliver `on_write` pushes from inside `write`, before the write itself
    /// completes, like a peripheral answering immediately.
    pub reply_inline: bool,
    /// How long the loop stalls before completing a write.
    pub write_delay: Duration,
}

pub struct FakeDevice {
    dispatcher: Dispatcher<FakeDevice>,
    script: Script,
    log: Log,
    listeners: HashMap<Characteristic, NotifyCallback>,
    pending_reads: HashMap<u64, (Characteristic, ReadCallback)>,
    pending_writes: HashMap<u64, (Characteristic, WriteCallback)>,
    next_id: u64,
}

impl FakeDevice {
    pub fn new(dispatcher: Dispatcher<FakeDevice>, script: Script, log: Log) -> Self {
        Self {
            dispatcher,
            script,
            log,
            listeners: HashMap::new(),
            pending_reads: HashMap::new(),
            pending_writes: HashMap::new(),
            next_id: 0,
        }
    }

    /// Delivers one push to the subscriber of `characteristic`, if there is one.
    pub fn push(&mut self, characteristic: Characteristic, push: Push) {
        match push {
            Push::Notify(outcome) => {
                if let Some(listener) = self.listeners.get_mut(&characteristic) {
                    listener(outcome);
                }
            }
            Push::Disconnect => {
                if let Some(mut listener) = self.listeners.remove(&characteristic) {
                    listener(ReadOutcome::Cancelled);
                }
            }
        }
    }

    fn record(&self, op: Op) {
        self.log.lock().unwrap().push(op);
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn push_later(&self, pushes: Vec<(Characteristic, Push)>) {
        for (characteristic, push) in pushes {
            let _ = self
                .dispatcher
                .dispatch(move |dev: &mut FakeDevice| dev.push(characteristic, push));
        }
    }

    fn finish_read(&mut self, id: u64) {
        if let Some((characteristic, on_result)) = self.pending_reads.remove(&id) {
            let outcome = self
                .script
                .reads
                .get(&characteristic)
                .cloned()
                .unwrap_or(ReadOutcome::Cancelled);
            on_result(outcome);
        }
    }

    fn finish_write(&mut self, id: u64) {
        if let Some((characteristic, on_result)) = self.pending_writes.remove(&id) {
            if !self.script.write_delay.is_zero() {
                std::thread::sleep(self.script.write_delay);
            }
            let outcome = self
                .script
                .writes
                .get(&characteristic)
                .cloned()
                .unwrap_or(WriteOutcome::Success);
            on_result(outcome);
        }
    }
}

impl DeviceInterface for FakeDevice {
    fn read(&mut self, characteristic: Characteristic, on_result: ReadCallback) {
        self.record(Op::Read(characteristic));
        let id = self.next_id();
        self.pending_reads.insert(id, (characteristic, on_result));
        let _ = self
            .dispatcher
            .dispatch(move |dev: &mut FakeDevice| dev.finish_read(id));
    }

    fn write(&mut self, characteristic: Characteristic, value: Vec<u8>, on_result: WriteCallback) {
        self.record(Op::Write(characteristic, value));
        let id = self.next_id();
        self.pending_writes.insert(id, (characteristic, on_result));
        let mut replies = self
            .script
            .on_write
            .get(&characteristic)
            .cloned()
            .unwrap_or_default();
        if self.script.reply_inline {
            for (target, push) in replies.drain(..) {
                self.push(target, push);
            }
        }
        let _ = self
            .dispatcher
            .dispatch(move |dev: &mut FakeDevice| dev.finish_write(id));
        self.push_later(replies);
    }

    fn listen(&mut self, characteristic: Characteristic, on_result: NotifyCallback) {
        self.record(Op::Listen(characteristic));
        self.listeners.insert(characteristic, on_result);
        let pushes = self
            .script
            .on_listen
            .get(&characteristic)
            .cloned()
            .unwrap_or_default();
        self.push_later(pushes);
    }

    fn unsubscribe(&mut self, characteristic: Characteristic) {
        self.record(Op::Unsubscribe(characteristic));
        self.listeners.remove(&characteristic);
    }

    fn is_subscribed(&self, characteristic: Characteristic) -> bool {
        self.listeners.contains_key(&characteristic)
    }
}

pub fn spawn(script: Script) -> (Bridge<FakeDevice>, Log) {
    let _ = env_logger::builder().is_test(true).try_init();
    let log = Log::default();
    let device_log = log.clone();
    let bridge = Bridge::spawn(
        BridgeConfig::default().thread_name("fake-ble"),
        move |dispatcher| FakeDevice::new(dispatcher, script, device_log),
    )
    .unwrap();
    (bridge, log)
}

pub fn ops(log: &Log) -> Vec<Op> {
    log.lock().unwrap().clone()
}

pub fn unsubscribes(log: &Log, characteristic: Characteristic) -> usize {
    ops(log)
        .iter()
        .filter(|op| **op == Op::Unsubscribe(characteristic))
        .count()
}

pub fn position(log: &Log, op: &Op) -> Option<usize> {
    ops(log).iter().position(|o| o == op)
}

/// Polls `cond` for up to five seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}
