use std::cell::Cell;
use std::time::Duration;

use async_channel::{Receiver, Sender, TryRecvError};
use futures_lite::{future, FutureExt};
use futures_timer::Delay;

/// Creates a single-use signal pair: the event loop fires the [Signal] once,
/// the blocked caller takes the value from the [Waiter].
pub fn oneshot<T>() -> (Signal<T>, Waiter<T>) {
    let (sender, receiver) = async_channel::bounded(1);
    (Signal { sender }, Waiter { receiver })
}

/// Sending half of [oneshot]. Firing never blocks.
pub struct Signal<T> {
    sender: Sender<T>,
}

impl<T> Signal<T> {
    /// Delivers `value` if nothing has been delivered before and the waiter is
    /// still alive. Returns whether the value was delivered.
    pub fn fire(&self, value: T) -> bool {
        self.sender.try_send(value).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The timeout elapsed before the signal fired.
    TimedOut,
    /// The signal was dropped without firing.
    Dropped,
}

/// Receiving half of [oneshot].
pub struct Waiter<T> {
    receiver: Receiver<T>,
}

impl<T> Waiter<T> {
    /// Blocks until the signal fires. Returns `None` if it is dropped unfired.
    pub fn wait(&self) -> Option<T> {
        self.receiver.recv_blocking().ok()
    }

    /// Blocks until the signal fires or `timeout` elapses. A zero `timeout`
    /// waits without bound.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, WaitError> {
        if timeout.is_zero() {
            return self.wait().ok_or(WaitError::Dropped);
        }
        let recv = async {
            self.receiver
                .recv()
                .await
                .map_err(|_| WaitError::Dropped)
        };
        future::block_on(recv.or(async {
            Delay::new(timeout).await;
            Err(WaitError::TimedOut)
        }))
    }

    /// Takes an already delivered value without blocking.
    pub fn try_take(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(val) => Some(val),
            Err(TryRecvError::Empty | TryRecvError::Closed) => None,
        }
    }
}

/// Settles a blocking call exactly once. Lives on the event loop thread,
/// shared by the completions of one call.
pub struct Completion<T> {
    signal: Signal<T>,
    settled: Cell<bool>,
}

impl<T> Completion<T> {
    pub fn new(signal: Signal<T>) -> Self {
        Self {
            signal,
            settled: Cell::new(false),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled.get()
    }

    /// Claims the right to settle. Only the first call returns `true`;
    /// the claimant must follow up with [Completion::fire].
    pub fn claim(&self) -> bool {
        !self.settled.replace(true)
    }

    pub fn fire(&self, value: T) {
        let _ = self.signal.fire(value);
    }
}
