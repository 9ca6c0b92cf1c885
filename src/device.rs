use super::{Characteristic, ReadOutcome, WriteOutcome};

/// Completion of [DeviceInterface::read].
pub type ReadCallback = Box<dyn FnOnce(ReadOutcome<Vec<u8>>)>;

/// Completion of [DeviceInterface::write].
pub type WriteCallback = Box<dyn FnOnce(WriteOutcome)>;

/// Invoked by [DeviceInterface::listen] once per notification.
pub type NotifyCallback = Box<dyn FnMut(ReadOutcome<Vec<u8>>)>;

/// The asynchronous operation surface of a remote device.
///
/// An implementation is created on the bridge's event loop thread (see
/// [crate::Bridge::spawn]) and never leaves it. Every method is called on that
/// thread, and callbacks must be invoked there as well; the callbacks are not
/// `Send`, so they cannot be moved elsewhere. Work arriving from other threads
/// (e.g. a transport's I/O thread) is brought back with [crate::Dispatcher].
///
/// Invoking a callback synchronously from inside the method that received it
/// is allowed.
pub trait DeviceInterface: 'static {
    /// Starts reading the value of `characteristic`.
    fn read(&mut self, characteristic: Characteristic, on_result: ReadCallback);

    /// Starts writing `value` to `characteristic`.
    fn write(&mut self, characteristic: Characteristic, value: Vec<u8>, on_result: WriteCallback);

    /// Subscribes to notifications of `characteristic`. `on_result` is invoked
    /// for every notification until [DeviceInterface::unsubscribe] is called,
    /// after which it must be dropped.
    fn listen(&mut self, characteristic: Characteristic, on_result: NotifyCallback);

    /// Cancels the subscription. Calling it when not subscribed does nothing.
    fn unsubscribe(&mut self, characteristic: Characteristic);

    /// Is there an active subscription for `characteristic`?
    fn is_subscribed(&self, characteristic: Characteristic) -> bool;
}
