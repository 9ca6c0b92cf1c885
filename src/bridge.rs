use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use async_lock::Mutex;
use log::{debug, trace, warn};

use super::async_util::{oneshot, WaitError};
use super::codec::{Decode, Encode};
use super::config::BridgeConfig;
use super::device::DeviceInterface;
use super::error::{Error, ErrorKind};
use super::event_loop::{self, CallId, Dispatcher, EventLoop};
use super::listener::{Assembled, CallContext, Decoded, Listener, NotificationSink};
use super::util::defer;
use super::{Characteristic, ListenAction, ReadOutcome, Result, WriteOutcome};

/// Blocking front end of a [DeviceInterface] that lives on its own event loop thread.
///
/// Any number of threads may call the blocking operations concurrently, each
/// call waits on its own private channel. Cloning is cheap; the event loop
/// stops when the last clone is dropped or [Bridge::shutdown] is called.
pub struct Bridge<D: DeviceInterface> {
    inner: Arc<Inner<D>>,
}

impl<D: DeviceInterface> Clone for Bridge<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: DeviceInterface> std::fmt::Debug for Bridge<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("event_loop", &self.inner.worker_id)
            .finish()
    }
}

struct Inner<D: DeviceInterface> {
    dispatcher: Dispatcher<D>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl<D: DeviceInterface> Inner<D> {
    fn stop(&self) {
        let _ = self
            .dispatcher
            .submit(Box::new(|lp: &mut EventLoop<D>| lp.stop()));
        let Some(worker) = self.worker.lock_blocking().take() else {
            return;
        };
        // The last handle may be dropped by a handler running on the loop itself.
        if thread::current().id() == self.worker_id {
            return;
        }
        if worker.join().is_err() {
            warn!("the event loop thread panicked");
        }
    }
}

impl<D: DeviceInterface> Drop for Inner<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<D: DeviceInterface> Bridge<D> {
    /// Starts the event loop thread and constructs the device on it.
    ///
    /// `make_device` receives a [Dispatcher] the device may keep for delivering
    /// completions from other threads.
    pub fn spawn<F>(config: BridgeConfig, make_device: F) -> Result<Self>
    where
        F: FnOnce(Dispatcher<D>) -> D + Send + 'static,
    {
        let (dispatcher, worker) = event_loop::spawn(&config, make_device)?;
        let worker_id = worker.thread().id();
        Ok(Self {
            inner: Arc::new(Inner {
                dispatcher,
                worker: Mutex::new(Some(worker)),
                worker_id,
            }),
        })
    }

    /// Returns a [Dispatcher] for posting work to the event loop.
    pub fn dispatcher(&self) -> Dispatcher<D> {
        self.inner.dispatcher.clone()
    }

    /// Runs `f` against the device on the event loop thread, without waiting for it.
    pub fn dispatch(&self, f: impl FnOnce(&mut D) + Send + 'static) -> Result<()> {
        self.inner.dispatcher.dispatch(f)
    }

    /// Stops the event loop for every clone of this bridge.
    ///
    /// Subscriptions still owned by blocking calls are torn down and those calls
    /// return with an error. Later calls fail with [ErrorKind::NotRunning].
    pub fn shutdown(&self) {
        self.inner.stop();
    }

    /// Does the device report an active subscription for `characteristic`?
    pub fn is_subscribed(&self, characteristic: Characteristic) -> Result<bool> {
        self.check_caller()?;
        self.run_sync(move |lp| lp.device().is_subscribed(characteristic))
    }

    /// Reads and decodes the value of `characteristic`.
    ///
    /// Waits without a timeout; it is up to the device to resolve or cancel the read.
    pub fn read<T: Decode>(&self, characteristic: Characteristic) -> Result<T> {
        self.check_caller()?;
        let (signal, waiter) = oneshot();
        self.submit(move |lp| {
            trace!("reading {characteristic}");
            lp.device().read(
                characteristic,
                Box::new(move |outcome: ReadOutcome<Vec<u8>>| {
                    signal.fire(outcome.into_result());
                }),
            );
        })?;
        let bytes = waiter.wait().unwrap_or_else(|| Err(dropped()))?;
        T::decode(&bytes).map_err(Error::decode)
    }

    /// Encodes `value` and writes it to `characteristic`.
    pub fn write<V>(&self, characteristic: Characteristic, value: &V) -> Result<()>
    where
        V: Encode + ?Sized,
    {
        self.check_caller()?;
        let bytes = value.encode().map_err(Error::encode)?;
        let (signal, waiter) = oneshot();
        self.submit(move |lp| {
            trace!("writing {} byte(s) to {characteristic}", bytes.len());
            lp.device().write(
                characteristic,
                bytes,
                Box::new(move |outcome: WriteOutcome| {
                    signal.fire(outcome.into_result());
                }),
            );
        })?;
        waiter.wait().unwrap_or_else(|| Err(dropped()))
    }

    /// Subscribes to `characteristic` and passes every decoded notification to
    /// `on_notification` (on the event loop thread) until it returns
    /// [ListenAction::Done] or the device ends the stream.
    ///
    /// There is no timeout. The subscription is released before this returns.
    pub fn listen<T, F>(&self, characteristic: Characteristic, on_notification: F) -> Result<()>
    where
        T: Decode + 'static,
        F: FnMut(T) -> ListenAction + Send + 'static,
    {
        self.check_caller()?;
        let call = CallId::next();
        let (signal, waiter) = oneshot();
        self.submit(move |lp| {
            let ctx = CallContext::new(lp, characteristic, call, signal);
            let listener = Listener::new(ctx.clone(), Decoded::<T, F>::new(on_notification));
            if let Err(err) = lp.subscribe(characteristic, call, listener.into_callback()) {
                ctx.settle(Err(err));
            }
        })?;
        waiter.wait().unwrap_or_else(|| Err(dropped()))
    }

    /// Subscribes to `listen_target`, then writes `value` to `write_target`, then
    /// handles notifications as [Bridge::listen] does.
    ///
    /// No other work runs on the device between the subscription and the write,
    /// so an immediate reply cannot be missed. A failed write ends the call.
    /// A zero `timeout` waits without bound; otherwise the call fails with
    /// [ErrorKind::ListenTimedOut] once it elapses without a result.
    pub fn write_and_listen<V, T, F>(
        &self,
        write_target: Characteristic,
        value: &V,
        listen_target: Characteristic,
        timeout: Duration,
        on_notification: F,
    ) -> Result<()>
    where
        V: Encode + ?Sized,
        T: Decode + 'static,
        F: FnMut(T) -> ListenAction + Send + 'static,
    {
        let sink = Decoded::<T, F>::new(on_notification);
        self.write_then_subscribe(write_target, value, listen_target, timeout, sink)
    }

    /// Like [Bridge::write_and_listen], but collects the raw notification bytes
    /// until exactly `target_len` bytes have arrived, decodes them as one value
    /// and passes it to `on_complete`. Bytes past `target_len` are discarded.
    ///
    /// `on_complete` runs at most once; if it returns
    /// [ListenAction::KeepListening] the call keeps waiting for the device to end
    /// the stream or for the timeout.
    pub fn write_and_assemble<V, T, F>(
        &self,
        write_target: Characteristic,
        value: &V,
        listen_target: Characteristic,
        target_len: usize,
        timeout: Duration,
        on_complete: F,
    ) -> Result<()>
    where
        V: Encode + ?Sized,
        T: Decode + 'static,
        F: FnOnce(T) -> ListenAction + Send + 'static,
    {
        let sink = Assembled::<T, F>::new(target_len, on_complete);
        self.write_then_subscribe(write_target, value, listen_target, timeout, sink)
    }

    fn write_then_subscribe<V, S>(
        &self,
        write_target: Characteristic,
        value: &V,
        listen_target: Characteristic,
        timeout: Duration,
        sink: S,
    ) -> Result<()>
    where
        V: Encode + ?Sized,
        S: NotificationSink + Send + 'static,
    {
        self.check_caller()?;
        let bytes = value.encode().map_err(Error::encode)?;
        let call = CallId::next();
        let (signal, waiter) = oneshot();

        // Subscribe and write within one job, and wait for the job itself so that
        // a rejected subscription is reported right away.
        self.run_sync(move |lp| -> Result<()> {
            let ctx = CallContext::new(lp, listen_target, call, signal);
            let listener = Listener::new(ctx.clone(), sink);
            lp.subscribe(listen_target, call, listener.into_callback())?;
            trace!("writing {} byte(s) to {write_target}", bytes.len());
            lp.device().write(
                write_target,
                bytes,
                Box::new(move |outcome: WriteOutcome| {
                    if let Err(err) = outcome.into_result() {
                        debug!("write to {write_target} failed: {err}");
                        ctx.settle(Err(err));
                    }
                }),
            );
            Ok(())
        })??;

        let guard = defer(|| self.teardown_blocking(listen_target, call));
        match waiter.wait_timeout(timeout) {
            Ok(result) => {
                guard.defuse();
                result
            }
            Err(WaitError::Dropped) => Err(dropped()),
            Err(WaitError::TimedOut) => {
                drop(guard);
                // A result recorded while the subscription was torn down wins.
                waiter.try_take().unwrap_or_else(|| {
                    warn!("no result from {listen_target} within {timeout:?}");
                    Err(ErrorKind::ListenTimedOut.into())
                })
            }
        }
    }

    fn teardown_blocking(&self, characteristic: Characteristic, call: CallId) {
        let _ = self.run_sync(move |lp| lp.teardown(characteristic, call));
    }

    fn check_caller(&self) -> Result<()> {
        if thread::current().id() == self.inner.worker_id {
            return Err(Error::new(
                ErrorKind::EventLoopThread,
                "the event loop would wait for itself",
            ));
        }
        Ok(())
    }

    fn submit(&self, f: impl FnOnce(&mut EventLoop<D>) + Send + 'static) -> Result<()> {
        self.inner.dispatcher.submit(Box::new(f))
    }

    /// Runs `f` on the event loop and blocks until it has returned.
    fn run_sync<R: Send + 'static>(
        &self,
        f: impl FnOnce(&mut EventLoop<D>) -> R + Send + 'static,
    ) -> Result<R> {
        let (signal, waiter) = oneshot();
        self.submit(move |lp| {
            signal.fire(f(lp));
        })?;
        waiter.wait().ok_or_else(|| ErrorKind::NotRunning.into())
    }
}

fn dropped() -> Error {
    Error::new(
        ErrorKind::Cancelled,
        "the device dropped the request before completing it",
    )
}
