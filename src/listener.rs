use std::marker::PhantomData;
use std::rc::Rc;

use log::trace;

use super::assembly::AssemblyBuffer;
use super::async_util::{Completion, Signal};
use super::codec::Decode;
use super::device::{DeviceInterface, NotifyCallback};
use super::error::{Error, ErrorKind};
use super::event_loop::{CallId, EventLoop, Settlements};
use super::{Characteristic, ListenAction, ReadOutcome, Result};

/// State of one subscribing call, shared by the completions that call registers
/// with the device. Only ever touched on the event loop thread.
pub(crate) struct CallContext<D> {
    characteristic: Characteristic,
    call: CallId,
    completion: Rc<Completion<Result<()>>>,
    settlements: Settlements<D>,
}

impl<D> Clone for CallContext<D> {
    fn clone(&self) -> Self {
        Self {
            characteristic: self.characteristic,
            call: self.call,
            completion: self.completion.clone(),
            settlements: self.settlements.clone(),
        }
    }
}

impl<D: DeviceInterface> CallContext<D> {
    pub fn new(
        lp: &EventLoop<D>,
        characteristic: Characteristic,
        call: CallId,
        signal: Signal<Result<()>>,
    ) -> Self {
        Self {
            characteristic,
            call,
            completion: Rc::new(Completion::new(signal)),
            settlements: lp.settlements(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.completion.is_settled()
    }

    /// Ends the call with `result`: the subscription is torn down first, then
    /// the caller is signalled. Later results are ignored.
    pub fn settle(&self, result: Result<()>) {
        if !self.completion.claim() {
            trace!("call {} already settled, ignoring {result:?}", self.call);
            return;
        }
        let (characteristic, call) = (self.characteristic, self.call);
        let completion = self.completion.clone();
        self.settlements.push(move |lp| {
            lp.teardown(characteristic, call);
            completion.fire(result);
        });
    }
}

/// Consumes the raw bytes of each notification.
pub(crate) trait NotificationSink {
    fn accept(&mut self, bytes: Vec<u8>) -> Result<ListenAction>;
}

/// Decodes every notification and hands it to the caller's handler.
pub(crate) struct Decoded<T, F> {
    handler: F,
    _value: PhantomData<fn() -> T>,
}

impl<T, F> Decoded<T, F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _value: PhantomData,
        }
    }
}

impl<T, F> NotificationSink for Decoded<T, F>
where
    T: Decode,
    F: FnMut(T) -> ListenAction,
{
    fn accept(&mut self, bytes: Vec<u8>) -> Result<ListenAction> {
        let value = T::decode(&bytes).map_err(Error::decode)?;
        Ok((self.handler)(value))
    }
}

/// Collects notification bytes until `target_len` is reached, then decodes the
/// whole buffer and hands it to the caller's handler once.
pub(crate) struct Assembled<T, F> {
    buffer: AssemblyBuffer,
    on_complete: Option<F>,
    _value: PhantomData<fn() -> T>,
}

impl<T, F> Assembled<T, F> {
    pub fn new(target_len: usize, on_complete: F) -> Self {
        Self {
            buffer: AssemblyBuffer::new(target_len),
            on_complete: Some(on_complete),
            _value: PhantomData,
        }
    }
}

impl<T, F> NotificationSink for Assembled<T, F>
where
    T: Decode,
    F: FnOnce(T) -> ListenAction,
{
    fn accept(&mut self, bytes: Vec<u8>) -> Result<ListenAction> {
        let taken = self.buffer.push(&bytes);
        if taken < bytes.len() {
            trace!("discarded {} byte(s) past the assembly target", bytes.len() - taken);
        }
        if !self.buffer.is_complete() {
            return Ok(ListenAction::KeepListening);
        }
        let Some(on_complete) = self.on_complete.take() else {
            return Ok(ListenAction::KeepListening);
        };
        let value = T::decode(self.buffer.as_slice()).map_err(Error::decode)?;
        Ok(on_complete(value))
    }
}

/// The notification callback registered with the device for one call.
pub(crate) struct Listener<D, S> {
    ctx: CallContext<D>,
    sink: S,
}

impl<D: DeviceInterface, S: NotificationSink + 'static> Listener<D, S> {
    pub fn new(ctx: CallContext<D>, sink: S) -> Self {
        Self { ctx, sink }
    }

    pub fn into_callback(mut self) -> NotifyCallback {
        Box::new(move |outcome| self.on_outcome(outcome))
    }

    fn on_outcome(&mut self, outcome: ReadOutcome<Vec<u8>>) {
        if self.ctx.is_settled() {
            trace!("notification after the call {} settled", self.ctx.call);
            return;
        }
        let result = match outcome {
            ReadOutcome::Success(bytes) => {
                trace!("{} byte(s) from {}", bytes.len(), self.ctx.characteristic);
                match self.sink.accept(bytes) {
                    Ok(ListenAction::KeepListening) => return,
                    Ok(ListenAction::Done) => Ok(()),
                    Err(err) => Err(err),
                }
            }
            ReadOutcome::Cancelled => Err(ErrorKind::Cancelled.into()),
            ReadOutcome::Failure(err) => Err(err.into()),
        };
        self.ctx.settle(result);
    }
}
