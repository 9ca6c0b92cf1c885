use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use async_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use super::config::BridgeConfig;
use super::device::{DeviceInterface, NotifyCallback};
use super::error::{Error, ErrorKind};
use super::{Characteristic, Result};

/// A unit of work executed on the event loop thread.
pub(crate) type Job<D> = Box<dyn FnOnce(&mut EventLoop<D>) + Send>;

type Settlement<D> = Box<dyn FnOnce(&mut EventLoop<D>)>;

/// Identifies one blocking call, so that teardown only touches the
/// subscription that call established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CallId(usize);

impl CallId {
    pub fn next() -> Self {
        static NEXT_CALL_ID: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Posts work to the event loop thread from any thread.
///
/// The device interface receives one on construction and uses it to deliver
/// completions that originate on other threads.
pub struct Dispatcher<D> {
    jobs: Sender<Job<D>>,
}

impl<D> Clone for Dispatcher<D> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
        }
    }
}

impl<D> std::fmt::Debug for Dispatcher<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.jobs.len())
            .finish()
    }
}

impl<D: DeviceInterface> Dispatcher<D> {
    /// Runs `f` against the device on the event loop thread, without waiting for it.
    pub fn dispatch(&self, f: impl FnOnce(&mut D) + Send + 'static) -> Result<()> {
        self.submit(Box::new(move |lp: &mut EventLoop<D>| f(&mut lp.device)))
    }

    pub(crate) fn submit(&self, job: Job<D>) -> Result<()> {
        self.jobs
            .try_send(job)
            .map_err(|_| ErrorKind::NotRunning.into())
    }
}

/// Settlements scheduled by completions; the loop runs them right after the
/// job during which they were scheduled.
pub(crate) struct Settlements<D>(Rc<RefCell<VecDeque<Settlement<D>>>>);

impl<D> Clone for Settlements<D> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<D: DeviceInterface> Settlements<D> {
    pub fn push(&self, settlement: impl FnOnce(&mut EventLoop<D>) + 'static) {
        self.0.borrow_mut().push_back(Box::new(settlement));
    }

    fn pop(&self) -> Option<Settlement<D>> {
        self.0.borrow_mut().pop_front()
    }
}

/// State owned by the event loop thread.
pub(crate) struct EventLoop<D> {
    device: D,
    owners: HashMap<Characteristic, CallId>,
    settlements: Settlements<D>,
    running: bool,
}

impl<D: DeviceInterface> EventLoop<D> {
    fn new(device: D) -> Self {
        Self {
            device,
            owners: HashMap::new(),
            settlements: Settlements(Rc::new(RefCell::new(VecDeque::new()))),
            running: true,
        }
    }

    pub fn device(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn settlements(&self) -> Settlements<D> {
        self.settlements.clone()
    }

    /// Subscribes on behalf of `call`.
    ///
    /// Only one call may own the subscription of a characteristic; a second
    /// subscriber is rejected, as is a characteristic the device already reports
    /// as subscribed by someone else.
    pub fn subscribe(
        &mut self,
        characteristic: Characteristic,
        call: CallId,
        on_result: NotifyCallback,
    ) -> Result<()> {
        if let Some(owner) = self.owners.get(&characteristic) {
            warn!("rejected subscription to {characteristic} for call {call}: owned by call {owner}");
            return Err(Error::new(
                ErrorKind::AlreadySubscribed,
                format!("{characteristic} is subscribed by another call"),
            ));
        }
        if self.device.is_subscribed(characteristic) {
            warn!("rejected subscription to {characteristic} for call {call}: subscribed outside the bridge");
            return Err(Error::new(
                ErrorKind::AlreadySubscribed,
                format!("{characteristic} is already subscribed on the device"),
            ));
        }
        debug!("subscribing to {characteristic} for call {call}");
        self.owners.insert(characteristic, call);
        self.device.listen(characteristic, on_result);
        Ok(())
    }

    /// Releases the subscription of `characteristic` if `call` still owns it,
    /// unsubscribing only while the device reports it active.
    pub fn teardown(&mut self, characteristic: Characteristic, call: CallId) {
        if self.owners.get(&characteristic) != Some(&call) {
            return;
        }
        self.owners.remove(&characteristic);
        if self.device.is_subscribed(characteristic) {
            debug!("unsubscribing from {characteristic} for call {call}");
            self.device.unsubscribe(characteristic);
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    fn run(mut self, queue: Receiver<Job<D>>) {
        while self.running {
            let Ok(job) = queue.recv_blocking() else {
                break;
            };
            // Caller handlers run inside jobs. A panic stops the loop.
            if panic::catch_unwind(AssertUnwindSafe(|| {
                job(&mut self);
                self.run_settlements();
            }))
            .is_err()
            {
                error!("a job panicked on the event loop thread, stopping");
                self.running = false;
            }
        }

        queue.close();
        let mut dropped = 0;
        while queue.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("dropped {dropped} pending job(s) on shutdown");
        }

        let owned: Vec<_> = self.owners.iter().map(|(c, call)| (*c, *call)).collect();
        for (characteristic, call) in owned {
            self.teardown(characteristic, call);
        }
        let _ = panic::catch_unwind(AssertUnwindSafe(|| self.run_settlements()));
    }

    fn run_settlements(&mut self) {
        while let Some(settlement) = self.settlements.pop() {
            settlement(self);
        }
    }
}

/// Starts the event loop thread and constructs the device on it.
pub(crate) fn spawn<D, F>(
    config: &BridgeConfig,
    make_device: F,
) -> Result<(Dispatcher<D>, JoinHandle<()>)>
where
    D: DeviceInterface,
    F: FnOnce(Dispatcher<D>) -> D + Send + 'static,
{
    let (jobs, queue) = async_channel::unbounded();
    let dispatcher = Dispatcher { jobs };
    let for_device = dispatcher.clone();

    let mut builder = thread::Builder::new().name(config.thread_name.clone());
    if let Some(size) = config.stack_size {
        builder = builder.stack_size(size);
    }
    let handle = builder
        .spawn(move || {
            info!("event loop started");
            let device = make_device(for_device);
            EventLoop::new(device).run(queue);
            info!("event loop stopped");
        })
        .map_err(|e| {
            Error::with_source(
                ErrorKind::NotRunning,
                e,
                "failed to spawn the event loop thread",
            )
        })?;
    Ok((dispatcher, handle))
}
