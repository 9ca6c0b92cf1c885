//! Blocking access to an asynchronous, single-threaded BLE device interface.
//!
//! A [DeviceInterface] implementation is callback driven and may only be touched
//! from one thread. [Bridge] owns that thread and lets any number of worker threads
//! run multi-step GATT protocols with straight-line blocking calls: reads, writes,
//! notification listening, and the compound write-then-listen and
//! write-then-assemble exchanges, in which the subscription is always set up
//! before the request is written.
//!
//! ```no_run
//! use std::time::Duration;
//! use ble_bridge::{Bridge, Characteristic, DeviceInterface, ListenAction, Result};
//!
//! const CONTROL: Characteristic = Characteristic::from_short(0xfff0, 0xfff1);
//! const DATA: Characteristic = Characteristic::from_short(0xfff0, 0xfff2);
//! const LOG_LEN: Characteristic = Characteristic::from_short(0xfff0, 0xfff3);
//!
//! fn fetch_log<D: DeviceInterface>(bridge: &Bridge<D>) -> Result<Vec<u8>> {
//!     let len: u32 = bridge.read(LOG_LEN)?;
//!     let (tx, rx) = std::sync::mpsc::channel();
//!     bridge.write_and_assemble(
//!         CONTROL,
//!         &[0x01u8],
//!         DATA,
//!         len as usize,
//!         Duration::from_secs(5),
//!         move |log: Vec<u8>| {
//!             let _ = tx.send(log);
//!             ListenAction::Done
//!         },
//!     )?;
//!     Ok(rx.recv().unwrap_or_default())
//! }
//! ```
//!
//! Only one blocking call may own the subscription of a characteristic at a time;
//! a second subscriber fails with [ErrorKind::AlreadySubscribed].

pub use bridge::Bridge;
pub use codec::{Decode, Encode};
pub use config::BridgeConfig;
pub use device::{DeviceInterface, NotifyCallback, ReadCallback, WriteCallback};
pub use error::{CodecError, Error, ErrorKind, TransportError};
pub use event_loop::Dispatcher;
pub use types::*;

/// Convenience alias for a result with [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

pub use uuid::Uuid;
pub mod error;
mod types;

mod assembly;
mod async_util;
mod bridge;
mod codec;
mod config;
mod device;
mod event_loop;
mod listener;
mod util;
