use uuid::Uuid;

use super::error::{ErrorKind, TransportError};
use super::Result;

/// The Bluetooth SIG base UUID, `00000000-0000-1000-8000-00805F9B34FB`.
const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Names one characteristic of the remote device.
///
/// It is only a handle; the device interface decides what it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Characteristic {
    service: Uuid,
    uuid: Uuid,
}

impl Characteristic {
    pub const fn new(service: Uuid, uuid: Uuid) -> Self {
        Self { service, uuid }
    }

    /// Builds a characteristic from 16-bit SIG-assigned numbers, expanded over the
    /// Bluetooth base UUID.
    pub const fn from_short(service: u16, uuid: u16) -> Self {
        Self {
            service: Uuid::from_u128(BLUETOOTH_BASE_UUID | ((service as u128) << 96)),
            uuid: Uuid::from_u128(BLUETOOTH_BASE_UUID | ((uuid as u128) << 96)),
        }
    }

    /// The [Uuid] of the service containing this characteristic.
    pub fn service(&self) -> Uuid {
        self.service
    }

    /// The [Uuid] identifying the type of this characteristic.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl std::fmt::Display for Characteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service, self.uuid)
    }
}

/// Returned by notification handlers to decide whether the subscription continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenAction {
    KeepListening,
    Done,
}

/// Result of one asynchronous read, or of one notification delivery.
#[derive(Debug, Clone)]
pub enum ReadOutcome<T> {
    Success(T),
    Cancelled,
    Failure(TransportError),
}

impl<T> ReadOutcome<T> {
    /// Converts `Cancelled` and `Failure` into the matching [crate::Error].
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(val) => Ok(val),
            Self::Cancelled => Err(ErrorKind::Cancelled.into()),
            Self::Failure(err) => Err(err.into()),
        }
    }
}

/// Result of one asynchronous write.
#[derive(Debug, Clone)]
pub enum WriteOutcome {
    Success,
    Cancelled,
    Failure(TransportError),
}

impl WriteOutcome {
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::Cancelled => Err(ErrorKind::Cancelled.into()),
            Self::Failure(err) => Err(err.into()),
        }
    }
}
