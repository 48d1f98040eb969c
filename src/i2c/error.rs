// Licensed under the Apache-2.0 license

//! Error type shared by the software and hardware engines.

use core::fmt;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Failure of an engine operation.
///
/// Protocol failures are reported only after the engine has put a STOP
/// condition on the bus, so a returned error never leaves a transaction open.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The instance has not been initialized.
    NotInitialized,
    /// Bad instance index, empty buffer, out-of-range address or a request
    /// that does not fit the current transfer mode.
    InvalidParameter,
    /// Pin clock or pin configuration failed.
    GpioFailure,
    /// A transfer is already in flight, or the bus stayed busy.
    Busy,
    /// A wait for a bus event exceeded its deadline.
    Timeout,
    /// The peer did not acknowledge an address or data byte.
    Nack(NoAcknowledgeSource),
    /// Another master won arbitration (hardware engine only).
    ArbitrationLost,
    /// The controller detected a misplaced START or STOP (hardware engine only).
    BusError,
}

impl Error {
    pub(crate) const fn nack_addr() -> Self {
        Self::Nack(NoAcknowledgeSource::Address)
    }

    pub(crate) const fn nack_data() -> Self {
        Self::Nack(NoAcknowledgeSource::Data)
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match *self {
            Self::Nack(source) => ErrorKind::NoAcknowledge(source),
            Self::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Self::BusError => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => f.write_str("instance not initialized"),
            Self::InvalidParameter => f.write_str("invalid parameter"),
            Self::GpioFailure => f.write_str("pin configuration failed"),
            Self::Busy => f.write_str("bus or instance busy"),
            Self::Timeout => f.write_str("timed out waiting for bus event"),
            Self::Nack(NoAcknowledgeSource::Address) => f.write_str("address not acknowledged"),
            Self::Nack(NoAcknowledgeSource::Data) => f.write_str("data not acknowledged"),
            Self::Nack(NoAcknowledgeSource::Unknown) => f.write_str("not acknowledged"),
            Self::ArbitrationLost => f.write_str("arbitration lost"),
            Self::BusError => f.write_str("bus error"),
        }
    }
}
