// Licensed under the Apache-2.0 license

//! [`PinControl`] over a pair of embedded-hal pins.
//!
//! The pins must already be in open-drain mode with their port clocked; the
//! HAL that produced them did that. `enable_clock` and `configure` only check
//! that the engine asks for the two lines this adapter owns.

use crate::i2c::common::{PinId, PinMode, PinSpeed, Port};
use crate::i2c::traits::PinControl;
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    /// The engine addressed a line this adapter does not own.
    UnknownPin(PinId),
    /// Hardware pins cannot be handed to the I2C peripheral through this adapter.
    UnsupportedMode(PinMode),
}

pub struct HalPins<SCL, SDA> {
    scl_id: PinId,
    sda_id: PinId,
    scl: SCL,
    sda: SDA,
}

impl<SCL, SDA> HalPins<SCL, SDA>
where
    SCL: OutputPin + InputPin + ErrorType<Error = Infallible>,
    SDA: OutputPin + InputPin + ErrorType<Error = Infallible>,
{
    /// `scl_id`/`sda_id` must match the ids in the engine's configuration.
    pub fn new(scl_id: PinId, scl: SCL, sda_id: PinId, sda: SDA) -> Self {
        Self {
            scl_id,
            sda_id,
            scl,
            sda,
        }
    }

    pub fn release(self) -> (SCL, SDA) {
        (self.scl, self.sda)
    }

    fn owns(&self, pin: PinId) -> bool {
        pin == self.scl_id || pin == self.sda_id
    }
}

impl<SCL, SDA> PinControl for HalPins<SCL, SDA>
where
    SCL: OutputPin + InputPin + ErrorType<Error = Infallible>,
    SDA: OutputPin + InputPin + ErrorType<Error = Infallible>,
{
    type Error = PinError;

    fn enable_clock(&mut self, port: Port) -> Result<(), PinError> {
        if self.scl_id.port == port || self.sda_id.port == port {
            Ok(())
        } else {
            Err(PinError::UnknownPin(PinId::new(port, 0)))
        }
    }

    fn configure(&mut self, pin: PinId, mode: PinMode, _speed: PinSpeed) -> Result<(), PinError> {
        if !self.owns(pin) {
            return Err(PinError::UnknownPin(pin));
        }
        match mode {
            PinMode::OutputOpenDrain => Ok(()),
            PinMode::AlternateOpenDrain => Err(PinError::UnsupportedMode(mode)),
        }
    }

    fn write(&mut self, pin: PinId, level: PinState) {
        if pin == self.scl_id {
            let Ok(()) = self.scl.set_state(level);
        } else if pin == self.sda_id {
            let Ok(()) = self.sda.set_state(level);
        }
    }

    fn read(&mut self, pin: PinId) -> PinState {
        let high = if pin == self.scl_id {
            let Ok(high) = self.scl.is_high();
            high
        } else {
            let Ok(high) = self.sda.is_high();
            high
        };
        PinState::from(high)
    }
}
