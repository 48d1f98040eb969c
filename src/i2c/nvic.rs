// Licensed under the Apache-2.0 license

//! NVIC lines of the I2C peripherals.

use crate::i2c::common::Peripheral;
use crate::i2c::traits::InterruptLine;
use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

/// Position of each I2C interrupt in the STM32F1 vector table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum I2cIrq {
    I2c1Event = 31,
    I2c1Error = 32,
    I2c2Event = 33,
    I2c2Error = 34,
}

// SAFETY: every variant is a valid STM32F1 interrupt position.
unsafe impl InterruptNumber for I2cIrq {
    fn number(self) -> u16 {
        self as u16
    }
}

/// Event and error lines of one peripheral.
pub struct NvicLines {
    event: I2cIrq,
    error: I2cIrq,
}

impl NvicLines {
    #[must_use]
    pub const fn new(peripheral: Peripheral) -> Self {
        match peripheral {
            Peripheral::I2c1 => Self {
                event: I2cIrq::I2c1Event,
                error: I2cIrq::I2c1Error,
            },
            Peripheral::I2c2 => Self {
                event: I2cIrq::I2c2Event,
                error: I2cIrq::I2c2Error,
            },
        }
    }

    #[must_use]
    pub fn lines(&self) -> (I2cIrq, I2cIrq) {
        (self.event, self.error)
    }
}

impl InterruptLine for NvicLines {
    fn enable(&mut self) {
        // SAFETY: the handlers for these lines only touch the engine that
        // unmasked them, through the engine's ISR entry points.
        unsafe {
            NVIC::unmask(self.event);
            NVIC::unmask(self.error);
        }
    }

    fn disable(&mut self) {
        NVIC::mask(self.event);
        NVIC::mask(self.error);
    }
}
