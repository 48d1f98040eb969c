// Licensed under the Apache-2.0 license

//! Bit-level I2C signal generator on two open-drain GPIO lines.
//!
//! Every transition is followed by the configured delay; that delay is the
//! only thing controlling bus speed. Clock stretching is not detected.

use crate::i2c::common::PinId;
use crate::i2c::traits::{Clock, PinControl};
use embedded_hal::digital::PinState;

/// Acknowledge bit as seen on the ninth clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ack {
    Ack,
    Nack,
}

impl Ack {
    fn level(self) -> PinState {
        match self {
            Self::Ack => PinState::Low,
            Self::Nack => PinState::High,
        }
    }
}

/// Number of clock pulses used to flush a target stuck mid-byte.
pub const RECOVERY_PULSES: usize = 9;

/// Drives SCL/SDA through a [`PinControl`], timing with a [`Clock`].
pub struct SignalGenerator<'a, P: PinControl, C: Clock> {
    pins: &'a mut P,
    clock: &'a mut C,
    scl: PinId,
    sda: PinId,
    delay_us: u32,
}

impl<'a, P: PinControl, C: Clock> SignalGenerator<'a, P, C> {
    pub fn new(pins: &'a mut P, clock: &'a mut C, scl: PinId, sda: PinId, delay_us: u32) -> Self {
        Self {
            pins,
            clock,
            scl,
            sda,
            delay_us,
        }
    }

    fn delay(&mut self) {
        if self.delay_us > 0 {
            self.clock.delay_us(self.delay_us);
        }
    }

    fn scl(&mut self, level: PinState) {
        self.pins.write(self.scl, level);
        self.delay();
    }

    fn sda(&mut self, level: PinState) {
        self.pins.write(self.sda, level);
        self.delay();
    }

    /// Release both lines (bus idle).
    pub fn release(&mut self) {
        self.pins.write(self.scl, PinState::High);
        self.pins.write(self.sda, PinState::High);
    }

    /// SDA falls while SCL is high; leaves SCL low.
    pub fn start(&mut self) {
        self.sda(PinState::High);
        self.scl(PinState::High);
        self.sda(PinState::Low);
        self.scl(PinState::Low);
    }

    /// Repeated START from the middle of a transaction (SCL low on entry).
    pub fn restart(&mut self) {
        // SDA is raised while SCL is still low; raising SCL first would be a STOP.
        self.start();
    }

    /// SDA rises while SCL is high; leaves the bus idle. Does nothing on an
    /// idle bus (both lines high), since every other primitive leaves SCL low.
    pub fn stop(&mut self) {
        if self.pins.read(self.scl) == PinState::High && self.pins.read(self.sda) == PinState::High {
            return;
        }
        self.sda(PinState::Low);
        self.scl(PinState::High);
        self.sda(PinState::High);
    }

    /// Shift a byte out MSB first and sample the acknowledge bit.
    pub fn send_byte(&mut self, byte: u8) -> Ack {
        for bit in (0..8).rev() {
            self.sda(PinState::from(byte & (1 << bit) != 0));
            self.scl(PinState::High);
            self.scl(PinState::Low);
        }
        self.sda(PinState::High);
        self.scl(PinState::High);
        let ack = match self.pins.read(self.sda) {
            PinState::Low => Ack::Ack,
            PinState::High => Ack::Nack,
        };
        self.scl(PinState::Low);
        ack
    }

    /// Shift a byte in MSB first, then drive `ack` on the ninth clock.
    pub fn receive_byte(&mut self, ack: Ack) -> u8 {
        let mut byte = 0u8;
        self.sda(PinState::High);
        for _ in 0..8 {
            self.scl(PinState::High);
            byte <<= 1;
            if self.pins.read(self.sda) == PinState::High {
                byte |= 1;
            }
            self.scl(PinState::Low);
        }
        self.sda(ack.level());
        self.scl(PinState::High);
        self.scl(PinState::Low);
        // Hand SDA back so the target can drive the next bit.
        self.pins.write(self.sda, PinState::High);
        byte
    }

    /// Nine SCL pulses with SDA released, then START + STOP.
    pub fn recover(&mut self) {
        self.pins.write(self.sda, PinState::High);
        for _ in 0..RECOVERY_PULSES {
            self.scl(PinState::Low);
            self.scl(PinState::High);
        }
        self.start();
        self.stop();
    }

    /// Level currently seen on SDA.
    pub fn sda_level(&mut self) -> PinState {
        self.pins.read(self.sda)
    }
}
