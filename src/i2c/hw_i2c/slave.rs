// Licensed under the Apache-2.0 license

//! Target (slave) mode of [`HwI2c`], 7-bit own address only.
//!
//! With a [`SlaveHandler`] the peripheral is served from the event and error
//! interrupts. Without one, the bus is served by polling with
//! [`HwI2c::slave_transmit`] and [`HwI2c::slave_receive`].

use super::{HwI2c, IT_SOURCES};
use crate::common::Logger;
use crate::i2c::common::{effective_timeout, TransferMode, DEFAULT_TIMEOUT};
use crate::i2c::error::Error;
use crate::i2c::protocol::{Direction, MAX_SEVEN_BIT};
use crate::i2c::registers::Status;
use crate::i2c::traits::{Clock, Deadline, I2cMaster, I2cPeripheral, InterruptLine, PinControl};
use fugit::MillisDurationU32 as MilliSeconds;

/// Bus events seen while addressed by a remote master. Called from
/// interrupt context.
pub trait SlaveHandler {
    /// Own address matched. [`Direction::Read`] means the master reads from us.
    fn on_address_match(&mut self, dir: Direction);

    fn on_byte_received(&mut self, byte: u8);

    /// Next byte for the master; asked once per byte it clocks out.
    fn on_byte_requested(&mut self) -> u8;

    /// STOP after a write, or the master's NACK ending a read.
    fn on_stop(&mut self);
}

pub type SlaveHandlerRef = &'static mut dyn SlaveHandler;

pub(super) struct SlaveRole {
    handler: Option<SlaveHandlerRef>,
}

impl SlaveRole {
    pub(super) fn interrupt_driven(&self) -> bool {
        self.handler.is_some()
    }
}

impl<I, P, C, N, L> HwI2c<I, P, C, N, L>
where
    I: I2cPeripheral,
    P: PinControl,
    C: Clock,
    N: InterruptLine,
    L: Logger,
{
    /// Answer at `address` instead of driving the bus. A master-mode
    /// instance is shut down first.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for an address above 0x7F, `Busy` if an interrupt
    /// transfer still holds a buffer, otherwise as [`I2cMaster::init`].
    pub fn slave_init(&mut self, address: u8, handler: Option<SlaveHandlerRef>) -> Result<(), Error> {
        if address > MAX_SEVEN_BIT {
            return Err(Error::InvalidParameter);
        }
        self.deinit()?;
        self.config.own_address = address;
        self.init()?;

        let role = SlaveRole { handler };
        if role.interrupt_driven() {
            self.regs.set_interrupts(IT_SOURCES, true);
            self.irq.enable();
        }
        self.slave = Some(role);
        self.logger.debug(format_args!(
            "hw i2c {:?}: target at 0x{address:02x}",
            self.config.peripheral
        ));
        Ok(())
    }

    /// # Errors
    ///
    /// `NotInitialized` unless the instance is in target mode.
    pub fn slave_deinit(&mut self) -> Result<(), Error> {
        if self.slave.is_none() {
            return Err(Error::NotInitialized);
        }
        self.deinit()
    }

    #[must_use]
    pub fn is_slave_mode(&self) -> bool {
        self.slave.is_some()
    }

    /// Wait for the data register to empty, then load `byte` for the master.
    ///
    /// # Errors
    ///
    /// `NotInitialized` outside target mode, `Timeout` if the master does not
    /// read in time (zero selects the default).
    pub fn slave_transmit(&mut self, byte: u8, timeout: MilliSeconds) -> Result<(), Error> {
        self.wait_slave(Status::TXE, timeout)?;
        self.regs.write_data(byte);
        Ok(())
    }

    /// Wait for a byte written by the master.
    ///
    /// # Errors
    ///
    /// As for [`HwI2c::slave_transmit`].
    pub fn slave_receive(&mut self, timeout: MilliSeconds) -> Result<u8, Error> {
        self.wait_slave(Status::RXNE, timeout)?;
        Ok(self.regs.read_data())
    }

    /// The status read also clears ADDR once the master has been matched.
    fn wait_slave(&mut self, flag: Status, timeout: MilliSeconds) -> Result<(), Error> {
        if !self.initialized || self.slave.is_none() {
            return Err(Error::NotInitialized);
        }
        let deadline = Deadline::start(&self.clock, effective_timeout(timeout, DEFAULT_TIMEOUT));
        while !self.regs.status().contains(flag) {
            if deadline.expired(&self.clock) {
                return Err(Error::Timeout);
            }
        }
        Ok(())
    }

    pub(super) fn on_slave_event(&mut self) {
        let Some(handler) = self.slave.as_mut().and_then(|role| role.handler.as_mut()) else {
            return;
        };
        let status = self.regs.status();
        let transmitting = status.contains(Status::TRA);

        if status.contains(Status::ADDR) {
            handler.on_address_match(if transmitting {
                Direction::Read
            } else {
                Direction::Write
            });
        }
        if status.contains(Status::RXNE) && !transmitting {
            handler.on_byte_received(self.regs.read_data());
        }
        if status.contains(Status::TXE) && transmitting {
            self.regs.write_data(handler.on_byte_requested());
        }
        if status.contains(Status::STOPF) {
            self.regs.clear_flags(Status::STOPF);
            handler.on_stop();
        }
    }

    /// AF is how a master ends a read; anything else is a fault.
    pub(super) fn on_slave_error(&mut self) {
        let errors = self.regs.status() & Status::ERRORS;
        self.regs.clear_flags(errors);
        if errors.contains(Status::AF) {
            if let Some(handler) = self.slave.as_mut().and_then(|role| role.handler.as_mut()) {
                handler.on_stop();
            }
        }
        let faults = errors.difference(Status::AF);
        if !faults.is_empty() {
            self.logger.error(format_args!(
                "hw i2c {:?}: target mode fault {faults:?}",
                self.config.peripheral
            ));
        }
    }

    pub(super) fn interrupts_armed(&self) -> bool {
        self.mode == TransferMode::Interrupt
            || self.slave.as_ref().is_some_and(SlaveRole::interrupt_driven)
    }
}
