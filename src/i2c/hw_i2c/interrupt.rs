// Licensed under the Apache-2.0 license

//! Interrupt-driven transfers for [`HwI2c`].
//!
//! A request moves a `'static` buffer into the engine and generates START;
//! the event handler walks `StartSent -> AddressPhase -> DataPhase ->
//! Complete`. The buffer comes back in a [`Completion`], either through the
//! registered callback or, without one, through [`HwI2c::poll_completion`].
//! Only 7-bit addressing is supported here.
//!
//! The engine is shared between thread mode and the two interrupt handlers
//! through a critical-section mutex; every entry point takes `&mut self`, so
//! all transfer state is plain data.
//!
//! ```ignore
//! static BUS: Mutex<RefCell<Option<Hw1>>> = Mutex::new(RefCell::new(None));
//!
//! #[interrupt]
//! fn I2C1_EV() {
//!     cortex_m::interrupt::free(|cs| {
//!         if let Some(hw) = BUS.borrow(cs).borrow_mut().as_mut() {
//!             hw.on_event_interrupt();
//!         }
//!     });
//! }
//! ```

use super::{HwI2c, Phase};
use crate::common::Logger;
use crate::i2c::common::TransferMode;
use crate::i2c::error::Error;
use crate::i2c::protocol::{Address, Direction, MAX_SEVEN_BIT};
use crate::i2c::registers::Status;
use crate::i2c::traits::{Clock, I2cPeripheral, InterruptLine, PinControl};

/// Progress of the interrupt-driven transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ItState {
    Idle,
    StartSent,
    AddressPhase,
    DataPhase,
    Complete,
}

/// Outcome of an interrupt-driven transfer, handing the buffer back.
#[derive(Debug)]
pub struct Completion {
    pub result: Result<(), Error>,
    pub direction: Direction,
    /// Bytes moved before the transfer ended.
    pub transferred: usize,
    pub buffer: &'static mut [u8],
}

/// A request that was not started; the buffer is returned untouched.
#[derive(Debug)]
pub struct Rejected {
    pub error: Error,
    pub buffer: &'static mut [u8],
}

/// Completion notification, invoked from interrupt context.
pub type TransferCallback = &'static mut dyn FnMut(Completion);

struct Pending {
    addr: u8,
    dir: Direction,
    buffer: &'static mut [u8],
    index: usize,
}

impl Pending {
    fn remaining(&self) -> usize {
        self.buffer.len() - self.index
    }
}

pub(super) struct ItTransfer {
    state: ItState,
    pending: Option<Pending>,
    parked: Option<Completion>,
    callback: Option<TransferCallback>,
}

impl ItTransfer {
    pub(super) const fn new() -> Self {
        Self {
            state: ItState::Idle,
            pending: None,
            parked: None,
            callback: None,
        }
    }

    pub(super) fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// A transfer is running or its buffer still waits to be collected.
    pub(super) fn holds_buffer(&self) -> bool {
        self.pending.is_some() || self.parked.is_some()
    }

    pub(super) fn reset(&mut self) {
        self.pending = None;
        self.parked = None;
        self.state = ItState::Idle;
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
    /// Register (or clear) the completion callback.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `Busy` while a transfer is in flight.
    pub fn set_callback(&mut self, callback: Option<TransferCallback>) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.it.in_flight() {
            return Err(Error::Busy);
        }
        self.it.callback = callback;
        Ok(())
    }

    #[must_use]
    pub fn transfer_state(&self) -> ItState {
        self.it.state
    }

    /// Start an interrupt-driven write of the whole buffer.
    ///
    /// # Errors
    ///
    /// The buffer is handed back with `NotInitialized`, `InvalidParameter`
    /// (wrong mode, empty buffer, address above 0x7F) or `Busy` (a transfer is
    /// in flight or its completion has not been collected).
    pub fn master_transmit_it(&mut self, addr: u8, buffer: &'static mut [u8]) -> Result<(), Rejected> {
        self.submit(addr, Direction::Write, buffer)
    }

    /// Start an interrupt-driven read filling the whole buffer.
    ///
    /// # Errors
    ///
    /// As for [`HwI2c::master_transmit_it`].
    pub fn master_receive_it(&mut self, addr: u8, buffer: &'static mut [u8]) -> Result<(), Rejected> {
        self.submit(addr, Direction::Read, buffer)
    }

    fn submit(&mut self, addr: u8, dir: Direction, buffer: &'static mut [u8]) -> Result<(), Rejected> {
        let error = if !self.initialized {
            Some(Error::NotInitialized)
        } else if self.it.holds_buffer() {
            Some(Error::Busy)
        } else if self.mode != TransferMode::Interrupt || buffer.is_empty() || addr > MAX_SEVEN_BIT {
            Some(Error::InvalidParameter)
        } else {
            None
        };
        if let Some(error) = error {
            return Err(Rejected { error, buffer });
        }

        self.it.pending = Some(Pending {
            addr,
            dir,
            buffer,
            index: 0,
        });
        self.it.state = ItState::StartSent;
        self.regs.set_ack(true);
        self.regs.generate_start();
        Ok(())
    }

    /// Collect a completion parked because no callback was registered.
    ///
    /// # Errors
    ///
    /// `WouldBlock` while the transfer runs, `InvalidParameter` when nothing
    /// was started.
    pub fn poll_completion(&mut self) -> nb::Result<Completion, Error> {
        if let Some(done) = self.it.parked.take() {
            self.it.state = ItState::Idle;
            return Ok(done);
        }
        if self.it.in_flight() {
            Err(nb::Error::WouldBlock)
        } else {
            Err(nb::Error::Other(Error::InvalidParameter))
        }
    }

    fn finish(&mut self, result: Result<(), Error>) {
        let Some(pending) = self.it.pending.take() else {
            return;
        };
        self.it.state = ItState::Complete;
        let done = Completion {
            result,
            direction: pending.dir,
            transferred: pending.index,
            buffer: pending.buffer,
        };
        if let Err(err) = done.result {
            self.logger
                .error(format_args!("hw i2c {:?}: it transfer failed: {err}", self.config.peripheral));
        }
        match self.it.callback.as_mut() {
            Some(callback) => callback(done),
            None => self.it.parked = Some(done),
        }
    }

    /// I2C event interrupt entry point.
    pub fn on_event_interrupt(&mut self) {
        if !self.initialized {
            return;
        }
        if self.slave.is_some() {
            self.on_slave_event();
            return;
        }
        let Some(pending) = self.it.pending.as_mut() else {
            return;
        };
        let status = self.regs.status();

        if status.contains(Status::SB) {
            self.regs
                .write_data(Address::Seven(pending.addr).first_byte(pending.dir));
            self.it.state = ItState::AddressPhase;
        } else if status.contains(Status::ADDR) {
            self.it.state = ItState::DataPhase;
            match pending.dir {
                Direction::Write => {
                    if let Some(&byte) = pending.buffer.first() {
                        self.regs.write_data(byte);
                        pending.index = 1;
                    }
                }
                Direction::Read if pending.remaining() == 1 => {
                    self.regs.set_ack(false);
                    self.regs.generate_stop();
                }
                Direction::Read => {}
            }
        } else if pending.dir == Direction::Read && status.contains(Status::RXNE) {
            let byte = self.regs.read_data();
            if let Some(slot) = pending.buffer.get_mut(pending.index) {
                *slot = byte;
                pending.index += 1;
            }
            match pending.remaining() {
                0 => {
                    self.regs.set_ack(true);
                    self.finish(Ok(()));
                }
                1 => {
                    self.regs.set_ack(false);
                    self.regs.generate_stop();
                }
                _ => {}
            }
        } else if pending.dir == Direction::Write && status.contains(Status::TXE) {
            if let Some(&byte) = pending.buffer.get(pending.index) {
                self.regs.write_data(byte);
                pending.index += 1;
            } else if status.contains(Status::BTF) {
                self.regs.generate_stop();
                self.finish(Ok(()));
            }
        }
    }

    /// I2C error interrupt entry point. Terminates the pending transfer with
    /// the error, whatever its progress.
    pub fn on_error_interrupt(&mut self) {
        if !self.initialized {
            return;
        }
        if self.slave.is_some() {
            self.on_slave_error();
            return;
        }
        let status = self.regs.status();
        let phase = match self.it.state {
            ItState::DataPhase => Phase::Data,
            _ => Phase::Address,
        };
        let error = if status.contains(Status::AF) {
            self.regs.generate_stop();
            self.check_errors(Status::AF, phase)
        } else {
            self.check_errors(status & Status::ERRORS, phase)
        };
        // Flags outside AF/ARLO/BERR (OVR, TIMEOUT) are just cleared.
        self.regs.clear_flags(status & Status::ERRORS);
        let Err(error) = error else {
            return;
        };
        self.regs.set_ack(true);
        self.finish(Err(error));
    }
}
