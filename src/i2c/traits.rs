// Licensed under the Apache-2.0 license

//! # I2C Engine Traits
//!
//! The engines sit between two kinds of collaborators:
//!
//! ```text
//! driver / application
//!         │  I2cMaster (transaction level, provided methods)
//!         ▼
//! ┌───────────────────┐      ┌─────────────────────────┐
//! │ SoftI2c (bit-bang)│      │ HwI2c (peripheral)      │
//! └───────┬───────────┘      └──────┬──────────┬───────┘
//!         │ PinControl, Clock        │ I2cPeripheral, InterruptLine
//!         ▼                          ▼          ▼
//!      GPIO lines              I2C registers   NVIC
//! ```
//!
//! An engine implements the *bus phases* of [`I2cMaster`] (START, address,
//! data, STOP, ...). The protocol itself (register framing, repeated-START
//! reads, 10-bit read sequencing, bus scanning and STOP-on-failure) is written
//! once, as provided methods on the trait, so both engines frame every
//! transaction identically.

use crate::i2c::common::{effective_timeout, DEFAULT_TIMEOUT, SCAN_SETTLE_US, SCAN_TIMEOUT};
use crate::i2c::common::{PinId, PinMode, PinSpeed, Port};
use crate::i2c::error::Error;
use crate::i2c::protocol::{Address, Direction, SCAN_RANGE};
use crate::i2c::registers::{BusTiming, Interrupts, Status};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;
use embedded_hal::i2c::Operation;
use fugit::MillisDurationU32 as MilliSeconds;

/// GPIO collaborator used by the software engine for every line transition and
/// by the hardware engine to hand its two pins to the peripheral.
pub trait PinControl {
    type Error: core::fmt::Debug;

    /// Enable the clock of a GPIO port.
    ///
    /// # Errors
    ///
    /// Returns an error if the port does not exist on this device.
    fn enable_clock(&mut self, port: Port) -> Result<(), Self::Error>;

    /// Configure one pin.
    ///
    /// # Errors
    ///
    /// Returns an error if the pin cannot be put into the requested mode.
    fn configure(&mut self, pin: PinId, mode: PinMode, speed: PinSpeed) -> Result<(), Self::Error>;

    /// Drive (or, for open-drain, release on `High`) one line.
    fn write(&mut self, pin: PinId, level: PinState);

    /// Sample the actual line level.
    fn read(&mut self, pin: PinId) -> PinState;
}

/// Monotonic time source and busy-wait delays.
pub trait Clock: DelayNs {
    /// Millisecond tick counter. Free-running, allowed to wrap.
    fn now_ticks(&self) -> u32;

    /// Ticks between `start` and `now`, correct across one wrap.
    fn elapsed(&self, now: u32, start: u32) -> u32 {
        now.wrapping_sub(start)
    }
}

/// A timeout window measured against a [`Clock`].
#[derive(Copy, Clone, Debug)]
pub struct Deadline {
    start: u32,
    budget: MilliSeconds,
}

impl Deadline {
    pub fn start<C: Clock + ?Sized>(clock: &C, budget: MilliSeconds) -> Self {
        Self {
            start: clock.now_ticks(),
            budget,
        }
    }

    pub fn expired<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        clock.elapsed(clock.now_ticks(), self.start) > self.budget.ticks()
    }

    #[must_use]
    pub fn budget(&self) -> MilliSeconds {
        self.budget
    }
}

/// How a read phase ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadEnd {
    /// More read data follows in the same phase: ACK every byte.
    Continue,
    /// A repeated START follows: NACK the last byte, no STOP.
    Restart,
    /// End of transaction: NACK the last byte, then STOP.
    Stop,
}

/// Register-level view of an STM32F1-style (v1) I2C peripheral.
///
/// Status is reported as the combined `SR1 | SR2 << 16` word, which is the
/// form the transfer events are defined in.
pub trait I2cPeripheral {
    fn enable_clock(&mut self, enable: bool);

    /// Route the peripheral to its alternate pin pair.
    fn set_remap(&mut self, remap: bool);

    /// Program clock control, rise time and own address. The peripheral must be disabled.
    fn configure(&mut self, timing: &BusTiming, own_address: u8);

    fn set_enabled(&mut self, enable: bool);
    fn generate_start(&mut self);
    fn generate_stop(&mut self);
    fn set_ack(&mut self, enable: bool);
    fn write_data(&mut self, byte: u8);
    fn read_data(&mut self) -> u8;

    /// Read SR1 then SR2. On real hardware this sequence also clears ADDR.
    fn status(&mut self) -> Status;

    /// Clear SR1 flags: the write-0-to-clear errors, and STOPF.
    fn clear_flags(&mut self, flags: Status);

    fn set_interrupts(&mut self, mask: Interrupts, enable: bool);
    fn set_software_reset(&mut self, asserted: bool);
}

/// Interrupt-controller lines (event + error) of one hardware instance.
pub trait InterruptLine {
    fn enable(&mut self);
    fn disable(&mut self);
}

/// Transaction-level I2C master contract, shared by both engines.
///
/// Implementors supply the bus phases; the transaction operations are
/// provided and must not be overridden. Every provided operation issues a
/// STOP before returning an error raised after START.
///
/// # Examples
///
/// ```rust,ignore
/// use stm32_i2c_engine::i2c::traits::I2cMaster;
/// use fugit::MillisDurationU32 as MilliSeconds;
///
/// fn read_temperature<M: I2cMaster>(bus: &mut M) -> Result<u16, stm32_i2c_engine::i2c::error::Error> {
///     let mut raw = [0u8; 2];
///     bus.master_read_regs(0x68u8, 0x11, &mut raw, MilliSeconds::millis(100))?;
///     Ok(u16::from_be_bytes(raw))
/// }
/// ```
pub trait I2cMaster {
    /// Per-instance configuration record.
    type Config: Copy;

    /// Bring the instance up. Idempotent.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if the instance is disabled in its configuration,
    /// `GpioFailure` if the pins cannot be configured.
    fn init(&mut self) -> Result<(), Error>;

    /// Release the instance. A no-op when not initialized.
    ///
    /// # Errors
    ///
    /// `Busy` if an interrupt-driven transfer is still in flight.
    fn deinit(&mut self) -> Result<(), Error>;

    fn is_initialized(&self) -> bool;

    /// Whether the bus is currently held.
    fn is_bus_busy(&mut self) -> bool;

    /// Recover a stuck bus. Never invoked implicitly.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `Busy` while a transfer is in flight.
    fn software_reset(&mut self) -> Result<(), Error>;

    /// # Errors
    ///
    /// `NotInitialized` before [`I2cMaster::init`].
    fn config(&self) -> Result<Self::Config, Error>;

    // ---- bus phases ----

    /// Check that a blocking transaction may start now.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, `Busy` or `InvalidParameter` (wrong transfer mode).
    fn check_ready(&self) -> Result<(), Error>;

    /// Wait for the bus to become idle and open the transaction's deadline.
    ///
    /// # Errors
    ///
    /// `Busy` if the bus stays held for the whole `timeout`.
    fn wait_idle(&mut self, timeout: MilliSeconds) -> Result<Deadline, Error>;

    /// Put START on the bus.
    ///
    /// # Errors
    ///
    /// Any bus failure; the caller issues STOP.
    fn start(&mut self, deadline: &Deadline) -> Result<(), Error>;

    /// Put a repeated START on the bus.
    ///
    /// # Errors
    ///
    /// Any bus failure; the caller issues STOP.
    fn restart(&mut self, deadline: &Deadline) -> Result<(), Error>;

    /// Send the address phase.
    ///
    /// For `Address::Ten` with `Direction::Write` both address bytes are sent;
    /// with `Direction::Read` only the header byte is sent, which is valid only
    /// after a repeated START that follows a 10-bit write address phase.
    ///
    /// # Errors
    ///
    /// `Nack(Address)` if the address is not acknowledged.
    fn send_address(
        &mut self,
        addr: Address,
        dir: Direction,
        deadline: &Deadline,
    ) -> Result<(), Error>;

    /// Send data bytes; returns once the last one has been acknowledged.
    ///
    /// # Errors
    ///
    /// `Nack(Data)` on the first byte not acknowledged.
    fn send_bytes(&mut self, bytes: &[u8], deadline: &Deadline) -> Result<(), Error>;

    /// Receive `buf.len()` bytes. With [`ReadEnd::Stop`] the engine issues the STOP
    /// itself, at the point its bus timing requires.
    ///
    /// # Errors
    ///
    /// Any bus failure; the caller issues STOP.
    fn receive_bytes(
        &mut self,
        buf: &mut [u8],
        end: ReadEnd,
        deadline: &Deadline,
    ) -> Result<(), Error>;

    /// Put STOP on the bus. Safe to call more than once.
    fn stop(&mut self);

    /// Unwind a failed transaction: STOP plus reporting.
    fn abort(&mut self, err: Error);

    /// Busy-wait.
    fn bus_delay_us(&mut self, us: u32);

    // ---- provided transaction operations ----

    /// Run one transaction body between the idle check and STOP-on-failure.
    #[doc(hidden)]
    fn run_transaction<F>(&mut self, timeout: MilliSeconds, body: F) -> Result<(), Error>
    where
        Self: Sized,
        F: FnOnce(&mut Self, &Deadline) -> Result<(), Error>,
    {
        self.check_ready()?;
        let deadline = self.wait_idle(effective_timeout(timeout, DEFAULT_TIMEOUT))?;
        body(self, &deadline).map_err(|err| {
            self.abort(err);
            err
        })
    }

    /// Address phase for a read that starts a transaction.
    ///
    /// 10-bit reads repeat the full write address phase, then a repeated START
    /// and the header byte with R/W set.
    #[doc(hidden)]
    fn select_for_read(&mut self, addr: Address, deadline: &Deadline) -> Result<(), Error>
    where
        Self: Sized,
    {
        if addr.is_ten_bit() {
            self.send_address(addr, Direction::Write, deadline)?;
            self.restart(deadline)?;
        }
        self.send_address(addr, Direction::Read, deadline)
    }

    /// START, address+W, `prefix`, `bytes`, STOP.
    #[doc(hidden)]
    fn write_prefixed(
        &mut self,
        addr: Address,
        prefix: &[u8],
        bytes: &[u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        let addr = addr.validate()?;
        self.run_transaction(timeout, |bus, deadline| {
            bus.start(deadline)?;
            bus.send_address(addr, Direction::Write, deadline)?;
            bus.send_bytes(prefix, deadline)?;
            bus.send_bytes(bytes, deadline)?;
            bus.stop();
            Ok(())
        })
    }

    /// Write `bytes` to a target.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for an empty buffer or bad address, otherwise any bus failure.
    fn master_transmit<A: Into<Address>>(
        &mut self,
        addr: A,
        bytes: &[u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        if bytes.is_empty() {
            return Err(Error::InvalidParameter);
        }
        self.write_prefixed(addr.into(), &[], bytes, timeout)
    }

    /// Read `buf.len()` bytes from a target, NACKing the last one.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for an empty buffer or bad address, otherwise any bus failure.
    fn master_receive<A: Into<Address>>(
        &mut self,
        addr: A,
        buf: &mut [u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        if buf.is_empty() {
            return Err(Error::InvalidParameter);
        }
        let addr = addr.into().validate()?;
        self.run_transaction(timeout, |bus, deadline| {
            bus.start(deadline)?;
            bus.select_for_read(addr, deadline)?;
            bus.receive_bytes(buf, ReadEnd::Stop, deadline)
        })
    }

    /// Write `bytes`, repeated START, read into `buf`, STOP. No STOP between the phases.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for empty buffers or a bad address, otherwise any bus failure.
    fn write_read<A: Into<Address>>(
        &mut self,
        addr: A,
        bytes: &[u8],
        buf: &mut [u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        if bytes.is_empty() || buf.is_empty() {
            return Err(Error::InvalidParameter);
        }
        let addr = addr.into().validate()?;
        self.run_transaction(timeout, |bus, deadline| {
            bus.start(deadline)?;
            bus.send_address(addr, Direction::Write, deadline)?;
            bus.send_bytes(bytes, deadline)?;
            bus.restart(deadline)?;
            // A 10-bit target stays selected across Sr: only the header is repeated.
            bus.send_address(addr, Direction::Read, deadline)?;
            bus.receive_bytes(buf, ReadEnd::Stop, deadline)
        })
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad address, otherwise any bus failure.
    fn master_write_reg<A: Into<Address>>(
        &mut self,
        addr: A,
        reg: u8,
        value: u8,
        timeout: MilliSeconds,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        self.write_prefixed(addr.into(), &[reg], &[value], timeout)
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad address, otherwise any bus failure.
    fn master_read_reg<A: Into<Address>>(
        &mut self,
        addr: A,
        reg: u8,
        timeout: MilliSeconds,
    ) -> Result<u8, Error>
    where
        Self: Sized,
    {
        let mut value = [0u8; 1];
        self.write_read(addr, &[reg], &mut value, timeout)?;
        Ok(value[0])
    }

    /// Write consecutive registers starting at `reg`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for empty data or a bad address, otherwise any bus failure.
    fn master_write_regs<A: Into<Address>>(
        &mut self,
        addr: A,
        reg: u8,
        data: &[u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        if data.is_empty() {
            return Err(Error::InvalidParameter);
        }
        self.write_prefixed(addr.into(), &[reg], data, timeout)
    }

    /// Read consecutive registers starting at `reg`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for an empty buffer or a bad address, otherwise any bus failure.
    fn master_read_regs<A: Into<Address>>(
        &mut self,
        addr: A,
        reg: u8,
        buf: &mut [u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        self.write_read(addr, &[reg], buf, timeout)
    }

    /// Run an embedded-hal operation list as one transaction.
    ///
    /// Adjacent operations of the same kind are merged; a direction change
    /// emits a repeated START and a new address phase.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a bad address, otherwise any bus failure.
    fn transaction<A: Into<Address>>(
        &mut self,
        addr: A,
        operations: &mut [Operation<'_>],
        timeout: MilliSeconds,
    ) -> Result<(), Error>
    where
        Self: Sized,
    {
        let addr = addr.into().validate()?;
        if operations.is_empty() {
            return Ok(());
        }
        self.run_transaction(timeout, |bus, deadline| {
            let mut current: Option<Direction> = None;
            let mut ops = operations.iter_mut().peekable();
            while let Some(op) = ops.next() {
                let next_is_read = match ops.peek() {
                    Some(Operation::Read(_)) => Some(true),
                    Some(Operation::Write(_)) => Some(false),
                    None => None,
                };
                match op {
                    Operation::Write(bytes) => {
                        if current != Some(Direction::Write) {
                            match current {
                                None => bus.start(deadline)?,
                                Some(_) => bus.restart(deadline)?,
                            }
                            bus.send_address(addr, Direction::Write, deadline)?;
                            current = Some(Direction::Write);
                        }
                        bus.send_bytes(bytes, deadline)?;
                    }
                    Operation::Read(buf) => {
                        if current != Some(Direction::Read) {
                            match current {
                                None => {
                                    bus.start(deadline)?;
                                    bus.select_for_read(addr, deadline)?;
                                }
                                Some(_) => {
                                    bus.restart(deadline)?;
                                    bus.send_address(addr, Direction::Read, deadline)?;
                                }
                            }
                            current = Some(Direction::Read);
                        }
                        let end = match next_is_read {
                            Some(true) => ReadEnd::Continue,
                            Some(false) => ReadEnd::Restart,
                            None => ReadEnd::Stop,
                        };
                        if !buf.is_empty() {
                            bus.receive_bytes(buf, end, deadline)?;
                        } else if end == ReadEnd::Stop {
                            bus.stop();
                        }
                    }
                }
            }
            if current == Some(Direction::Write) {
                bus.stop();
            }
            Ok(())
        })
    }

    /// Probe every address in `0x08..=0x77` with a write address phase and
    /// collect the ones that ACK, up to `max_count` (and the capacity `N`).
    ///
    /// Each probed address gets exactly one STOP followed by a short settle
    /// delay. `timeout` applies per address; zero selects 10 ms.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` if `max_count` is zero, `NotInitialized` or `Busy`
    /// as for any transaction. Probe failures are not errors.
    fn scan_bus<const N: usize>(
        &mut self,
        max_count: usize,
        timeout: MilliSeconds,
    ) -> Result<heapless::Vec<u8, N>, Error>
    where
        Self: Sized,
    {
        if max_count == 0 || N == 0 {
            return Err(Error::InvalidParameter);
        }
        self.check_ready()?;
        let timeout = effective_timeout(timeout, SCAN_TIMEOUT);
        let limit = max_count.min(N);
        let mut found = heapless::Vec::new();

        for addr in SCAN_RANGE {
            if found.len() >= limit {
                break;
            }
            // Skipped, not probed: nothing was put on the bus.
            let Ok(deadline) = self.wait_idle(timeout) else {
                continue;
            };
            let acked = self
                .start(&deadline)
                .and_then(|()| self.send_address(Address::Seven(addr), Direction::Write, &deadline))
                .is_ok();
            self.stop();
            self.bus_delay_us(SCAN_SETTLE_US);
            if acked && found.push(addr).is_err() {
                break;
            }
        }
        Ok(found)
    }
}
