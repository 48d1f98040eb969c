// Licensed under the Apache-2.0 license

//! Peripheral-backed I2C master engine.
//!
//! In [`TransferMode::Polling`] every phase is awaited by polling the combined
//! status word against a transfer event, with the error flags (AF, ARLO, BERR)
//! checked in the same loop. In [`TransferMode::Interrupt`] the `*_it` calls
//! only trigger START and the event/error interrupt handlers run the transfer
//! (see the `interrupt` submodule). The same peripheral can instead answer
//! as a bus target (the `slave` submodule).

mod interrupt;
mod slave;

pub use interrupt::{Completion, ItState, Rejected, TransferCallback};
pub use slave::{SlaveHandler, SlaveHandlerRef};

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{HwI2cConfig, Peripheral, PinId, PinMode, PinSpeed, Port, TransferMode};
use crate::i2c::error::Error;
use crate::i2c::protocol::{Address, Direction};
use crate::i2c::registers::{BusTiming, Interrupts, Status};
use crate::i2c::traits::{
    Clock, Deadline, I2cMaster, I2cPeripheral, InterruptLine, PinControl, ReadEnd,
};
use fugit::MillisDurationU32 as MilliSeconds;
use interrupt::ItTransfer;
use slave::SlaveRole;

/// Interrupt sources used by interrupt mode.
const IT_SOURCES: Interrupts = Interrupts::EVT.union(Interrupts::BUF).union(Interrupts::ERR);

/// Which transfer phase a wait belongs to; decides the NACK source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Start,
    Address,
    Data,
}

/// Resolve the pin pair to the peripheral's pin mapping.
///
/// Returns whether the alternate (remapped) pins are used.
fn pin_mapping(peripheral: Peripheral, scl: PinId, sda: PinId) -> Result<bool, Error> {
    let pb = |pin| PinId::new(Port::B, pin);
    match peripheral {
        Peripheral::I2c1 if scl == pb(6) && sda == pb(7) => Ok(false),
        Peripheral::I2c1 if scl == pb(8) && sda == pb(9) => Ok(true),
        Peripheral::I2c2 if scl == pb(10) && sda == pb(11) => Ok(false),
        _ => Err(Error::GpioFailure),
    }
}

pub struct HwI2c<I, P, C, N, L = NoOpLogger>
where
    I: I2cPeripheral,
    P: PinControl,
    C: Clock,
    N: InterruptLine,
    L: Logger,
{
    config: HwI2cConfig,
    regs: I,
    pins: P,
    clock: C,
    irq: N,
    logger: L,
    initialized: bool,
    mode: TransferMode,
    it: ItTransfer,
    slave: Option<SlaveRole>,
}

impl<I, P, C, N> HwI2c<I, P, C, N, NoOpLogger>
where
    I: I2cPeripheral,
    P: PinControl,
    C: Clock,
    N: InterruptLine,
{
    pub fn new(config: HwI2cConfig, regs: I, pins: P, clock: C, irq: N) -> Self {
        Self::with_logger(config, regs, pins, clock, irq, NoOpLogger)
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
    pub fn with_logger(config: HwI2cConfig, regs: I, pins: P, clock: C, irq: N, logger: L) -> Self {
        Self {
            config,
            regs,
            pins,
            clock,
            irq,
            logger,
            initialized: false,
            mode: TransferMode::Polling,
            it: ItTransfer::new(),
            slave: None,
        }
    }

    #[must_use]
    pub fn transfer_mode(&self) -> TransferMode {
        self.mode
    }

    /// Switch between polling and interrupt-driven transfers.
    ///
    /// Leaving interrupt mode masks the peripheral's event/buffer/error
    /// interrupts and the interrupt-controller lines before the mode flag
    /// changes.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, `InvalidParameter` in target mode, or `Busy` while an
    /// interrupt transfer is in flight.
    pub fn set_transfer_mode(&mut self, mode: TransferMode) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.slave.is_some() {
            return Err(Error::InvalidParameter);
        }
        if self.it.in_flight() {
            return Err(Error::Busy);
        }
        if self.mode == TransferMode::Interrupt {
            self.regs.set_interrupts(IT_SOURCES, false);
            self.irq.disable();
        }
        self.mode = mode;
        if mode == TransferMode::Interrupt {
            self.regs.set_interrupts(IT_SOURCES, true);
            self.irq.enable();
        }
        self.logger
            .debug(format_args!("hw i2c {:?}: mode {:?}", self.config.peripheral, mode));
        Ok(())
    }

    fn timing(&self) -> Result<BusTiming, Error> {
        BusTiming::compute(self.config.pclk1_hz, self.config.speed)
    }

    /// PE off, program timing and own address, PE on, ACK on.
    fn program(&mut self, timing: &BusTiming) {
        self.regs.set_enabled(false);
        self.regs.configure(timing, self.config.own_address);
        self.regs.set_enabled(true);
        self.regs.set_ack(true);
    }

    fn configure_pins(&mut self) -> Result<(), P::Error> {
        let HwI2cConfig { scl, sda, .. } = self.config;
        self.pins.enable_clock(scl.port)?;
        if sda.port != scl.port {
            self.pins.enable_clock(sda.port)?;
        }
        self.pins
            .configure(scl, PinMode::AlternateOpenDrain, PinSpeed::Mhz50)?;
        self.pins
            .configure(sda, PinMode::AlternateOpenDrain, PinSpeed::Mhz50)
    }

    fn check_errors(&mut self, status: Status, phase: Phase) -> Result<(), Error> {
        if status.contains(Status::AF) {
            self.regs.clear_flags(Status::AF);
            return Err(match phase {
                Phase::Data => Error::nack_data(),
                Phase::Start | Phase::Address => Error::nack_addr(),
            });
        }
        if status.contains(Status::ARLO) {
            self.regs.clear_flags(Status::ARLO);
            return Err(Error::ArbitrationLost);
        }
        if status.contains(Status::BERR) {
            self.regs.clear_flags(Status::BERR);
            return Err(Error::BusError);
        }
        Ok(())
    }

    /// Poll until every bit of `event` is set. Each wait gets the full
    /// transaction budget.
    fn wait_event(&mut self, event: Status, phase: Phase, deadline: &Deadline) -> Result<(), Error> {
        let window = Deadline::start(&self.clock, deadline.budget());
        loop {
            let status = self.regs.status();
            if status.has_event(event) {
                return Ok(());
            }
            self.check_errors(status, phase)?;
            if window.expired(&self.clock) {
                return Err(Error::Timeout);
            }
        }
    }
}

impl<I, P, C, N, L> I2cMaster for HwI2c<I, P, C, N, L>
where
    I: I2cPeripheral,
    P: PinControl,
    C: Clock,
    N: InterruptLine,
    L: Logger,
{
    type Config = HwI2cConfig;

    fn init(&mut self) -> Result<(), Error> {
        if !self.config.enabled {
            return Err(Error::InvalidParameter);
        }
        if self.initialized {
            return Ok(());
        }
        let remap = pin_mapping(self.config.peripheral, self.config.scl, self.config.sda)
            .inspect_err(|_| {
                self.logger.error(format_args!(
                    "hw i2c {:?}: unsupported pins {:?}/{:?}",
                    self.config.peripheral, self.config.scl, self.config.sda
                ));
            })?;
        let timing = self.timing()?;

        self.regs.enable_clock(true);
        if let Err(err) = self.configure_pins() {
            self.logger
                .error(format_args!("hw i2c: pin setup failed: {err:?}"));
            return Err(Error::GpioFailure);
        }
        if self.config.peripheral == Peripheral::I2c1 {
            self.regs.set_remap(remap);
        }
        self.program(&timing);

        self.initialized = true;
        self.mode = TransferMode::Polling;
        self.logger.debug(format_args!(
            "hw i2c {:?}: up at {} Hz",
            self.config.peripheral,
            self.config.speed.hz()
        ));
        Ok(())
    }

    /// `Busy` while an interrupt transfer holds a buffer, including a
    /// finished one not yet collected with [`HwI2c::poll_completion`].
    fn deinit(&mut self) -> Result<(), Error> {
        if !self.initialized {
            return Ok(());
        }
        if self.it.holds_buffer() {
            return Err(Error::Busy);
        }
        if self.interrupts_armed() {
            self.regs.set_interrupts(IT_SOURCES, false);
            self.irq.disable();
        }
        self.regs.set_enabled(false);
        self.regs.enable_clock(false);
        self.initialized = false;
        self.mode = TransferMode::Polling;
        self.slave = None;
        self.it.reset();
        self.logger
            .debug(format_args!("hw i2c {:?}: down", self.config.peripheral));
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn is_bus_busy(&mut self) -> bool {
        self.initialized && self.regs.status().contains(Status::BUSY)
    }

    /// Pulse SWRST, clear the error flags and restore the configuration
    /// (SWRST clears every register).
    fn software_reset(&mut self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.it.in_flight() {
            return Err(Error::Busy);
        }
        self.regs.set_software_reset(true);
        self.regs.set_software_reset(false);
        self.regs.clear_flags(Status::ERRORS);

        let timing = self.timing()?;
        self.program(&timing);
        if self.interrupts_armed() {
            self.regs.set_interrupts(IT_SOURCES, true);
        }
        self.logger
            .debug(format_args!("hw i2c {:?}: software reset", self.config.peripheral));
        Ok(())
    }

    fn config(&self) -> Result<HwI2cConfig, Error> {
        if self.initialized {
            Ok(self.config)
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn check_ready(&self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.slave.is_some() {
            return Err(Error::InvalidParameter);
        }
        match self.mode {
            TransferMode::Polling => Ok(()),
            TransferMode::Interrupt if self.it.in_flight() => Err(Error::Busy),
            TransferMode::Interrupt => Err(Error::InvalidParameter),
        }
    }

    fn wait_idle(&mut self, timeout: MilliSeconds) -> Result<Deadline, Error> {
        let deadline = Deadline::start(&self.clock, timeout);
        while self.regs.status().contains(Status::BUSY) {
            if deadline.expired(&self.clock) {
                self.logger.error(format_args!(
                    "hw i2c {:?}: bus stayed busy",
                    self.config.peripheral
                ));
                return Err(Error::Busy);
            }
        }
        Ok(Deadline::start(&self.clock, timeout))
    }

    fn start(&mut self, deadline: &Deadline) -> Result<(), Error> {
        self.regs.set_ack(true);
        self.regs.generate_start();
        self.wait_event(Status::MASTER_MODE_SELECT, Phase::Start, deadline)
    }

    fn restart(&mut self, deadline: &Deadline) -> Result<(), Error> {
        self.start(deadline)
    }

    fn send_address(
        &mut self,
        addr: Address,
        dir: Direction,
        deadline: &Deadline,
    ) -> Result<(), Error> {
        let selected = match dir {
            Direction::Write => Status::MASTER_TRANSMITTER_MODE_SELECTED,
            Direction::Read => Status::MASTER_RECEIVER_MODE_SELECTED,
        };
        self.regs.write_data(addr.first_byte(dir));
        if let (Some(low), Direction::Write) = (addr.ten_bit_low(), dir) {
            self.wait_event(Status::MASTER_MODE_ADDRESS10, Phase::Address, deadline)?;
            self.regs.write_data(low);
        }
        self.wait_event(selected, Phase::Address, deadline)
    }

    fn send_bytes(&mut self, bytes: &[u8], deadline: &Deadline) -> Result<(), Error> {
        if bytes.is_empty() {
            return Ok(());
        }
        for &byte in bytes {
            self.wait_event(Status::MASTER_BYTE_TRANSMITTING, Phase::Data, deadline)?;
            self.regs.write_data(byte);
        }
        self.wait_event(Status::MASTER_BYTE_TRANSMITTED, Phase::Data, deadline)
    }

    /// ACK is turned off (and STOP requested, when this read ends the
    /// transaction) before the final byte is clocked in. For a single byte
    /// that is right after the address phase.
    fn receive_bytes(
        &mut self,
        buf: &mut [u8],
        end: ReadEnd,
        deadline: &Deadline,
    ) -> Result<(), Error> {
        let last = buf.len().saturating_sub(1);
        for (i, slot) in buf.iter_mut().enumerate() {
            if i == last && end != ReadEnd::Continue {
                self.regs.set_ack(false);
                if end == ReadEnd::Stop {
                    self.regs.generate_stop();
                }
            }
            self.wait_event(Status::MASTER_BYTE_RECEIVED, Phase::Data, deadline)?;
            *slot = self.regs.read_data();
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.regs.generate_stop();
    }

    fn abort(&mut self, err: Error) {
        self.regs.generate_stop();
        self.regs.set_ack(true);
        self.logger.error(format_args!(
            "hw i2c {:?}: transaction aborted: {err}",
            self.config.peripheral
        ));
    }

    fn bus_delay_us(&mut self, us: u32) {
        self.clock.delay_us(us);
    }
}
