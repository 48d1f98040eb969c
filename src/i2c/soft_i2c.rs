// Licensed under the Apache-2.0 license

//! Bit-banged I2C master engine.
//!
//! Entirely synchronous: a call returns once the transaction has completed,
//! failed or timed out. The transaction deadline is checked after START and
//! after every byte.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::bitbang::{Ack, SignalGenerator};
use crate::i2c::common::{PinMode, PinSpeed, SoftI2cConfig};
use crate::i2c::error::Error;
use crate::i2c::protocol::{Address, Direction};
use crate::i2c::traits::{Clock, Deadline, I2cMaster, PinControl, ReadEnd};
use embedded_hal::digital::PinState;
use fugit::MillisDurationU32 as MilliSeconds;

/// Settle time after releasing both lines during init.
const INIT_SETTLE_US: u32 = 10;

pub struct SoftI2c<P: PinControl, C: Clock, L: Logger = NoOpLogger> {
    config: SoftI2cConfig,
    pins: P,
    clock: C,
    logger: L,
    initialized: bool,
}

impl<P: PinControl, C: Clock> SoftI2c<P, C, NoOpLogger> {
    pub fn new(config: SoftI2cConfig, pins: P, clock: C) -> Self {
        Self::with_logger(config, pins, clock, NoOpLogger)
    }
}

impl<P: PinControl, C: Clock, L: Logger> SoftI2c<P, C, L> {
    pub fn with_logger(config: SoftI2cConfig, pins: P, clock: C, logger: L) -> Self {
        Self {
            config,
            pins,
            clock,
            logger,
            initialized: false,
        }
    }

    /// Direct access to the pin collaborator.
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// Give back the collaborators.
    pub fn release(self) -> (P, C, L) {
        (self.pins, self.clock, self.logger)
    }

    fn signals(&mut self) -> SignalGenerator<'_, P, C> {
        SignalGenerator::new(
            &mut self.pins,
            &mut self.clock,
            self.config.scl,
            self.config.sda,
            self.config.delay_us,
        )
    }

    fn check_deadline(&self, deadline: &Deadline) -> Result<(), Error> {
        if deadline.expired(&self.clock) {
            Err(Error::Timeout)
        } else {
            Ok(())
        }
    }

    fn send(&mut self, byte: u8, nack: Error, deadline: &Deadline) -> Result<(), Error> {
        if self.signals().send_byte(byte) == Ack::Nack {
            return Err(nack);
        }
        self.check_deadline(deadline)
    }

    fn configure_pins(&mut self) -> Result<(), P::Error> {
        let SoftI2cConfig { scl, sda, .. } = self.config;
        self.pins.enable_clock(scl.port)?;
        if sda.port != scl.port {
            self.pins.enable_clock(sda.port)?;
        }
        self.pins
            .configure(scl, PinMode::OutputOpenDrain, PinSpeed::Mhz50)?;
        self.pins
            .configure(sda, PinMode::OutputOpenDrain, PinSpeed::Mhz50)
    }
}

impl<P: PinControl, C: Clock, L: Logger> I2cMaster for SoftI2c<P, C, L> {
    type Config = SoftI2cConfig;

    fn init(&mut self) -> Result<(), Error> {
        if !self.config.enabled {
            return Err(Error::InvalidParameter);
        }
        if self.initialized {
            return Ok(());
        }
        if let Err(err) = self.configure_pins() {
            self.logger
                .error(format_args!("soft i2c: pin setup failed: {err:?}"));
            return Err(Error::GpioFailure);
        }
        self.signals().release();
        self.clock.delay_us(INIT_SETTLE_US);
        self.initialized = true;
        self.logger.debug(format_args!(
            "soft i2c: up on {:?}/{:?}, {} us bit delay",
            self.config.scl, self.config.sda, self.config.delay_us
        ));
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), Error> {
        if self.initialized {
            self.signals().release();
            self.initialized = false;
            self.logger.debug(format_args!("soft i2c: down"));
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// SDA held low means someone owns the bus. An uninitialized instance
    /// counts as busy.
    fn is_bus_busy(&mut self) -> bool {
        if !self.initialized {
            return true;
        }
        self.signals().sda_level() == PinState::Low
    }

    fn software_reset(&mut self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        self.signals().recover();
        self.logger.debug(format_args!("soft i2c: bus recovery done"));
        Ok(())
    }

    fn config(&self) -> Result<SoftI2cConfig, Error> {
        if self.initialized {
            Ok(self.config)
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn check_ready(&self) -> Result<(), Error> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn wait_idle(&mut self, timeout: MilliSeconds) -> Result<Deadline, Error> {
        Ok(Deadline::start(&self.clock, timeout))
    }

    fn start(&mut self, deadline: &Deadline) -> Result<(), Error> {
        self.signals().start();
        self.check_deadline(deadline)
    }

    fn restart(&mut self, deadline: &Deadline) -> Result<(), Error> {
        self.signals().restart();
        self.check_deadline(deadline)
    }

    fn send_address(
        &mut self,
        addr: Address,
        dir: Direction,
        deadline: &Deadline,
    ) -> Result<(), Error> {
        self.send(addr.first_byte(dir), Error::nack_addr(), deadline)?;
        match (addr.ten_bit_low(), dir) {
            (Some(low), Direction::Write) => self.send(low, Error::nack_addr(), deadline),
            _ => Ok(()),
        }
    }

    fn send_bytes(&mut self, bytes: &[u8], deadline: &Deadline) -> Result<(), Error> {
        for &byte in bytes {
            self.send(byte, Error::nack_data(), deadline)?;
        }
        Ok(())
    }

    fn receive_bytes(
        &mut self,
        buf: &mut [u8],
        end: ReadEnd,
        deadline: &Deadline,
    ) -> Result<(), Error> {
        let last = buf.len().saturating_sub(1);
        for (i, slot) in buf.iter_mut().enumerate() {
            let ack = if i == last && end != ReadEnd::Continue {
                Ack::Nack
            } else {
                Ack::Ack
            };
            *slot = self.signals().receive_byte(ack);
            self.check_deadline(deadline)?;
        }
        if end == ReadEnd::Stop {
            self.signals().stop();
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.signals().stop();
    }

    fn abort(&mut self, err: Error) {
        self.signals().stop();
        self.logger
            .error(format_args!("soft i2c: transaction aborted: {err}"));
    }

    fn bus_delay_us(&mut self, us: u32) {
        self.clock.delay_us(us);
    }
}
