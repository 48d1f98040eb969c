// Licensed under the Apache-2.0 license

//! STM32F1 I2C (v1) register model.
//!
//! Status bits are packed as `SR1 | SR2 << 16`, so one mask can describe a
//! whole master event (EV5, EV6, EV8, ...).

use crate::i2c::common::{I2cSpeed, Peripheral};
use crate::i2c::error::Error;
use crate::i2c::traits::I2cPeripheral;
use bitflags::bitflags;
use core::ops::Deref;
use stm32f1::stm32f103::{i2c1, rcc, AFIO, I2C1, I2C2, RCC};

bitflags! {
    /// Combined SR1/SR2 status word.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Status: u32 {
        /// Start condition generated.
        const SB      = 1 << 0;
        /// Address sent and acknowledged.
        const ADDR    = 1 << 1;
        /// Byte transfer finished.
        const BTF     = 1 << 2;
        /// 10-bit header sent.
        const ADD10   = 1 << 3;
        const STOPF   = 1 << 4;
        /// Data register not empty (receiver).
        const RXNE    = 1 << 6;
        /// Data register empty (transmitter).
        const TXE     = 1 << 7;
        const BERR    = 1 << 8;
        const ARLO    = 1 << 9;
        /// Acknowledge failure.
        const AF      = 1 << 10;
        const OVR     = 1 << 11;
        const TIMEOUT = 1 << 14;
        /// Master mode.
        const MSL     = 1 << 16;
        /// Bus busy.
        const BUSY    = 1 << 17;
        /// Transmitter.
        const TRA     = 1 << 18;
    }
}

impl Status {
    /// EV5: START sent, master mode.
    pub const MASTER_MODE_SELECT: Self =
        Self::from_bits_retain(Self::BUSY.bits() | Self::MSL.bits() | Self::SB.bits());
    /// EV6 (transmitter): address ACKed.
    pub const MASTER_TRANSMITTER_MODE_SELECTED: Self = Self::from_bits_retain(
        Self::BUSY.bits() | Self::MSL.bits() | Self::ADDR.bits() | Self::TXE.bits() | Self::TRA.bits(),
    );
    /// EV6 (receiver): address ACKed.
    pub const MASTER_RECEIVER_MODE_SELECTED: Self =
        Self::from_bits_retain(Self::BUSY.bits() | Self::MSL.bits() | Self::ADDR.bits());
    /// EV9: 10-bit header sent.
    pub const MASTER_MODE_ADDRESS10: Self =
        Self::from_bits_retain(Self::BUSY.bits() | Self::MSL.bits() | Self::ADD10.bits());
    /// EV8: data register empty, shifting.
    pub const MASTER_BYTE_TRANSMITTING: Self = Self::from_bits_retain(
        Self::TRA.bits() | Self::BUSY.bits() | Self::MSL.bits() | Self::TXE.bits(),
    );
    /// EV8_2: last byte shifted out and ACKed.
    pub const MASTER_BYTE_TRANSMITTED: Self = Self::from_bits_retain(
        Self::TRA.bits() | Self::BUSY.bits() | Self::MSL.bits() | Self::TXE.bits() | Self::BTF.bits(),
    );
    /// EV7: byte received.
    pub const MASTER_BYTE_RECEIVED: Self =
        Self::from_bits_retain(Self::BUSY.bits() | Self::MSL.bits() | Self::RXNE.bits());

    /// Error flags checked alongside every awaited event.
    pub const ERRORS: Self =
        Self::from_bits_retain(Self::AF.bits() | Self::ARLO.bits() | Self::BERR.bits());

    /// Whether every bit of `event` is set.
    #[must_use]
    pub fn has_event(self, event: Self) -> bool {
        self.contains(event)
    }
}

bitflags! {
    /// CR2 interrupt enables.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Interrupts: u32 {
        const ERR = 1 << 8;
        const EVT = 1 << 9;
        const BUF = 1 << 10;
    }
}

const CR2_FREQ_MASK: u32 = 0x3F;
const CCR_FS: u32 = 1 << 15;
const CCR_DUTY: u32 = 1 << 14;
const OAR1_BIT14: u32 = 1 << 14;

/// Clock control values derived from the APB1 clock and the bus speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BusTiming {
    pub freq_mhz: u8,
    /// CCR including the F/S and DUTY bits.
    pub ccr: u16,
    pub trise: u8,
}

impl BusTiming {
    /// # Errors
    ///
    /// `InvalidParameter` if `pclk1_hz` is outside 2..=36 MHz.
    pub fn compute(pclk1_hz: u32, speed: I2cSpeed) -> Result<Self, Error> {
        let freq_mhz = pclk1_hz / 1_000_000;
        if !(2..=36).contains(&freq_mhz) {
            return Err(Error::InvalidParameter);
        }
        let (ccr, trise) = match speed {
            I2cSpeed::Standard => {
                // Thigh = Tlow = CCR * Tpclk
                let ccr = (pclk1_hz / (speed.hz() * 2)).max(4);
                (ccr, freq_mhz + 1)
            }
            I2cSpeed::Fast => {
                // Duty 16/9: Thigh = 9 * CCR * Tpclk, Tlow = 16 * CCR * Tpclk
                let ccr = (pclk1_hz / (speed.hz() * 25)).max(1);
                (ccr | CCR_FS | CCR_DUTY, freq_mhz * 300 / 1000 + 1)
            }
        };
        Ok(Self {
            freq_mhz: freq_mhz as u8,
            ccr: (ccr & 0xFFFF) as u16,
            trise: (trise & 0x3F) as u8,
        })
    }
}

/// An I2C register block of the STM32F103.
pub trait Instance: Deref<Target = i2c1::RegisterBlock> {
    const PERIPHERAL: Peripheral;

    fn set_clock(rcc: &rcc::RegisterBlock, enable: bool);
}

impl Instance for I2C1 {
    const PERIPHERAL: Peripheral = Peripheral::I2c1;

    fn set_clock(rcc: &rcc::RegisterBlock, enable: bool) {
        rcc.apb1enr.modify(|_, w| w.i2c1en().bit(enable));
    }
}

impl Instance for I2C2 {
    const PERIPHERAL: Peripheral = Peripheral::I2c2;

    fn set_clock(rcc: &rcc::RegisterBlock, enable: bool) {
        rcc.apb1enr.modify(|_, w| w.i2c2en().bit(enable));
    }
}

/// STM32F1 I2C peripheral driven through the device crate's register block.
pub struct Stm32I2c<I: Instance> {
    i2c: I,
}

impl<I: Instance> Stm32I2c<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    #[must_use]
    pub fn peripheral(&self) -> Peripheral {
        I::PERIPHERAL
    }

    /// Give the register block back.
    pub fn free(self) -> I {
        self.i2c
    }
}

impl<I: Instance> I2cPeripheral for Stm32I2c<I> {
    fn enable_clock(&mut self, enable: bool) {
        // SAFETY: read-modify-write of this peripheral's enable bit only.
        let rcc = unsafe { &*RCC::ptr() };
        I::set_clock(rcc, enable);
    }

    fn set_remap(&mut self, remap: bool) {
        // SAFETY: as in `enable_clock`; AFIO_MAPR is touched for I2C1_REMAP only.
        let (rcc, afio) = unsafe { (&*RCC::ptr(), &*AFIO::ptr()) };
        rcc.apb2enr.modify(|_, w| w.afioen().set_bit());
        afio.mapr.modify(|_, w| w.i2c1_remap().bit(remap));
    }

    fn configure(&mut self, timing: &BusTiming, own_address: u8) {
        let freq = u32::from(timing.freq_mhz);
        self.i2c
            .cr2
            .modify(|r, w| unsafe { w.bits((r.bits() & !CR2_FREQ_MASK) | freq) });
        self.i2c.ccr.write(|w| unsafe { w.bits(u32::from(timing.ccr)) });
        self.i2c
            .trise
            .write(|w| unsafe { w.bits(u32::from(timing.trise)) });
        // Bit 14 of OAR1 must be kept at 1 by software.
        let oar1 = OAR1_BIT14 | (u32::from(own_address) << 1);
        self.i2c.oar1.write(|w| unsafe { w.bits(oar1) });
    }

    fn set_enabled(&mut self, enable: bool) {
        self.i2c.cr1.modify(|_, w| w.pe().bit(enable));
    }

    fn generate_start(&mut self) {
        self.i2c.cr1.modify(|_, w| w.start().set_bit());
    }

    fn generate_stop(&mut self) {
        self.i2c.cr1.modify(|_, w| w.stop().set_bit());
    }

    fn set_ack(&mut self, enable: bool) {
        self.i2c.cr1.modify(|_, w| w.ack().bit(enable));
    }

    fn write_data(&mut self, byte: u8) {
        self.i2c.dr.write(|w| unsafe { w.bits(u32::from(byte)) });
    }

    fn read_data(&mut self) -> u8 {
        self.i2c.dr.read().dr().bits()
    }

    fn status(&mut self) -> Status {
        let sr1 = self.i2c.sr1.read().bits() & 0xFFFF;
        let sr2 = self.i2c.sr2.read().bits() & 0xFFFF;
        Status::from_bits_retain(sr1 | (sr2 << 16))
    }

    /// Error flags are rc_w0. STOPF clears on the CR1 write that follows the
    /// SR1 read done by [`I2cPeripheral::status`].
    fn clear_flags(&mut self, flags: Status) {
        let mask = flags.bits() & 0xFFFF & !Status::STOPF.bits();
        if mask != 0 {
            self.i2c.sr1.write(|w| unsafe { w.bits(!mask & 0xFFFF) });
        }
        if flags.contains(Status::STOPF) {
            self.i2c.cr1.modify(|_, w| w);
        }
    }

    fn set_interrupts(&mut self, mask: Interrupts, enable: bool) {
        self.i2c.cr2.modify(|_, w| {
            if mask.contains(Interrupts::ERR) {
                w.iterren().bit(enable);
            }
            if mask.contains(Interrupts::EVT) {
                w.itevten().bit(enable);
            }
            if mask.contains(Interrupts::BUF) {
                w.itbufen().bit(enable);
            }
            w
        });
    }

    fn set_software_reset(&mut self, asserted: bool) {
        self.i2c.cr1.modify(|_, w| w.swrst().bit(asserted));
    }
}
