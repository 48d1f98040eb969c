// Licensed under the Apache-2.0 license

//! Configuration types for the I2C engines.
//!
//! Each engine instance is described by a configuration record that is built
//! once at startup (see [`crate::board`]) and never modified afterwards.

use fugit::MillisDurationU32 as MilliSeconds;

/// Default timeout used when a caller passes zero milliseconds.
pub const DEFAULT_TIMEOUT: MilliSeconds = MilliSeconds::millis(1000);

/// Default per-address timeout while scanning the bus.
pub const SCAN_TIMEOUT: MilliSeconds = MilliSeconds::millis(10);

/// Bus settle time after the STOP of each scan probe, in microseconds.
pub const SCAN_SETTLE_US: u32 = 100;

/// Map a caller supplied timeout to the effective one (`0` selects the default).
#[must_use]
pub fn effective_timeout(timeout: MilliSeconds, default: MilliSeconds) -> MilliSeconds {
    if timeout.ticks() == 0 {
        default
    } else {
        timeout
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
}

impl I2cSpeed {
    #[must_use]
    pub const fn hz(self) -> u32 {
        self as u32
    }
}

/// How the hardware engine drives a transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferMode {
    /// Calls block and poll status flags until the transfer ends.
    Polling,
    /// Calls return after START; the event/error interrupts run the transfer.
    Interrupt,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

/// One GPIO line: port plus pin number (0..=15).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId {
    pub port: Port,
    pub pin: u8,
}

impl PinId {
    #[must_use]
    pub const fn new(port: Port, pin: u8) -> Self {
        Self { port, pin }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Plain open-drain output driven by software (bit-banged bus).
    OutputOpenDrain,
    /// Open-drain output owned by the I2C peripheral.
    AlternateOpenDrain,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinSpeed {
    Mhz2,
    Mhz10,
    Mhz50,
}

/// Hardware I2C peripheral backing an instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    I2c1,
    I2c2,
}

/// Software engine instance configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SoftI2cConfig {
    pub scl: PinId,
    pub sda: PinId,
    /// Delay between line transitions; the only knob for bus speed.
    pub delay_us: u32,
    pub enabled: bool,
}

pub struct SoftI2cConfigBuilder {
    scl: PinId,
    sda: PinId,
    delay_us: u32,
    enabled: bool,
}

impl Default for SoftI2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftI2cConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scl: PinId::new(Port::B, 8),
            sda: PinId::new(Port::B, 9),
            delay_us: 5,
            enabled: true,
        }
    }
    #[must_use]
    pub const fn pins(mut self, scl: PinId, sda: PinId) -> Self {
        self.scl = scl;
        self.sda = sda;
        self
    }
    #[must_use]
    pub const fn delay_us(mut self, delay_us: u32) -> Self {
        self.delay_us = delay_us;
        self
    }
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    #[must_use]
    pub const fn build(self) -> SoftI2cConfig {
        SoftI2cConfig {
            scl: self.scl,
            sda: self.sda,
            delay_us: self.delay_us,
            enabled: self.enabled,
        }
    }
}

/// Hardware engine instance configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HwI2cConfig {
    pub peripheral: Peripheral,
    pub scl: PinId,
    pub sda: PinId,
    pub speed: I2cSpeed,
    /// Own address, only meaningful when the peripheral is addressed as a target.
    pub own_address: u8,
    /// APB1 clock feeding the peripheral, used for CCR/TRISE computation.
    pub pclk1_hz: u32,
    pub enabled: bool,
}

pub struct HwI2cConfigBuilder {
    peripheral: Peripheral,
    scl: PinId,
    sda: PinId,
    speed: I2cSpeed,
    own_address: u8,
    pclk1_hz: u32,
    enabled: bool,
}

impl Default for HwI2cConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HwI2cConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            peripheral: Peripheral::I2c1,
            scl: PinId::new(Port::B, 6),
            sda: PinId::new(Port::B, 7),
            speed: I2cSpeed::Standard,
            own_address: 0,
            pclk1_hz: 36_000_000,
            enabled: true,
        }
    }
    #[must_use]
    pub const fn peripheral(mut self, peripheral: Peripheral) -> Self {
        self.peripheral = peripheral;
        self
    }
    #[must_use]
    pub const fn pins(mut self, scl: PinId, sda: PinId) -> Self {
        self.scl = scl;
        self.sda = sda;
        self
    }
    #[must_use]
    pub const fn speed(mut self, speed: I2cSpeed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub const fn own_address(mut self, own_address: u8) -> Self {
        self.own_address = own_address;
        self
    }
    #[must_use]
    pub const fn pclk1_hz(mut self, pclk1_hz: u32) -> Self {
        self.pclk1_hz = pclk1_hz;
        self
    }
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    #[must_use]
    pub const fn build(self) -> HwI2cConfig {
        HwI2cConfig {
            peripheral: self.peripheral,
            scl: self.scl,
            sda: self.sda,
            speed: self.speed,
            own_address: self.own_address,
            pclk1_hz: self.pclk1_hz,
            enabled: self.enabled,
        }
    }
}
