// Licensed under the Apache-2.0 license

//! Address framing shared by both engines.
//!
//! 7-bit address byte: `A6..A0 R/W`.
//! 10-bit header byte: `1 1 1 1 0 A9 A8 R/W`, followed by `A7..A0` as a plain byte.

use crate::i2c::error::Error;
use core::ops::RangeInclusive;

/// Addresses probed by a bus scan. 0x00..=0x07 and 0x78..=0x7F are reserved.
pub const SCAN_RANGE: RangeInclusive<u8> = 0x08..=0x77;

pub const MAX_SEVEN_BIT: u8 = 0x7F;
pub const MAX_TEN_BIT: u16 = 0x3FF;

const TEN_BIT_HEADER: u8 = 0b1111_0000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    const fn bit(self) -> u8 {
        match self {
            Self::Write => 0,
            Self::Read => 1,
        }
    }
}

/// Target address in either addressing mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Address {
    Seven(u8),
    Ten(u16),
}

impl From<u8> for Address {
    fn from(value: u8) -> Self {
        Self::Seven(value)
    }
}

impl From<u16> for Address {
    fn from(value: u16) -> Self {
        Self::Ten(value)
    }
}

impl Address {
    /// Reject addresses outside their mode's range.
    pub fn validate(self) -> Result<Self, Error> {
        match self {
            Self::Seven(a) if a > MAX_SEVEN_BIT => Err(Error::InvalidParameter),
            Self::Ten(a) if a > MAX_TEN_BIT => Err(Error::InvalidParameter),
            _ => Ok(self),
        }
    }

    #[must_use]
    pub const fn is_ten_bit(self) -> bool {
        matches!(self, Self::Ten(_))
    }

    /// First byte on the wire after START for the given direction.
    ///
    /// For a 10-bit address this is the header byte; the low byte follows
    /// separately (see [`Address::ten_bit_low`]).
    #[must_use]
    pub const fn first_byte(self, dir: Direction) -> u8 {
        match self {
            Self::Seven(a) => (a << 1) | dir.bit(),
            Self::Ten(a) => TEN_BIT_HEADER | ((((a >> 8) & 0x03) as u8) << 1) | dir.bit(),
        }
    }

    /// Second address byte of a 10-bit address.
    #[must_use]
    pub const fn ten_bit_low(self) -> Option<u8> {
        match self {
            Self::Seven(_) => None,
            Self::Ten(a) => Some((a & 0xFF) as u8),
        }
    }
}

/// Whether a byte seen right after START is a 10-bit header.
#[must_use]
pub const fn is_ten_bit_header(byte: u8) -> bool {
    byte & 0b1111_1000 == TEN_BIT_HEADER
}
