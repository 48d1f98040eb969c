// Licensed under the Apache-2.0 license

//! STM32F1-style I2C master engines.
//!
//! Two engines implement the same [`traits::I2cMaster`] contract: a bit-banged
//! software engine driving two open-drain GPIO lines, and a hardware engine
//! driving the on-chip I2C peripheral, either by polling or from its event and
//! error interrupts. Framing (register access, repeated-START reads, 10-bit
//! addressing, bus scan) lives in one place, on the trait, so both engines put
//! identical transactions on the wire. Intended for bare-metal, `no_std` use.

pub mod bitbang;
pub mod common;
pub mod error;
pub mod gpio;
pub mod hw_i2c;
pub mod i2c_controller;
pub mod instance_table;
pub mod nvic;
pub mod protocol;
pub mod registers;
pub mod soft_i2c;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;
