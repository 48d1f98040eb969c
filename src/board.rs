// Licensed under the Apache-2.0 license

//! Instance tables of the reference board.
//!
//! Two software buses and one hardware bus. Each entry expands to a
//! `<NAME>_CONFIG` constant and a `<name>()` constructor that takes the
//! board's collaborators. Hardware constructors take the device crate's
//! peripheral singleton.

use crate::i2c::common::{
    HwI2cConfig, HwI2cConfigBuilder, I2cSpeed, Peripheral, PinId, Port, SoftI2cConfig,
    SoftI2cConfigBuilder,
};
use crate::i2c::hw_i2c::HwI2c;
use crate::i2c::nvic::NvicLines;
use crate::i2c::soft_i2c::SoftI2c;
use crate::i2c::registers::Stm32I2c;
use crate::i2c::traits::{Clock, PinControl};

macro_rules! soft_instances {
    ($( $name:ident => ($scl:literal, $sda:literal, $delay_us:literal) ),* $(,)?) => {
        paste::paste! {
            $(
                pub const [<$name:upper _CONFIG>]: SoftI2cConfig = SoftI2cConfigBuilder::new()
                    .pins(PinId::new(Port::B, $scl), PinId::new(Port::B, $sda))
                    .delay_us($delay_us)
                    .build();

                pub fn [<$name:lower>]<P: PinControl, C: Clock>(pins: P, clock: C) -> SoftI2c<P, C> {
                    SoftI2c::new([<$name:upper _CONFIG>], pins, clock)
                }
            )*
        }
    };
}

macro_rules! hw_instances {
    ($( $name:ident => ($periph:ident, $pac:ident, $scl:literal, $sda:literal, $speed:ident, $own:literal) ),* $(,)?) => {
        paste::paste! {
            $(
                pub const [<$name:upper _CONFIG>]: HwI2cConfig = HwI2cConfigBuilder::new()
                    .peripheral(Peripheral::$periph)
                    .pins(PinId::new(Port::B, $scl), PinId::new(Port::B, $sda))
                    .speed(I2cSpeed::$speed)
                    .own_address($own)
                    .build();

                pub fn [<$name:lower>]<P: PinControl, C: Clock>(
                    i2c: stm32f1::stm32f103::$pac,
                    pins: P,
                    clock: C,
                ) -> HwI2c<Stm32I2c<stm32f1::stm32f103::$pac>, P, C, NvicLines> {
                    HwI2c::new(
                        [<$name:upper _CONFIG>],
                        Stm32I2c::new(i2c),
                        pins,
                        clock,
                        NvicLines::new(Peripheral::$periph),
                    )
                }
            )*
        }
    };
}

soft_instances! {
    soft_i2c1 => (8, 9, 5),
    soft_i2c2 => (10, 11, 5),
}

hw_instances! {
    hw_i2c1 => (I2c1, I2C1, 6, 7, Standard, 0x00),
}
