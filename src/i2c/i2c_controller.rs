// Licensed under the Apache-2.0 license

//! embedded-hal front end for the engines.
//!
//! Wraps any [`I2cMaster`] so that drivers written against
//! `embedded_hal::i2c::I2c` can run on either engine, with 7-bit or 10-bit
//! addresses. Every call uses the controller's timeout.

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::DEFAULT_TIMEOUT;
use crate::i2c::error::Error;
use crate::i2c::protocol::Address;
use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress, TenBitAddress};
use fugit::MillisDurationU32 as MilliSeconds;

pub struct I2cController<M: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: M,
    pub timeout: MilliSeconds,
    pub logger: L,
}

impl<M: I2cMaster> I2cController<M, NoOpLogger> {
    pub fn new(hardware: M) -> Self {
        Self {
            hardware,
            timeout: DEFAULT_TIMEOUT,
            logger: NoOpLogger,
        }
    }
}

impl<M: I2cMaster, L: Logger> I2cController<M, L> {
    fn run(&mut self, addr: Address, operations: &mut [Operation<'_>]) -> Result<(), Error> {
        self.hardware
            .transaction(addr, operations, self.timeout)
            .inspect_err(|err| {
                self.logger
                    .error(format_args!("i2c {addr:?}: {err}"));
            })
    }
}

impl<M: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<M, L> {
    type Error = Error;
}

impl<M: I2cMaster, L: Logger> embedded_hal::i2c::I2c<SevenBitAddress> for I2cController<M, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.run(addr.into(), &mut [Operation::Read(buffer)])
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.run(addr.into(), &mut [Operation::Write(bytes)])
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.run(
            addr.into(),
            &mut [Operation::Write(bytes), Operation::Read(buffer)],
        )
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run(addr.into(), operations)
    }
}

impl<M: I2cMaster, L: Logger> embedded_hal::i2c::I2c<TenBitAddress> for I2cController<M, L> {
    fn transaction(
        &mut self,
        addr: TenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run(addr.into(), operations)
    }
}
