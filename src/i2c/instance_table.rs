// Licensed under the Apache-2.0 license

//! # Indexed Engine Instances
//!
//! Drivers address a bus by instance number (`init(id)`,
//! `master_read_reg(id, ...)`). Engines of different kinds are different
//! types, so the table stores them through the [`AnyEngine`] enum, which is a
//! single type that forwards every bus phase to the engine it wraps:
//!
//! ```rust,ignore
//! let mut buses: InstanceTable<AnyEngine<SoftBus, HwBus>, 3> = InstanceTable::new([
//!     AnyEngine::Soft(soft1),
//!     AnyEngine::Soft(soft2),
//!     AnyEngine::Hw(i2c1),
//! ]);
//! buses.init(2)?;
//! let chip_id = buses.master_read_reg(2, 0x68u8, 0x75, MilliSeconds::millis(100))?;
//! ```
//!
//! An out-of-range index is `InvalidParameter`. The table also keeps the last
//! error each instance reported.

use crate::common::Logger;
use crate::i2c::common::{HwI2cConfig, SoftI2cConfig, TransferMode};
use crate::i2c::error::Error;
use crate::i2c::hw_i2c::{Completion, HwI2c, ItState, Rejected, SlaveHandlerRef, TransferCallback};
use crate::i2c::protocol::{Address, Direction};
use crate::i2c::traits::{
    Clock, Deadline, I2cMaster, I2cPeripheral, InterruptLine, PinControl, ReadEnd,
};
use fugit::MillisDurationU32 as MilliSeconds;

/// Configuration of either engine kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstanceConfig {
    Soft(SoftI2cConfig),
    Hw(HwI2cConfig),
}

/// One engine of either kind.
pub enum AnyEngine<S, H> {
    Soft(S),
    Hw(H),
}

macro_rules! dispatch {
    ($self:ident, $engine:ident => $call:expr) => {
        match $self {
            AnyEngine::Soft($engine) => $call,
            AnyEngine::Hw($engine) => $call,
        }
    };
}

impl<S, H> I2cMaster for AnyEngine<S, H>
where
    S: I2cMaster<Config = SoftI2cConfig>,
    H: I2cMaster<Config = HwI2cConfig>,
{
    type Config = InstanceConfig;

    fn init(&mut self) -> Result<(), Error> {
        dispatch!(self, e => e.init())
    }

    fn deinit(&mut self) -> Result<(), Error> {
        dispatch!(self, e => e.deinit())
    }

    fn is_initialized(&self) -> bool {
        dispatch!(self, e => e.is_initialized())
    }

    fn is_bus_busy(&mut self) -> bool {
        dispatch!(self, e => e.is_bus_busy())
    }

    fn software_reset(&mut self) -> Result<(), Error> {
        dispatch!(self, e => e.software_reset())
    }

    fn config(&self) -> Result<InstanceConfig, Error> {
        match self {
            Self::Soft(e) => e.config().map(InstanceConfig::Soft),
            Self::Hw(e) => e.config().map(InstanceConfig::Hw),
        }
    }

    fn check_ready(&self) -> Result<(), Error> {
        dispatch!(self, e => e.check_ready())
    }

    fn wait_idle(&mut self, timeout: MilliSeconds) -> Result<Deadline, Error> {
        dispatch!(self, e => e.wait_idle(timeout))
    }

    fn start(&mut self, deadline: &Deadline) -> Result<(), Error> {
        dispatch!(self, e => e.start(deadline))
    }

    fn restart(&mut self, deadline: &Deadline) -> Result<(), Error> {
        dispatch!(self, e => e.restart(deadline))
    }

    fn send_address(
        &mut self,
        addr: Address,
        dir: Direction,
        deadline: &Deadline,
    ) -> Result<(), Error> {
        dispatch!(self, e => e.send_address(addr, dir, deadline))
    }

    fn send_bytes(&mut self, bytes: &[u8], deadline: &Deadline) -> Result<(), Error> {
        dispatch!(self, e => e.send_bytes(bytes, deadline))
    }

    fn receive_bytes(
        &mut self,
        buf: &mut [u8],
        end: ReadEnd,
        deadline: &Deadline,
    ) -> Result<(), Error> {
        dispatch!(self, e => e.receive_bytes(buf, end, deadline))
    }

    fn stop(&mut self) {
        dispatch!(self, e => e.stop());
    }

    fn abort(&mut self, err: Error) {
        dispatch!(self, e => e.abort(err));
    }

    fn bus_delay_us(&mut self, us: u32) {
        dispatch!(self, e => e.bus_delay_us(us));
    }
}

/// Statically sized set of engine instances, addressed by index.
pub struct InstanceTable<E, const N: usize> {
    engines: [E; N],
    last_error: [Option<Error>; N],
}

impl<E: I2cMaster, const N: usize> InstanceTable<E, N> {
    pub fn new(engines: [E; N]) -> Self {
        Self {
            engines,
            last_error: [None; N],
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// # Errors
    ///
    /// `InvalidParameter` for an index outside the table.
    pub fn get_mut(&mut self, id: usize) -> Result<&mut E, Error> {
        self.engines.get_mut(id).ok_or(Error::InvalidParameter)
    }

    /// Most recent failure reported by instance `id`, if any.
    #[must_use]
    pub fn last_error(&self, id: usize) -> Option<Error> {
        self.last_error.get(id).copied().flatten()
    }

    fn with<T>(
        &mut self,
        id: usize,
        op: impl FnOnce(&mut E) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let engine = self.engines.get_mut(id).ok_or(Error::InvalidParameter)?;
        let result = op(engine);
        if let Err(err) = result {
            self.record(id, err);
        }
        result
    }

    fn record(&mut self, id: usize, err: Error) {
        if let Some(slot) = self.last_error.get_mut(id) {
            *slot = Some(err);
        }
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::init`].
    pub fn init(&mut self, id: usize) -> Result<(), Error> {
        self.with(id, I2cMaster::init)
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::deinit`].
    pub fn deinit(&mut self, id: usize) -> Result<(), Error> {
        self.with(id, I2cMaster::deinit)
    }

    /// `false` for a bad index.
    #[must_use]
    pub fn is_initialized(&self, id: usize) -> bool {
        self.engines.get(id).is_some_and(I2cMaster::is_initialized)
    }

    /// `false` for a bad index.
    pub fn is_bus_busy(&mut self, id: usize) -> bool {
        self.engines.get_mut(id).is_some_and(I2cMaster::is_bus_busy)
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::software_reset`].
    pub fn software_reset(&mut self, id: usize) -> Result<(), Error> {
        self.with(id, I2cMaster::software_reset)
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, `NotInitialized` before init.
    pub fn config(&self, id: usize) -> Result<E::Config, Error> {
        self.engines
            .get(id)
            .ok_or(Error::InvalidParameter)?
            .config()
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::master_transmit`].
    pub fn master_transmit<A: Into<Address>>(
        &mut self,
        id: usize,
        addr: A,
        bytes: &[u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error> {
        self.with(id, |e| e.master_transmit(addr, bytes, timeout))
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::master_receive`].
    pub fn master_receive<A: Into<Address>>(
        &mut self,
        id: usize,
        addr: A,
        buf: &mut [u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error> {
        self.with(id, |e| e.master_receive(addr, buf, timeout))
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::master_write_reg`].
    pub fn master_write_reg<A: Into<Address>>(
        &mut self,
        id: usize,
        addr: A,
        reg: u8,
        value: u8,
        timeout: MilliSeconds,
    ) -> Result<(), Error> {
        self.with(id, |e| e.master_write_reg(addr, reg, value, timeout))
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::master_read_reg`].
    pub fn master_read_reg<A: Into<Address>>(
        &mut self,
        id: usize,
        addr: A,
        reg: u8,
        timeout: MilliSeconds,
    ) -> Result<u8, Error> {
        self.with(id, |e| e.master_read_reg(addr, reg, timeout))
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::master_write_regs`].
    pub fn master_write_regs<A: Into<Address>>(
        &mut self,
        id: usize,
        addr: A,
        reg: u8,
        data: &[u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error> {
        self.with(id, |e| e.master_write_regs(addr, reg, data, timeout))
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::master_read_regs`].
    pub fn master_read_regs<A: Into<Address>>(
        &mut self,
        id: usize,
        addr: A,
        reg: u8,
        buf: &mut [u8],
        timeout: MilliSeconds,
    ) -> Result<(), Error> {
        self.with(id, |e| e.master_read_regs(addr, reg, buf, timeout))
    }

    /// # Errors
    ///
    /// `InvalidParameter` for a bad index, otherwise as [`I2cMaster::scan_bus`].
    pub fn scan_bus<const M: usize>(
        &mut self,
        id: usize,
        max_count: usize,
        timeout: MilliSeconds,
    ) -> Result<heapless::Vec<u8, M>, Error> {
        self.with(id, |e| e.scan_bus(max_count, timeout))
    }
}

/// Interrupt-mode operations, available on hardware instances only.
impl<S, I, P, C, Q, L, const N: usize> InstanceTable<AnyEngine<S, HwI2c<I, P, C, Q, L>>, N>
where
    S: I2cMaster<Config = SoftI2cConfig>,
    I: I2cPeripheral,
    P: PinControl,
    C: Clock,
    Q: InterruptLine,
    L: Logger,
{
    fn hw(&mut self, id: usize) -> Result<&mut HwI2c<I, P, C, Q, L>, Error> {
        match self.engines.get_mut(id) {
            Some(AnyEngine::Hw(hw)) => Ok(hw),
            _ => Err(Error::InvalidParameter),
        }
    }

    fn with_hw<T>(
        &mut self,
        id: usize,
        op: impl FnOnce(&mut HwI2c<I, P, C, Q, L>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let result = self.hw(id).and_then(op);
        if let Err(err) = result {
            self.record(id, err);
        }
        result
    }

    /// Software instances only accept `Polling`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a bad index or `Interrupt` on a software
    /// instance, otherwise as [`HwI2c::set_transfer_mode`].
    pub fn set_transfer_mode(&mut self, id: usize, mode: TransferMode) -> Result<(), Error> {
        let result = match self.engines.get_mut(id) {
            Some(AnyEngine::Hw(hw)) => hw.set_transfer_mode(mode),
            Some(AnyEngine::Soft(soft)) if mode == TransferMode::Polling => soft.check_ready(),
            _ => Err(Error::InvalidParameter),
        };
        if let Err(err) = result {
            self.record(id, err);
        }
        result
    }

    /// # Errors
    ///
    /// `InvalidParameter` unless `id` is a hardware instance, otherwise as
    /// [`HwI2c::set_callback`].
    pub fn set_callback(&mut self, id: usize, callback: Option<TransferCallback>) -> Result<(), Error> {
        self.with_hw(id, |hw| hw.set_callback(callback))
    }

    /// # Errors
    ///
    /// The buffer comes back with `InvalidParameter` unless `id` is a hardware
    /// instance, otherwise as [`HwI2c::master_transmit_it`].
    pub fn master_transmit_it(
        &mut self,
        id: usize,
        addr: u8,
        buffer: &'static mut [u8],
    ) -> Result<(), Rejected> {
        let result = match self.hw(id) {
            Ok(hw) => hw.master_transmit_it(addr, buffer),
            Err(error) => Err(Rejected { error, buffer }),
        };
        if let Err(rejected) = &result {
            self.record(id, rejected.error);
        }
        result
    }

    /// # Errors
    ///
    /// As for [`InstanceTable::master_transmit_it`].
    pub fn master_receive_it(
        &mut self,
        id: usize,
        addr: u8,
        buffer: &'static mut [u8],
    ) -> Result<(), Rejected> {
        let result = match self.hw(id) {
            Ok(hw) => hw.master_receive_it(addr, buffer),
            Err(error) => Err(Rejected { error, buffer }),
        };
        if let Err(rejected) = &result {
            self.record(id, rejected.error);
        }
        result
    }

    /// A completion carrying an error is recorded like a failed call.
    ///
    /// # Errors
    ///
    /// `Other(InvalidParameter)` unless `id` is a hardware instance, otherwise
    /// as [`HwI2c::poll_completion`].
    pub fn poll_completion(&mut self, id: usize) -> nb::Result<Completion, Error> {
        let result = self.hw(id).map_err(nb::Error::Other)?.poll_completion();
        match &result {
            Ok(Completion { result: Err(err), .. }) | Err(nb::Error::Other(err)) => {
                self.record(id, *err);
            }
            _ => {}
        }
        result
    }

    /// # Errors
    ///
    /// `InvalidParameter` unless `id` is a hardware instance, otherwise as
    /// [`HwI2c::slave_init`].
    pub fn slave_init(
        &mut self,
        id: usize,
        address: u8,
        handler: Option<SlaveHandlerRef>,
    ) -> Result<(), Error> {
        self.with_hw(id, |hw| hw.slave_init(address, handler))
    }

    /// # Errors
    ///
    /// As for [`HwI2c::slave_deinit`].
    pub fn slave_deinit(&mut self, id: usize) -> Result<(), Error> {
        self.with_hw(id, HwI2c::slave_deinit)
    }

    /// # Errors
    ///
    /// As for [`HwI2c::slave_transmit`].
    pub fn slave_transmit(&mut self, id: usize, byte: u8, timeout: MilliSeconds) -> Result<(), Error> {
        self.with_hw(id, |hw| hw.slave_transmit(byte, timeout))
    }

    /// # Errors
    ///
    /// As for [`HwI2c::slave_receive`].
    pub fn slave_receive(&mut self, id: usize, timeout: MilliSeconds) -> Result<u8, Error> {
        self.with_hw(id, |hw| hw.slave_receive(timeout))
    }

    /// `false` unless `id` is a hardware instance in target mode.
    pub fn is_slave_mode(&mut self, id: usize) -> bool {
        self.hw(id).is_ok_and(|hw| hw.is_slave_mode())
    }

    /// `None` unless `id` is a hardware instance.
    pub fn transfer_state(&mut self, id: usize) -> Option<ItState> {
        self.hw(id).ok().map(|hw| hw.transfer_state())
    }

    /// Event interrupt of instance `id`; ignored for other kinds.
    pub fn on_event_interrupt(&mut self, id: usize) {
        if let Ok(hw) = self.hw(id) {
            hw.on_event_interrupt();
        }
    }

    /// Error interrupt of instance `id`; ignored for other kinds.
    pub fn on_error_interrupt(&mut self, id: usize) {
        if let Ok(hw) = self.hw(id) {
            hw.on_error_interrupt();
        }
    }
}
