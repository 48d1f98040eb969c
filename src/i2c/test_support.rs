// Licensed under the Apache-2.0 license

//! Host-side simulations used by the engine tests.
//!
//! * [`SimOpenDrainBus`]: two wired-AND lines with targets that decode the
//!   waveform bit by bit (software engine).
//! * [`SimPeripheral`]: a register-level model of the v1 I2C peripheral with
//!   the same targets behind it (hardware engine).
//!
//! Both record what happened on the bus as a list of [`BusEvent`]s.

use crate::i2c::common::{PinId, PinMode, PinSpeed, Port};
use crate::i2c::protocol::{is_ten_bit_header, Address};
use crate::i2c::registers::{BusTiming, Interrupts, Status};
use crate::i2c::traits::{Clock, I2cPeripheral, InterruptLine, PinControl};
use core::cell::Cell;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::PinState;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusEvent {
    Start,
    Restart,
    /// Address byte (7-bit address byte, 10-bit header or 10-bit low byte).
    Address(u8),
    Write(u8),
    Read { byte: u8, acked: bool },
    /// A master-to-target byte went unacknowledged.
    Nack,
    Stop,
    /// STOP requested while the final byte is still being received.
    StopRequested,
}

/// Millisecond clock advanced by reads and delays, never by wall time.
#[derive(Default)]
pub struct SimClock {
    now: Cell<u32>,
    /// Added to the counter after every `now_ticks` read.
    pub auto_advance_ms: u32,
    /// Added to the counter on every delay call.
    pub ms_per_delay_call: u32,
    delayed_ns: u64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ticks: u32) -> Self {
        let clock = Self::default();
        clock.now.set(ticks);
        clock
    }

    /// Current tick without advancing.
    pub fn peek(&self) -> u32 {
        self.now.get()
    }

    pub fn delayed_us(&self) -> u64 {
        self.delayed_ns / 1000
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.delayed_ns += u64::from(ns);
        self.now
            .set(self.now.get().wrapping_add(self.ms_per_delay_call));
    }
}

impl Clock for SimClock {
    fn now_ticks(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.auto_advance_ms));
        now
    }
}

/// Interrupt-controller lines that only remember their state.
#[derive(Default)]
pub struct SimIrq {
    pub enabled: bool,
    pub disable_calls: usize,
}

impl InterruptLine for SimIrq {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.disable_calls += 1;
    }
}

/// A register-file style target device.
///
/// The first byte written after the address sets the register pointer; further
/// bytes are stored and advance it. Reads return `read_data` first, then the
/// registers from the pointer on.
pub struct SimTarget {
    pub address: Address,
    pub registers: [u8; 256],
    pub read_data: Vec<u8>,
    /// Index of the byte (within one write phase) to NACK.
    pub nack_data_at: Option<usize>,
    /// Falling SCL edges during which the device keeps SDA low.
    pub stuck_low_for: u32,
    received: Vec<u8>,
    pointer: u8,
    write_index: usize,
}

impl SimTarget {
    pub fn new(addr: u8) -> Self {
        Self::at(Address::Seven(addr))
    }

    pub fn new_ten_bit(addr: u16) -> Self {
        Self::at(Address::Ten(addr))
    }

    fn at(address: Address) -> Self {
        Self {
            address,
            registers: [0; 256],
            read_data: Vec::new(),
            nack_data_at: None,
            stuck_low_for: 0,
            received: Vec::new(),
            pointer: 0,
            write_index: 0,
        }
    }

    /// Every data byte the device accepted.
    pub fn received(&self) -> Vec<u8> {
        self.received.clone()
    }

    fn write(&mut self, byte: u8) -> bool {
        let index = self.write_index;
        self.write_index += 1;
        if self.nack_data_at == Some(index) {
            return false;
        }
        if index == 0 {
            self.pointer = byte;
        } else {
            self.registers[usize::from(self.pointer)] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
        self.received.push(byte);
        true
    }

    fn read(&mut self) -> u8 {
        if self.read_data.is_empty() {
            let value = self.registers[usize::from(self.pointer)];
            self.pointer = self.pointer.wrapping_add(1);
            value
        } else {
            self.read_data.remove(0)
        }
    }
}

fn ten_upper(target: &SimTarget) -> Option<u8> {
    match target.address {
        Address::Ten(a) => Some(((a >> 8) & 0x03) as u8),
        Address::Seven(_) => None,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AddrOutcome {
    Selected { read: bool },
    /// 10-bit header accepted; the low byte follows.
    AwaitLow,
    Nack,
}

/// Targets on one bus plus who is currently addressed.
struct Targets {
    list: Vec<SimTarget>,
    selected: Option<usize>,
    /// A9..A8 of an accepted 10-bit header.
    ten_pending: Option<u8>,
    /// Selected by a 10-bit write; stays selected across Sr.
    ten_selected: Option<usize>,
}

impl Targets {
    fn new(list: Vec<SimTarget>) -> Self {
        Self {
            list,
            selected: None,
            ten_pending: None,
            ten_selected: None,
        }
    }

    fn start(&mut self, repeated: bool) {
        self.selected = None;
        self.ten_pending = None;
        if !repeated {
            self.ten_selected = None;
        }
        for target in &mut self.list {
            target.write_index = 0;
        }
    }

    fn stop(&mut self) {
        self.selected = None;
        self.ten_pending = None;
        self.ten_selected = None;
    }

    fn address(&mut self, byte: u8) -> AddrOutcome {
        let read = byte & 1 == 1;
        if is_ten_bit_header(byte) {
            let upper = (byte >> 1) & 0x03;
            if read {
                return match self.ten_selected {
                    Some(i) if ten_upper(&self.list[i]) == Some(upper) => {
                        self.selected = Some(i);
                        AddrOutcome::Selected { read: true }
                    }
                    _ => AddrOutcome::Nack,
                };
            }
            return if self.list.iter().any(|t| ten_upper(t) == Some(upper)) {
                self.ten_pending = Some(upper);
                AddrOutcome::AwaitLow
            } else {
                AddrOutcome::Nack
            };
        }
        let addr = byte >> 1;
        match self
            .list
            .iter()
            .position(|t| t.address == Address::Seven(addr))
        {
            Some(i) => {
                self.selected = Some(i);
                AddrOutcome::Selected { read }
            }
            None => AddrOutcome::Nack,
        }
    }

    fn ten_low(&mut self, byte: u8) -> bool {
        let Some(upper) = self.ten_pending.take() else {
            return false;
        };
        let wanted = Address::Ten((u16::from(upper) << 8) | u16::from(byte));
        match self.list.iter().position(|t| t.address == wanted) {
            Some(i) => {
                self.selected = Some(i);
                self.ten_selected = Some(i);
                true
            }
            None => false,
        }
    }

    fn write(&mut self, byte: u8) -> bool {
        match self.selected {
            Some(i) => self.list[i].write(byte),
            None => false,
        }
    }

    fn read(&mut self) -> u8 {
        match self.selected {
            Some(i) => self.list[i].read(),
            None => 0xFF,
        }
    }
}

// ---------------------------------------------------------------------------
// Open-drain line model
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ByteKind {
    Address,
    TenLow,
    Data,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Next {
    MasterWrites(ByteKind),
    TargetSends,
    Ignore,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LinePhase {
    Idle,
    /// Master shifting a byte in to the targets.
    Incoming { kind: ByteKind, bits: u8, value: u8 },
    /// Ninth clock of an incoming byte; the target drives ACK.
    AckSlot { ack: bool, next: Next },
    /// Target shifting a byte out.
    Outgoing { value: u8, bits: u8 },
    /// Ninth clock of an outgoing byte; the master drives ACK.
    MasterAck { value: u8 },
    /// Waiting for START or STOP.
    Ignore,
}

/// Two open-drain lines (SCL on PB8, SDA on PB9) shared by the master and
/// simulated targets.
pub struct SimOpenDrainBus {
    pub fail_configure: bool,
    scl_pin: PinId,
    sda_pin: PinId,
    master_scl: PinState,
    master_sda: PinState,
    target_sda: PinState,
    phase: LinePhase,
    targets: Targets,
    trace: Vec<BusEvent>,
    configured: Vec<PinId>,
    scl_pulses: usize,
}

impl SimOpenDrainBus {
    pub fn new(targets: Vec<SimTarget>) -> Self {
        Self {
            fail_configure: false,
            scl_pin: PinId::new(Port::B, 8),
            sda_pin: PinId::new(Port::B, 9),
            master_scl: PinState::High,
            master_sda: PinState::High,
            target_sda: PinState::High,
            phase: LinePhase::Idle,
            targets: Targets::new(targets),
            trace: Vec::new(),
            configured: Vec::new(),
            scl_pulses: 0,
        }
    }

    pub fn trace(&self) -> Vec<BusEvent> {
        self.trace.clone()
    }

    /// Forget the trace and the SCL pulse count.
    pub fn clear_trace(&mut self) {
        self.trace.clear();
        self.scl_pulses = 0;
    }

    pub fn target(&self, index: usize) -> &SimTarget {
        &self.targets.list[index]
    }

    pub fn configured_pins(&self) -> usize {
        self.configured.len()
    }

    /// Rising SCL edges since the last [`SimOpenDrainBus::clear_trace`].
    pub fn scl_pulses(&self) -> usize {
        self.scl_pulses
    }

    /// (SCL, SDA) as seen on the wires.
    pub fn line_levels(&self) -> (PinState, PinState) {
        (self.master_scl, self.sda_line())
    }

    fn stuck(&self) -> bool {
        self.targets.list.iter().any(|t| t.stuck_low_for > 0)
    }

    fn sda_line(&self) -> PinState {
        if self.master_sda == PinState::Low || self.target_sda == PinState::Low || self.stuck() {
            PinState::Low
        } else {
            PinState::High
        }
    }

    fn drive_bit(&mut self, value: u8, bit: u8) {
        self.target_sda = PinState::from(value & (0x80 >> bit) != 0);
    }

    fn on_start(&mut self) {
        let repeated = self.phase != LinePhase::Idle;
        self.trace.push(if repeated {
            BusEvent::Restart
        } else {
            BusEvent::Start
        });
        self.targets.start(repeated);
        self.target_sda = PinState::High;
        self.phase = LinePhase::Incoming {
            kind: ByteKind::Address,
            bits: 0,
            value: 0,
        };
    }

    fn on_stop(&mut self) {
        self.trace.push(BusEvent::Stop);
        self.targets.stop();
        self.target_sda = PinState::High;
        self.phase = LinePhase::Idle;
    }

    fn on_scl_rising(&mut self) {
        self.scl_pulses += 1;
        let sda = self.sda_line();
        match self.phase {
            LinePhase::Incoming { kind, bits, value } if bits < 8 => {
                self.phase = LinePhase::Incoming {
                    kind,
                    bits: bits + 1,
                    value: (value << 1) | u8::from(sda == PinState::High),
                };
            }
            LinePhase::AckSlot { ack: false, .. } => self.trace.push(BusEvent::Nack),
            LinePhase::MasterAck { value } => self.trace.push(BusEvent::Read {
                byte: value,
                acked: sda == PinState::Low,
            }),
            _ => {}
        }
    }

    fn on_scl_falling(&mut self) {
        for target in &mut self.targets.list {
            target.stuck_low_for = target.stuck_low_for.saturating_sub(1);
        }
        match self.phase {
            LinePhase::Incoming {
                kind,
                bits: 8,
                value,
            } => self.byte_in(kind, value),
            LinePhase::AckSlot { next, .. } => {
                self.target_sda = PinState::High;
                match next {
                    Next::MasterWrites(kind) => {
                        self.phase = LinePhase::Incoming {
                            kind,
                            bits: 0,
                            value: 0,
                        };
                    }
                    Next::TargetSends => self.next_outgoing(),
                    Next::Ignore => self.phase = LinePhase::Ignore,
                }
            }
            LinePhase::Outgoing { value, bits } => {
                let bits = bits + 1;
                if bits == 8 {
                    self.target_sda = PinState::High;
                    self.phase = LinePhase::MasterAck { value };
                } else {
                    self.drive_bit(value, bits);
                    self.phase = LinePhase::Outgoing { value, bits };
                }
            }
            LinePhase::MasterAck { .. } => {
                if self.sda_line() == PinState::Low {
                    self.next_outgoing();
                } else {
                    self.phase = LinePhase::Ignore;
                }
            }
            _ => {}
        }
    }

    fn next_outgoing(&mut self) {
        let value = self.targets.read();
        self.drive_bit(value, 0);
        self.phase = LinePhase::Outgoing { value, bits: 0 };
    }

    fn byte_in(&mut self, kind: ByteKind, value: u8) {
        let (ack, next) = match kind {
            ByteKind::Address => {
                self.trace.push(BusEvent::Address(value));
                match self.targets.address(value) {
                    AddrOutcome::Selected { read: true } => (true, Next::TargetSends),
                    AddrOutcome::Selected { read: false } => {
                        (true, Next::MasterWrites(ByteKind::Data))
                    }
                    AddrOutcome::AwaitLow => (true, Next::MasterWrites(ByteKind::TenLow)),
                    AddrOutcome::Nack => (false, Next::Ignore),
                }
            }
            ByteKind::TenLow => {
                self.trace.push(BusEvent::Address(value));
                if self.targets.ten_low(value) {
                    (true, Next::MasterWrites(ByteKind::Data))
                } else {
                    (false, Next::Ignore)
                }
            }
            ByteKind::Data => {
                self.trace.push(BusEvent::Write(value));
                if self.targets.write(value) {
                    (true, Next::MasterWrites(ByteKind::Data))
                } else {
                    (false, Next::Ignore)
                }
            }
        };
        if ack {
            self.target_sda = PinState::Low;
        }
        self.phase = LinePhase::AckSlot { ack, next };
    }
}

impl PinControl for SimOpenDrainBus {
    type Error = ();

    fn enable_clock(&mut self, _port: Port) -> Result<(), ()> {
        if self.fail_configure {
            Err(())
        } else {
            Ok(())
        }
    }

    fn configure(&mut self, pin: PinId, _mode: PinMode, _speed: PinSpeed) -> Result<(), ()> {
        if self.fail_configure {
            return Err(());
        }
        if !self.configured.contains(&pin) {
            self.configured.push(pin);
        }
        Ok(())
    }

    fn write(&mut self, pin: PinId, level: PinState) {
        if pin == self.scl_pin {
            let before = self.master_scl;
            self.master_scl = level;
            match (before, level) {
                (PinState::Low, PinState::High) => self.on_scl_rising(),
                (PinState::High, PinState::Low) => self.on_scl_falling(),
                _ => {}
            }
        } else if pin == self.sda_pin {
            let before = self.sda_line();
            self.master_sda = level;
            let after = self.sda_line();
            if self.master_scl == PinState::High && before != after {
                if after == PinState::Low {
                    self.on_start();
                } else {
                    self.on_stop();
                }
            }
        }
    }

    fn read(&mut self, pin: PinId) -> PinState {
        if pin == self.scl_pin {
            self.master_scl
        } else {
            self.sda_line()
        }
    }
}

// ---------------------------------------------------------------------------
// Peripheral model
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum HwPhase {
    Idle,
    StartSent,
    TenHeaderSent,
    AddrAcked { read: bool },
    Transmit,
    Receive,
    Failed,
    TargetReceive,
    TargetTransmit,
}

const BUS_FLAGS: Status = Status::SB
    .union(Status::ADDR)
    .union(Status::ADD10)
    .union(Status::TXE)
    .union(Status::BTF)
    .union(Status::RXNE)
    .union(Status::TRA)
    .union(Status::MSL)
    .union(Status::BUSY);

/// Register-level model of the v1 peripheral. Bytes move instantly: a
/// transmitted byte is acknowledged (or not) inside `write_data`, and the
/// next received byte is clocked in the first time `status` is read after
/// the previous one was taken.
pub struct SimPeripheral {
    pub clock_on: bool,
    pub enabled: bool,
    pub ack: bool,
    pub remap: Option<bool>,
    pub timing: Option<(BusTiming, u8)>,
    pub interrupts: Interrupts,
    pub reset_count: usize,
    pub stop_requests: usize,
    /// Another master holds the bus: BUSY reads set.
    pub bus_held: bool,
    /// START never completes (SB stays clear).
    pub stall_start: bool,
    pub bus_error_on_start: bool,
    pub lose_arbitration_on_address: bool,
    sr: Status,
    phase: HwPhase,
    dr: u8,
    rx_loaded: bool,
    rx_done: bool,
    stop_pending: bool,
    tx_loaded: bool,
    targets: Targets,
    trace: Vec<BusEvent>,
}

impl SimPeripheral {
    pub fn new(targets: Vec<SimTarget>) -> Self {
        Self {
            clock_on: false,
            enabled: false,
            ack: false,
            remap: None,
            timing: None,
            interrupts: Interrupts::empty(),
            reset_count: 0,
            stop_requests: 0,
            bus_held: false,
            stall_start: false,
            bus_error_on_start: false,
            lose_arbitration_on_address: false,
            sr: Status::empty(),
            phase: HwPhase::Idle,
            dr: 0,
            rx_loaded: false,
            rx_done: false,
            stop_pending: false,
            tx_loaded: false,
            targets: Targets::new(targets),
            trace: Vec::new(),
        }
    }

    pub fn trace(&self) -> Vec<BusEvent> {
        self.trace.clone()
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
        self.stop_requests = 0;
    }

    pub fn target(&self, index: usize) -> &SimTarget {
        &self.targets.list[index]
    }

    /// Raw status bits, without the side effects of a status read.
    pub fn status_bits(&self) -> Status {
        self.sr
    }

    /// Raise flags as if the hardware had set them.
    pub fn inject(&mut self, flags: Status) {
        self.sr |= flags;
    }

    /// The event interrupt line would be asserted.
    pub fn event_pending(&self) -> bool {
        if !self.interrupts.contains(Interrupts::EVT) {
            return false;
        }
        let buffer = self.interrupts.contains(Interrupts::BUF);
        self.sr
            .intersects(Status::SB | Status::ADDR | Status::ADD10 | Status::BTF | Status::STOPF)
            || (buffer && self.sr.intersects(Status::TXE | Status::RXNE))
            || (buffer && self.phase == HwPhase::Receive && !self.rx_loaded && !self.rx_done)
    }

    /// The error interrupt line would be asserted.
    pub fn error_pending(&self) -> bool {
        self.interrupts.contains(Interrupts::ERR) && self.sr.intersects(Status::ERRORS)
    }

    fn release_bus(&mut self) {
        self.trace.push(BusEvent::Stop);
        self.targets.stop();
        self.sr.remove(BUS_FLAGS);
        self.phase = HwPhase::Idle;
        self.rx_loaded = false;
        self.rx_done = false;
        self.stop_pending = false;
    }

    fn fail_nack(&mut self) {
        self.trace.push(BusEvent::Nack);
        self.sr.remove(Status::TXE | Status::BTF);
        self.sr |= Status::AF;
        self.phase = HwPhase::Failed;
    }

    fn clock_in_byte(&mut self) {
        self.dr = self.targets.read();
        self.trace.push(BusEvent::Read {
            byte: self.dr,
            acked: self.ack,
        });
        self.rx_loaded = true;
        self.rx_done = !self.ack;
        self.sr |= Status::RXNE;
    }
}

impl I2cPeripheral for SimPeripheral {
    fn enable_clock(&mut self, enable: bool) {
        self.clock_on = enable;
    }

    fn set_remap(&mut self, remap: bool) {
        self.remap = Some(remap);
    }

    fn configure(&mut self, timing: &BusTiming, own_address: u8) {
        self.timing = Some((*timing, own_address));
    }

    fn set_enabled(&mut self, enable: bool) {
        self.enabled = enable;
        if !enable {
            self.ack = false;
        }
    }

    fn generate_start(&mut self) {
        if !self.enabled || self.stall_start {
            return;
        }
        if self.bus_error_on_start {
            self.sr |= Status::BERR;
            return;
        }
        let repeated = self.sr.contains(Status::MSL);
        self.trace.push(if repeated {
            BusEvent::Restart
        } else {
            BusEvent::Start
        });
        self.targets.start(repeated);
        self.sr
            .remove(Status::TXE | Status::BTF | Status::TRA | Status::RXNE | Status::ADDR);
        self.sr |= Status::SB | Status::MSL | Status::BUSY;
        self.phase = HwPhase::StartSent;
        self.rx_loaded = false;
        self.rx_done = false;
        self.stop_pending = false;
    }

    fn generate_stop(&mut self) {
        self.stop_requests += 1;
        match self.phase {
            HwPhase::Idle => {}
            HwPhase::Receive if !self.rx_loaded && !self.rx_done => {
                self.trace.push(BusEvent::StopRequested);
                self.stop_pending = true;
            }
            _ => self.release_bus(),
        }
    }

    fn set_ack(&mut self, enable: bool) {
        self.ack = enable && self.enabled;
    }

    fn write_data(&mut self, byte: u8) {
        match self.phase {
            HwPhase::StartSent => {
                self.sr.remove(Status::SB);
                self.trace.push(BusEvent::Address(byte));
                if self.lose_arbitration_on_address {
                    self.sr.remove(Status::MSL | Status::BUSY);
                    self.sr |= Status::ARLO;
                    self.phase = HwPhase::Failed;
                    return;
                }
                match self.targets.address(byte) {
                    AddrOutcome::Selected { read } => {
                        self.sr |= Status::ADDR;
                        if !read {
                            self.sr |= Status::TXE | Status::TRA;
                        }
                        self.phase = HwPhase::AddrAcked { read };
                    }
                    AddrOutcome::AwaitLow => {
                        self.sr |= Status::ADD10;
                        self.phase = HwPhase::TenHeaderSent;
                    }
                    AddrOutcome::Nack => self.fail_nack(),
                }
            }
            HwPhase::TenHeaderSent => {
                self.sr.remove(Status::ADD10);
                self.trace.push(BusEvent::Address(byte));
                if self.targets.ten_low(byte) {
                    self.sr |= Status::ADDR | Status::TXE | Status::TRA;
                    self.phase = HwPhase::AddrAcked { read: false };
                } else {
                    self.fail_nack();
                }
            }
            HwPhase::TargetTransmit => {
                self.dr = byte;
                self.tx_loaded = true;
                self.sr.remove(Status::TXE);
            }
            HwPhase::Transmit => {
                self.trace.push(BusEvent::Write(byte));
                if self.targets.write(byte) {
                    self.sr |= Status::TXE | Status::BTF;
                } else {
                    self.fail_nack();
                }
            }
            _ => {}
        }
    }

    fn read_data(&mut self) -> u8 {
        if self.rx_loaded {
            self.rx_loaded = false;
            self.sr.remove(Status::RXNE);
            if self.stop_pending {
                self.release_bus();
            }
        }
        self.dr
    }

    fn status(&mut self) -> Status {
        if self.sr.contains(Status::ADDR) {
            let seen = self.sr | self.held();
            self.sr.remove(Status::ADDR);
            if let HwPhase::AddrAcked { read } = self.phase {
                self.phase = if read {
                    HwPhase::Receive
                } else {
                    HwPhase::Transmit
                };
            }
            return seen;
        }
        if self.phase == HwPhase::Receive && !self.rx_loaded && !self.rx_done {
            self.clock_in_byte();
        }
        self.sr | self.held()
    }

    fn clear_flags(&mut self, flags: Status) {
        self.sr.remove(flags & (Status::ERRORS | Status::STOPF));
    }

    fn set_interrupts(&mut self, mask: Interrupts, enable: bool) {
        self.interrupts.set(mask, enable);
    }

    fn set_software_reset(&mut self, asserted: bool) {
        if asserted {
            self.reset_count += 1;
            self.sr = Status::empty();
            self.phase = HwPhase::Idle;
            self.enabled = false;
            self.ack = false;
            self.timing = None;
            self.interrupts = Interrupts::empty();
            self.rx_loaded = false;
            self.rx_done = false;
            self.stop_pending = false;
            self.tx_loaded = false;
        }
    }
}

/// A remote master driving the peripheral while it is a bus target.
impl SimPeripheral {
    /// START plus address byte. Returns whether the peripheral acknowledged.
    pub fn remote_address(&mut self, byte: u8) -> bool {
        self.trace.push(BusEvent::Start);
        self.trace.push(BusEvent::Address(byte));
        let own = self.timing.map(|(_, own)| own);
        if !self.enabled || !self.ack || own != Some(byte >> 1) {
            self.trace.push(BusEvent::Nack);
            return false;
        }
        self.sr |= Status::ADDR | Status::BUSY;
        if byte & 1 == 1 {
            self.sr |= Status::TRA | Status::TXE;
            self.phase = HwPhase::TargetTransmit;
        } else {
            self.sr.remove(Status::TRA);
            self.phase = HwPhase::TargetReceive;
        }
        self.tx_loaded = false;
        true
    }

    /// The master writes one byte; returns the peripheral's ACK.
    pub fn remote_send(&mut self, byte: u8) -> bool {
        if self.phase != HwPhase::TargetReceive {
            return false;
        }
        self.trace.push(BusEvent::Write(byte));
        self.dr = byte;
        self.rx_loaded = true;
        self.sr |= Status::RXNE;
        self.ack
    }

    /// The master clocks out the loaded byte and answers with `ack`. `None`
    /// if nothing was loaded.
    pub fn remote_read(&mut self, ack: bool) -> Option<u8> {
        if self.phase != HwPhase::TargetTransmit || !self.tx_loaded {
            return None;
        }
        self.tx_loaded = false;
        self.trace.push(BusEvent::Read {
            byte: self.dr,
            acked: ack,
        });
        if ack {
            self.sr |= Status::TXE;
        } else {
            self.sr |= Status::AF;
        }
        Some(self.dr)
    }

    /// STOPF is only raised for a target receiver.
    pub fn remote_stop(&mut self) {
        self.trace.push(BusEvent::Stop);
        if self.phase == HwPhase::TargetReceive {
            self.sr |= Status::STOPF;
        }
        self.sr.remove(Status::BUSY | Status::TRA | Status::TXE);
        self.phase = HwPhase::Idle;
        self.tx_loaded = false;
    }
}

impl SimPeripheral {
    fn held(&self) -> Status {
        if self.bus_held {
            Status::BUSY
        } else {
            Status::empty()
        }
    }
}
