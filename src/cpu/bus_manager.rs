//! M68K bus manager
//!
//! Runs the external bus cycles one state per clock:
//!
//! | Cycle      | States                                              |
//! |:-----------|:----------------------------------------------------|
//! | read       | READ0 READ1 READ2 READ_WAIT READ3                   |
//! | write      | WRITE0 WRITE1 WRITE2 WRITE_WAIT WRITE3              |
//! | rmw        | RMW_READ0..3, RMW_MODIFY0..1, RMW_WRITE0..3 (AS held)|
//! | int ack    | IAC0 IAC1 IAC2 IAC_WAIT IAC3                        |
//!
//! Dispatch and the first poll of the target unit share a cycle, so a read
//! against an always-idle unit takes 4 clocks. The manager also owns the
//! BR/BG arbitration used by the VDP DMA engine.

use super::bus::{BusLine, CpuBus};
use super::exceptions::{ExceptionManager, FaultInfo};
use super::registers::RegisterFile;
use crate::memory::{AddressSpace, Addressable};

use std::cell::RefCell;
use std::rc::Rc;

/// Several VDP bus-error paths in the modeled hardware are not understood
/// well enough to enable; the check stays compiled but gated off.
const BUS_ERROR_CHECK: bool = false;

/// Address space presented on the function-code pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrSpace {
    Program,
    Data,
    Cpu,
}

/// Outcome of an interrupt-acknowledge negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptType {
    Vectored,
    Autovectored,
    Spurious,
}

pub const SPURIOUS_VECTOR: u8 = 24;

/// The device driving the IPL lines; consulted during the IAC cycle.
pub trait InterruptingDevice {
    fn is_idle(&self) -> bool;
    fn init_interrupt_ack(&mut self, priority: u8);
    fn interrupt_type(&self) -> InterruptType;
    fn vector_number(&self) -> u8;
}

pub type SharedInterruptingDevice = Rc<RefCell<dyn InterruptingDevice>>;

/// Modify step of a read-modify-write cycle, as a closed set of kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmwModify {
    /// Test-and-set: flags from the read byte, then OR in bit 7.
    Tas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusCycleState {
    Idle,

    Read0,
    Read1,
    Read2,
    ReadWait,
    Read3,

    Write0,
    Write1,
    Write2,
    WriteWait,
    Write3,

    RmwRead0,
    RmwRead1,
    RmwRead2,
    RmwReadWait,
    RmwRead3,
    RmwModify0,
    RmwModify1,
    RmwWrite0,
    RmwWrite1,
    RmwWrite2,
    RmwWriteWait,
    RmwWrite3,

    Iac0,
    Iac1,
    Iac2,
    IacWait,
    Iac3,
}

impl BusCycleState {
    fn next(self) -> Self {
        use BusCycleState::*;
        match self {
            Read0 => Read1,
            Read1 => Read2,
            Read2 => ReadWait,
            ReadWait => Read3,
            Write0 => Write1,
            Write1 => Write2,
            Write2 => WriteWait,
            WriteWait => Write3,
            RmwRead0 => RmwRead1,
            RmwRead1 => RmwRead2,
            RmwRead2 => RmwReadWait,
            RmwReadWait => RmwRead3,
            RmwRead3 => RmwModify0,
            RmwModify0 => RmwModify1,
            RmwModify1 => RmwWrite0,
            RmwWrite0 => RmwWrite1,
            RmwWrite1 => RmwWrite2,
            RmwWrite2 => RmwWriteWait,
            RmwWriteWait => RmwWrite3,
            Iac0 => Iac1,
            Iac1 => Iac2,
            Iac2 => IacWait,
            IacWait => Iac3,
            Read3 | Write3 | RmwWrite3 | Iac3 | Idle => panic!("no next state after {:?}", self),
        }
    }
}

pub struct BusManager {
    memory: Rc<RefCell<AddressSpace>>,
    int_device: Option<SharedInterruptingDevice>,

    state: BusCycleState,
    byte_op: bool,
    address: u32,
    address_even: bool,
    space: AddrSpace,
    data_to_write: u16,
    modify: Option<RmwModify>,
    ipl: u8,

    latched_byte: Option<u8>,
    latched_word: Option<u16>,
    vector: Option<u8>,
    aborted: bool,
}

impl BusManager {
    pub fn new(memory: Rc<RefCell<AddressSpace>>) -> Self {
        Self {
            memory,
            int_device: None,
            state: BusCycleState::Idle,
            byte_op: false,
            address: 0,
            address_even: true,
            space: AddrSpace::Data,
            data_to_write: 0,
            modify: None,
            ipl: 0,
            latched_byte: None,
            latched_word: None,
            vector: None,
            aborted: false,
        }
    }

    pub fn set_interrupting_device(&mut self, device: SharedInterruptingDevice) {
        self.int_device = Some(device);
    }

    pub fn is_idle(&self) -> bool {
        self.state == BusCycleState::Idle
    }

    pub fn reset(&mut self, bus: &mut CpuBus) {
        self.state = BusCycleState::Idle;
        self.modify = None;
        self.latched_byte = None;
        self.latched_word = None;
        self.vector = None;
        self.aborted = false;
        Self::clear_bus(bus);
    }

    /// True when the last started operation was cut short by an address or
    /// bus error instead of completing. Pollers use this to abandon their
    /// wait instead of consuming latched data that never arrived.
    pub fn operation_aborted(&self) -> bool {
        self.aborted
    }

    pub fn latched_byte(&self) -> u8 {
        self.assert_idle("latched_byte");
        self.latched_byte
            .expect("bus manager: no latched byte available")
    }

    pub fn latched_word(&self) -> u16 {
        self.assert_idle("latched_word");
        self.latched_word
            .expect("bus manager: no latched word available")
    }

    /// Vector negotiated by the last interrupt-acknowledge cycle.
    pub fn vector_number(&self) -> u8 {
        self.assert_idle("vector_number");
        self.vector.expect("bus manager: no negotiated vector")
    }

    /* read/write interface */

    pub fn init_read_byte(&mut self, address: u32, space: AddrSpace) {
        self.assert_idle("init_read_byte");
        self.start_operation(address, space, BusCycleState::Read0);
        self.byte_op = true;
    }

    pub fn init_read_word(&mut self, address: u32, space: AddrSpace) {
        self.assert_idle("init_read_word");
        self.start_operation(address, space, BusCycleState::Read0);
        self.byte_op = false;
    }

    pub fn init_write_byte(&mut self, address: u32, data: u8) {
        self.assert_idle("init_write_byte");
        self.start_operation(address, AddrSpace::Data, BusCycleState::Write0);
        self.byte_op = true;
        self.data_to_write = data as u16;
    }

    pub fn init_write_word(&mut self, address: u32, data: u16) {
        self.assert_idle("init_write_word");
        self.start_operation(address, AddrSpace::Data, BusCycleState::Write0);
        self.byte_op = false;
        self.data_to_write = data;
    }

    /// Byte-sized read-modify-write with AS held across the whole chain.
    pub fn init_read_modify_write(&mut self, address: u32, modify: RmwModify) {
        self.assert_idle("init_read_modify_write");
        self.start_operation(address, AddrSpace::Data, BusCycleState::RmwRead0);
        self.byte_op = true;
        self.modify = Some(modify);
    }

    /* interrupt interface */

    pub fn init_interrupt_ack(&mut self, ipl: u8) {
        self.assert_idle("init_interrupt_ack");
        assert!((1..=7).contains(&ipl), "interrupt ack with ipl {}", ipl);
        self.state = BusCycleState::Iac0;
        self.ipl = ipl;
        self.vector = None;
        self.latched_byte = None;
        self.latched_word = None;
        self.aborted = false;
    }

    /* bus arbitration interface */

    pub fn bus_granted(&self, bus: &CpuBus) -> bool {
        bus.is_set(BusLine::Bg)
    }

    pub fn request_bus(&mut self, bus: &mut CpuBus) {
        assert!(
            !bus.is_set(BusLine::Br) && !bus.is_set(BusLine::Bg),
            "bus requested while already requested or granted"
        );
        bus.set(BusLine::Br);
    }

    pub fn release_bus(&mut self, bus: &mut CpuBus) {
        self.assert_idle("release_bus");
        assert!(
            bus.is_set(BusLine::Br) && bus.is_set(BusLine::Bg),
            "bus released without an outstanding grant"
        );
        bus.clear(BusLine::Br);
    }

    pub fn cycle(&mut self, bus: &mut CpuBus, regs: &mut RegisterFile, exman: &mut ExceptionManager) {
        use BusCycleState::*;
        match self.state {
            Idle => self.on_idle(bus),

            Read0 | RmwRead0 => {
                if self.check_exceptions(regs, exman) {
                    return;
                }
                bus.set_func_codes(self.gen_func_codes(regs));
                bus.set(BusLine::Rw);
                bus.set_address(self.address);
                self.advance();
            }

            Read1 | RmwRead1 => {
                bus.set(BusLine::As);
                self.set_data_strobes(bus);
                self.advance();
            }

            Read2 | RmwRead2 => {
                {
                    let mut mem = self.memory.borrow_mut();
                    if self.byte_op {
                        mem.init_read_byte(bus.address());
                    } else {
                        mem.init_read_word(bus.address());
                    }
                }
                self.advance();
                self.poll_read(bus);
            }

            ReadWait | RmwReadWait => self.poll_read(bus),

            Read3 => {
                Self::clear_bus(bus);
                self.set_idle(bus);
            }

            RmwRead3 => {
                Self::clear_bus(bus);
                bus.set(BusLine::As); // held across the modify and write
                self.advance();
            }

            RmwModify0 => {
                // idle cycle
                self.advance();
            }

            RmwModify1 => {
                let input = self
                    .latched_byte
                    .expect("rmw modify without a latched byte");
                let output = match self.modify.expect("rmw cycle without modify kind") {
                    RmwModify::Tas => super::operations::tas(input, regs),
                };
                self.data_to_write = output as u16;
                self.advance();
            }

            Write0 | RmwWrite0 => {
                if self.check_exceptions(regs, exman) {
                    return;
                }
                bus.set_func_codes(self.gen_func_codes(regs));
                bus.set(BusLine::Rw);
                bus.set_address(self.address);
                self.advance();
            }

            Write1 | RmwWrite1 => {
                bus.set(BusLine::As);
                bus.clear(BusLine::Rw);
                self.set_data_bus(bus, self.data_to_write);
                self.advance();
            }

            Write2 | RmwWrite2 => {
                self.set_data_strobes(bus);
                {
                    let mut mem = self.memory.borrow_mut();
                    if self.byte_op {
                        mem.init_write_byte(bus.address(), self.data_to_write as u8);
                    } else {
                        mem.init_write_word(bus.address(), self.data_to_write);
                    }
                }
                self.advance();
                self.poll_write(bus);
            }

            WriteWait | RmwWriteWait => self.poll_write(bus),

            Write3 | RmwWrite3 => {
                Self::clear_bus(bus);
                bus.set(BusLine::Rw);
                self.set_idle(bus);
            }

            Iac0 => {
                bus.set_func_codes(0b111);
                bus.set(BusLine::Rw);
                bus.set_address(0xFF_FFF0 | ((self.ipl as u32) << 1));
                self.advance();
            }

            Iac1 => {
                bus.set(BusLine::As);
                bus.set(BusLine::Lds);
                self.advance();
            }

            Iac2 => {
                let device = self
                    .int_device
                    .clone()
                    .expect("interrupt ack without an interrupting device");
                device.borrow_mut().init_interrupt_ack(self.ipl);
                self.advance();
                self.poll_interrupt_ack(bus);
            }

            IacWait => self.poll_interrupt_ack(bus),

            Iac3 => {
                Self::clear_bus(bus);
                bus.clear(BusLine::Vpa);
                self.set_idle(bus);
            }
        }
    }

    fn advance(&mut self) {
        self.state = self.state.next();
    }

    fn poll_read(&mut self, bus: &mut CpuBus) {
        let idle = self.memory.borrow().is_idle();
        if !idle {
            return;
        }

        let data = {
            let mem = self.memory.borrow();
            if self.byte_op {
                let byte = mem.latched_byte();
                self.latched_byte = Some(byte);
                byte as u16
            } else {
                let word = mem.latched_word();
                self.latched_word = Some(word);
                word
            }
        };
        self.set_data_bus(bus, data);
        bus.set(BusLine::Dtack);
        self.advance();
    }

    fn poll_write(&mut self, bus: &mut CpuBus) {
        if !self.memory.borrow().is_idle() {
            return;
        }
        bus.set(BusLine::Dtack);
        self.advance();
    }

    fn poll_interrupt_ack(&mut self, bus: &mut CpuBus) {
        let device = self
            .int_device
            .clone()
            .expect("interrupt ack without an interrupting device");
        let dev = device.borrow();
        if !dev.is_idle() {
            return;
        }

        let vector = match dev.interrupt_type() {
            InterruptType::Vectored => dev.vector_number(),
            InterruptType::Autovectored => {
                bus.set(BusLine::Vpa);
                0x18 + self.ipl
            }
            InterruptType::Spurious => {
                bus.set(BusLine::Berr);
                SPURIOUS_VECTOR
            }
        };
        drop(dev);

        self.vector = Some(vector);
        bus.set_data(vector as u16);
        bus.set(BusLine::Dtack);
        self.advance();
    }

    fn set_idle(&mut self, bus: &mut CpuBus) {
        self.state = BusCycleState::Idle;
        self.modify = None;
        self.on_idle(bus);
    }

    /// Bus handover happens only between cycles: grant on the transition to
    /// idle while BR is set, take the bus back once BR clears.
    fn on_idle(&mut self, bus: &mut CpuBus) {
        if bus.is_set(BusLine::Br) && !bus.is_set(BusLine::Bg) {
            bus.set(BusLine::Bg);
        } else if bus.is_set(BusLine::Bg) && !bus.is_set(BusLine::Br) {
            bus.clear(BusLine::Bg);
        }
    }

    fn start_operation(&mut self, address: u32, space: AddrSpace, first_state: BusCycleState) {
        self.address = address & 0xFF_FFFF;
        self.address_even = (address & 1) == 0;
        self.space = space;
        self.state = first_state;
        self.latched_byte = None;
        self.latched_word = None;
        self.vector = None;
        self.aborted = false;
    }

    fn assert_idle(&self, caller: &str) {
        assert!(
            self.is_idle(),
            "bus manager: {} called while a bus cycle is in flight",
            caller
        );
    }

    fn clear_bus(bus: &mut CpuBus) {
        bus.clear(BusLine::As);
        bus.clear(BusLine::Uds);
        bus.clear(BusLine::Lds);
        bus.clear(BusLine::Dtack);
        bus.clear(BusLine::Berr);
        bus.set_func_codes(0);
        // BR/BG survive; the arbitration state lives across bus cycles
    }

    fn gen_func_codes(&self, regs: &RegisterFile) -> u8 {
        let mut fc = 0;
        if self.space == AddrSpace::Data {
            fc |= 0b001;
        }
        if self.space == AddrSpace::Program {
            fc |= 0b010;
        }
        if regs.supervisor() {
            fc |= 0b100;
        }
        fc
    }

    /// Byte accesses strobe the half selected by A0; word accesses both.
    fn set_data_strobes(&self, bus: &mut CpuBus) {
        if self.byte_op {
            if self.address_even {
                bus.set(BusLine::Uds);
            } else {
                bus.set(BusLine::Lds);
            }
        } else {
            bus.set(BusLine::Uds);
            bus.set(BusLine::Lds);
        }
    }

    fn set_data_bus(&self, bus: &mut CpuBus, data: u16) {
        let value = if self.byte_op {
            if self.address_even {
                (data << 8) | (bus.data() & 0x00FF)
            } else {
                (bus.data() & 0xFF00) | (data & 0x00FF)
            }
        } else {
            data
        };
        bus.set_data(value);
    }

    /* exceptions */

    fn check_exceptions(&mut self, regs: &mut RegisterFile, exman: &mut ExceptionManager) -> bool {
        self.check_address_error(regs, exman) || self.check_bus_error(regs, exman)
    }

    fn check_address_error(&mut self, regs: &mut RegisterFile, exman: &mut ExceptionManager) -> bool {
        if self.byte_op || self.address_even {
            return false;
        }

        // RMW cycles are byte-only and cannot get here
        let read = self.state == BusCycleState::Read0;
        exman.rise_address_error(FaultInfo {
            address: self.address,
            func_codes: self.gen_func_codes(regs),
            read,
            in_program: self.space == AddrSpace::Program,
        });
        self.state = BusCycleState::Idle;
        self.modify = None;
        self.aborted = true;
        true
    }

    fn check_bus_error(&mut self, regs: &mut RegisterFile, exman: &mut ExceptionManager) -> bool {
        if !BUS_ERROR_CHECK {
            return false;
        }
        if self.memory.borrow().covers(self.address) {
            return false;
        }

        let read = self.state == BusCycleState::Read0;
        exman.rise_bus_error(FaultInfo {
            address: self.address,
            func_codes: self.gen_func_codes(regs),
            read,
            in_program: self.space == AddrSpace::Program,
        });
        self.state = BusCycleState::Idle;
        self.modify = None;
        self.aborted = true;
        true
    }
}

