//! The Sega Mega Drive system
//!
//! Owns the ROM, both CPUs and the VDP, builds the two address maps once at
//! startup, and divides the master clock into the per-chip sub-clocks:
//! M68K every 7 master ticks, Z80 every 15, VDP pixel every 8.
//!
//! ## M68K address map (24-bit)
//!
//! | Address Range      | Unit                                  |
//! |:-------------------|:--------------------------------------|
//! | 0x000000-0x3FFFFF  | Cartridge ROM (read-only)             |
//! | 0xA00000-0xA0FFFF  | Z80 address space window              |
//! | 0xA10000-0xA10001  | Version register                      |
//! | 0xA10002-0xA1000D  | Controller and expansion ports        |
//! | 0xA1000E-0xA1001F  | Serial interface scratch              |
//! | 0xA11100-0xA11101  | Z80 bus request                       |
//! | 0xA11200-0xA11201  | Z80 reset                             |
//! | 0xA14000-0xA14003  | TMSS (plain RAM, no effect)           |
//! | 0xC00000-0xC0000F  | VDP ports                             |
//! | 0xE00000-0xE0FFFF  | 64 KiB work RAM, mirrored to the top  |
//!
//! ## Z80 address map (16-bit)
//!
//! | Address Range | Unit                                       |
//! |:--------------|:-------------------------------------------|
//! | 0x0000-0x1FFF | 8 KiB sound RAM (mirrored at 0x2000)       |
//! | 0x4000-0x4003 | YM2612 stub                                |
//! | 0x6000        | Bank register (9 single-bit writes)        |
//! | 0x7F11        | PSG stub                                   |
//! | 0x8000-0xFFFF | 32 KiB banked window into cartridge ROM    |

use crate::cpu::Cpu;
use crate::io::{version_register, Controller, DisabledPort};
use crate::memory::{
    shared, AddressSpace, Addressable, ByteOrder, ConstUnit, DummyUnit, MemoryBuilder, MemoryUnit,
    ReadOnlyMemoryUnit, SharedUnit,
};
use crate::rom::Rom;
use crate::vdp::{TimingMode, Vdp};
use crate::z80::{StubIoPorts, Z80};

use log::{debug, info};
use std::cell::RefCell;
use std::rc::Rc;

/// The Z80 bus-request and reset handshake registers on the M68K side.
///
/// At power-on the bus is granted to the M68K and the reset line is held,
/// so the Z80 does not run until the program releases both.
pub struct Z80ControlRegisters {
    request: Rc<RefCell<MemoryUnit>>,
    reset: Rc<RefCell<MemoryUnit>>,
    bus_granted: bool,
    reset_requested: bool,
}

impl Z80ControlRegisters {
    const BUS_REQUESTED: u16 = 0x100;
    const BUS_GRANTED: u16 = 0x200;
    const BUS_RELEASED: u16 = 0x000;

    const RESET_REQUESTED: u16 = 0x000;

    pub fn new() -> Self {
        let request = Rc::new(RefCell::new(MemoryUnit::new(0x1, ByteOrder::Big)));
        let reset = Rc::new(RefCell::new(MemoryUnit::new(0x1, ByteOrder::Big)));

        let mut registers = Self {
            request,
            reset,
            bus_granted: false,
            reset_requested: false,
        };
        registers.power_on();
        registers
    }

    fn power_on(&mut self) {
        self.request.borrow_mut().write_word(0, Self::BUS_GRANTED);
        self.reset.borrow_mut().write_word(0, Self::RESET_REQUESTED);
        self.bus_granted = true;
        self.reset_requested = true;
    }

    pub fn request_register(&self) -> SharedUnit {
        self.request.clone()
    }

    pub fn reset_register(&self) -> SharedUnit {
        self.reset.clone()
    }

    /// Evaluate the registers the M68K may have rewritten. A request takes
    /// a cycle to move to granted; the grant is visible to the M68K as a
    /// cleared bit 8.
    pub fn cycle(&mut self) {
        let request = self.request.borrow().read_word(0);
        let reset = self.reset.borrow().read_word(0);

        match request {
            Self::BUS_REQUESTED => {
                self.request.borrow_mut().write_word(0, Self::BUS_GRANTED);
                if !self.bus_granted {
                    debug!("z80 bus granted to the m68k side");
                }
                self.bus_granted = true;
            }
            Self::BUS_RELEASED => {
                if self.bus_granted {
                    debug!("z80 bus released");
                }
                self.bus_granted = false;
            }
            _ => {}
        }

        // the reset line only bites while the bus is held
        self.reset_requested = reset == Self::RESET_REQUESTED && self.bus_granted;
    }

    /// True while the M68K side owns the Z80 bus.
    pub fn z80_bus_granted(&self) -> bool {
        self.bus_granted
    }

    pub fn z80_reset_requested(&self) -> bool {
        self.reset_requested
    }
}

impl Default for Z80ControlRegisters {
    fn default() -> Self {
        Self::new()
    }
}

/// The Z80-side bank register at 0x6000: nine single-bit writes, MSB first,
/// build the 9-bit bank index.
pub struct BankRegister {
    bank: u32,
}

impl BankRegister {
    pub fn new() -> Self {
        Self { bank: 0 }
    }

    pub fn bank(&self) -> u32 {
        self.bank
    }
}

impl Default for BankRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl Addressable for BankRegister {
    fn max_address(&self) -> u32 {
        0x1
    }

    fn is_idle(&self) -> bool {
        true
    }

    fn init_write_byte(&mut self, _address: u32, data: u8) {
        self.bank = (self.bank >> 1) | (((data as u32) & 1) << 8);
    }

    fn init_write_word(&mut self, _address: u32, _data: u16) {
        panic!("z80 bank register only takes byte writes");
    }

    fn init_read_byte(&mut self, _address: u32) {}

    fn init_read_word(&mut self, _address: u32) {
        panic!("z80 bank register only takes byte reads");
    }

    fn latched_byte(&self) -> u8 {
        0xFF
    }

    fn latched_word(&self) -> u16 {
        panic!("z80 bank register has no word latch");
    }
}

/// The 32 KiB window at 0x8000-0xFFFF: a shared handle into cartridge ROM
/// reinterpreted through the bank register.
pub struct BankArea {
    bank_register: Rc<RefCell<BankRegister>>,
    rom: Rc<RefCell<ReadOnlyMemoryUnit>>,
}

impl BankArea {
    pub fn new(
        bank_register: Rc<RefCell<BankRegister>>,
        rom: Rc<RefCell<ReadOnlyMemoryUnit>>,
    ) -> Self {
        Self { bank_register, rom }
    }

    fn resolve(&self, address: u32) -> u32 {
        let target = (self.bank_register.borrow().bank() << 15) | (address & 0x7FFF);
        assert!(
            target <= 0x3F_FFFF,
            "z80 bank window only reaches cartridge ROM (address {:#08X})",
            target
        );
        target
    }
}

impl Addressable for BankArea {
    fn max_address(&self) -> u32 {
        0x7FFF
    }

    fn is_idle(&self) -> bool {
        self.rom.borrow().is_idle()
    }

    fn init_write_byte(&mut self, address: u32, data: u8) {
        let target = self.resolve(address);
        self.rom.borrow_mut().init_write_byte(target, data);
    }

    fn init_write_word(&mut self, address: u32, data: u16) {
        let target = self.resolve(address);
        self.rom.borrow_mut().init_write_word(target, data);
    }

    fn init_read_byte(&mut self, address: u32) {
        let target = self.resolve(address);
        self.rom.borrow_mut().init_read_byte(target);
    }

    fn init_read_word(&mut self, address: u32) {
        let target = self.resolve(address);
        self.rom.borrow_mut().init_read_word(target);
    }

    fn latched_byte(&self) -> u8 {
        self.rom.borrow().latched_byte()
    }

    fn latched_word(&self) -> u16 {
        self.rom.borrow().latched_word()
    }
}

/// Master-clock divisors.
const M68K_DIVIDER: u64 = 7;
const Z80_DIVIDER: u64 = 15;
const VDP_DIVIDER: u64 = 8;

/// The whole machine.
pub struct Smd {
    pub m68k: Cpu,
    pub z80: Z80,
    pub vdp: Rc<RefCell<Vdp>>,
    pub controller1: Controller,

    z80_ctrl: Z80ControlRegisters,
    work_ram: Rc<RefCell<MemoryUnit>>,
    rom: Rom,
    master_cycles: u64,
}

impl Smd {
    pub fn new(rom: Rom) -> Self {
        let mode = if rom.header().region_support.contains('E') {
            TimingMode::Pal
        } else {
            TimingMode::Ntsc
        };
        info!(
            "starting '{}' ({:?})",
            rom.header().title_overseas,
            mode
        );

        let rom_unit = Rc::new(RefCell::new(ReadOnlyMemoryUnit::from_bytes(
            rom.padded_data(),
            ByteOrder::Big,
        )));
        let vdp = Rc::new(RefCell::new(Vdp::new(mode)));
        let z80_ctrl = Z80ControlRegisters::new();
        let controller1 = Controller::new();
        let work_ram = Rc::new(RefCell::new(MemoryUnit::new(0xFFFF, ByteOrder::Big)));

        let z80_space = Rc::new(RefCell::new(Self::build_z80_map(rom_unit.clone())));
        let m68k_space = Self::build_m68k_map(
            &rom,
            rom_unit,
            z80_space.clone(),
            vdp.clone(),
            &z80_ctrl,
            &controller1,
            work_ram.clone(),
        );

        let mut m68k = Cpu::new(Rc::new(RefCell::new(m68k_space)));
        m68k.set_interrupting_device(vdp.borrow().interrupt_device());

        let z80 = Z80::new(z80_space, Box::new(StubIoPorts));

        Self {
            m68k,
            z80,
            vdp,
            controller1,
            z80_ctrl,
            work_ram,
            rom,
            master_cycles: 0,
        }
    }

    fn build_z80_map(rom_unit: Rc<RefCell<ReadOnlyMemoryUnit>>) -> AddressSpace {
        let mut builder = MemoryBuilder::new();

        builder.add(
            shared(MemoryUnit::new(0x1FFF, ByteOrder::Little)),
            0x0000,
            0x1FFF,
        );
        builder.mirror(0x0000, 0x1FFF, 0x2000, 0x3FFF);

        // YM2612 stub: status reads increment, data reads are zero
        builder.add(shared(DummyUnit::new(0x0)), 0x4000, 0x4000);
        builder.add(shared(ConstUnit::zero(0x0)), 0x4001, 0x4001);
        builder.add(shared(DummyUnit::new(0x0)), 0x4002, 0x4002);
        builder.add(shared(ConstUnit::zero(0x0)), 0x4003, 0x4003);

        let bank_register = Rc::new(RefCell::new(BankRegister::new()));
        builder.add(bank_register.clone(), 0x6000, 0x6000);

        // PSG stub
        builder.add(shared(ConstUnit::ff(0x0)), 0x7F11, 0x7F11);

        builder.add(
            shared(BankArea::new(bank_register, rom_unit)),
            0x8000,
            0xFFFF,
        );

        builder.build()
    }

    #[allow(clippy::too_many_arguments)]
    fn build_m68k_map(
        rom: &Rom,
        rom_unit: Rc<RefCell<ReadOnlyMemoryUnit>>,
        z80_space: Rc<RefCell<AddressSpace>>,
        vdp: Rc<RefCell<Vdp>>,
        z80_ctrl: &Z80ControlRegisters,
        controller1: &Controller,
        work_ram: Rc<RefCell<MemoryUnit>>,
    ) -> AddressSpace {
        let mut builder = MemoryBuilder::new();

        builder.add(rom_unit, 0x000000, 0x3FFFFF);

        // the Z80 side, reachable while its bus is requested
        builder.add(z80_space, 0xA00000, 0xA0FFFF);

        builder.add(version_register(&rom.header().region_support), 0xA10000, 0xA10001);

        builder.add(controller1.data_port(), 0xA10002, 0xA10003);
        builder.add(DisabledPort::data(), 0xA10004, 0xA10005);
        builder.add(DisabledPort::data(), 0xA10006, 0xA10007);
        builder.add(controller1.control_port(), 0xA10008, 0xA10009);
        builder.add(DisabledPort::control(), 0xA1000A, 0xA1000B);
        builder.add(DisabledPort::control(), 0xA1000C, 0xA1000D);

        // serial interface scratch
        builder.add(shared(ConstUnit::zero(0x11)), 0xA1000E, 0xA1001F);

        builder.add(z80_ctrl.request_register(), 0xA11100, 0xA11101);
        builder.add(z80_ctrl.reset_register(), 0xA11200, 0xA11201);

        // reserved space around TMSS, modeled as writable scratch
        builder.add(
            shared(MemoryUnit::new(0xA13FFF - 0xA11202, ByteOrder::Big)),
            0xA11202,
            0xA13FFF,
        );
        // TMSS: plain RAM with no semantic effect
        builder.add(shared(MemoryUnit::new(0x3, ByteOrder::Big)), 0xA14000, 0xA14003);
        builder.add(
            shared(MemoryUnit::new(0xBFFFFF - 0xA14004, ByteOrder::Big)),
            0xA14004,
            0xBFFFFF,
        );

        builder.add(vdp, 0xC00000, 0xC0000F);
        builder.add(shared(DummyUnit::new(0x0F)), 0xC00010, 0xC0001F);

        // 64 KiB work RAM mirrored through the top 2 MiB
        builder.add(work_ram, 0xE00000, 0xE0FFFF);
        for i in 1..=31u32 {
            let start = 0xE00000 + 0x10000 * i;
            builder.mirror(0xE00000, 0xE0FFFF, start, start + 0xFFFF);
        }

        builder.build()
    }

    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    pub fn work_ram(&self) -> Rc<RefCell<MemoryUnit>> {
        self.work_ram.clone()
    }

    /// One master-clock tick, fanned out to each chip at its divisor.
    pub fn cycle(&mut self) {
        self.master_cycles += 1;

        if self.master_cycles % M68K_DIVIDER == 0 {
            // the VDP's pending level rides the IPL lines into the riser
            let ipl = self.vdp.borrow().ipl();
            self.m68k.bus.set_interrupt_priority(ipl);
            self.m68k.cycle();
        }

        if self.master_cycles % Z80_DIVIDER == 0 {
            self.z80_cycle();
        }

        if self.master_cycles % VDP_DIVIDER == 0 {
            let vdp = self.vdp.clone();
            vdp.borrow_mut().cycle(&mut self.m68k.bus_access());
        }
    }

    pub fn run_cycles(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.cycle();
        }
    }

    /// Roughly one NTSC frame's worth of master clocks.
    pub fn run_frame(&mut self) {
        self.run_cycles(262 * 171 * VDP_DIVIDER);
    }

    fn z80_cycle(&mut self) {
        self.z80_ctrl.cycle();

        if self.z80_ctrl.z80_reset_requested() {
            self.z80.reset();
            return;
        }

        if self.z80_ctrl.z80_bus_granted() {
            // the M68K side owns the Z80 bus; the Z80 stalls
            return;
        }

        self.z80.step();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z80_control_power_on_state() {
        let ctrl = Z80ControlRegisters::new();
        assert!(ctrl.z80_bus_granted());
        assert!(ctrl.z80_reset_requested());
    }

    #[test]
    fn test_z80_bus_handshake() {
        let mut ctrl = Z80ControlRegisters::new();

        // the program releases the bus and the reset line
        ctrl.request_register().borrow_mut().init_write_word(0, 0x000);
        ctrl.reset_register().borrow_mut().init_write_word(0, 0x100);
        ctrl.cycle();
        assert!(!ctrl.z80_bus_granted());
        assert!(!ctrl.z80_reset_requested());

        // requesting again grants over a cycle and rewrites the register so
        // the M68K sees bit 8 clear
        ctrl.request_register().borrow_mut().init_write_word(0, 0x100);
        ctrl.cycle();
        assert!(ctrl.z80_bus_granted());
        ctrl.request_register().borrow_mut().init_read_word(0);
        assert_eq!(ctrl.request_register().borrow().latched_word(), 0x200);
    }

    #[test]
    fn test_reset_only_bites_while_bus_held() {
        let mut ctrl = Z80ControlRegisters::new();

        ctrl.request_register().borrow_mut().init_write_word(0, 0x000);
        ctrl.reset_register().borrow_mut().init_write_word(0, 0x000);
        ctrl.cycle();
        // reset asserted but the bus is released: the line stays idle
        assert!(!ctrl.z80_reset_requested());

        ctrl.request_register().borrow_mut().init_write_word(0, 0x100);
        ctrl.cycle();
        assert!(ctrl.z80_reset_requested());
    }

    #[test]
    fn test_bank_register_shifts_msb_first() {
        let mut bank = BankRegister::new();
        // write bit pattern 1_0000_0000 (bit 8 first write is the MSB)
        bank.init_write_byte(0, 1);
        for _ in 0..8 {
            bank.init_write_byte(0, 0);
        }
        assert_eq!(bank.bank(), 1);

        // nine ones
        for _ in 0..9 {
            bank.init_write_byte(0, 1);
        }
        assert_eq!(bank.bank(), 0x1FF);
    }

    #[test]
    fn test_bank_area_windows_into_rom() {
        let mut rom_bytes = vec![0u8; 0x20000];
        rom_bytes[0x8000] = 0xAB;
        rom_bytes[0x8001] = 0xCD;
        let rom = Rc::new(RefCell::new(ReadOnlyMemoryUnit::from_bytes(
            rom_bytes,
            ByteOrder::Big,
        )));

        let bank_register = Rc::new(RefCell::new(BankRegister::new()));
        let mut area = BankArea::new(bank_register.clone(), rom);

        // bank 1: window covers 0x8000..0xFFFF of ROM
        bank_register.borrow_mut().bank = 1;
        area.init_read_byte(0x0000);
        assert_eq!(area.latched_byte(), 0xAB);
        area.init_read_byte(0x0001);
        assert_eq!(area.latched_byte(), 0xCD);
    }
}
