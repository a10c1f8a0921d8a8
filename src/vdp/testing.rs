//! Shared VDP test harness
//!
//! A VDP plus a detached M68K bus manager over 64 KiB of RAM standing in
//! for the 68K side, so DMA transfers have something to read.

use super::{TimingMode, Vdp};
use crate::cpu::bus::CpuBus;
use crate::cpu::bus_manager::BusManager;
use crate::cpu::exceptions::ExceptionManager;
use crate::cpu::registers::RegisterFile;
use crate::cpu::M68kBusAccess;
use crate::memory::{ByteOrder, MemoryBuilder, MemoryUnit};

use std::cell::RefCell;
use std::rc::Rc;

pub struct TestVdp {
    pub vdp: Vdp,
    pub ram: Rc<RefCell<MemoryUnit>>,
    pub busm: BusManager,
    pub bus: CpuBus,
    regs: RegisterFile,
    exman: ExceptionManager,
}

impl TestVdp {
    pub fn new() -> Self {
        Self::with_mode(TimingMode::Ntsc)
    }

    pub fn with_mode(mode: TimingMode) -> Self {
        let ram = Rc::new(RefCell::new(MemoryUnit::new(0xFFFF, ByteOrder::Big)));
        let mut builder = MemoryBuilder::new();
        builder.add(ram.clone(), 0x000000, 0x00FFFF);
        let space = Rc::new(RefCell::new(builder.build()));

        let mut vdp = Vdp::new(mode);
        // DMA tests want the engine armed
        vdp.regs.set_register(15, 0x02);

        Self {
            vdp,
            ram,
            busm: BusManager::new(space),
            bus: CpuBus::new(),
            regs: RegisterFile::new(),
            exman: ExceptionManager::new(),
        }
    }

    /// One VDP cycle plus one M68K bus clock, the way the system interleaves
    /// them.
    pub fn cycle(&mut self) {
        let mut access = M68kBusAccess {
            busm: &mut self.busm,
            bus: &mut self.bus,
        };
        self.vdp.cycle(&mut access);
        self.busm.cycle(&mut self.bus, &mut self.regs, &mut self.exman);
    }

    pub fn run(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.cycle();
        }
    }

    /// Write a control word and let the port settle.
    pub fn control_write(&mut self, word: u16) {
        self.vdp.ports.init_write_control(word);
        self.run(2);
    }

    /// Write a data word and let it drain to memory.
    pub fn data_write(&mut self, word: u16) {
        self.vdp.ports.init_write_data(word);
        self.run(4);
    }

    /// Read the data port to completion.
    pub fn data_read(&mut self) -> u16 {
        self.vdp.ports.init_read_data();
        let mut cycles = 0;
        while !self.vdp.ports.is_idle() {
            self.cycle();
            cycles += 1;
            assert!(cycles < 100, "data port read never completed");
        }
        self.vdp.ports.read_result(&self.vdp.regs)
    }

    /// Read the status word through the control port.
    pub fn status_read(&mut self) -> u16 {
        self.vdp.ports.init_read_control();
        self.run(2);
        self.vdp.ports.read_result(&self.vdp.regs)
    }

    /// Run cycles until the DMA unit settles back to idle.
    pub fn run_dma(&mut self) {
        let mut cycles = 0;
        while !self.vdp.dma.is_idle() || self.vdp.regs.status.dma_busy {
            self.cycle();
            cycles += 1;
            assert!(cycles < 2_000_000, "dma never finished");
        }
    }
}

impl Default for TestVdp {
    fn default() -> Self {
        Self::new()
    }
}
