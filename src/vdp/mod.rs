//! Video Display Processor
//!
//! Owns the video memories and the per-pixel pipeline. A VDP cycle is one
//! pixel clock: the port state machine runs, one FIFO entry drains to
//! memory, the read cache refills, the DMA engine steps, the H/V counters
//! advance and the interrupt unit re-evaluates the IPL lines.
//!
//! | Memory | Size      | Contents                           |
//! |:-------|:----------|:-----------------------------------|
//! | VRAM   | 64 KiB    | patterns, name tables, sprite table|
//! | CRAM   | 64 colors | 9-bit `----bbb-ggg-rrr-` entries   |
//! | VSRAM  | 40 words  | vertical scroll strip values       |
//!
//! The CPU sees four word ports through [`Addressable`]: data (+0),
//! control/status (+4), HV counter (+8, mirrored at +0xC).

pub mod control;
pub mod dma;
pub mod hv;
pub mod interrupts;
pub mod ports;
pub mod registers;
pub mod render;

pub use control::{ControlType, VMemType};
pub use registers::{DisplayHeight, DisplayWidth, TimingMode};

use crate::cpu::M68kBusAccess;
use crate::debugger::Debuggable;
use crate::memory::Addressable;

use serde_json::{json, Value};

use dma::DmaUnit;
use hv::HvUnit;
use interrupts::InterruptUnit;
use ports::Ports;
use registers::RegisterSet;

use std::cell::RefCell;
use std::rc::Rc;

/// Which port the last bus access touched, for latching results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortSelect {
    Data,
    Control,
    HvCounter,
}

pub struct Vdp {
    pub regs: RegisterSet,
    pub ports: Ports,

    pub vram: Box<[u8; 0x10000]>,
    pub cram: [u16; 64],
    pub vsram: [u16; 40],

    pub hv: HvUnit,
    pub irq: Rc<RefCell<InterruptUnit>>,
    pub(crate) dma: DmaUnit,

    /// Active display output, one 9-bit color per pixel, 320 wide.
    pub framebuffer: Vec<u16>,

    selected_port: PortSelect,
    hv_latch: u16,
    byte_select: u32,
}

pub const FRAMEBUFFER_WIDTH: usize = 320;
pub const FRAMEBUFFER_HEIGHT: usize = 240;

impl Vdp {
    pub fn new(mode: TimingMode) -> Self {
        Self {
            regs: RegisterSet::new(mode),
            ports: Ports::new(),
            vram: Box::new([0; 0x10000]),
            cram: [0; 64],
            vsram: [0; 40],
            hv: HvUnit::new(),
            irq: Rc::new(RefCell::new(InterruptUnit::new())),
            dma: DmaUnit::new(),
            framebuffer: vec![0; FRAMEBUFFER_WIDTH * FRAMEBUFFER_HEIGHT],
            selected_port: PortSelect::Control,
            hv_latch: 0,
            byte_select: 0,
        }
    }

    /// The interrupting-device handle the M68K's bus manager acknowledges
    /// through.
    pub fn interrupt_device(&self) -> Rc<RefCell<InterruptUnit>> {
        self.irq.clone()
    }

    /// The IPL level the VDP is asserting right now.
    pub fn ipl(&self) -> u8 {
        self.irq.borrow().ipl()
    }

    /// One pixel clock.
    pub fn cycle(&mut self, m68k_bus: &mut M68kBusAccess) {
        self.ports.cycle(&mut self.regs);
        self.drain_fifo();
        self.precache_read();
        self.dma_cycle(m68k_bus);

        let new_line = self.hv.on_pixel(&mut self.regs);
        self.irq.borrow_mut().cycle(&mut self.regs);

        if new_line {
            let line = self.hv.v.raw();
            if line < self.regs.display_height().pixels() {
                self.render_line(line);
            }
        }
    }

    /* memory side */

    /// Move one queued write into video memory per cycle.
    fn drain_fifo(&mut self) {
        if !self.regs.fifo.is_empty() {
            let entry = self.regs.fifo.pop();
            let addr = entry.control.address();
            match entry.control.vmem_type() {
                VMemType::Vram => self.vram_write_word(addr, entry.data),
                VMemType::Cram => self.cram_write(addr, entry.data),
                VMemType::Vsram => self.vsram_write(addr, entry.data),
                VMemType::Invalid => {}
            }
            self.dma.on_fifo_drain();
        }

        self.regs.status.fifo_empty = self.regs.fifo.is_empty();
        self.regs.status.fifo_full = self.regs.fifo.is_full();
    }

    /// With the control register in read mode and the cache released, fetch
    /// the next word so a data-port read can complete.
    fn precache_read(&mut self) {
        if self.regs.control.control_type() != ControlType::Read
            || self.regs.control.work_completed()
            || !self.regs.fifo.is_empty()
            || !self.dma.is_idle()
        {
            return;
        }

        let addr = self.regs.control.address();
        let word = match self.regs.control.vmem_type() {
            VMemType::Vram => self.vram_read_word(addr),
            VMemType::Cram => self.cram_read(addr),
            VMemType::Vsram => self.vsram_read(addr),
            VMemType::Invalid => return,
        };
        self.regs.read_buffer.set(word);
        self.regs.control.set_work_completed(true);
    }

    /// Word write to VRAM: the low byte lands at the target address, the
    /// high byte at the target with A0 flipped.
    pub(crate) fn vram_write_word(&mut self, addr: u32, data: u16) {
        let a = (addr as usize) & 0xFFFF;
        self.vram[a] = data as u8;
        self.vram[a ^ 1] = (data >> 8) as u8;
    }

    pub(crate) fn vram_read_word(&self, addr: u32) -> u16 {
        let a = (addr as usize) & 0xFFFE;
        ((self.vram[a ^ 1] as u16) << 8) | self.vram[a] as u16
    }

    /// The byte at a VRAM address as the CPU sees it.
    pub(crate) fn vram_byte(&self, addr: u32) -> u8 {
        self.vram[(addr as usize & 0xFFFF) ^ 1]
    }

    pub(crate) fn cram_write(&mut self, addr: u32, data: u16) {
        self.cram[((addr as usize) & 0x7F) >> 1] = data;
    }

    pub(crate) fn cram_read(&self, addr: u32) -> u16 {
        self.cram[((addr as usize) & 0x7F) >> 1]
    }

    pub(crate) fn vsram_write(&mut self, addr: u32, data: u16) {
        let index = ((addr as usize) & 0x7F) >> 1;
        if index < self.vsram.len() {
            self.vsram[index] = data;
        }
    }

    pub(crate) fn vsram_read(&self, addr: u32) -> u16 {
        let index = ((addr as usize) & 0x7F) >> 1;
        if index < self.vsram.len() {
            self.vsram[index]
        } else {
            0
        }
    }

    fn hv_counter_word(&self) -> u16 {
        ((self.regs.v_counter as u16) << 8) | self.regs.h_counter as u16
    }
}

impl Addressable for Vdp {
    fn max_address(&self) -> u32 {
        0xF
    }

    fn is_idle(&self) -> bool {
        self.ports.is_idle()
    }

    fn init_write_byte(&mut self, address: u32, data: u8) {
        self.byte_select = address;
        match address & 0xC {
            0x0 => {
                self.selected_port = PortSelect::Data;
                self.ports.init_write_data_byte(data);
            }
            0x4 => {
                self.selected_port = PortSelect::Control;
                self.ports.init_write_control_byte(data);
            }
            _ => {}
        }
    }

    fn init_write_word(&mut self, address: u32, data: u16) {
        match address & 0xC {
            0x0 => {
                self.selected_port = PortSelect::Data;
                self.ports.init_write_data(data);
            }
            0x4 => {
                self.selected_port = PortSelect::Control;
                self.ports.init_write_control(data);
            }
            _ => {} // HV counter ignores writes
        }
    }

    fn init_read_byte(&mut self, address: u32) {
        self.byte_select = address;
        self.init_read_word(address);
    }

    fn init_read_word(&mut self, address: u32) {
        match address & 0xC {
            0x0 => {
                self.selected_port = PortSelect::Data;
                self.ports.init_read_data();
            }
            0x4 => {
                self.selected_port = PortSelect::Control;
                self.ports.init_read_control();
            }
            _ => {
                self.selected_port = PortSelect::HvCounter;
                self.hv_latch = self.hv_counter_word();
            }
        }
    }

    fn latched_byte(&self) -> u8 {
        let word = self.latched_word();
        if self.byte_select & 1 == 0 {
            (word >> 8) as u8
        } else {
            word as u8
        }
    }

    fn latched_word(&self) -> u16 {
        match self.selected_port {
            PortSelect::HvCounter => self.hv_latch,
            _ => self.ports.read_result(&self.regs),
        }
    }
}

impl Debuggable for Vdp {
    fn read_state(&self) -> Value {
        let registers: Vec<u8> = (0..registers::REGISTER_COUNT)
            .map(|reg| self.regs.register(reg))
            .collect();
        json!({
            "registers": registers,
            "status": self.regs.status.as_word(),
            "control_address": self.regs.control.address(),
            "h_counter": self.regs.h_counter,
            "v_counter": self.regs.v_counter,
            "dma_busy": self.regs.status.dma_busy,
        })
    }

    fn write_state(&mut self, state: &Value) {
        if let Some(registers) = state.get("registers").and_then(Value::as_array) {
            for (reg, value) in registers.iter().take(registers::REGISTER_COUNT).enumerate() {
                if let Some(value) = value.as_u64() {
                    self.regs.set_register(reg, value as u8);
                }
            }
        }
    }
}

#[cfg(test)]
pub mod testing;

#[cfg(test)]
mod tests_control;
#[cfg(test)]
mod tests_dma;
#[cfg(test)]
mod tests_hv;
#[cfg(test)]
mod tests_render;
