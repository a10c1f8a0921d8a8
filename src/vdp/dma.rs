//! VDP DMA engine
//!
//! Three modes selected by the top bits of R23: VRAM fill (`10`), VRAM copy
//! (`11`), and M68K-to-VDP transfer (`0x`). The transfer mode acquires the
//! M68K bus through the BR/BG handshake and streams words into the write
//! FIFO; fill and copy run entirely inside video memory. One step per VDP
//! cycle, length counts down through the R19/R20 registers (a zero length
//! wraps through the full 64 K range).

use super::registers::DmaMode;
use super::{VMemType, Vdp};
use crate::cpu::M68kBusAccess;

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DmaState {
    Idle,
    /// Fill armed, waiting for the seed word to land through the FIFO.
    FillPending,
    Fill,
    VramCopy,
    MemToVram,
    Finishing,
}

pub(crate) struct DmaUnit {
    state: DmaState,
    /// VRAM copy alternates read and write cycles.
    copy_byte: Option<u8>,
    /// Transfer-mode handshake progress.
    bus_requested: bool,
    reading: bool,
}

impl DmaUnit {
    pub fn new() -> Self {
        Self {
            state: DmaState::Idle,
            copy_byte: None,
            bus_requested: false,
            reading: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == DmaState::Idle
    }

    /// The fill seed has been drained to memory; filling can start.
    pub fn on_fifo_drain(&mut self) {
        if self.state == DmaState::FillPending {
            self.state = DmaState::Fill;
        }
    }
}

impl Vdp {
    pub(crate) fn dma_cycle(&mut self, m68k_bus: &mut M68kBusAccess) {
        self.dma_check_work();

        match self.dma.state {
            DmaState::Idle | DmaState::FillPending => {}
            DmaState::Fill => self.dma_fill_step(),
            DmaState::VramCopy => self.dma_copy_step(),
            DmaState::MemToVram => self.dma_transfer_step(m68k_bus),
            DmaState::Finishing => self.dma_finish(m68k_bus),
        }
    }

    fn dma_check_work(&mut self) {
        if self.dma.state != DmaState::Idle {
            return;
        }
        if !self.regs.control.dma_start() || !self.regs.dma_enabled() {
            return;
        }

        let mode = self.regs.dma_mode();
        debug!(
            "dma start: mode {:?}, length {:#06X}, source {:#08X}, target {:#06X}",
            mode,
            self.regs.dma_length(),
            self.regs.dma_source(),
            self.regs.control.address()
        );

        self.dma.copy_byte = None;
        self.dma.bus_requested = false;
        self.dma.reading = false;
        self.regs.status.dma_busy = true;
        self.dma.state = match mode {
            DmaMode::VramFill => DmaState::FillPending,
            DmaMode::VramCopy => DmaState::VramCopy,
            DmaMode::MemToVram => DmaState::MemToVram,
        };
    }

    /// One fill write per cycle: the high byte of the seed word lands at the
    /// current address on VRAM targets, the full word on CRAM/VSRAM slots.
    fn dma_fill_step(&mut self) {
        if !self.regs.fifo.is_empty() {
            // a CPU write slipped in; let it drain first
            return;
        }

        let addr = self.regs.control.address();
        let fill_word = self.regs.fifo.last_popped().data;
        match self.regs.control.vmem_type() {
            VMemType::Vram => {
                self.vram[(addr as usize) & 0xFFFF] = (fill_word >> 8) as u8;
            }
            VMemType::Cram => self.cram_write(addr, fill_word),
            VMemType::Vsram => self.vsram_write(addr, fill_word),
            VMemType::Invalid => {}
        }

        self.dma_advance();
    }

    /// Alternate cycles read a source byte and write it to the target.
    fn dma_copy_step(&mut self) {
        match self.dma.copy_byte.take() {
            None => {
                let source = self.regs.dma_source();
                self.dma.copy_byte = Some(self.vram[(source as usize) & 0xFFFF]);
                self.regs.set_dma_source(source.wrapping_add(1));
            }
            Some(byte) => {
                let addr = self.regs.control.address();
                self.vram[(addr as usize) & 0xFFFF] = byte;
                self.dma_advance();
            }
        }
    }

    /// Stream words from the M68K bus into the FIFO, owning the bus for the
    /// duration of the run.
    fn dma_transfer_step(&mut self, m68k_bus: &mut M68kBusAccess) {
        if self.regs.fifo.is_full() {
            return;
        }
        if !m68k_bus.is_idle() {
            return;
        }

        if !self.dma.bus_requested {
            m68k_bus.request_bus();
            self.dma.bus_requested = true;
            return;
        }
        if !m68k_bus.bus_granted() {
            return;
        }

        if self.dma.reading {
            self.dma.reading = false;

            let data = m68k_bus.latched_word();
            self.regs.fifo.push(data, self.regs.control);
            let addr = self.regs.control.address() + self.regs.auto_increment() as u32;
            self.regs.control.set_address(addr);

            if self.regs.dma_length() == 0 {
                m68k_bus.release_bus();
                self.dma.bus_requested = false;
                self.dma.state = DmaState::Finishing;
                return;
            }
        }

        let source = self.regs.dma_source();
        m68k_bus.init_read_word(source);
        self.dma.reading = true;
        self.regs.set_dma_source(source.wrapping_add(2));
        self.regs
            .set_dma_length(self.regs.dma_length().wrapping_sub(1));
    }

    /// Advance target address and length for fill/copy; a length hitting
    /// zero ends the run.
    fn dma_advance(&mut self) {
        let addr = self.regs.control.address() + self.regs.auto_increment() as u32;
        self.regs.control.set_address(addr);

        let length = self.regs.dma_length().wrapping_sub(1);
        self.regs.set_dma_length(length);
        if length == 0 {
            self.dma.state = DmaState::Finishing;
        }
    }

    /// Wait for memory quiescence, then drop CD5 and the R1 enable bit.
    fn dma_finish(&mut self, m68k_bus: &mut M68kBusAccess) {
        if !self.regs.fifo.is_empty() || !m68k_bus.is_idle() {
            return;
        }

        debug!("dma finished at target {:#06X}", self.regs.control.address());
        self.regs.control.set_dma_start(false);
        self.regs.clear_dma_enabled();
        self.regs.status.dma_busy = false;
        self.dma.state = DmaState::Idle;
    }
}
