//! VDP I/O ports
//!
//! The CPU-facing side of the VDP: the data and control ports with their
//! two-word control protocol. Requests follow the addressable begin/latch
//! shape - `init_*` starts one, the VDP's cycle completes it (a data-port
//! read may stall until the read cache fills, a write until the FIFO has a
//! free slot).
//!
//! The single `pending` flag rules the control protocol: clear on any data
//! port access and on control reads; toggled by control writes.

use super::registers::RegisterSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    None,
    ReadControl,
    WriteControl,
    ReadData,
    WriteData,
}

pub struct Ports {
    request: Request,
    data_to_write: u16,
    /// Result of the last completed read request. Control reads always
    /// reflect the live status register instead.
    read_data: Option<u16>,
    reading_control: bool,
    /// Waiting for the second control word.
    pending: bool,
}

impl Ports {
    pub fn new() -> Self {
        Self {
            request: Request::None,
            data_to_write: 0,
            read_data: None,
            reading_control: false,
            pending: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.request == Request::None
    }

    pub fn control_pending(&self) -> bool {
        self.pending
    }

    pub fn reset(&mut self) {
        self.request = Request::None;
        self.read_data = None;
        self.reading_control = false;
        self.pending = false;
    }

    /* request interface */

    pub fn init_read_control(&mut self) {
        self.start(Request::ReadControl);
    }

    pub fn init_write_control(&mut self, data: u16) {
        self.start(Request::WriteControl);
        self.data_to_write = data;
    }

    pub fn init_write_control_byte(&mut self, data: u8) {
        // byte writes land on both halves of the bus
        self.init_write_control(((data as u16) << 8) | data as u16);
    }

    pub fn init_read_data(&mut self) {
        self.start(Request::ReadData);
    }

    pub fn init_write_data(&mut self, data: u16) {
        self.start(Request::WriteData);
        self.data_to_write = data;
    }

    pub fn init_write_data_byte(&mut self, data: u8) {
        self.init_write_data(((data as u16) << 8) | data as u16);
    }

    /// Result of the last read request; only valid while idle.
    pub fn read_result(&self, regs: &RegisterSet) -> u16 {
        assert!(self.is_idle(), "vdp port result read while busy");
        if self.reading_control {
            return regs.status.as_word();
        }
        self.read_data.expect("vdp port result without a read")
    }

    fn start(&mut self, request: Request) {
        assert!(
            self.request == Request::None,
            "vdp port request started while busy"
        );
        self.request = request;
        self.reading_control = false;
        self.read_data = None;
        self.data_to_write = 0;
    }

    /// Drive the current request; one VDP cycle each, except data accesses
    /// that wait on the FIFO or the read cache.
    pub fn cycle(&mut self, regs: &mut RegisterSet) {
        match self.request {
            Request::None => {}

            Request::ReadControl => {
                self.reading_control = true;
                self.pending = false;
                self.request = Request::None;
            }

            Request::WriteControl => {
                let data = self.data_to_write;
                if !self.pending && data >> 14 == 0b10 {
                    // register write: 10RR RRRD DDDD DDDD
                    let reg = ((data >> 8) & 0x1F) as usize;
                    regs.set_register(reg, data as u8);
                } else if !self.pending {
                    regs.control.cp1 = data;
                    self.pending = true;
                } else {
                    regs.control.cp2 = data;
                    self.pending = false;
                }
                self.request = Request::None;
            }

            Request::ReadData => {
                if !regs.control.work_completed() {
                    // wait for the VDP to fill the read cache
                    return;
                }

                self.read_data = Some(regs.read_buffer.data());
                let addr = regs.control.address() + regs.auto_increment() as u32;
                regs.control.set_address(addr);
                // release the cache so the next word can be prefetched
                regs.control.set_work_completed(false);
                regs.read_buffer.clear_data_flag();
                self.pending = false;
                self.request = Request::None;
            }

            Request::WriteData => {
                if regs.fifo.is_full() {
                    // wait for the VDP to drain a slot
                    return;
                }

                regs.fifo.push(self.data_to_write, regs.control);
                let addr = regs.control.address() + regs.auto_increment() as u32;
                regs.control.set_address(addr);
                self.pending = false;
                self.request = Request::None;
            }
        }
    }
}

impl Default for Ports {
    fn default() -> Self {
        Self::new()
    }
}
