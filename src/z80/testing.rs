//! Shared Z80 test harness: a CPU over 64 KiB of flat little-endian RAM.

use super::{IoPorts, Z80};
use crate::memory::{ByteOrder, MemoryBuilder, MemoryUnit};

use std::cell::RefCell;
use std::rc::Rc;

/// IO stub that records writes and serves scripted reads.
#[derive(Debug, Default)]
pub struct RecordingPorts {
    pub reads: Vec<u16>,
    pub writes: Vec<(u16, u8)>,
    pub read_value: u8,
}

pub struct SharedPorts(pub Rc<RefCell<RecordingPorts>>);

impl IoPorts for SharedPorts {
    fn read_port(&mut self, port: u16) -> u8 {
        let mut inner = self.0.borrow_mut();
        inner.reads.push(port);
        inner.read_value
    }

    fn write_port(&mut self, port: u16, value: u8) {
        self.0.borrow_mut().writes.push((port, value));
    }
}

pub struct TestZ80 {
    pub cpu: Z80,
    pub ram: Rc<RefCell<MemoryUnit>>,
    pub ports: Rc<RefCell<RecordingPorts>>,
}

impl TestZ80 {
    pub fn new() -> Self {
        let ram = Rc::new(RefCell::new(MemoryUnit::new(0xFFFF, ByteOrder::Little)));
        let mut builder = MemoryBuilder::new();
        builder.add(ram.clone(), 0x0000, 0xFFFF);
        let space = Rc::new(RefCell::new(builder.build()));

        let ports = Rc::new(RefCell::new(RecordingPorts::default()));
        let mut cpu = Z80::new(space, Box::new(SharedPorts(ports.clone())));
        cpu.f = 0;
        cpu.sp = 0xF000;

        Self { cpu, ram, ports }
    }

    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        let mut ram = self.ram.borrow_mut();
        for (i, &byte) in bytes.iter().enumerate() {
            ram.write_byte(addr as u32 + i as u32, byte);
        }
    }

    pub fn run(&mut self, addr: u16, bytes: &[u8]) -> u8 {
        self.load(addr, bytes);
        self.cpu.pc = addr;
        self.cpu.step()
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.ram.borrow().read_byte(addr as u32)
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        self.ram.borrow_mut().write_byte(addr as u32, value);
    }
}

impl Default for TestZ80 {
    fn default() -> Self {
        Self::new()
    }
}
