//! Controller ports and the version register
//!
//! The 3-button pad protocol is two-phase: the running program writes the
//! select patterns to the pad and reads back one of two button bytes
//! (zero means pressed).
//!
//! | Port address | Unit                    |
//! |:-------------|:------------------------|
//! | 0xA10000     | Version register        |
//! | 0xA10002     | Controller 1 data       |
//! | 0xA10004     | Controller 2 data       |
//! | 0xA10006     | Expansion data          |
//! | 0xA10008     | Controller 1 control    |
//! | 0xA1000A     | Controller 2 control    |
//! | 0xA1000C     | Expansion control       |

use crate::memory::{Addressable, ByteOrder, ConstUnit, ReadOnlyMemoryUnit, SharedUnit};

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// Button state for a 3-button pad; true means held down.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ControllerState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub c: bool,
    pub start: bool,
}

pub type SharedControllerState = Rc<RefCell<ControllerState>>;

const ALL_RELEASED: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectPhase {
    Unknown,
    FirstByte,
    SecondByte,
}

/// The pad's data port. Writes drive the select line, reads latch the
/// button byte for the current phase.
pub struct ControllerDataPort {
    state: SharedControllerState,
    phase: SelectPhase,
    latched: u8,
}

impl ControllerDataPort {
    fn new(state: SharedControllerState) -> Self {
        Self {
            state,
            phase: SelectPhase::Unknown,
            latched: ALL_RELEASED,
        }
    }

    fn on_write(&mut self, data: u16) {
        self.phase = match data {
            0x40 => SelectPhase::FirstByte,
            0x00 => SelectPhase::SecondByte,
            _ => SelectPhase::Unknown,
        };
    }

    fn on_read(&mut self) {
        self.latched = match self.phase {
            SelectPhase::FirstByte => self.first_byte(),
            SelectPhase::SecondByte => self.second_byte(),
            SelectPhase::Unknown => ALL_RELEASED,
        };
    }

    /// UP/DOWN/LEFT/RIGHT in bits 0-3, B and C in bits 4-5.
    fn first_byte(&self) -> u8 {
        let state = self.state.borrow();
        let mut data = 0;
        data |= Self::bit(state.up, 0);
        data |= Self::bit(state.down, 1);
        data |= Self::bit(state.left, 2);
        data |= Self::bit(state.right, 3);
        data |= Self::bit(state.b, 4);
        data |= Self::bit(state.c, 5);
        data
    }

    /// UP/DOWN in bits 0-1, A and START in bits 4-5.
    fn second_byte(&self) -> u8 {
        let state = self.state.borrow();
        let mut data = 0;
        data |= Self::bit(state.up, 0);
        data |= Self::bit(state.down, 1);
        data |= Self::bit(state.a, 4);
        data |= Self::bit(state.start, 5);
        data
    }

    fn bit(pressed: bool, position: u8) -> u8 {
        if pressed {
            0
        } else {
            1 << position
        }
    }
}

impl Addressable for ControllerDataPort {
    fn max_address(&self) -> u32 {
        0x1
    }

    fn is_idle(&self) -> bool {
        true
    }

    fn init_write_byte(&mut self, _address: u32, data: u8) {
        self.on_write(data as u16);
    }

    fn init_write_word(&mut self, _address: u32, data: u16) {
        self.on_write(data & 0xFF);
    }

    fn init_read_byte(&mut self, _address: u32) {
        self.on_read();
    }

    fn init_read_word(&mut self, _address: u32) {
        self.on_read();
    }

    fn latched_byte(&self) -> u8 {
        self.latched
    }

    fn latched_word(&self) -> u16 {
        ((self.latched as u16) << 8) | self.latched as u16
    }
}

/// A standard 3-button controller: a data port with the select protocol and
/// a plain control port.
pub struct Controller {
    state: SharedControllerState,
    data_port: SharedUnit,
    control_port: SharedUnit,
}

impl Controller {
    pub fn new() -> Self {
        let state = Rc::new(RefCell::new(ControllerState::default()));
        let data_port: SharedUnit =
            Rc::new(RefCell::new(ControllerDataPort::new(state.clone())));
        let control_port: SharedUnit = Rc::new(RefCell::new(ConstUnit::zero(0x1)));
        Self {
            state,
            data_port,
            control_port,
        }
    }

    pub fn state(&self) -> SharedControllerState {
        self.state.clone()
    }

    pub fn data_port(&self) -> SharedUnit {
        self.data_port.clone()
    }

    pub fn control_port(&self) -> SharedUnit {
        self.control_port.clone()
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

/// Absent controllers and the expansion port: data reads 0xFF, control
/// reads 0x00, writes vanish.
pub struct DisabledPort;

impl DisabledPort {
    pub fn data() -> SharedUnit {
        Rc::new(RefCell::new(ConstUnit::ff(0x1)))
    }

    pub fn control() -> SharedUnit {
        Rc::new(RefCell::new(ConstUnit::zero(0x1)))
    }
}

/// The read-only version register at 0xA10000: overseas and PAL bits from
/// the cartridge region, no expansion unit, hardware version 1.
pub fn version_register(region_support: &str) -> SharedUnit {
    let supports = |region: char| region_support.contains(region);

    let mut value: u8 = 0;
    if supports('E') || supports('U') {
        value |= 1 << 7;
    }
    if supports('E') {
        value |= 1 << 6; // PAL
    }
    value |= 1 << 5; // no expansion unit attached
    value |= 0b0001;

    let mut unit = ReadOnlyMemoryUnit::new(0x1, ByteOrder::Big);
    unit.preset_word(0, (value as u16) << 8 | value as u16);
    Rc::new(RefCell::new(unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_data(port: &SharedUnit) -> u8 {
        port.borrow_mut().init_read_byte(0);
        port.borrow().latched_byte()
    }

    #[test]
    fn test_unknown_phase_reads_ff() {
        let controller = Controller::new();
        assert_eq!(read_data(&controller.data_port()), 0xFF);
    }

    #[test]
    fn test_first_byte_buttons() {
        let controller = Controller::new();
        controller.state().borrow_mut().up = true;
        controller.state().borrow_mut().b = true;

        let port = controller.data_port();
        port.borrow_mut().init_write_byte(0, 0x40);
        // pressed bits read zero: UP (bit 0) and B (bit 4)
        assert_eq!(read_data(&port), 0b0010_1110);
    }

    #[test]
    fn test_second_byte_buttons() {
        let controller = Controller::new();
        controller.state().borrow_mut().start = true;

        let port = controller.data_port();
        port.borrow_mut().init_write_byte(0, 0x00);
        assert_eq!(read_data(&port), 0b0001_0011);
    }

    #[test]
    fn test_other_select_values_read_ff() {
        let controller = Controller::new();
        let port = controller.data_port();
        port.borrow_mut().init_write_byte(0, 0x40);
        port.borrow_mut().init_write_byte(0, 0x7F);
        assert_eq!(read_data(&port), 0xFF);
    }

    #[test]
    fn test_disabled_ports() {
        let data = DisabledPort::data();
        data.borrow_mut().init_read_byte(0);
        assert_eq!(data.borrow().latched_byte(), 0xFF);

        let control = DisabledPort::control();
        control.borrow_mut().init_read_byte(0);
        assert_eq!(control.borrow().latched_byte(), 0x00);

        // writes are dropped
        data.borrow_mut().init_write_byte(0, 0x12);
        data.borrow_mut().init_read_byte(0);
        assert_eq!(data.borrow().latched_byte(), 0xFF);
    }

    #[test]
    fn test_version_register_regions() {
        let reg = version_register("JUE");
        reg.borrow_mut().init_read_byte(0);
        let value = reg.borrow().latched_byte();
        assert_ne!(value & 0x80, 0); // overseas
        assert_ne!(value & 0x40, 0); // PAL support listed
        assert_ne!(value & 0x20, 0); // no expansion
        assert_eq!(value & 0x0F, 1);

        let reg = version_register("J");
        reg.borrow_mut().init_read_byte(0);
        let value = reg.borrow().latched_byte();
        assert_eq!(value & 0x80, 0);
        assert_eq!(value & 0x40, 0);
    }

    #[test]
    #[should_panic]
    fn test_version_register_rejects_writes() {
        let reg = version_register("JUE");
        reg.borrow_mut().init_write_byte(0, 0x00);
    }
}
