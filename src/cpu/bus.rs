//! M68K bus signal lines
//!
//! The latched 24-bit address, the 16-bit data bus and the named control
//! lines. Components communicate exclusively through these signals plus the
//! bus manager's state machine.

/// Named bus lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusLine {
    /* asynchronous bus control */
    Rw,
    As,
    Uds,
    Lds,
    Dtack,

    /* processor status */
    Fc0,
    Fc1,
    Fc2,

    /* system control */
    Berr,
    Reset,
    Halt,

    /* interrupt control */
    Ipl0,
    Ipl1,
    Ipl2,
    Vpa,

    /* bus arbitration */
    Br,
    Bg,
}

const NUM_LINES: usize = 17;

/// The M68K's externally visible bus state.
#[derive(Debug, Clone)]
pub struct CpuBus {
    lines: [bool; NUM_LINES],
    address: u32,
    data: u16,
}

impl CpuBus {
    pub fn new() -> Self {
        Self {
            lines: [false; NUM_LINES],
            address: 0,
            data: 0,
        }
    }

    pub fn set(&mut self, line: BusLine) {
        self.lines[line as usize] = true;
    }

    pub fn clear(&mut self, line: BusLine) {
        self.lines[line as usize] = false;
    }

    pub fn is_set(&self, line: BusLine) -> bool {
        self.lines[line as usize]
    }

    /// Latch an address; only 24 bits reach the pins.
    pub fn set_address(&mut self, address: u32) {
        self.address = address & 0xFF_FFFF;
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn set_data(&mut self, data: u16) {
        self.data = data;
    }

    pub fn data(&self) -> u16 {
        self.data
    }

    pub fn set_func_codes(&mut self, fc: u8) {
        self.lines[BusLine::Fc0 as usize] = (fc & 0b001) != 0;
        self.lines[BusLine::Fc1 as usize] = (fc & 0b010) != 0;
        self.lines[BusLine::Fc2 as usize] = (fc & 0b100) != 0;
    }

    pub fn func_codes(&self) -> u8 {
        let mut fc = 0;
        if self.is_set(BusLine::Fc0) {
            fc |= 0b001;
        }
        if self.is_set(BusLine::Fc1) {
            fc |= 0b010;
        }
        if self.is_set(BusLine::Fc2) {
            fc |= 0b100;
        }
        fc
    }

    /// Drive the IPL0-IPL2 lines with an interrupt priority level.
    pub fn set_interrupt_priority(&mut self, ipl: u8) {
        self.lines[BusLine::Ipl0 as usize] = (ipl & 0b001) != 0;
        self.lines[BusLine::Ipl1 as usize] = (ipl & 0b010) != 0;
        self.lines[BusLine::Ipl2 as usize] = (ipl & 0b100) != 0;
    }

    pub fn interrupt_priority(&self) -> u8 {
        let mut ipl = 0;
        if self.is_set(BusLine::Ipl0) {
            ipl |= 0b001;
        }
        if self.is_set(BusLine::Ipl1) {
            ipl |= 0b010;
        }
        if self.is_set(BusLine::Ipl2) {
            ipl |= 0b100;
        }
        ipl
    }
}

impl Default for CpuBus {
    fn default() -> Self {
        Self::new()
    }
}
