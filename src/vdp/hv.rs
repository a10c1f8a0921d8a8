//! H/V counters and blank flags
//!
//! The raster counters advance with the documented overflow-skip pairs:
//!
//! | Counter | Mode       | Skip               |
//! |:--------|:-----------|:-------------------|
//! | H       | H32        | 0x93 -> 0xE9       |
//! | H       | H40        | 0xB6 -> 0xE4       |
//! | V       | NTSC V28   | 0xEA -> 0xE5       |
//! | V       | NTSC V30   | wraps naturally    |
//! | V       | PAL V28    | 0x02 -> 0xCA       |
//! | V       | PAL V30    | 0x0A -> 0xD2       |
//!
//! The raw value counts pixels/lines from the top of the frame and drives
//! the blank flags; the 8-bit value is what the HV-counter port exposes.

use super::registers::{DisplayHeight, DisplayWidth, RegisterSet, TimingMode};

/// One raster counter: the externally visible 8-bit value with its skip
/// behavior, and the raw position that never skips.
#[derive(Debug, Default)]
pub struct RasterCounter {
    raw: u32,
    value: u8,
    jumped: bool,
}

impl RasterCounter {
    pub fn reset(&mut self) {
        self.raw = 0;
        self.value = 0;
        self.jumped = false;
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Advance with a single skip per wrap: at `skip_at` the value jumps to
    /// `skip_to`, then continues to 0xFF and restarts.
    fn advance(&mut self, skip_at: u8, skip_to: u8) {
        if self.jumped && self.value == 0xFF {
            self.reset();
            return;
        }
        self.raw += 1;

        if !self.jumped && self.value == skip_at {
            self.value = skip_to;
            self.jumped = true;
        } else {
            self.value = self.value.wrapping_add(1);
        }
    }

    /// Advance with the PAL double-pass behavior: the skip point holds on
    /// every second wrap of the 8-bit value.
    fn advance_rollover(&mut self, skip_at: u8, skip_to: u8) {
        if self.jumped && self.value == 0xFF {
            self.raw = 0;
        } else {
            self.raw += 1;
        }

        if self.value == 0xFF {
            self.jumped = !self.jumped;
        }

        if self.jumped && self.value == skip_at {
            self.value = skip_to;
        } else {
            self.value = self.value.wrapping_add(1);
        }
    }

    fn advance_wrapping(&mut self, total: u32) {
        self.raw = (self.raw + 1) % total;
        self.value = self.raw as u8;
    }
}

/// Updates both counters and the blank flags, one pixel clock at a time.
#[derive(Debug, Default)]
pub struct HvUnit {
    pub h: RasterCounter,
    pub v: RasterCounter,
    hblank: bool,
    vblank: bool,
}

impl HvUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.h.reset();
        self.v.reset();
        self.hblank = false;
        self.vblank = false;
    }

    pub fn hblank(&self) -> bool {
        self.hblank
    }

    pub fn vblank(&self) -> bool {
        self.vblank
    }

    /// Advance one pixel. The V counter moves at the documented raw H
    /// position; returns true when a new line began.
    pub fn on_pixel(&mut self, regs: &mut RegisterSet) -> bool {
        let width = regs.display_width();
        let height = regs.display_height();
        let mode = regs.mode;

        match width {
            DisplayWidth::C32 => self.h.advance(0x93, 0xE9),
            DisplayWidth::C40 => self.h.advance(0xB6, 0xE4),
        }
        self.update_hblank(width);

        let v_advance_at = match width {
            DisplayWidth::C32 => 0x85,
            DisplayWidth::C40 => 0xA5,
        };

        let mut new_line = false;
        if self.h.raw() == v_advance_at {
            self.advance_v(height, mode);
            self.update_vblank(height, mode);
            new_line = true;
        }

        if !regs.hv_counter_frozen() {
            regs.h_counter = self.h.value();
            regs.v_counter = self.v.value();
        }
        regs.status.hblank = self.hblank;
        regs.status.vblank = self.vblank;

        new_line
    }

    fn advance_v(&mut self, height: DisplayHeight, mode: TimingMode) {
        match (mode, height) {
            (TimingMode::Pal, DisplayHeight::C28) => self.v.advance_rollover(0x02, 0xCA),
            (TimingMode::Pal, DisplayHeight::C30) => self.v.advance_rollover(0x0A, 0xD2),
            (TimingMode::Ntsc, DisplayHeight::C28) => self.v.advance(0xEA, 0xE5),
            (TimingMode::Ntsc, DisplayHeight::C30) => self.v.advance_wrapping(0x200),
        }
    }

    fn update_hblank(&mut self, width: DisplayWidth) {
        let (set_at, clear_at) = match width {
            DisplayWidth::C32 => (0x93, 0x05),
            DisplayWidth::C40 => (0xB3, 0x06),
        };
        if self.h.raw() == set_at {
            self.hblank = true;
        } else if self.h.raw() == clear_at {
            self.hblank = false;
        }
    }

    fn update_vblank(&mut self, height: DisplayHeight, mode: TimingMode) {
        let set_at = match height {
            DisplayHeight::C28 => 0xE0,
            DisplayHeight::C30 => 0xF0,
        };
        let clear_at = match (mode, height) {
            (TimingMode::Pal, _) => 0x138,
            (TimingMode::Ntsc, DisplayHeight::C28) => 0x105,
            (TimingMode::Ntsc, DisplayHeight::C30) => 0x1FF,
        };

        if self.v.raw() == set_at {
            self.vblank = true;
        } else if self.v.raw() == clear_at {
            self.vblank = false;
        }
    }
}
