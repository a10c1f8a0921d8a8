//! VDP interrupt unit
//!
//! Tracks the vertical and horizontal interrupt pending flags and drives the
//! M68K's IPL lines: VINT at level 6, HINT at level 4, the external pin at
//! level 2. The M68K acknowledges through its interrupt-acknowledge bus
//! cycle, which lands here via the [`InterruptingDevice`] trait; the VDP
//! autovectors.

use super::registers::{DisplayHeight, DisplayWidth, RegisterSet};
use crate::cpu::bus_manager::{InterruptType, InterruptingDevice};

use log::trace;

pub struct InterruptUnit {
    hint_counter: u32,
    pub hint_pending: bool,
    pub vint_pending: bool,
    /// External interrupt pin (unused by the stock machine).
    pub ext_pending: bool,

    prev_h: u32,
    ipl: u8,
}

impl InterruptUnit {
    pub fn new() -> Self {
        Self {
            hint_counter: 0,
            hint_pending: false,
            vint_pending: false,
            ext_pending: false,
            prev_h: u32::MAX,
            ipl: 0,
        }
    }

    pub fn reset(&mut self) {
        self.hint_counter = 0;
        self.hint_pending = false;
        self.vint_pending = false;
        self.ext_pending = false;
        self.prev_h = u32::MAX;
        self.ipl = 0;
    }

    /// The level currently asserted on the IPL lines.
    pub fn ipl(&self) -> u8 {
        self.ipl
    }

    /// Evaluate the counters once per VDP cycle.
    pub fn cycle(&mut self, regs: &mut RegisterSet) {
        let h_value = regs.h_counter as u32;
        if self.prev_h != h_value {
            self.prev_h = h_value;
            self.check_vint(regs);
            self.check_hint(regs);
        }

        regs.status.vint_pending = self.vint_pending;
        self.update_ipl(regs);
    }

    /// VINT pends at the first pixel past the active display: V 0xE0 (V28)
    /// or 0xF0 (V30), H exactly 0x02.
    fn check_vint(&mut self, regs: &RegisterSet) {
        if self.vint_pending || regs.h_counter != 0x02 {
            return;
        }

        let trigger_line = match regs.display_height() {
            DisplayHeight::C28 => 0xE0,
            DisplayHeight::C30 => 0xF0,
        };
        if regs.v_counter == trigger_line {
            trace!("vint pending at line {:#04X}", regs.v_counter);
            self.vint_pending = true;
        }
    }

    /// The line counter reloads from R10 during vertical blank and on
    /// underflow; it decrements once per in-display line.
    fn check_hint(&mut self, regs: &RegisterSet) {
        if self.hint_counter > 0 {
            let max_line = match regs.display_height() {
                DisplayHeight::C28 => 0xE0,
                DisplayHeight::C30 => 0xF0,
            };
            let decrement_at = match regs.display_width() {
                DisplayWidth::C32 => 0x86,
                DisplayWidth::C40 => 0xA6,
            };

            if (regs.v_counter as u32) <= max_line && regs.h_counter as u32 == decrement_at {
                self.hint_counter -= 1;
                if self.hint_counter == 0 {
                    trace!("hint pending at line {:#04X}", regs.v_counter);
                    self.hint_pending = true;
                    self.hint_counter = regs.hint_counter() as u32;
                }
            }
        }

        if regs.status.vblank {
            self.hint_counter = regs.hint_counter() as u32;
        }
    }

    fn update_ipl(&mut self, regs: &RegisterSet) {
        let mut level = 0;
        if self.ext_pending && regs.ext_interrupt_enabled() {
            level = 2;
        }
        if self.hint_pending && regs.hint_enabled() {
            level = 4;
        }
        if self.vint_pending && regs.vint_enabled() {
            level = 6;
        }
        self.ipl = level;
    }
}

impl Default for InterruptUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptingDevice for InterruptUnit {
    fn is_idle(&self) -> bool {
        true
    }

    /// The acknowledged level clears its pending flag; the IPL lines drop
    /// until the next evaluation.
    fn init_interrupt_ack(&mut self, priority: u8) {
        trace!("interrupt level {} acknowledged", priority);
        match priority {
            6 => self.vint_pending = false,
            4 => self.hint_pending = false,
            2 => self.ext_pending = false,
            _ => {}
        }
        self.ipl = 0;
    }

    fn interrupt_type(&self) -> InterruptType {
        InterruptType::Autovectored
    }

    fn vector_number(&self) -> u8 {
        0
    }
}
