//! 0xCB-prefixed opcodes: rotates, shifts and bit operations

use super::{flags, Z80};

impl Z80 {
    pub(super) fn execute_cb(&mut self) -> u8 {
        let opcode = self.fetch_byte();
        let x = (opcode >> 6) & 0x03;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        match x {
            0 => {
                let value = self.get_reg(z);
                let result = self.rotate_shift(y, value);
                self.set_reg(z, result);
                if z == 6 {
                    15
                } else {
                    8
                }
            }
            1 => {
                // BIT y,r
                let value = self.get_reg(z);
                self.bit_test(y, value);
                if z == 6 {
                    // (HL): the X/Y flags leak from MEMPTR's high byte
                    let high = (self.memptr >> 8) as u8;
                    self.f = (self.f & !(flags::X_FLAG | flags::Y_FLAG))
                        | (high & (flags::X_FLAG | flags::Y_FLAG));
                    12
                } else {
                    8
                }
            }
            2 => {
                // RES y,r
                let value = self.get_reg(z) & !(1 << y);
                self.set_reg(z, value);
                if z == 6 {
                    15
                } else {
                    8
                }
            }
            _ => {
                // SET y,r
                let value = self.get_reg(z) | (1 << y);
                self.set_reg(z, value);
                if z == 6 {
                    15
                } else {
                    8
                }
            }
        }
    }

    /// The eight CB rotate/shift kinds by the y field.
    pub(super) fn rotate_shift(&mut self, kind: u8, value: u8) -> u8 {
        let old_carry = self.flag(flags::CARRY) as u8;
        let (result, carry) = match kind {
            0 => (value.rotate_left(1), value >> 7),            // RLC
            1 => (value.rotate_right(1), value & 1),            // RRC
            2 => ((value << 1) | old_carry, value >> 7),        // RL
            3 => ((value >> 1) | (old_carry << 7), value & 1),  // RR
            4 => (value << 1, value >> 7),                      // SLA
            5 => (((value as i8) >> 1) as u8, value & 1),       // SRA
            6 => ((value << 1) | 1, value >> 7),                // SLL (undocumented)
            _ => (value >> 1, value & 1),                       // SRL
        };

        let mut f = Self::szxy(result) | Self::parity(result);
        if carry != 0 {
            f |= flags::CARRY;
        }
        self.f = f;
        result
    }

    /// BIT n,r flags: Z/P from the tested bit, S only for bit 7, X/Y from
    /// the operand, H set, N clear, C preserved.
    pub(super) fn bit_test(&mut self, bit: u8, value: u8) {
        let tested = value & (1 << bit);
        let mut f = (self.f & flags::CARRY) | flags::HALF_CARRY;
        if tested == 0 {
            f |= flags::ZERO | flags::PARITY;
        }
        if bit == 7 && tested != 0 {
            f |= flags::SIGN;
        }
        f |= value & (flags::X_FLAG | flags::Y_FLAG);
        self.f = f;
    }
}
