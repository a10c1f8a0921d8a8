//! 0xDD/0xFD-prefixed opcodes: IX/IY addressing, the register halves, and
//! the compound 0xDD/0xFD 0xCB d op displaced bit operations

use super::{flags, Z80};

impl Z80 {
    pub(super) fn execute_index(&mut self, is_ix: bool) -> u8 {
        let opcode = self.fetch_byte();

        // a prefix in front of an opcode with no IX/IY meaning acts as NONI:
        // the main table runs with four extra T-states
        match opcode {
            0xCB => self.execute_index_cb(is_ix),

            0x09 | 0x19 | 0x29 | 0x39 => {
                // ADD IX,rp (HL slot is the index register itself)
                let p = (opcode >> 4) & 0x03;
                let src = match p {
                    0 => self.bc(),
                    1 => self.de(),
                    2 => self.index_reg(is_ix),
                    _ => self.sp,
                };
                let result = self.add16(self.index_reg(is_ix), src);
                self.set_index_reg(is_ix, result);
                15
            }

            0x21 => {
                // LD IX,nn
                let nn = self.fetch_word();
                self.set_index_reg(is_ix, nn);
                14
            }
            0x22 => {
                // LD (nn),IX
                let addr = self.fetch_word();
                let value = self.index_reg(is_ix);
                self.write_word(addr, value);
                self.memptr = addr.wrapping_add(1);
                20
            }
            0x2A => {
                // LD IX,(nn)
                let addr = self.fetch_word();
                let value = self.read_word(addr);
                self.set_index_reg(is_ix, value);
                self.memptr = addr.wrapping_add(1);
                20
            }
            0x23 => {
                let value = self.index_reg(is_ix).wrapping_add(1);
                self.set_index_reg(is_ix, value);
                10
            }
            0x2B => {
                let value = self.index_reg(is_ix).wrapping_sub(1);
                self.set_index_reg(is_ix, value);
                10
            }

            0x34 => {
                // INC (IX+d)
                let addr = self.indexed_address(is_ix);
                let value = self.read_byte(addr);
                let result = self.inc8(value);
                self.write_byte(addr, result);
                23
            }
            0x35 => {
                // DEC (IX+d)
                let addr = self.indexed_address(is_ix);
                let value = self.read_byte(addr);
                let result = self.dec8(value);
                self.write_byte(addr, result);
                23
            }
            0x36 => {
                // LD (IX+d),n
                let addr = self.indexed_address(is_ix);
                let n = self.fetch_byte();
                self.write_byte(addr, n);
                19
            }

            // INC/DEC on the index halves
            0x24 | 0x25 | 0x2C | 0x2D => {
                let half = (opcode >> 3) & 0x07;
                let value = self.index_half(half, is_ix);
                let result = if opcode & 1 == 0 {
                    self.inc8(value)
                } else {
                    self.dec8(value)
                };
                self.set_index_half(half, result, is_ix);
                8
            }
            0x26 => {
                // LD IXH,n
                let n = self.fetch_byte();
                self.set_index_half(4, n, is_ix);
                11
            }
            0x2E => {
                // LD IXL,n
                let n = self.fetch_byte();
                self.set_index_half(5, n, is_ix);
                11
            }

            0x40..=0x7F => self.index_load(opcode, is_ix),

            0x80..=0xBF => {
                // ALU against an indexed or half operand
                let y = (opcode >> 3) & 0x07;
                let z = opcode & 0x07;
                if z == 6 {
                    let addr = self.indexed_address(is_ix);
                    let value = self.read_byte(addr);
                    self.alu_dispatch(y, value);
                    19
                } else {
                    let value = self.index_half(z, is_ix);
                    self.alu_dispatch(y, value);
                    8
                }
            }

            0xE1 => {
                // POP IX
                let value = self.pop();
                self.set_index_reg(is_ix, value);
                14
            }
            0xE5 => {
                // PUSH IX
                let value = self.index_reg(is_ix);
                self.push(value);
                15
            }
            0xE3 => {
                // EX (SP),IX
                let sp_value = self.read_word(self.sp);
                let ix = self.index_reg(is_ix);
                self.write_word(self.sp, ix);
                self.set_index_reg(is_ix, sp_value);
                self.memptr = sp_value;
                23
            }
            0xE9 => {
                // JP (IX)
                self.pc = self.index_reg(is_ix);
                8
            }
            0xF9 => {
                // LD SP,IX
                self.sp = self.index_reg(is_ix);
                10
            }

            _ => {
                // no IX/IY variant; replay through the main table
                4 + self.execute(opcode)
            }
        }
    }

    /// LD block with the HL slots replaced by IX halves or (IX+d).
    fn index_load(&mut self, opcode: u8, is_ix: bool) -> u8 {
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        if y == 6 && z == 6 {
            // HALT has no indexed form; the prefix is dead weight
            self.halted = true;
            self.bus.halt = true;
            return 8;
        }

        if y == 6 {
            // LD (IX+d),r - the source is the plain register file
            let addr = self.indexed_address(is_ix);
            let value = self.get_reg(z);
            self.write_byte(addr, value);
            19
        } else if z == 6 {
            // LD r,(IX+d)
            let addr = self.indexed_address(is_ix);
            let value = self.read_byte(addr);
            self.set_reg(y, value);
            19
        } else {
            // register-to-register with H/L mapped onto the index halves
            let value = self.index_half(z, is_ix);
            self.set_index_half(y, value, is_ix);
            8
        }
    }

    /// 0xDD/0xFD 0xCB d op: the displacement comes before the final opcode,
    /// the operation always acts on memory, and the non-(HL) register codes
    /// copy the result into that register as well.
    fn execute_index_cb(&mut self, is_ix: bool) -> u8 {
        let d = self.fetch_byte() as i8;
        let addr = self.index_reg(is_ix).wrapping_add(d as u16);
        self.memptr = addr;
        let opcode = self.fetch_byte();

        let x = (opcode >> 6) & 0x03;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        match x {
            1 => {
                // BIT y,(IX+d); X/Y from the address high byte
                let value = self.read_byte(addr);
                self.bit_test(y, value);
                let high = (addr >> 8) as u8;
                self.f = (self.f & !(flags::X_FLAG | flags::Y_FLAG))
                    | (high & (flags::X_FLAG | flags::Y_FLAG));
                20
            }
            _ => {
                let value = self.read_byte(addr);
                let result = match x {
                    0 => self.rotate_shift(y, value),
                    2 => value & !(1 << y),
                    _ => value | (1 << y),
                };
                self.write_byte(addr, result);
                if z != 6 {
                    self.set_reg(z, result);
                }
                23
            }
        }
    }

    fn index_reg(&self, is_ix: bool) -> u16 {
        if is_ix {
            self.ix
        } else {
            self.iy
        }
    }

    fn set_index_reg(&mut self, is_ix: bool, value: u16) {
        if is_ix {
            self.ix = value;
        } else {
            self.iy = value;
        }
    }

    /// Fetch the displacement and form IX+d, recording it in MEMPTR.
    fn indexed_address(&mut self, is_ix: bool) -> u16 {
        let d = self.fetch_byte() as i8;
        let addr = self.index_reg(is_ix).wrapping_add(d as u16);
        self.memptr = addr;
        addr
    }

    /// The 8-bit register file with H/L replaced by the index halves.
    fn index_half(&self, index: u8, is_ix: bool) -> u8 {
        match index {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => {
                if is_ix {
                    self.ixh()
                } else {
                    self.iyh()
                }
            }
            5 => {
                if is_ix {
                    self.ixl()
                } else {
                    self.iyl()
                }
            }
            _ => self.a,
        }
    }

    fn set_index_half(&mut self, index: u8, value: u8, is_ix: bool) {
        match index {
            0 => self.b = value,
            1 => self.c = value,
            2 => self.d = value,
            3 => self.e = value,
            4 => {
                if is_ix {
                    self.ix = (self.ix & 0x00FF) | ((value as u16) << 8);
                } else {
                    self.iy = (self.iy & 0x00FF) | ((value as u16) << 8);
                }
            }
            5 => {
                if is_ix {
                    self.ix = (self.ix & 0xFF00) | value as u16;
                } else {
                    self.iy = (self.iy & 0xFF00) | value as u16;
                }
            }
            _ => self.a = value,
        }
    }
}
