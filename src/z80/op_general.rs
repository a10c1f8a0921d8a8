//! Unprefixed opcode groups, split by the x field

use super::{flags, Z80};

impl Z80 {
    /* x = 0: relative jumps, 16-bit loads/arithmetic, 8-bit inc/dec, loads,
    accumulator rotates */

    pub(super) fn execute_x0(&mut self, y: u8, z: u8, p: u8, q: u8) -> u8 {
        match z {
            0 => self.x0_control(y),
            1 => {
                if q == 0 {
                    // LD rp,nn
                    let nn = self.fetch_word();
                    self.set_rp(p, nn);
                    10
                } else {
                    // ADD HL,rp
                    let src = self.get_rp(p);
                    let result = self.add16(self.hl(), src);
                    self.set_hl(result);
                    11
                }
            }
            2 => self.x0_indirect_load(p, q),
            3 => {
                // INC/DEC rp, no flags
                let rp = self.get_rp(p);
                let value = if q == 0 {
                    rp.wrapping_add(1)
                } else {
                    rp.wrapping_sub(1)
                };
                self.set_rp(p, value);
                6
            }
            4 => {
                // INC r
                let value = self.get_reg(y);
                let result = self.inc8(value);
                self.set_reg(y, result);
                if y == 6 {
                    11
                } else {
                    4
                }
            }
            5 => {
                // DEC r
                let value = self.get_reg(y);
                let result = self.dec8(value);
                self.set_reg(y, result);
                if y == 6 {
                    11
                } else {
                    4
                }
            }
            6 => {
                // LD r,n
                let n = self.fetch_byte();
                self.set_reg(y, n);
                if y == 6 {
                    10
                } else {
                    7
                }
            }
            _ => self.x0_accumulator_ops(y),
        }
    }

    fn x0_control(&mut self, y: u8) -> u8 {
        match y {
            0 => 4, // NOP
            1 => {
                // EX AF,AF'
                std::mem::swap(&mut self.a, &mut self.a_alt);
                std::mem::swap(&mut self.f, &mut self.f_alt);
                4
            }
            2 => {
                // DJNZ d
                let d = self.fetch_byte() as i8;
                self.b = self.b.wrapping_sub(1);
                if self.b != 0 {
                    self.pc = self.pc.wrapping_add(d as u16);
                    self.memptr = self.pc;
                    13
                } else {
                    8
                }
            }
            3 => {
                // JR d
                let d = self.fetch_byte() as i8;
                self.pc = self.pc.wrapping_add(d as u16);
                self.memptr = self.pc;
                12
            }
            _ => {
                // JR cc,d
                let d = self.fetch_byte() as i8;
                if self.condition(y - 4) {
                    self.pc = self.pc.wrapping_add(d as u16);
                    self.memptr = self.pc;
                    12
                } else {
                    7
                }
            }
        }
    }

    fn x0_indirect_load(&mut self, p: u8, q: u8) -> u8 {
        match (p, q) {
            (0, 0) => {
                // LD (BC),A
                let addr = self.bc();
                self.write_byte(addr, self.a);
                self.memptr = ((self.a as u16) << 8) | (addr.wrapping_add(1) & 0xFF);
                7
            }
            (0, _) => {
                // LD A,(BC)
                let addr = self.bc();
                self.a = self.read_byte(addr);
                self.memptr = addr.wrapping_add(1);
                7
            }
            (1, 0) => {
                // LD (DE),A
                let addr = self.de();
                self.write_byte(addr, self.a);
                self.memptr = ((self.a as u16) << 8) | (addr.wrapping_add(1) & 0xFF);
                7
            }
            (1, _) => {
                // LD A,(DE)
                let addr = self.de();
                self.a = self.read_byte(addr);
                self.memptr = addr.wrapping_add(1);
                7
            }
            (2, 0) => {
                // LD (nn),HL
                let addr = self.fetch_word();
                let hl = self.hl();
                self.write_word(addr, hl);
                self.memptr = addr.wrapping_add(1);
                16
            }
            (2, _) => {
                // LD HL,(nn)
                let addr = self.fetch_word();
                let value = self.read_word(addr);
                self.set_hl(value);
                self.memptr = addr.wrapping_add(1);
                16
            }
            (_, 0) => {
                // LD (nn),A
                let addr = self.fetch_word();
                self.write_byte(addr, self.a);
                self.memptr = ((self.a as u16) << 8) | (addr.wrapping_add(1) & 0xFF);
                13
            }
            _ => {
                // LD A,(nn)
                let addr = self.fetch_word();
                self.a = self.read_byte(addr);
                self.memptr = addr.wrapping_add(1);
                13
            }
        }
    }

    fn x0_accumulator_ops(&mut self, y: u8) -> u8 {
        match y {
            0 => {
                // RLCA
                let carry = self.a >> 7;
                self.a = (self.a << 1) | carry;
                self.rot_a_flags(carry != 0);
                4
            }
            1 => {
                // RRCA
                let carry = self.a & 1;
                self.a = (self.a >> 1) | (carry << 7);
                self.rot_a_flags(carry != 0);
                4
            }
            2 => {
                // RLA
                let old = self.flag(flags::CARRY) as u8;
                let carry = self.a >> 7;
                self.a = (self.a << 1) | old;
                self.rot_a_flags(carry != 0);
                4
            }
            3 => {
                // RRA
                let old = self.flag(flags::CARRY) as u8;
                let carry = self.a & 1;
                self.a = (self.a >> 1) | (old << 7);
                self.rot_a_flags(carry != 0);
                4
            }
            4 => {
                self.daa();
                4
            }
            5 => {
                // CPL
                self.a = !self.a;
                let keep = self.f & (flags::SIGN | flags::ZERO | flags::PARITY | flags::CARRY);
                self.f = keep
                    | flags::HALF_CARRY
                    | flags::ADD_SUB
                    | (self.a & (flags::X_FLAG | flags::Y_FLAG));
                4
            }
            6 => {
                // SCF
                let keep = self.f & (flags::SIGN | flags::ZERO | flags::PARITY);
                self.f = keep | flags::CARRY | (self.a & (flags::X_FLAG | flags::Y_FLAG));
                4
            }
            _ => {
                // CCF: old carry becomes half-carry
                let old_carry = self.flag(flags::CARRY);
                let keep = self.f & (flags::SIGN | flags::ZERO | flags::PARITY);
                let mut f = keep | (self.a & (flags::X_FLAG | flags::Y_FLAG));
                if old_carry {
                    f |= flags::HALF_CARRY;
                } else {
                    f |= flags::CARRY;
                }
                self.f = f;
                4
            }
        }
    }

    /// RLCA/RRCA/RLA/RRA: X/Y from A, S/Z/P preserved, H=N=0.
    fn rot_a_flags(&mut self, carry: bool) {
        let keep = self.f & (flags::SIGN | flags::ZERO | flags::PARITY);
        let mut f = keep | (self.a & (flags::X_FLAG | flags::Y_FLAG));
        if carry {
            f |= flags::CARRY;
        }
        self.f = f;
    }

    /* x = 1: 8-bit loads plus HALT */

    pub(super) fn execute_x1(&mut self, y: u8, z: u8) -> u8 {
        if y == 6 && z == 6 {
            // HALT
            self.halted = true;
            self.bus.halt = true;
            return 4;
        }

        let value = self.get_reg(z);
        self.set_reg(y, value);
        if y == 6 || z == 6 {
            7
        } else {
            4
        }
    }

    /* x = 2: 8-bit arithmetic and logic against a register operand */

    pub(super) fn execute_x2(&mut self, y: u8, z: u8) -> u8 {
        let value = self.get_reg(z);
        self.alu_dispatch(y, value);
        if z == 6 {
            7
        } else {
            4
        }
    }

    pub(super) fn alu_dispatch(&mut self, y: u8, value: u8) {
        match y {
            0 => self.add_a(value, false),
            1 => self.add_a(value, true),
            2 => self.sub_a(value, false, true),
            3 => self.sub_a(value, true, true),
            4 => self.and_a(value),
            5 => self.xor_a(value),
            6 => self.or_a(value),
            _ => self.sub_a(value, false, false), // CP
        }
    }

    /* x = 3: conditional flow, stack, immediate ALU, IO */

    pub(super) fn execute_x3(&mut self, y: u8, z: u8, p: u8, q: u8) -> u8 {
        match z {
            0 => {
                // RET cc
                self.memptr = self.pc;
                if self.condition(y) {
                    self.pc = self.pop();
                    self.memptr = self.pc;
                    11
                } else {
                    5
                }
            }
            1 => {
                if q == 0 {
                    // POP rp2
                    let value = self.pop();
                    self.set_rp2(p, value);
                    10
                } else {
                    match p {
                        0 => {
                            // RET
                            self.pc = self.pop();
                            self.memptr = self.pc;
                            10
                        }
                        1 => {
                            // EXX
                            std::mem::swap(&mut self.b, &mut self.b_alt);
                            std::mem::swap(&mut self.c, &mut self.c_alt);
                            std::mem::swap(&mut self.d, &mut self.d_alt);
                            std::mem::swap(&mut self.e, &mut self.e_alt);
                            std::mem::swap(&mut self.h, &mut self.h_alt);
                            std::mem::swap(&mut self.l, &mut self.l_alt);
                            4
                        }
                        2 => {
                            // JP (HL)
                            self.pc = self.hl();
                            4
                        }
                        _ => {
                            // LD SP,HL
                            self.sp = self.hl();
                            6
                        }
                    }
                }
            }
            2 => {
                // JP cc,nn
                let nn = self.fetch_word();
                self.memptr = nn;
                if self.condition(y) {
                    self.pc = nn;
                }
                10
            }
            3 => match y {
                0 => {
                    // JP nn
                    let nn = self.fetch_word();
                    self.pc = nn;
                    self.memptr = nn;
                    10
                }
                2 => {
                    // OUT (n),A
                    let n = self.fetch_byte();
                    let port = ((self.a as u16) << 8) | n as u16;
                    self.write_port(port, self.a);
                    self.memptr = ((self.a as u16) << 8) | ((n as u16 + 1) & 0xFF);
                    11
                }
                3 => {
                    // IN A,(n)
                    let n = self.fetch_byte();
                    let port = ((self.a as u16) << 8) | n as u16;
                    self.a = self.read_port(port);
                    self.memptr = port.wrapping_add(1);
                    11
                }
                4 => {
                    // EX (SP),HL
                    let sp_value = self.read_word(self.sp);
                    let hl = self.hl();
                    self.write_word(self.sp, hl);
                    self.set_hl(sp_value);
                    self.memptr = sp_value;
                    19
                }
                5 => {
                    // EX DE,HL
                    let de = self.de();
                    let hl = self.hl();
                    self.set_de(hl);
                    self.set_hl(de);
                    4
                }
                6 => {
                    // DI
                    self.iff1 = false;
                    self.iff2 = false;
                    4
                }
                _ => {
                    // EI takes effect after the next instruction
                    self.iff1 = true;
                    self.iff2 = true;
                    self.pending_ei = true;
                    4
                }
            },
            4 => {
                // CALL cc,nn
                let nn = self.fetch_word();
                self.memptr = nn;
                if self.condition(y) {
                    self.push(self.pc);
                    self.pc = nn;
                    17
                } else {
                    10
                }
            }
            5 => {
                if q == 0 {
                    // PUSH rp2
                    let value = self.get_rp2(p);
                    self.push(value);
                    11
                } else {
                    // CALL nn (p == 0; the other encodings are prefixes,
                    // handled before dispatch)
                    let nn = self.fetch_word();
                    self.memptr = nn;
                    self.push(self.pc);
                    self.pc = nn;
                    17
                }
            }
            6 => {
                // ALU n
                let n = self.fetch_byte();
                self.alu_dispatch(y, n);
                7
            }
            _ => {
                // RST y*8
                self.push(self.pc);
                self.pc = (y as u16) * 8;
                self.memptr = self.pc;
                11
            }
        }
    }
}
