//! 0xED-prefixed opcodes: 16-bit carry arithmetic, I/R transfers, IM
//! selection, RRD/RLD, and the block instructions

use super::{flags, Z80};

impl Z80 {
    pub(super) fn execute_ed(&mut self) -> u8 {
        let opcode = self.fetch_byte();
        let x = (opcode >> 6) & 0x03;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let p = y >> 1;
        let q = y & 0x01;

        match x {
            1 => self.ed_x1(y, z, p, q),
            2 => self.ed_block(y, z),
            // x = 0 and x = 3 are NONI: the Z80 treats them as two NOPs
            _ => 8,
        }
    }

    fn ed_x1(&mut self, y: u8, z: u8, p: u8, q: u8) -> u8 {
        match z {
            0 => {
                // IN r,(C); r = 6 only sets flags
                let port = self.bc();
                let value = self.read_port(port);
                if y != 6 {
                    self.set_reg(y, value);
                }
                self.f = (self.f & flags::CARRY) | Self::szxy(value) | Self::parity(value);
                self.memptr = port.wrapping_add(1);
                12
            }
            1 => {
                // OUT (C),r; r = 6 writes zero
                let port = self.bc();
                let value = if y == 6 { 0 } else { self.get_reg(y) };
                self.write_port(port, value);
                self.memptr = port.wrapping_add(1);
                12
            }
            2 => {
                // SBC/ADC HL,rp
                let src = self.get_rp(p);
                if q == 0 {
                    self.sbc16(src);
                } else {
                    self.adc16(src);
                }
                15
            }
            3 => {
                // LD (nn),rp / LD rp,(nn)
                let addr = self.fetch_word();
                if q == 0 {
                    let value = self.get_rp(p);
                    self.write_word(addr, value);
                } else {
                    let value = self.read_word(addr);
                    self.set_rp(p, value);
                }
                self.memptr = addr.wrapping_add(1);
                20
            }
            4 => {
                // NEG (every encoding)
                let a = self.a;
                self.a = 0;
                self.sub_a(a, false, true);
                8
            }
            5 => {
                if y == 1 {
                    // RETI
                    self.pc = self.pop();
                    self.memptr = self.pc;
                    14
                } else {
                    // RETN (and mirrors): restore IFF1 from IFF2
                    self.iff1 = self.iff2;
                    self.pc = self.pop();
                    self.memptr = self.pc;
                    14
                }
            }
            6 => {
                // IM 0/1/2 by y
                self.im = match y & 0x03 {
                    2 => 1,
                    3 => 2,
                    _ => 0,
                };
                8
            }
            _ => match y {
                0 => {
                    // LD I,A
                    self.i = self.a;
                    9
                }
                1 => {
                    // LD R,A
                    self.r = self.a;
                    9
                }
                2 => {
                    // LD A,I
                    self.a = self.i;
                    self.ld_a_ir_flags();
                    9
                }
                3 => {
                    // LD A,R
                    self.a = self.r;
                    self.ld_a_ir_flags();
                    9
                }
                4 => {
                    self.rrd();
                    18
                }
                5 => {
                    self.rld();
                    18
                }
                _ => 8, // NOP mirrors
            },
        }
    }

    /// LD A,I / LD A,R copy IFF2 into P/V.
    fn ld_a_ir_flags(&mut self) {
        let mut f = (self.f & flags::CARRY) | Self::szxy(self.a);
        if self.iff2 {
            f |= flags::PARITY;
        }
        self.f = f;
    }

    /// Rotate the low nibbles right through (HL) and A.
    fn rrd(&mut self) {
        let addr = self.hl();
        let mem = self.read_byte(addr);
        let new_mem = (self.a << 4) | (mem >> 4);
        self.a = (self.a & 0xF0) | (mem & 0x0F);
        self.write_byte(addr, new_mem);

        self.f = (self.f & flags::CARRY) | Self::szxy(self.a) | Self::parity(self.a);
        self.memptr = addr.wrapping_add(1);
    }

    /// Rotate the low nibbles left through (HL) and A.
    fn rld(&mut self) {
        let addr = self.hl();
        let mem = self.read_byte(addr);
        let new_mem = (mem << 4) | (self.a & 0x0F);
        self.a = (self.a & 0xF0) | (mem >> 4);
        self.write_byte(addr, new_mem);

        self.f = (self.f & flags::CARRY) | Self::szxy(self.a) | Self::parity(self.a);
        self.memptr = addr.wrapping_add(1);
    }

    /// Block instructions. The repeating forms run one step per execution
    /// and rewind PC by two while the counter is live, so interrupts land
    /// between steps.
    fn ed_block(&mut self, y: u8, z: u8) -> u8 {
        match (z, y) {
            (0, 4) => self.ldi_ldd(1, false),
            (0, 5) => self.ldi_ldd(-1, false),
            (0, 6) => self.ldi_ldd(1, true),
            (0, 7) => self.ldi_ldd(-1, true),
            (1, 4) => self.cpi_cpd(1, false),
            (1, 5) => self.cpi_cpd(-1, false),
            (1, 6) => self.cpi_cpd(1, true),
            (1, 7) => self.cpi_cpd(-1, true),
            (2, 4) => self.ini_ind(1, false),
            (2, 5) => self.ini_ind(-1, false),
            (2, 6) => self.ini_ind(1, true),
            (2, 7) => self.ini_ind(-1, true),
            (3, 4) => self.outi_outd(1, false),
            (3, 5) => self.outi_outd(-1, false),
            (3, 6) => self.outi_outd(1, true),
            (3, 7) => self.outi_outd(-1, true),
            _ => 8,
        }
    }

    fn ldi_ldd(&mut self, step: i16, repeat: bool) -> u8 {
        let value = self.read_byte(self.hl());
        let de = self.de();
        self.write_byte(de, value);

        self.set_hl(self.hl().wrapping_add(step as u16));
        self.set_de(de.wrapping_add(step as u16));
        let bc = self.bc().wrapping_sub(1);
        self.set_bc(bc);

        // undocumented: X/Y from A + copied byte
        let n = self.a.wrapping_add(value);
        let mut f = self.f & (flags::SIGN | flags::ZERO | flags::CARRY);
        if n & 0x08 != 0 {
            f |= flags::X_FLAG;
        }
        if n & 0x02 != 0 {
            f |= flags::Y_FLAG;
        }
        if bc != 0 {
            f |= flags::PARITY;
        }
        self.f = f;

        if repeat && bc != 0 {
            self.pc = self.pc.wrapping_sub(2);
            self.memptr = self.pc.wrapping_add(1);
            21
        } else {
            16
        }
    }

    fn cpi_cpd(&mut self, step: i16, repeat: bool) -> u8 {
        let value = self.read_byte(self.hl());
        let result = self.a.wrapping_sub(value);
        let half = (self.a & 0x0F) < (value & 0x0F);

        self.set_hl(self.hl().wrapping_add(step as u16));
        let bc = self.bc().wrapping_sub(1);
        self.set_bc(bc);
        self.memptr = self.memptr.wrapping_add(step as u16);

        let mut f = (self.f & flags::CARRY) | flags::ADD_SUB;
        f |= result & flags::SIGN;
        if result == 0 {
            f |= flags::ZERO;
        }
        if half {
            f |= flags::HALF_CARRY;
        }
        if bc != 0 {
            f |= flags::PARITY;
        }
        // undocumented: X/Y from result minus half-carry
        let n = result.wrapping_sub(half as u8);
        if n & 0x08 != 0 {
            f |= flags::X_FLAG;
        }
        if n & 0x02 != 0 {
            f |= flags::Y_FLAG;
        }
        self.f = f;

        if repeat && bc != 0 && result != 0 {
            self.pc = self.pc.wrapping_sub(2);
            self.memptr = self.pc.wrapping_add(1);
            21
        } else {
            16
        }
    }

    fn ini_ind(&mut self, step: i16, repeat: bool) -> u8 {
        let port = self.bc();
        let value = self.read_port(port);
        let hl = self.hl();
        self.write_byte(hl, value);

        self.memptr = port.wrapping_add(step as u16);
        self.b = self.b.wrapping_sub(1);
        self.set_hl(hl.wrapping_add(step as u16));

        self.block_io_flags(value, (self.c as u16).wrapping_add(step as u16) as u8);

        if repeat && self.b != 0 {
            self.pc = self.pc.wrapping_sub(2);
            21
        } else {
            16
        }
    }

    fn outi_outd(&mut self, step: i16, repeat: bool) -> u8 {
        let hl = self.hl();
        let value = self.read_byte(hl);
        self.b = self.b.wrapping_sub(1);
        let port = self.bc();
        self.write_port(port, value);

        self.set_hl(hl.wrapping_add(step as u16));
        self.memptr = port.wrapping_add(step as u16);

        self.block_io_flags(value, self.l);

        if repeat && self.b != 0 {
            self.pc = self.pc.wrapping_sub(2);
            21
        } else {
            16
        }
    }

    /// Shared undocumented flag rule for the IO block instructions.
    fn block_io_flags(&mut self, value: u8, counter: u8) {
        let mut f = Self::szxy(self.b);
        if value & 0x80 != 0 {
            f |= flags::ADD_SUB;
        }
        let k = value as u16 + counter as u16;
        if k > 0xFF {
            f |= flags::CARRY | flags::HALF_CARRY;
        }
        f |= Self::parity((k as u8 & 0x07) ^ self.b);
        self.f = f;
    }
}
