//! Z80 arithmetic and logic tests

use super::flags;
use super::testing::TestZ80;

#[test]
fn test_add_a_basic() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x13;
    t.cpu.b = 0x31;

    t.run(0x100, &[0x80]); // ADD A,B

    assert_eq!(t.cpu.a, 0x44);
    assert!(!t.cpu.flag(flags::CARRY));
    assert!(!t.cpu.flag(flags::ZERO));
    assert!(!t.cpu.flag(flags::ADD_SUB));
}

#[test]
fn test_add_a_carry_and_overflow() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x7F;
    t.cpu.b = 0x01;
    t.run(0x100, &[0x80]);

    assert_eq!(t.cpu.a, 0x80);
    assert!(t.cpu.flag(flags::PARITY)); // signed overflow
    assert!(t.cpu.flag(flags::SIGN));
    assert!(t.cpu.flag(flags::HALF_CARRY));
    assert!(!t.cpu.flag(flags::CARRY));
}

#[test]
fn test_adc_uses_carry() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x10;
    t.cpu.b = 0x20;
    t.cpu.set_flag(flags::CARRY, true);

    t.run(0x100, &[0x88]); // ADC A,B
    assert_eq!(t.cpu.a, 0x31);
}

#[test]
fn test_sub_sets_n_and_borrow() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x00;
    t.cpu.b = 0x01;

    t.run(0x100, &[0x90]); // SUB B
    assert_eq!(t.cpu.a, 0xFF);
    assert!(t.cpu.flag(flags::CARRY));
    assert!(t.cpu.flag(flags::ADD_SUB));
    assert!(t.cpu.flag(flags::SIGN));
}

#[test]
fn test_cp_keeps_a_and_takes_xy_from_operand() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x50;
    t.cpu.b = 0x28; // bits 3 and 5 set
    t.run(0x100, &[0xB8]); // CP B

    assert_eq!(t.cpu.a, 0x50);
    assert!(t.cpu.flag(flags::X_FLAG));
    assert!(t.cpu.flag(flags::Y_FLAG));
}

#[test]
fn test_and_sets_half_carry() {
    let mut t = TestZ80::new();
    t.cpu.a = 0b1100;
    t.cpu.c = 0b1010;
    t.run(0x100, &[0xA1]); // AND C

    assert_eq!(t.cpu.a, 0b1000);
    assert!(t.cpu.flag(flags::HALF_CARRY));
    assert!(!t.cpu.flag(flags::CARRY));
}

#[test]
fn test_xor_clears_to_zero() {
    let mut t = TestZ80::new();
    t.cpu.a = 0xA5;
    t.run(0x100, &[0xAF]); // XOR A

    assert_eq!(t.cpu.a, 0);
    assert!(t.cpu.flag(flags::ZERO));
    assert!(t.cpu.flag(flags::PARITY)); // zero has even parity
}

#[test]
fn test_inc_dec_preserve_carry() {
    let mut t = TestZ80::new();
    t.cpu.b = 0x7F;
    t.cpu.set_flag(flags::CARRY, true);
    t.run(0x100, &[0x04]); // INC B

    assert_eq!(t.cpu.b, 0x80);
    assert!(t.cpu.flag(flags::PARITY)); // 0x7F -> 0x80 overflows
    assert!(t.cpu.flag(flags::CARRY)); // untouched

    let mut t = TestZ80::new();
    t.cpu.b = 0x80;
    t.run(0x100, &[0x05]); // DEC B
    assert_eq!(t.cpu.b, 0x7F);
    assert!(t.cpu.flag(flags::PARITY));
    assert!(t.cpu.flag(flags::ADD_SUB));
}

#[test]
fn test_add_hl_half_carry_from_bit_11() {
    let mut t = TestZ80::new();
    t.cpu.set_hl(0x0FFF);
    t.cpu.set_bc(0x0001);
    t.run(0x100, &[0x09]); // ADD HL,BC

    assert_eq!(t.cpu.hl(), 0x1000);
    assert!(t.cpu.flag(flags::HALF_CARRY));
    assert!(!t.cpu.flag(flags::CARRY));
}

#[test]
fn test_adc_hl_sets_sign_and_overflow() {
    let mut t = TestZ80::new();
    t.cpu.set_hl(0x7FFF);
    t.cpu.set_bc(0x0001);
    t.run(0x100, &[0xED, 0x4A]); // ADC HL,BC

    assert_eq!(t.cpu.hl(), 0x8000);
    assert!(t.cpu.flag(flags::SIGN));
    assert!(t.cpu.flag(flags::PARITY));
}

#[test]
fn test_sbc_hl_borrow() {
    let mut t = TestZ80::new();
    t.cpu.set_hl(0x0000);
    t.cpu.set_de(0x0001);
    t.run(0x100, &[0xED, 0x52]); // SBC HL,DE

    assert_eq!(t.cpu.hl(), 0xFFFF);
    assert!(t.cpu.flag(flags::CARRY));
    assert!(t.cpu.flag(flags::ADD_SUB));
}

#[test]
fn test_daa_after_add() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x15;
    t.cpu.b = 0x27;
    t.run(0x100, &[0x80]); // ADD A,B -> 0x3C
    t.cpu.pc = 0x101;
    t.load(0x101, &[0x27]); // DAA
    t.cpu.step();

    assert_eq!(t.cpu.a, 0x42); // 15 + 27 = 42 decimal
}

#[test]
fn test_daa_after_sub() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x42;
    t.cpu.b = 0x15;
    t.run(0x100, &[0x90]); // SUB B -> 0x2D
    t.cpu.pc = 0x101;
    t.load(0x101, &[0x27]); // DAA
    t.cpu.step();

    assert_eq!(t.cpu.a, 0x27); // 42 - 15 = 27 decimal
}

#[test]
fn test_neg() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x01;
    t.run(0x100, &[0xED, 0x44]); // NEG

    assert_eq!(t.cpu.a, 0xFF);
    assert!(t.cpu.flag(flags::CARRY));
    assert!(t.cpu.flag(flags::ADD_SUB));
}

#[test]
fn test_cpl_scf_ccf() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x0F;
    t.run(0x100, &[0x2F]); // CPL
    assert_eq!(t.cpu.a, 0xF0);
    assert!(t.cpu.flag(flags::HALF_CARRY));
    assert!(t.cpu.flag(flags::ADD_SUB));

    let mut t = TestZ80::new();
    t.run(0x100, &[0x37]); // SCF
    assert!(t.cpu.flag(flags::CARRY));

    t.cpu.pc = 0x101;
    t.load(0x101, &[0x3F]); // CCF
    t.cpu.step();
    assert!(!t.cpu.flag(flags::CARRY));
    assert!(t.cpu.flag(flags::HALF_CARRY)); // takes the old carry
}

#[test]
fn test_rlca_rrca() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x81;
    t.run(0x100, &[0x07]); // RLCA
    assert_eq!(t.cpu.a, 0x03);
    assert!(t.cpu.flag(flags::CARRY));

    let mut t = TestZ80::new();
    t.cpu.a = 0x01;
    t.run(0x100, &[0x0F]); // RRCA
    assert_eq!(t.cpu.a, 0x80);
    assert!(t.cpu.flag(flags::CARRY));
}

#[test]
fn test_cb_rotates_and_shifts() {
    let mut t = TestZ80::new();
    t.cpu.b = 0x80;
    t.run(0x100, &[0xCB, 0x00]); // RLC B
    assert_eq!(t.cpu.b, 0x01);
    assert!(t.cpu.flag(flags::CARRY));

    let mut t = TestZ80::new();
    t.cpu.b = 0x81;
    t.run(0x100, &[0xCB, 0x28]); // SRA B
    assert_eq!(t.cpu.b, 0xC0);
    assert!(t.cpu.flag(flags::CARRY));

    let mut t = TestZ80::new();
    t.cpu.b = 0x81;
    t.run(0x100, &[0xCB, 0x38]); // SRL B
    assert_eq!(t.cpu.b, 0x40);
    assert!(t.cpu.flag(flags::CARRY));

    // SLL shifts in a one
    let mut t = TestZ80::new();
    t.cpu.b = 0x01;
    t.run(0x100, &[0xCB, 0x30]); // SLL B
    assert_eq!(t.cpu.b, 0x03);
}

#[test]
fn test_cb_bit_set_res() {
    let mut t = TestZ80::new();
    t.cpu.d = 0b0000_0100;
    t.run(0x100, &[0xCB, 0x52]); // BIT 2,D
    assert!(!t.cpu.flag(flags::ZERO));
    assert!(t.cpu.flag(flags::HALF_CARRY));

    let mut t = TestZ80::new();
    t.cpu.d = 0xFF;
    t.run(0x100, &[0xCB, 0x92]); // RES 2,D
    assert_eq!(t.cpu.d, 0xFB);

    let mut t = TestZ80::new();
    t.cpu.d = 0x00;
    t.run(0x100, &[0xCB, 0xD2]); // SET 2,D
    assert_eq!(t.cpu.d, 0x04);
}

#[test]
fn test_rrd_rld() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x84;
    t.cpu.set_hl(0x2000);
    t.write(0x2000, 0x20);
    t.run(0x100, &[0xED, 0x67]); // RRD

    assert_eq!(t.cpu.a, 0x80);
    assert_eq!(t.read(0x2000), 0x42);

    let mut t = TestZ80::new();
    t.cpu.a = 0x13;
    t.cpu.set_hl(0x2000);
    t.write(0x2000, 0x57);
    t.run(0x100, &[0xED, 0x6F]); // RLD

    assert_eq!(t.cpu.a, 0x15);
    assert_eq!(t.read(0x2000), 0x73);
}

#[test]
fn test_indexed_alu() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x10;
    t.cpu.ix = 0x2000;
    t.write(0x2005, 0x22);
    t.run(0x100, &[0xDD, 0x86, 0x05]); // ADD A,(IX+5)

    assert_eq!(t.cpu.a, 0x32);
}

#[test]
fn test_index_halves() {
    let mut t = TestZ80::new();
    t.cpu.ix = 0x1234;
    t.cpu.a = 0x01;
    t.run(0x100, &[0xDD, 0x84]); // ADD A,IXH

    assert_eq!(t.cpu.a, 0x13);

    let mut t = TestZ80::new();
    t.cpu.iy = 0x00FF;
    t.run(0x100, &[0xFD, 0x2C]); // INC IYL
    assert_eq!(t.cpu.iy, 0x0000);
    assert!(t.cpu.flag(flags::ZERO));
}
