//! Z80 load, exchange and stack instruction tests

use super::testing::TestZ80;

#[test]
fn test_ld_r_n_and_r_r() {
    let mut t = TestZ80::new();
    t.run(0x100, &[0x06, 0x42]); // LD B,$42
    assert_eq!(t.cpu.b, 0x42);

    t.cpu.pc = 0x102;
    t.load(0x102, &[0x48]); // LD C,B
    t.cpu.step();
    assert_eq!(t.cpu.c, 0x42);
}

#[test]
fn test_ld_rp_nn() {
    let mut t = TestZ80::new();
    t.run(0x100, &[0x21, 0x34, 0x12]); // LD HL,$1234
    assert_eq!(t.cpu.hl(), 0x1234);

    let mut t = TestZ80::new();
    t.run(0x100, &[0x31, 0x00, 0x80]); // LD SP,$8000
    assert_eq!(t.cpu.sp, 0x8000);
}

#[test]
fn test_ld_hl_indirect() {
    let mut t = TestZ80::new();
    t.cpu.set_hl(0x2000);
    t.cpu.a = 0x99;
    t.run(0x100, &[0x77]); // LD (HL),A
    assert_eq!(t.read(0x2000), 0x99);

    t.cpu.pc = 0x101;
    t.load(0x101, &[0x4E]); // LD C,(HL)
    t.cpu.step();
    assert_eq!(t.cpu.c, 0x99);
}

#[test]
fn test_ld_a_bc_de() {
    let mut t = TestZ80::new();
    t.write(0x3000, 0xAB);
    t.cpu.set_bc(0x3000);
    t.run(0x100, &[0x0A]); // LD A,(BC)
    assert_eq!(t.cpu.a, 0xAB);
    assert_eq!(t.cpu.memptr, 0x3001);

    let mut t = TestZ80::new();
    t.cpu.set_de(0x3000);
    t.cpu.a = 0xCD;
    t.run(0x100, &[0x12]); // LD (DE),A
    assert_eq!(t.read(0x3000), 0xCD);
}

#[test]
fn test_ld_nn_hl_roundtrip() {
    let mut t = TestZ80::new();
    t.cpu.set_hl(0xBEEF);
    t.run(0x100, &[0x22, 0x00, 0x40]); // LD ($4000),HL
    assert_eq!(t.read(0x4000), 0xEF); // little-endian
    assert_eq!(t.read(0x4001), 0xBE);

    let mut t = TestZ80::new();
    t.write(0x4000, 0x34);
    t.write(0x4001, 0x12);
    t.run(0x100, &[0x2A, 0x00, 0x40]); // LD HL,($4000)
    assert_eq!(t.cpu.hl(), 0x1234);
}

#[test]
fn test_push_pop() {
    let mut t = TestZ80::new();
    t.cpu.set_bc(0xABCD);
    t.cpu.sp = 0xF000;
    t.run(0x100, &[0xC5]); // PUSH BC
    assert_eq!(t.cpu.sp, 0xEFFE);
    assert_eq!(t.read(0xEFFE), 0xCD);
    assert_eq!(t.read(0xEFFF), 0xAB);

    t.cpu.pc = 0x101;
    t.load(0x101, &[0xD1]); // POP DE
    t.cpu.step();
    assert_eq!(t.cpu.de(), 0xABCD);
    assert_eq!(t.cpu.sp, 0xF000);
}

#[test]
fn test_ex_af_and_exx() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x11;
    t.cpu.a_alt = 0x22;
    t.run(0x100, &[0x08]); // EX AF,AF'
    assert_eq!(t.cpu.a, 0x22);
    assert_eq!(t.cpu.a_alt, 0x11);

    let mut t = TestZ80::new();
    t.cpu.set_bc(0x1111);
    t.cpu.b_alt = 0x22;
    t.cpu.c_alt = 0x22;
    t.run(0x100, &[0xD9]); // EXX
    assert_eq!(t.cpu.bc(), 0x2222);
    assert_eq!(t.cpu.b_alt, 0x11);
}

#[test]
fn test_ex_de_hl_and_ex_sp_hl() {
    let mut t = TestZ80::new();
    t.cpu.set_de(0x1234);
    t.cpu.set_hl(0x5678);
    t.run(0x100, &[0xEB]); // EX DE,HL
    assert_eq!(t.cpu.de(), 0x5678);
    assert_eq!(t.cpu.hl(), 0x1234);

    let mut t = TestZ80::new();
    t.cpu.sp = 0xE000;
    t.write(0xE000, 0xEF);
    t.write(0xE001, 0xBE);
    t.cpu.set_hl(0x1234);
    t.run(0x100, &[0xE3]); // EX (SP),HL
    assert_eq!(t.cpu.hl(), 0xBEEF);
    assert_eq!(t.read(0xE000), 0x34);
    assert_eq!(t.read(0xE001), 0x12);
}

#[test]
fn test_ld_indexed() {
    let mut t = TestZ80::new();
    t.cpu.ix = 0x2000;
    t.cpu.b = 0x5A;
    t.run(0x100, &[0xDD, 0x70, 0x10]); // LD (IX+$10),B
    assert_eq!(t.read(0x2010), 0x5A);

    let mut t = TestZ80::new();
    t.cpu.iy = 0x2020;
    t.write(0x2018, 0x66);
    t.run(0x100, &[0xFD, 0x46, 0xF8]); // LD B,(IY-8)
    assert_eq!(t.cpu.b, 0x66);
}

#[test]
fn test_ld_ix_immediate_and_memory() {
    let mut t = TestZ80::new();
    t.run(0x100, &[0xDD, 0x21, 0xCD, 0xAB]); // LD IX,$ABCD
    assert_eq!(t.cpu.ix, 0xABCD);

    t.cpu.pc = 0x104;
    t.load(0x104, &[0xDD, 0x22, 0x00, 0x50]); // LD ($5000),IX
    t.cpu.step();
    assert_eq!(t.read(0x5000), 0xCD);
    assert_eq!(t.read(0x5001), 0xAB);
}

#[test]
fn test_ld_sp_hl() {
    let mut t = TestZ80::new();
    t.cpu.set_hl(0xD000);
    t.run(0x100, &[0xF9]); // LD SP,HL
    assert_eq!(t.cpu.sp, 0xD000);
}

#[test]
fn test_ld_i_a_and_back() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x7E;
    t.run(0x100, &[0xED, 0x47]); // LD I,A
    assert_eq!(t.cpu.i, 0x7E);

    t.cpu.pc = 0x102;
    t.cpu.iff2 = true;
    t.cpu.a = 0;
    t.load(0x102, &[0xED, 0x57]); // LD A,I
    t.cpu.step();
    assert_eq!(t.cpu.a, 0x7E);
    assert!(t.cpu.flag(super::flags::PARITY)); // copies IFF2
}
