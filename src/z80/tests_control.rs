//! Z80 control-flow, IO and halt tests

use super::flags;
use super::testing::TestZ80;

#[test]
fn test_jp_unconditional() {
    let mut t = TestZ80::new();
    t.run(0x100, &[0xC3, 0x00, 0x20]); // JP $2000
    assert_eq!(t.cpu.pc, 0x2000);
}

#[test]
fn test_jp_conditional() {
    let mut t = TestZ80::new();
    t.cpu.set_flag(flags::ZERO, true);
    t.run(0x100, &[0xCA, 0x00, 0x20]); // JP Z,$2000
    assert_eq!(t.cpu.pc, 0x2000);

    let mut t = TestZ80::new();
    t.run(0x100, &[0xCA, 0x00, 0x20]); // Z clear: falls through
    assert_eq!(t.cpu.pc, 0x103);
}

#[test]
fn test_jr_displacement() {
    let mut t = TestZ80::new();
    t.run(0x100, &[0x18, 0x10]); // JR +$10
    assert_eq!(t.cpu.pc, 0x112);

    let mut t = TestZ80::new();
    t.run(0x100, &[0x18, 0xFE]); // JR -2: tight loop onto itself
    assert_eq!(t.cpu.pc, 0x100);
}

#[test]
fn test_jr_conditional_timing() {
    let mut t = TestZ80::new();
    t.cpu.set_flag(flags::CARRY, true);
    let taken = t.run(0x100, &[0x38, 0x08]); // JR C,+8
    assert_eq!(t.cpu.pc, 0x10A);
    assert_eq!(taken, 12);

    let mut t = TestZ80::new();
    let skipped = t.run(0x100, &[0x38, 0x08]);
    assert_eq!(t.cpu.pc, 0x102);
    assert_eq!(skipped, 7);
}

#[test]
fn test_djnz_counts_b() {
    let mut t = TestZ80::new();
    t.cpu.b = 3;
    t.run(0x100, &[0x10, 0xFE]); // DJNZ -2
    assert_eq!(t.cpu.b, 2);
    assert_eq!(t.cpu.pc, 0x100);

    t.cpu.b = 1;
    t.cpu.pc = 0x100;
    t.cpu.step();
    assert_eq!(t.cpu.b, 0);
    assert_eq!(t.cpu.pc, 0x102); // falls through on zero
}

#[test]
fn test_call_and_ret() {
    let mut t = TestZ80::new();
    t.cpu.sp = 0xF000;
    t.run(0x100, &[0xCD, 0x00, 0x30]); // CALL $3000
    assert_eq!(t.cpu.pc, 0x3000);
    assert_eq!(t.cpu.sp, 0xEFFE);
    assert_eq!(t.read(0xEFFE), 0x03);
    assert_eq!(t.read(0xEFFF), 0x01);

    t.load(0x3000, &[0xC9]); // RET
    t.cpu.step();
    assert_eq!(t.cpu.pc, 0x103);
    assert_eq!(t.cpu.sp, 0xF000);
}

#[test]
fn test_conditional_call_and_ret() {
    let mut t = TestZ80::new();
    t.cpu.sp = 0xF000;
    t.run(0x100, &[0xC4, 0x00, 0x30]); // CALL NZ,$3000; Z clear -> taken
    assert_eq!(t.cpu.pc, 0x3000);

    t.load(0x3000, &[0xC8]); // RET Z; Z clear -> not taken
    t.cpu.step();
    assert_eq!(t.cpu.pc, 0x3001);

    t.cpu.set_flag(flags::ZERO, true);
    t.load(0x3001, &[0xC8]); // RET Z; taken
    t.cpu.step();
    assert_eq!(t.cpu.pc, 0x103);
}

#[test]
fn test_rst_vectors() {
    let mut t = TestZ80::new();
    t.cpu.sp = 0xF000;
    t.run(0x100, &[0xFF]); // RST 38h
    assert_eq!(t.cpu.pc, 0x0038);
    assert_eq!(t.read(0xEFFE), 0x01);
}

#[test]
fn test_jp_hl_and_ix() {
    let mut t = TestZ80::new();
    t.cpu.set_hl(0x4000);
    t.run(0x100, &[0xE9]); // JP (HL)
    assert_eq!(t.cpu.pc, 0x4000);

    let mut t = TestZ80::new();
    t.cpu.ix = 0x5000;
    t.run(0x100, &[0xDD, 0xE9]); // JP (IX)
    assert_eq!(t.cpu.pc, 0x5000);
}

#[test]
fn test_halt_spins() {
    let mut t = TestZ80::new();
    t.run(0x100, &[0x76]); // HALT
    assert!(t.cpu.halted);
    assert!(t.cpu.bus.halt);

    let pc = t.cpu.pc;
    t.cpu.step();
    t.cpu.step();
    assert_eq!(t.cpu.pc, pc); // parked
}

#[test]
fn test_di_ei_shadow() {
    let mut t = TestZ80::new();
    t.run(0x100, &[0xF3]); // DI
    assert!(!t.cpu.iff1);

    t.cpu.pc = 0x101;
    t.load(0x101, &[0xFB, 0x00]); // EI; NOP
    t.cpu.step();
    assert!(t.cpu.iff1);

    // the interrupt right after EI is held off for one instruction
    t.cpu.bus.int = true;
    t.cpu.bus.data = 0xFF;
    let t_states = t.cpu.step(); // runs the NOP instead
    assert_eq!(t.cpu.pc, 0x103);
    assert_eq!(t_states, 4);
}

#[test]
fn test_out_and_in_ports() {
    let mut t = TestZ80::new();
    t.cpu.a = 0x5A;
    t.run(0x100, &[0xD3, 0x7F]); // OUT ($7F),A
    assert_eq!(t.ports.borrow().writes, vec![(0x5A7F, 0x5A)]);

    let mut t = TestZ80::new();
    t.ports.borrow_mut().read_value = 0x42;
    t.cpu.a = 0x10;
    t.run(0x100, &[0xDB, 0x20]); // IN A,($20)
    assert_eq!(t.cpu.a, 0x42);
    assert_eq!(t.ports.borrow().reads, vec![0x1020]);
}

#[test]
fn test_in_r_c_sets_flags() {
    let mut t = TestZ80::new();
    t.ports.borrow_mut().read_value = 0x80;
    t.cpu.set_bc(0x1234);
    t.run(0x100, &[0xED, 0x50]); // IN D,(C)

    assert_eq!(t.cpu.d, 0x80);
    assert!(t.cpu.flag(flags::SIGN));
    assert!(!t.cpu.flag(flags::PARITY)); // 0x80 has odd parity
}

#[test]
fn test_im_selection() {
    let mut t = TestZ80::new();
    t.run(0x100, &[0xED, 0x56]); // IM 1
    assert_eq!(t.cpu.im, 1);

    t.cpu.pc = 0x102;
    t.load(0x102, &[0xED, 0x5E]); // IM 2
    t.cpu.step();
    assert_eq!(t.cpu.im, 2);

    t.cpu.pc = 0x104;
    t.load(0x104, &[0xED, 0x46]); // IM 0
    t.cpu.step();
    assert_eq!(t.cpu.im, 0);
}

#[test]
fn test_refresh_register_counts_fetches() {
    let mut t = TestZ80::new();
    t.cpu.r = 0x00;
    t.load(0x100, &[0x00, 0x00, 0x00]);
    t.cpu.pc = 0x100;
    t.cpu.step();
    t.cpu.step();
    t.cpu.step();
    assert_eq!(t.cpu.r, 3);

    // bit 7 never changes
    t.cpu.r = 0xFF;
    t.cpu.pc = 0x100;
    t.cpu.step();
    assert_eq!(t.cpu.r, 0x80);
}
