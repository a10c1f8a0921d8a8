//! Z80 block instruction tests

use super::flags;
use super::testing::TestZ80;

#[test]
fn test_ldi_moves_and_counts() {
    let mut t = TestZ80::new();
    t.write(0x2000, 0x55);
    t.cpu.set_hl(0x2000);
    t.cpu.set_de(0x3000);
    t.cpu.set_bc(0x0002);

    t.run(0x100, &[0xED, 0xA0]); // LDI

    assert_eq!(t.read(0x3000), 0x55);
    assert_eq!(t.cpu.hl(), 0x2001);
    assert_eq!(t.cpu.de(), 0x3001);
    assert_eq!(t.cpu.bc(), 0x0001);
    assert!(t.cpu.flag(flags::PARITY)); // BC still nonzero
    assert_eq!(t.cpu.pc, 0x102);
}

#[test]
fn test_ldd_walks_backwards() {
    let mut t = TestZ80::new();
    t.write(0x2000, 0xAA);
    t.cpu.set_hl(0x2000);
    t.cpu.set_de(0x3000);
    t.cpu.set_bc(0x0001);

    t.run(0x100, &[0xED, 0xA8]); // LDD

    assert_eq!(t.read(0x3000), 0xAA);
    assert_eq!(t.cpu.hl(), 0x1FFF);
    assert_eq!(t.cpu.de(), 0x2FFF);
    assert!(!t.cpu.flag(flags::PARITY)); // BC exhausted
}

#[test]
fn test_ldir_repeats_by_rewinding_pc() {
    let mut t = TestZ80::new();
    for i in 0..4 {
        t.write(0x2000 + i, 0x10 + i as u8);
    }
    t.cpu.set_hl(0x2000);
    t.cpu.set_de(0x3000);
    t.cpu.set_bc(0x0004);
    t.load(0x100, &[0xED, 0xB0]); // LDIR
    t.cpu.pc = 0x100;

    // each step copies one byte; PC stays on the instruction until BC dies
    t.cpu.step();
    assert_eq!(t.cpu.pc, 0x100);
    assert_eq!(t.cpu.bc(), 3);

    let mut steps = 1;
    while t.cpu.bc() != 0 {
        t.cpu.step();
        steps += 1;
        assert!(steps <= 4);
    }
    assert_eq!(t.cpu.pc, 0x102);
    for i in 0..4 {
        assert_eq!(t.read(0x3000 + i), 0x10 + i as u8);
    }
}

#[test]
fn test_cpi_compares_without_storing() {
    let mut t = TestZ80::new();
    t.write(0x2000, 0x42);
    t.cpu.a = 0x42;
    t.cpu.set_hl(0x2000);
    t.cpu.set_bc(0x0002);

    t.run(0x100, &[0xED, 0xA1]); // CPI

    assert!(t.cpu.flag(flags::ZERO)); // match found
    assert!(t.cpu.flag(flags::ADD_SUB));
    assert_eq!(t.cpu.hl(), 0x2001);
    assert_eq!(t.cpu.bc(), 0x0001);
    assert_eq!(t.cpu.a, 0x42); // never written
}

#[test]
fn test_cpir_stops_on_match() {
    let mut t = TestZ80::new();
    t.write(0x2000, 0x01);
    t.write(0x2001, 0x02);
    t.write(0x2002, 0x99);
    t.cpu.a = 0x99;
    t.cpu.set_hl(0x2000);
    t.cpu.set_bc(0x0010);
    t.load(0x100, &[0xED, 0xB1]); // CPIR
    t.cpu.pc = 0x100;

    let mut steps = 0;
    loop {
        t.cpu.step();
        steps += 1;
        if t.cpu.pc == 0x102 {
            break;
        }
        assert!(steps < 0x10);
    }

    assert!(t.cpu.flag(flags::ZERO));
    assert_eq!(t.cpu.hl(), 0x2003); // one past the match
    assert_eq!(t.cpu.bc(), 0x000D);
}

#[test]
fn test_ini_reads_port_into_memory() {
    let mut t = TestZ80::new();
    t.ports.borrow_mut().read_value = 0x7E;
    t.cpu.set_bc(0x0234); // B = 2 transfers left
    t.cpu.set_hl(0x2000);

    t.run(0x100, &[0xED, 0xA2]); // INI

    assert_eq!(t.read(0x2000), 0x7E);
    assert_eq!(t.cpu.b, 0x01);
    assert_eq!(t.cpu.hl(), 0x2001);
    assert_eq!(t.ports.borrow().reads, vec![0x0234]);
}

#[test]
fn test_otir_drains_until_b_zero() {
    let mut t = TestZ80::new();
    t.write(0x2000, 0x11);
    t.write(0x2001, 0x22);
    t.cpu.set_bc(0x027F);
    t.cpu.set_hl(0x2000);
    t.load(0x100, &[0xED, 0xB3]); // OTIR
    t.cpu.pc = 0x100;

    let mut steps = 0;
    while t.cpu.b != 0 {
        t.cpu.step();
        steps += 1;
        assert!(steps <= 2);
    }
    assert_eq!(t.cpu.pc, 0x102);

    let writes = &t.ports.borrow().writes;
    // B decrements before the port address forms
    assert_eq!(writes[0], (0x017F, 0x11));
    assert_eq!(writes[1], (0x007F, 0x22));
}
