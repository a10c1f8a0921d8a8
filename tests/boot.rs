//! System-level boot tests: the machine comes up through the reset
//! exception and starts executing the ROM.

use megacycle::{Rom, Smd};

/// A minimal cartridge: vectors, header and a program at 0x200.
fn build_rom(program: &[u16]) -> Rom {
    let mut image = vec![0u8; 0x200];

    // initial SSP and reset PC
    image[0..4].copy_from_slice(&0x00FF_8000u32.to_be_bytes());
    image[4..8].copy_from_slice(&0x0000_0200u32.to_be_bytes());

    image[0x100..0x110].copy_from_slice(b"SEGA MEGA DRIVE ");
    image[0x1F0..0x1F3].copy_from_slice(b"JUE");

    for &word in program {
        image.extend_from_slice(&word.to_be_bytes());
    }
    // padding NOPs
    for _ in 0..16 {
        image.extend_from_slice(&0x4E71u16.to_be_bytes());
    }

    Rom::from_bytes(image).unwrap()
}

#[test]
fn test_reset_vector_boot() {
    let rom = build_rom(&[0x4E71]);
    let mut smd = Smd::new(rom);

    // enough master clocks for the reset prologue and a few instructions
    smd.run_cycles(1000);

    assert!(!smd.m68k.is_halted());
    assert!(smd.m68k.regs.supervisor());
    assert!(smd.m68k.regs.pc >= 0x200, "pc = {:#X}", smd.m68k.regs.pc);
    assert!(smd.m68k.regs.pc < 0x300);
    assert_eq!(smd.m68k.regs.a[7], 0x00FF_8000);
    assert_eq!(smd.m68k.regs.ipm(), 7);
}

#[test]
fn test_program_reaches_work_ram() {
    // MOVE.W #$CAFE,($FF0000).L ; NOPs
    let rom = build_rom(&[0x33FC, 0xCAFE, 0x00FF, 0x0000]);
    let mut smd = Smd::new(rom);

    smd.run_cycles(2000);

    assert_eq!(smd.work_ram().borrow().read_word(0), 0xCAFE);
}

#[test]
fn test_program_counts_in_a_loop() {
    // ADDQ.W #1,D0 ; BRA.B -4 (back to the ADDQ)
    let rom = build_rom(&[0x5240, 0x60FC]);
    let mut smd = Smd::new(rom);

    smd.run_cycles(4000);
    let first = smd.m68k.regs.d[0];
    smd.run_cycles(4000);
    let second = smd.m68k.regs.d[0];

    assert!(first > 0);
    assert!(second > first, "loop stopped making progress");
}

#[test]
fn test_rom_checksum_of_generated_image() {
    let rom = build_rom(&[0x4E71]);
    // body is NOP padding plus the program words
    let expected: u16 = rom
        .body()
        .chunks_exact(2)
        .map(|pair| ((pair[0] as u16) << 8) | pair[1] as u16)
        .fold(0u16, |sum, word| sum.wrapping_add(word));
    assert_eq!(rom.checksum(), expected);
}

#[test]
fn test_vdp_register_write_from_program() {
    // MOVE.W #$8F02,($C00004).L : set VDP auto-increment through the bus
    let rom = build_rom(&[0x33FC, 0x8F02, 0x00C0, 0x0004]);
    let mut smd = Smd::new(rom);

    smd.run_cycles(3000);

    assert_eq!(smd.vdp.borrow().regs.register(15), 0x02);
}
