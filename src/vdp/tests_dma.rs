//! VDP DMA engine tests

use super::testing::TestVdp;

/// Arm the DMA enable bit and pick a mode through R23's top bits.
fn arm_dma(t: &mut TestVdp, mode_bits: u8, length: u16) {
    t.control_write(0x8100 | 0x10); // R1: DMA enable
    t.control_write(0x9300 | (length & 0xFF)); // R19 length low
    t.control_write(0x9400 | (length >> 8)); // R20 length high
    t.control_write(0x9700 | mode_bits as u16); // R23 mode
}

#[test]
fn test_vram_fill_scenario() {
    let mut t = TestVdp::new();
    t.control_write(0x8F01); // auto-increment 1
    arm_dma(&mut t, 0x80, 100); // VRAM fill, length 100

    // VRAM write to 0 with CD5 set in the second word
    t.control_write(0x4000);
    t.control_write(0x0080);
    assert!(t.vdp.regs.control.dma_start());

    // the fill pattern arrives through the data port
    t.vdp.ports.init_write_data(0xDEAD);
    t.run_dma();

    assert_eq!(t.vdp.vram[0], 0xAD);
    for k in 1..=100usize {
        assert_eq!(t.vdp.vram[k], 0xDE, "vram[{}]", k);
    }
    assert_eq!(t.vdp.vram[101], 0x00);

    assert_eq!(t.vdp.regs.control.address(), 0x0065);
    assert!(!t.vdp.regs.control.dma_start());
    assert!(!t.vdp.regs.dma_enabled()); // R1.M1 cleared
    assert!(!t.vdp.regs.status.dma_busy);
}

#[test]
fn test_fill_with_zero_length_wraps_the_whole_range() {
    let mut t = TestVdp::new();
    t.control_write(0x8F01);
    arm_dma(&mut t, 0x80, 0);

    t.control_write(0x4000);
    t.control_write(0x0080);
    t.vdp.ports.init_write_data(0x55AA);
    t.run_dma();

    // the run wraps through the full 64 K range, so even the seed byte at
    // address 0 ends up overwritten by the final fill step
    for k in 0..0x10000usize {
        assert_eq!(t.vdp.vram[k], 0x55, "vram[{}]", k);
    }
}

#[test]
fn test_cram_fill_writes_full_words() {
    let mut t = TestVdp::new();
    t.control_write(0x8F02);
    arm_dma(&mut t, 0x80, 4);

    // CRAM write at slot 0 with CD5
    t.control_write(0xC000);
    t.control_write(0x0080);
    t.vdp.ports.init_write_data(0x0EEE);
    t.run_dma();

    for slot in 1..=4usize {
        assert_eq!(t.vdp.cram[slot], 0x0EEE);
    }
}

#[test]
fn test_vram_copy() {
    let mut t = TestVdp::new();
    t.control_write(0x8F01);

    for (i, &byte) in [0x11u8, 0x22, 0x33, 0x44].iter().enumerate() {
        t.vdp.vram[0x100 + i] = byte;
    }

    arm_dma(&mut t, 0xC0, 4); // VRAM copy
    // source = 0x100: R21 = 0x80 (source is shifted left once)
    t.control_write(0x9580);
    t.control_write(0x9600);

    // destination 0x200 with CD5
    t.control_write(0x4000 | 0x0200);
    t.control_write(0x0080);
    t.run_dma();

    assert_eq!(&t.vdp.vram[0x200..0x204], &[0x11, 0x22, 0x33, 0x44]);
}

#[test]
fn test_m68k_transfer_pushes_words_through_the_fifo() {
    let mut t = TestVdp::new();
    t.control_write(0x8F02);

    // source data in work RAM at 0x1000
    t.ram.borrow_mut().write_word(0x1000, 0x1234);
    t.ram.borrow_mut().write_word(0x1002, 0x5678);

    arm_dma(&mut t, 0x00, 2); // 68K -> VDP, two words
    // source 0x1000: R21 = (0x1000 >> 1) & 0xFF = 0x00, R22 = 0x08
    t.control_write(0x9500);
    t.control_write(0x9608);

    // VRAM write at 0x0100 with CD5
    t.control_write(0x4100);
    t.control_write(0x0080);
    t.run_dma();

    assert_eq!(t.vdp.vram_read_word(0x100), 0x1234);
    assert_eq!(t.vdp.vram_read_word(0x102), 0x5678);
    assert!(!t.vdp.regs.status.dma_busy);
    // the bus came back to the CPU
    assert!(!t.bus.is_set(crate::cpu::bus::BusLine::Bg));
}

#[test]
fn test_dma_busy_flag_visible_in_status() {
    let mut t = TestVdp::new();
    t.control_write(0x8F01);
    arm_dma(&mut t, 0x80, 0x400);

    t.control_write(0x4000);
    t.control_write(0x0080);
    t.vdp.ports.init_write_data(0xFFFF);

    t.run(16);
    assert!(t.vdp.regs.status.dma_busy);

    t.run_dma();
    assert!(!t.vdp.regs.status.dma_busy);
}
