//! Property-based tests for the composite address space

use super::builder::MemoryBuilder;
use super::{shared, Addressable, ByteOrder, MemoryUnit};
use proptest::prelude::*;

proptest! {
    /// A byte written through any mirror of work RAM reads back at the
    /// canonical window with the offset preserved.
    #[test]
    fn prop_mirror_preserves_offset(offset in 0u32..0x10000, value: u8, mirror_idx in 1u32..=32) {
        let mut builder = MemoryBuilder::new();
        builder.add(shared(MemoryUnit::new(0xFFFF, ByteOrder::Big)), 0xE00000, 0xE0FFFF);
        for i in 1..=32u32 {
            let start = 0xE00000 + 0x10000 * i;
            builder.mirror(0xE00000, 0xE0FFFF, start, start + 0xFFFF);
        }
        let mut space = builder.build();

        let mirrored = 0xE00000 + 0x10000 * mirror_idx + offset;
        space.init_write_byte(mirrored, value);
        space.init_read_byte(0xE00000 + offset);
        prop_assert_eq!(space.latched_byte(), value);
    }

    /// Word round-trips keep big-endian layout across unit boundaries.
    #[test]
    fn prop_word_roundtrip(offset in 0u32..0xFFF, value: u16) {
        let mut builder = MemoryBuilder::new();
        builder.add(shared(MemoryUnit::new(0xFFF, ByteOrder::Big)), 0x1000, 0x1FFF);
        let mut space = builder.build();

        let addr = 0x1000 + (offset & !1);
        space.init_write_word(addr, value);
        space.init_read_word(addr);
        prop_assert_eq!(space.latched_word(), value);

        space.init_read_byte(addr);
        prop_assert_eq!(space.latched_byte(), (value >> 8) as u8);
    }

    /// Any pair of overlapping windows is rejected at add time.
    #[test]
    fn prop_overlap_rejected(a_start in 0u32..0x1000, a_len in 1u32..0x100, b_off in 0u32..0x80) {
        let a_end = a_start + a_len - 1;
        let b_start = a_start + b_off.min(a_len - 1);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut builder = MemoryBuilder::new();
            builder.add(shared(MemoryUnit::new(0xFFFF, ByteOrder::Big)), a_start, a_end);
            builder.add(shared(MemoryUnit::new(0xFFFF, ByteOrder::Big)), b_start, b_start + 0xFF);
        }));
        prop_assert!(result.is_err());
    }
}
