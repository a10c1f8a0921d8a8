//! Composite address space construction
//!
//! [`MemoryBuilder`] stitches addressable units into a single address space:
//! each unit claims an inclusive `[start; end]` window, mirrors alias one
//! window onto another of the same size, and `build` produces the
//! [`AddressSpace`] that dispatches every access to the unique owning unit.
//!
//! Invariants enforced at `add`/`mirror` time:
//! - no two entries overlap (mirrors included)
//! - an entry's window fits the unit's capacity
//! - a mirror's window has exactly the size of its source

use super::{Addressable, SharedUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: u32,
    end: u32,
}

impl Window {
    fn contains(&self, address: u32) -> bool {
        self.start <= address && address <= self.end
    }

    fn intersects(&self, other: &Window) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    fn size(&self) -> u32 {
        self.end - self.start + 1
    }
}

struct Entry {
    unit: SharedUnit,
    window: Window,
}

struct Mirror {
    source: Window,
    target: Window,
}

/// Builder for a composite address space.
#[derive(Default)]
pub struct MemoryBuilder {
    entries: Vec<Entry>,
    mirrors: Vec<Mirror>,
}

impl MemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a unit over `[start; end]`.
    ///
    /// Panics when the window is malformed, overlaps an existing entry or
    /// exceeds the unit's capacity; the memory map topology is fixed at
    /// startup and a bad map is a construction bug.
    pub fn add(&mut self, unit: SharedUnit, start: u32, end: u32) -> &mut Self {
        assert!(start <= end, "window end {:#08X} before start {:#08X}", end, start);

        let capacity = unit.borrow().max_address() as u64 + 1;
        let window = Window { start, end };
        assert!(
            u64::from(window.size()) <= capacity,
            "unit capacity {:#X} cannot back window {:#08X}..={:#08X}",
            capacity,
            start,
            end
        );

        self.check_intersect(&window);
        self.entries.push(Entry { unit, window });
        self
    }

    /// Alias `[start; end]` at `[mirror_start; mirror_end]`.
    pub fn mirror(&mut self, start: u32, end: u32, mirror_start: u32, mirror_end: u32) -> &mut Self {
        let source = Window { start, end };
        let target = Window {
            start: mirror_start,
            end: mirror_end,
        };
        assert!(start <= end && mirror_start <= mirror_end, "malformed mirror windows");
        assert_eq!(source.size(), target.size(), "mirror must match its source size");

        self.check_intersect(&target);
        self.mirrors.push(Mirror { source, target });
        self
    }

    pub fn build(self) -> AddressSpace {
        AddressSpace {
            entries: self.entries,
            mirrors: self.mirrors,
            active: None,
        }
    }

    fn check_intersect(&self, window: &Window) {
        for entry in &self.entries {
            assert!(
                !entry.window.intersects(window),
                "window {:#08X}..={:#08X} overlaps mapped {:#08X}..={:#08X}",
                window.start,
                window.end,
                entry.window.start,
                entry.window.end
            );
        }
        for mirror in &self.mirrors {
            assert!(
                !mirror.target.intersects(window),
                "window {:#08X}..={:#08X} overlaps mirror {:#08X}..={:#08X}",
                window.start,
                window.end,
                mirror.target.start,
                mirror.target.end
            );
        }
    }
}

/// The built composite. Itself [`Addressable`]: bus managers treat the whole
/// map as one unit, tracking the entry serving the in-flight operation.
pub struct AddressSpace {
    entries: Vec<Entry>,
    mirrors: Vec<Mirror>,
    /// Index of the entry serving the last started operation.
    active: Option<usize>,
}

impl AddressSpace {
    /// Resolve an absolute address to (entry index, unit-relative address),
    /// following at most one mirror hop.
    fn resolve(&self, address: u32) -> (usize, u32) {
        let mut address = address;
        for mirror in &self.mirrors {
            if mirror.target.contains(address) {
                address = mirror.source.start + (address - mirror.target.start);
                break;
            }
        }

        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.window.contains(address) {
                return (idx, address - entry.window.start);
            }
        }

        panic!("no addressable unit serves address {:#08X}", address);
    }

    /// True when some entry or mirror covers the address. The M68K bus
    /// manager uses this for its (disabled) bus-error check.
    pub fn covers(&self, address: u32) -> bool {
        let mut address = address;
        for mirror in &self.mirrors {
            if mirror.target.contains(address) {
                address = mirror.source.start + (address - mirror.target.start);
                break;
            }
        }
        self.entries.iter().any(|e| e.window.contains(address))
    }

    fn assert_idle(&self) {
        assert!(self.is_idle(), "address space: operation started while busy");
    }
}

impl Addressable for AddressSpace {
    fn max_address(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.window.end)
            .chain(self.mirrors.iter().map(|m| m.target.end))
            .max()
            .unwrap_or(0)
    }

    fn is_idle(&self) -> bool {
        match self.active {
            None => true,
            Some(idx) => self.entries[idx].unit.borrow().is_idle(),
        }
    }

    fn init_write_byte(&mut self, address: u32, data: u8) {
        self.assert_idle();
        let (idx, rel) = self.resolve(address);
        self.entries[idx].unit.borrow_mut().init_write_byte(rel, data);
        self.active = Some(idx);
    }

    fn init_write_word(&mut self, address: u32, data: u16) {
        self.assert_idle();
        let (idx, rel) = self.resolve(address);
        self.entries[idx].unit.borrow_mut().init_write_word(rel, data);
        self.active = Some(idx);
    }

    fn init_read_byte(&mut self, address: u32) {
        self.assert_idle();
        let (idx, rel) = self.resolve(address);
        self.entries[idx].unit.borrow_mut().init_read_byte(rel);
        self.active = Some(idx);
    }

    fn init_read_word(&mut self, address: u32) {
        self.assert_idle();
        let (idx, rel) = self.resolve(address);
        self.entries[idx].unit.borrow_mut().init_read_word(rel);
        self.active = Some(idx);
    }

    fn latched_byte(&self) -> u8 {
        let idx = self.active.expect("address space: no completed operation");
        self.entries[idx].unit.borrow().latched_byte()
    }

    fn latched_word(&self) -> u16 {
        let idx = self.active.expect("address space: no completed operation");
        self.entries[idx].unit.borrow().latched_word()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{shared, ByteOrder, MemoryUnit};

    fn ram(max_address: u32) -> SharedUnit {
        shared(MemoryUnit::new(max_address, ByteOrder::Big))
    }

    #[test]
    fn test_dispatch_with_offset() {
        let mut builder = MemoryBuilder::new();
        builder.add(ram(0xFF), 0x1000, 0x10FF);
        builder.add(ram(0xFF), 0x2000, 0x20FF);
        let mut space = builder.build();

        space.init_write_byte(0x1010, 0xAA);
        space.init_write_byte(0x2010, 0xBB);

        space.init_read_byte(0x1010);
        assert_eq!(space.latched_byte(), 0xAA);
        space.init_read_byte(0x2010);
        assert_eq!(space.latched_byte(), 0xBB);
    }

    #[test]
    fn test_mirror_dispatches_to_source() {
        let mut builder = MemoryBuilder::new();
        builder.add(ram(0xFF), 0x0000, 0x00FF);
        builder.mirror(0x0000, 0x00FF, 0x0100, 0x01FF);
        let mut space = builder.build();

        space.init_write_byte(0x0142, 0x7E);
        space.init_read_byte(0x0042);
        assert_eq!(space.latched_byte(), 0x7E);
    }

    #[test]
    #[should_panic]
    fn test_overlapping_windows_rejected() {
        let mut builder = MemoryBuilder::new();
        builder.add(ram(0xFFF), 0x0000, 0x0FFF);
        builder.add(ram(0xFFF), 0x0800, 0x17FF);
    }

    #[test]
    #[should_panic]
    fn test_mirror_over_mapped_window_rejected() {
        let mut builder = MemoryBuilder::new();
        builder.add(ram(0xFF), 0x0000, 0x00FF);
        builder.add(ram(0xFF), 0x0100, 0x01FF);
        builder.mirror(0x0000, 0x00FF, 0x0100, 0x01FF);
    }

    #[test]
    #[should_panic]
    fn test_mirror_size_mismatch_rejected() {
        let mut builder = MemoryBuilder::new();
        builder.add(ram(0xFF), 0x0000, 0x00FF);
        builder.mirror(0x0000, 0x00FF, 0x0100, 0x02FF);
    }

    #[test]
    #[should_panic]
    fn test_undersized_unit_rejected() {
        let mut builder = MemoryBuilder::new();
        builder.add(ram(0x0F), 0x0000, 0x00FF);
    }

    #[test]
    #[should_panic]
    fn test_unmapped_access_panics() {
        let mut builder = MemoryBuilder::new();
        builder.add(ram(0xFF), 0x0000, 0x00FF);
        let mut space = builder.build();
        space.init_read_byte(0x4000);
    }

    #[test]
    fn test_word_access_through_mirror() {
        let mut builder = MemoryBuilder::new();
        builder.add(ram(0xFFFF), 0xE00000, 0xE0FFFF);
        builder.mirror(0xE00000, 0xE0FFFF, 0xFF0000, 0xFFFFFF);
        let mut space = builder.build();

        space.init_write_word(0xFF1000, 0xABCD);
        space.init_read_word(0xE01000);
        assert_eq!(space.latched_word(), 0xABCD);
    }
}
