//! Throughput benchmarks for the hot per-clock paths.

use criterion::{criterion_group, criterion_main, Criterion};

use megacycle::{Rom, Smd};

/// A cartridge spinning a counter loop out of work RAM writes.
fn bench_rom() -> Rom {
    let mut image = vec![0u8; 0x200];
    image[0..4].copy_from_slice(&0x00FF_8000u32.to_be_bytes());
    image[4..8].copy_from_slice(&0x0000_0200u32.to_be_bytes());
    image[0x100..0x110].copy_from_slice(b"SEGA MEGA DRIVE ");
    image[0x1F0..0x1F3].copy_from_slice(b"JUE");

    // ADDQ.W #1,D0 ; MOVE.W D0,($FF0000).L ; BRA.B -10
    for word in [0x5240u16, 0x33C0, 0x00FF, 0x0000, 0x60F6] {
        image.extend_from_slice(&word.to_be_bytes());
    }
    Rom::from_bytes(image).unwrap()
}

fn bench_system_cycles(c: &mut Criterion) {
    c.bench_function("system_10k_master_cycles", |b| {
        let mut smd = Smd::new(bench_rom());
        b.iter(|| smd.run_cycles(10_000));
    });
}

fn bench_frame(c: &mut Criterion) {
    c.bench_function("system_frame", |b| {
        let mut smd = Smd::new(bench_rom());
        b.iter(|| smd.run_frame());
    });
}

criterion_group!(benches, bench_system_cycles, bench_frame);
criterion_main!(benches);
