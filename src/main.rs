//! Headless runner: load a ROM, run it for a number of frames and dump the
//! machine state as JSON.

use megacycle::debugger::Debuggable;
use megacycle::{Rom, Smd};

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(rom_path) = args.next() else {
        eprintln!("usage: megacycle <rom.bin|rom.md|rom.zip> [frames]");
        return ExitCode::FAILURE;
    };
    let frames: u64 = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(60);

    let rom = match Rom::from_file(&rom_path) {
        Ok(rom) => rom,
        Err(err) => {
            eprintln!("failed to load '{}': {}", rom_path, err);
            return ExitCode::FAILURE;
        }
    };

    println!("title:    {}", rom.header().title_overseas);
    println!("serial:   {}", rom.header().serial);
    println!("region:   {}", rom.header().region_support);
    println!(
        "checksum: {:#06X} (header says {:#06X})",
        rom.checksum(),
        rom.header().rom_checksum
    );

    let mut smd = Smd::new(rom);
    for _ in 0..frames {
        smd.run_frame();
        if smd.m68k.is_halted() {
            eprintln!("cpu halted by a catastrophic fault");
            break;
        }
    }

    println!("m68k: {}", smd.m68k.read_state());
    println!("z80:  {}", smd.z80.read_state());
    ExitCode::SUCCESS
}
