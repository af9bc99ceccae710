//! Console runner for the 8080 core: load a raw image, run it to a
//! terminal state, and report the registers and effective clock speed.

pub mod machine;

use std::time::Duration;

use anyhow::{ensure, Context, Result};

use retro80_core::flags::{C_SHIFT, H_SHIFT, P_SHIFT, S_SHIFT, Z_SHIFT};
use retro80_core::Cpu;

pub use machine::{Machine, MachineConfig, RunReport};

/// Load the image at `rom_path` and run it until HLT or a break.
pub fn run(rom_path: &str, config: MachineConfig) -> Result<(Machine, RunReport)> {
    let image = std::fs::read(rom_path)
        .with_context(|| format!("failed to read image {}", rom_path))?;
    ensure!(
        image.len() <= 0x10000,
        "image is {} bytes, larger than the 64 KiB address space",
        image.len()
    );

    log::info!(
        "loaded {} ({} bytes) at {:#06x}, entry {:#06x}",
        rom_path,
        image.len(),
        config.org,
        config.entry
    );

    let mut machine = Machine::new(&config, &image);
    let report = machine.run();

    log::info!(
        "stopped: {:?} after {} T-states in {:?}",
        report.state,
        report.tstates,
        report.elapsed
    );

    Ok((machine, report))
}

/// Diagnostic register dump: PC, A, the S/Z/H/P/C bits, the pairs, and SP.
pub fn register_dump(cpu: &Cpu) -> String {
    let r = &cpu.regs;
    let bit = |shift: u8| (r.f >> shift) & 1;
    format!(
        "PC={:04X} A={:02X} S={} Z={} H={} P={} C={} B:C={:02X}:{:02X} D:E={:02X}:{:02X} H:L={:02X}:{:02X} SP={:04X}",
        r.pc,
        r.a,
        bit(S_SHIFT),
        bit(Z_SHIFT),
        bit(H_SHIFT),
        bit(P_SHIFT),
        bit(C_SHIFT),
        r.b,
        r.c,
        r.d,
        r.e,
        r.h,
        r.l,
        r.sp,
    )
}

/// Effective emulated clock rate in MHz: T-states per elapsed millisecond,
/// scaled to megahertz.
pub fn clock_mhz(tstates: u64, elapsed: Duration) -> f64 {
    let ms = elapsed.as_secs_f64() * 1000.0;
    if ms <= 0.0 {
        return 0.0;
    }
    tstates as f64 / ms / 1000.0
}
