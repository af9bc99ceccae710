//! A minimal 8080 machine around the core: flat RAM, console ports, and a
//! break hook.

use std::io::Write as _;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use typed_builder::TypedBuilder;

use retro80_core::{Cpu, IoBus, Memory, RunFlag, RunState};

/// Console status port. Writes are accepted and ignored; reads report the
/// input-pending bit.
pub const STATUS_PORT: u8 = 0;
/// Console data port. OUT prints the byte; IN consumes the queued host byte.
pub const DATA_PORT: u8 = 1;

/// Flat 64 KiB RAM with every address readable and writable.
pub struct FlatMemory {
    bytes: Box<[u8; 0x10000]>,
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self {
            bytes: Box::new([0; 0x10000]),
        }
    }
}

impl FlatMemory {
    /// Place a raw image at `org`, wrapping at the top of the address space.
    pub fn load(&mut self, org: u16, image: &[u8]) {
        for (offset, byte) in image.iter().enumerate() {
            self.bytes[org.wrapping_add(offset as u16) as usize] = *byte;
        }
    }

    pub fn byte_at(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }
}

impl Memory for FlatMemory {
    fn read(&mut self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.bytes[addr as usize] = value;
    }
}

/// Serial-console port map.
///
/// Output bytes go to stdout immediately and are mirrored into a transcript
/// so callers (and tests) can inspect what the program printed.
#[derive(Default)]
pub struct ConsoleIo {
    pending_input: Option<u8>,
    transcript: Vec<u8>,
}

impl ConsoleIo {
    /// Queue a byte for the next IN of the data port.
    pub fn queue_input(&mut self, byte: u8) {
        self.pending_input = Some(byte);
    }

    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }
}

impl IoBus for ConsoleIo {
    fn port_in(&mut self, port: u8, _addr_low: u8) -> u8 {
        match port {
            STATUS_PORT => u8::from(self.pending_input.is_some()),
            DATA_PORT => self.pending_input.take().unwrap_or(0),
            _ => {
                log::trace!("IN from unmapped port {:#04x}", port);
                0
            }
        }
    }

    fn port_out(&mut self, port: u8, _addr_low: u8, value: u8) {
        match port {
            DATA_PORT => {
                self.transcript.push(value);
                let mut stdout = std::io::stdout();
                // Console output is best-effort; a closed pipe should not
                // take the emulation down.
                let _ = stdout.write_all(&[value]);
                let _ = stdout.flush();
            }
            STATUS_PORT => {}
            _ => log::trace!("OUT {:#04x} to unmapped port {:#04x}", value, port),
        }
    }
}

/// Where the image lands, where execution starts, and how the power-on
/// state is seeded.
#[derive(Clone, Copy, Debug, TypedBuilder)]
pub struct MachineConfig {
    #[builder(default = 0)]
    pub org: u16,
    #[builder(default = 0)]
    pub entry: u16,
    #[builder(default = 0x8080)]
    pub seed: u64,
}

/// Outcome of a run to a terminal state.
#[derive(Clone, Copy, Debug)]
pub struct RunReport {
    pub state: RunState,
    pub tstates: u64,
    pub elapsed: Duration,
}

pub struct Machine {
    pub cpu: Cpu,
    pub mem: FlatMemory,
    pub io: ConsoleIo,
}

impl Machine {
    pub fn new(config: &MachineConfig, image: &[u8]) -> Self {
        let mut mem = FlatMemory::default();
        mem.load(config.org, image);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut cpu = Cpu::power_on(&mut rng);
        cpu.regs.pc = config.entry;

        Self {
            cpu,
            mem,
            io: ConsoleIo::default(),
        }
    }

    /// Handle for stopping the run asynchronously (the break key).
    pub fn break_handle(&self) -> RunFlag {
        self.cpu.run_flag()
    }

    /// Run to a terminal state, timing the wall clock for the MHz report.
    pub fn run(&mut self) -> RunReport {
        let started = Instant::now();
        self.cpu.run(&mut self.mem, &mut self.io);
        RunReport {
            state: self.cpu.run_state(),
            tstates: self.cpu.tstates,
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_output_lands_in_transcript() {
        // MVI A,'H'; OUT 1; MVI A,'i'; OUT 1; HLT
        let program = [0x3e, b'H', 0xd3, DATA_PORT, 0x3e, b'i', 0xd3, DATA_PORT, 0x76];
        let config = MachineConfig::builder().build();
        let mut machine = Machine::new(&config, &program);
        let report = machine.run();

        assert_eq!(report.state, RunState::Halted);
        assert_eq!(machine.io.transcript(), b"Hi");
    }

    #[test]
    fn console_input_is_consumed_once() {
        // IN 0 (status); IN 1 (data); MOV B,A; IN 0; HLT
        let program = [
            0xdb,
            STATUS_PORT,
            0xdb,
            DATA_PORT,
            0x47,
            0xdb,
            STATUS_PORT,
            0x76,
        ];
        let config = MachineConfig::builder().build();
        let mut machine = Machine::new(&config, &program);
        machine.io.queue_input(b'x');
        machine.run();

        assert_eq!(machine.cpu.regs.b, b'x');
        // The second status read sees the queue drained.
        assert_eq!(machine.cpu.regs.a, 0);
    }

    #[test]
    fn image_loads_at_the_configured_origin() {
        let config = MachineConfig::builder().org(0x0100).entry(0x0100).build();
        // MVI A,0x42; HLT at 0x0100.
        let mut machine = Machine::new(&config, &[0x3e, 0x42, 0x76]);
        assert_eq!(machine.mem.byte_at(0x0100), 0x3e);
        let report = machine.run();

        assert_eq!(report.state, RunState::Halted);
        assert_eq!(machine.cpu.regs.a, 0x42);
        assert_eq!(machine.cpu.regs.pc, 0x0103);
        assert_eq!(report.tstates, 7 + 7);
    }

    #[test]
    fn break_handle_stops_a_spinning_machine() {
        // JMP 0: spins until interrupted from outside.
        let config = MachineConfig::builder().build();
        let mut machine = Machine::new(&config, &[0xc3, 0x00, 0x00]);
        let brk = machine.break_handle();

        let worker = std::thread::spawn(move || machine.run());
        brk.interrupt();
        let report = worker.join().unwrap();

        assert_eq!(report.state, RunState::Interrupted);
    }
}
