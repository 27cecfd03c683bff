//! Machine state and its lifecycle.
//!
//! A [`Machine`] owns everything an instruction can observe or change:
//! registers, main memory, the display buffer, key state, the random
//! generator, and the frame clock that paces the timers. Nothing is
//! shared between machines.
//!
//! # Memory map
//!
//! ```text
//! 0x000-0x001  fault trap (`JP 0x000`)
//! 0x050-0x09F  hexadecimal font
//! 0x200-...    program image
//! ```
//!
//! # Faults
//!
//! Control-flow errors never surface as `Err`. Call-stack overflow,
//! return with an empty stack, and a `pc` that runs off the end of memory
//! all send `pc` to [`FAULT_ADDRESS`], where the trap jumps to itself
//! until the host resets the machine.

use emu_core::logging::{log, LogCategory, LogLevel};

use crate::config::{MachineConfig, Quirks};
use crate::dispatch::{self, Opcode};
use crate::error::Chip8Error;
use crate::font::{FONT, FONT_OFFSET};
use crate::registers::{Registers, PROGRAM_START};
use crate::rng::Rng;
use crate::timer::FrameClock;

/// Landing address for unrecoverable control-flow errors.
pub const FAULT_ADDRESS: u16 = 0x000;

/// `JP FAULT_ADDRESS`, installed at `FAULT_ADDRESS` on every reset.
pub const FAULT_TRAP: [u8; 2] = [
    0x10 | ((FAULT_ADDRESS >> 8) & 0x0F) as u8,
    (FAULT_ADDRESS & 0xFF) as u8,
];

/// Number of keys on the hexadecimal keypad.
pub const KEY_COUNT: usize = 16;

pub struct Machine {
    config: MachineConfig,
    registers: Registers,
    memory: Vec<u8>,
    display: Vec<u8>,
    keys: [bool; KEY_COUNT],
    rng: Rng,
    clock: FrameClock,
    vblank: u16,
}

impl Machine {
    /// Create a machine and bring it to its reset state.
    ///
    /// The generator is seeded from the wall clock; call
    /// [`set_rng_seed`](Self::set_rng_seed) for a reproducible stream.
    pub fn new(config: MachineConfig) -> Result<Self, Chip8Error> {
        config.validate()?;
        let mut machine = Self {
            config,
            registers: Registers::default(),
            memory: Vec::new(),
            display: Vec::new(),
            keys: [false; KEY_COUNT],
            rng: Rng::new(Rng::seed_from_time()),
            clock: FrameClock::new(),
            vblank: 0,
        };
        machine.reset();
        Ok(machine)
    }

    /// Clear memory, display, registers, keys and frame pacing.
    ///
    /// The random generator keeps its current state.
    pub fn reset(&mut self) {
        let memory_size = self.config.memory_size;
        let display_size = self.config.display_size();

        self.memory.clear();
        self.memory.resize(memory_size, 0);
        let trap = FAULT_ADDRESS as usize;
        self.memory[trap..trap + FAULT_TRAP.len()].copy_from_slice(&FAULT_TRAP);
        let font = FONT_OFFSET as usize;
        self.memory[font..font + FONT.len()].copy_from_slice(&FONT);

        self.display.clear();
        self.display.resize(display_size, 0);

        self.registers = Registers::default();
        self.keys = [false; KEY_COUNT];
        self.clock.reset();
        self.vblank = 0;

        log(LogCategory::CPU, LogLevel::Info, || {
            format!(
                "reset: {} bytes memory, {}x{} display, quirks {}",
                memory_size, self.config.screen_width, self.config.screen_height, self.config.quirks
            )
        });
    }

    /// Copy a program image to `PROGRAM_START`, dropping whatever does not fit.
    pub fn load_rom(&mut self, rom: &[u8]) {
        let start = PROGRAM_START as usize;
        let room = self.memory.len().saturating_sub(start);
        let len = rom.len().min(room);
        self.memory[start..start + len].copy_from_slice(&rom[..len]);

        log(LogCategory::Memory, LogLevel::Info, || {
            format!("loaded {} byte program at {:03X}", len, start)
        });
        if len < rom.len() {
            log(LogCategory::Memory, LogLevel::Warn, || {
                format!("program truncated by {} bytes", rom.len() - len)
            });
        }
    }

    /// Host write into memory at `addr`, dropping whatever does not fit.
    pub fn write_memory(&mut self, addr: u16, bytes: &[u8]) {
        let start = addr as usize;
        if start >= self.memory.len() {
            return;
        }
        let len = bytes.len().min(self.memory.len() - start);
        self.memory[start..start + len].copy_from_slice(&bytes[..len]);
    }

    /// Seed the random generator. Zero would lock it at zero, so a
    /// clock-derived seed is used instead.
    pub fn set_rng_seed(&mut self, seed: u32) {
        let seed = if seed == 0 {
            let replacement = Rng::seed_from_time();
            log(LogCategory::CPU, LogLevel::Warn, || {
                format!("rng seed 0 replaced with {:08X}", replacement)
            });
            replacement
        } else {
            seed
        };
        self.rng = Rng::new(seed);
    }

    pub fn rng_seed(&self) -> u32 {
        self.rng.seed()
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn quirks(&self) -> Quirks {
        self.config.quirks
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn set_registers(&mut self, registers: Registers) {
        self.registers = registers;
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// One byte per pixel, row-major, each 0 or 1.
    pub fn display(&self) -> &[u8] {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut [u8] {
        &mut self.display
    }

    /// Overwrite the start of the display with `pixels`. Extra bytes are
    /// ignored and non-zero values are stored as 1.
    pub fn set_display(&mut self, pixels: &[u8]) {
        if pixels.len() > self.display.len() {
            log(LogCategory::Display, LogLevel::Warn, || {
                format!(
                    "display write of {} bytes truncated to {}",
                    pixels.len(),
                    self.display.len()
                )
            });
        }
        for (dst, src) in self.display.iter_mut().zip(pixels) {
            *dst = (*src != 0) as u8;
        }
    }

    pub fn press_key(&mut self, key: u8) {
        self.set_key(key, true);
    }

    pub fn release_key(&mut self, key: u8) {
        self.set_key(key, false);
    }

    fn set_key(&mut self, key: u8, down: bool) {
        match self.keys.get_mut(key as usize) {
            Some(slot) => {
                if *slot != down {
                    log(LogCategory::Input, LogLevel::Debug, || {
                        format!("key {:X} {}", key, if down { "down" } else { "up" })
                    });
                }
                *slot = down;
            }
            None => log(LogCategory::Input, LogLevel::Warn, || {
                format!("ignoring out-of-range key {}", key)
            }),
        }
    }

    /// Out-of-range keys are never pressed.
    pub fn is_key_pressed(&self, key: u8) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }

    /// Lowest-numbered key currently held.
    pub fn first_pressed_key(&self) -> Option<u8> {
        self.keys.iter().position(|&down| down).map(|k| k as u8)
    }

    pub fn next_random(&mut self) -> u8 {
        self.rng.next_byte()
    }

    /// Sprite draws still allowed in the current tick.
    pub fn vblank_budget(&self) -> u16 {
        self.vblank
    }

    /// Take one draw from the vblank budget; `false` when it is exhausted.
    pub fn consume_vblank(&mut self) -> bool {
        if self.vblank == 0 {
            return false;
        }
        self.vblank -= 1;
        true
    }

    /// Send `pc` to the fault trap.
    pub fn fault(&mut self, reason: &str) {
        log(LogCategory::CPU, LogLevel::Warn, || {
            format!(
                "fault at {:03X}: {}, halting at {:03X}",
                self.registers.pc, reason, FAULT_ADDRESS
            )
        });
        self.registers.pc = FAULT_ADDRESS;
    }

    /// Advance the delay and sound timers by the 60 Hz ticks contained in
    /// `delta_ms`, carrying any remainder to the next call. The tick count
    /// becomes the new vblank budget.
    pub fn update_timers(&mut self, delta_ms: f32) {
        let ticks = self.clock.advance(delta_ms);
        let r = &mut self.registers;
        r.dt = (r.dt as u32).saturating_sub(ticks) as u8;
        r.st = (r.st as u32).saturating_sub(ticks) as u8;
        self.vblank = ticks.min(u16::MAX as u32) as u16;

        log(LogCategory::Timers, LogLevel::Trace, || {
            format!(
                "{} tick(s): dt={:02X} st={:02X}",
                ticks, self.registers.dt, self.registers.st
            )
        });
    }

    fn pc_in_bounds(&self) -> bool {
        (self.registers.pc as usize) + 1 < self.memory.len()
    }

    fn fetch(&self) -> Opcode {
        let pc = self.registers.pc as usize;
        Opcode::from_bytes(self.memory[pc], self.memory[pc + 1])
    }

    /// Execute one instruction.
    pub fn step(&mut self) {
        if !self.pc_in_bounds() {
            self.fault("pc outside memory");
        }

        let op = self.fetch();
        log(LogCategory::CPU, LogLevel::Trace, || {
            format!("{:03X}: {}", self.registers.pc, op)
        });

        let chain = self.config.handlers.clone();
        dispatch::dispatch(self, &chain, op);

        if !self.pc_in_bounds() {
            self.fault("pc outside memory");
        }
    }

    /// Execute `cycles_per_frame` instructions.
    pub fn step_frame(&mut self) {
        for _ in 0..self.config.cycles_per_frame {
            self.step();
        }
    }
}
