//! CHIP-8 virtual machine core
//!
//! A byte-code interpreter for the CHIP-8 instruction set: 4 KiB of
//! memory, sixteen 8-bit registers, a 16-level call stack, a monochrome
//! display, a 16-key hexadecimal keypad, and 60 Hz delay/sound timers.
//!
//! # Architecture
//!
//! - [`Machine`] owns all state and executes one instruction per
//!   [`Machine::step`].
//! - Opcodes are resolved through a [`HandlerChain`]: an ordered list of
//!   [`OpHandler`]s walked until one accepts the word. The base chain
//!   holds only [`BaseInstructionSet`]; hosts extend the instruction set
//!   with [`MachineConfig::with_handler`].
//! - Behavioral differences between historical interpreters are selected
//!   with [`Quirks`].
//! - The host reports elapsed time through [`Machine::update_timers`];
//!   nothing in the crate reads a clock except to pick a default seed.
//! - [`Chip8System`] adapts a machine to [`emu_core::System`], and
//!   [`handle`] offers `Option`-tolerant free functions.
//!
//! ```
//! use emu_chip8::{Machine, MachineConfig, Quirks};
//!
//! let config = MachineConfig::default().with_quirks(Quirks::COSMAC_VIP);
//! let mut machine = Machine::new(config).unwrap();
//! machine.load_rom(&[0x6A, 0x07, 0x7A, 0x01]);
//! machine.step();
//! machine.step();
//! assert_eq!(machine.registers().v[0xA], 8);
//! ```

mod config;
mod dispatch;
mod error;
mod font;
pub mod handle;
mod instructions;
mod machine;
mod registers;
mod rng;
mod system;
mod timer;

pub use config::{HandlerChain, MachineConfig, Quirks};
pub use dispatch::{dispatch, OpHandler, Opcode};
pub use error::Chip8Error;
pub use font::{glyph_address, FONT, FONT_OFFSET, GLYPH_HEIGHT};
pub use instructions::BaseInstructionSet;
pub use machine::{Machine, FAULT_ADDRESS, FAULT_TRAP, KEY_COUNT};
pub use registers::{Registers, PROGRAM_START, REG_COUNT, STACK_DEPTH, VF};
pub use rng::Rng;
pub use system::Chip8System;
pub use timer::{FrameClock, FRAME_MS, TICKS_PER_SECOND};
