//! Opcode decoding and the handler-chain walk.

use std::fmt;

use emu_core::logging::{log, LogCategory, LogLevel};

use crate::config::HandlerChain;
use crate::machine::Machine;

/// A 16-bit instruction word, fetched big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u16);

impl Opcode {
    pub fn from_bytes(hi: u8, lo: u8) -> Self {
        Opcode(u16::from_be_bytes([hi, lo]))
    }

    /// Instruction group, the top nibble.
    #[inline(always)]
    pub fn kind(self) -> u8 {
        (self.0 >> 12) as u8
    }

    #[inline(always)]
    pub fn x(self) -> usize {
        ((self.0 >> 8) & 0xF) as usize
    }

    #[inline(always)]
    pub fn y(self) -> usize {
        ((self.0 >> 4) & 0xF) as usize
    }

    #[inline(always)]
    pub fn n(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    #[inline(always)]
    pub fn nn(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    #[inline(always)]
    pub fn nnn(self) -> u16 {
        self.0 & 0x0FFF
    }

    /// All four nibbles, most significant first.
    pub fn nibbles(self) -> (u8, u8, u8, u8) {
        (self.kind(), self.x() as u8, self.y() as u8, self.n())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// One instruction-set variant in a [`HandlerChain`].
///
/// A handler that recognises `op` performs the whole state transition,
/// including moving `pc`, and returns `true`. Returning `false` must
/// leave the machine untouched so the next handler sees the same state.
pub trait OpHandler {
    fn name(&self) -> &'static str;

    fn try_handle(&self, machine: &mut Machine, op: Opcode) -> bool;
}

/// Offer `op` to each handler in order until one accepts it.
///
/// Returns `false` when nobody did; the machine then stays on the same
/// instruction.
pub fn dispatch(machine: &mut Machine, chain: &HandlerChain, op: Opcode) -> bool {
    for handler in chain.iter() {
        if handler.try_handle(machine, op) {
            log(LogCategory::CPU, LogLevel::Trace, || {
                format!("{} handled {}", handler.name(), op)
            });
            return true;
        }
    }

    log(LogCategory::CPU, LogLevel::Debug, || {
        format!(
            "unhandled opcode {} at {:03X}, machine stalled",
            op,
            machine.registers().pc
        )
    });
    false
}
