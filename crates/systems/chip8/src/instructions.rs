//! The standard instruction set.
//!
//! Every handler moves `pc` itself: +2 normally, +4 for a taken skip, or
//! straight to a jump target. Instructions that wait (`Fx0A` with no key
//! held, `Dxyn` with an exhausted vblank budget) leave `pc` where it is
//! so the same instruction runs again on the next step.
//!
//! Flag-producing ALU instructions write VF after the result register,
//! so with X = F the flag is what remains in VF.

use emu_core::logging::{log, LogCategory, LogLevel};

use crate::config::Quirks;
use crate::dispatch::{OpHandler, Opcode};
use crate::font::glyph_address;
use crate::machine::Machine;
use crate::registers::{STACK_DEPTH, VF};

/// Handler for the ~35 original opcodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseInstructionSet;

impl OpHandler for BaseInstructionSet {
    fn name(&self) -> &'static str {
        "chip8"
    }

    fn try_handle(&self, m: &mut Machine, op: Opcode) -> bool {
        let (x, y) = (op.x(), op.y());
        match op.nibbles() {
            (0x0, 0x0, 0xE, 0x0) => cls(m),
            (0x0, 0x0, 0xE, 0xE) => ret(m),
            (0x0, _, _, _) => sys(m, op.nnn()),
            (0x1, _, _, _) => m.registers_mut().pc = op.nnn(),
            (0x2, _, _, _) => call(m, op.nnn()),
            (0x3, _, _, _) => {
                let cond = m.registers().v[x] == op.nn();
                skip_if(m, cond);
            }
            (0x4, _, _, _) => {
                let cond = m.registers().v[x] != op.nn();
                skip_if(m, cond);
            }
            (0x5, _, _, 0x0) => {
                let cond = m.registers().v[x] == m.registers().v[y];
                skip_if(m, cond);
            }
            (0x6, _, _, _) => {
                m.registers_mut().v[x] = op.nn();
                advance(m);
            }
            (0x7, _, _, _) => {
                let r = m.registers_mut();
                r.v[x] = r.v[x].wrapping_add(op.nn());
                advance(m);
            }
            (0x8, _, _, 0x0) => {
                let r = m.registers_mut();
                r.v[x] = r.v[y];
                advance(m);
            }
            (0x8, _, _, 0x1) => bitwise(m, x, y, |a, b| a | b),
            (0x8, _, _, 0x2) => bitwise(m, x, y, |a, b| a & b),
            (0x8, _, _, 0x3) => bitwise(m, x, y, |a, b| a ^ b),
            (0x8, _, _, 0x4) => {
                let r = m.registers_mut();
                let (sum, carry) = r.v[x].overflowing_add(r.v[y]);
                r.v[x] = sum;
                r.set_flag(carry);
                advance(m);
            }
            (0x8, _, _, 0x5) => {
                let r = m.registers_mut();
                let (a, b) = (r.v[x], r.v[y]);
                r.v[x] = a.wrapping_sub(b);
                r.set_flag(a > b);
                advance(m);
            }
            (0x8, _, _, 0x6) => shift(m, x, y, |v| (v >> 1, v & 0x01)),
            (0x8, _, _, 0x7) => {
                let r = m.registers_mut();
                let (a, b) = (r.v[x], r.v[y]);
                r.v[x] = b.wrapping_sub(a);
                r.set_flag(b > a);
                advance(m);
            }
            (0x8, _, _, 0xE) => shift(m, x, y, |v| (v << 1, v >> 7)),
            (0x9, _, _, 0x0) => {
                let cond = m.registers().v[x] != m.registers().v[y];
                skip_if(m, cond);
            }
            (0xA, _, _, _) => {
                m.registers_mut().i = op.nnn();
                advance(m);
            }
            (0xB, _, _, _) => jump_offset(m, op.nnn()),
            (0xC, _, _, _) => {
                let value = m.next_random() & op.nn();
                m.registers_mut().v[x] = value;
                advance(m);
            }
            (0xD, _, _, n) => draw(m, x, y, n),
            (0xE, _, 0x9, 0xE) => {
                let pressed = m.is_key_pressed(m.registers().v[x]);
                skip_if(m, pressed);
            }
            (0xE, _, 0xA, 0x1) => {
                let pressed = m.is_key_pressed(m.registers().v[x]);
                skip_if(m, !pressed);
            }
            (0xF, _, 0x0, 0x7) => {
                let r = m.registers_mut();
                r.v[x] = r.dt;
                advance(m);
            }
            (0xF, _, 0x0, 0xA) => wait_key(m, x),
            (0xF, _, 0x1, 0x5) => {
                let r = m.registers_mut();
                r.dt = r.v[x];
                advance(m);
            }
            (0xF, _, 0x1, 0x8) => {
                let r = m.registers_mut();
                r.st = r.v[x];
                advance(m);
            }
            (0xF, _, 0x1, 0xE) => {
                let r = m.registers_mut();
                let sum = r.i.wrapping_add(r.v[x] as u16);
                r.i = sum & 0x0FFF;
                r.set_flag(sum > 0x0FFF);
                advance(m);
            }
            (0xF, _, 0x2, 0x9) => {
                let r = m.registers_mut();
                r.i = glyph_address(r.v[x]);
                advance(m);
            }
            (0xF, _, 0x3, 0x3) => bcd(m, x),
            (0xF, _, 0x5, 0x5) => store(m, x),
            (0xF, _, 0x6, 0x5) => load(m, x),
            _ => return false,
        }
        true
    }
}

#[inline(always)]
fn advance(m: &mut Machine) {
    let r = m.registers_mut();
    r.pc = r.pc.wrapping_add(2);
}

fn skip_if(m: &mut Machine, cond: bool) {
    let r = m.registers_mut();
    r.pc = r.pc.wrapping_add(if cond { 4 } else { 2 });
}

/// 0nnn: machine-code subroutine on the original hardware; ignored.
fn sys(m: &mut Machine, nnn: u16) {
    log(LogCategory::Stubs, LogLevel::Debug, || {
        format!("ignoring SYS {:03X}", nnn)
    });
    advance(m);
}

fn cls(m: &mut Machine) {
    m.display_mut().fill(0);
    advance(m);
}

/// 00EE. An empty stack faults without touching `sp`.
fn ret(m: &mut Machine) {
    let sp = m.registers().sp as usize;
    if sp == 0 || sp > STACK_DEPTH {
        m.fault("return with empty stack");
        return;
    }
    let r = m.registers_mut();
    r.sp -= 1;
    r.pc = r.stack[sp - 1].wrapping_add(2);
}

/// 2nnn. Pushes the address of the call itself; `ret` skips past it.
/// A full stack faults without pushing.
fn call(m: &mut Machine, nnn: u16) {
    let sp = m.registers().sp as usize;
    if sp >= STACK_DEPTH {
        m.fault("call stack overflow");
        return;
    }
    let r = m.registers_mut();
    r.stack[sp] = r.pc;
    r.sp += 1;
    r.pc = nnn;
}

fn bitwise(m: &mut Machine, x: usize, y: usize, f: impl Fn(u8, u8) -> u8) {
    let reset_vf = m.quirks().contains(Quirks::VF_RESET);
    let r = m.registers_mut();
    r.v[x] = f(r.v[x], r.v[y]);
    if reset_vf {
        r.v[VF] = 0;
    }
    advance(m);
}

/// `f` maps the source value to (result, bit shifted out).
fn shift(m: &mut Machine, x: usize, y: usize, f: impl Fn(u8) -> (u8, u8)) {
    let src = if m.quirks().contains(Quirks::SHIFT) { x } else { y };
    let r = m.registers_mut();
    let (result, out) = f(r.v[src]);
    r.v[x] = result;
    r.v[VF] = out;
    advance(m);
}

fn jump_offset(m: &mut Machine, nnn: u16) {
    let reg = if m.quirks().contains(Quirks::BXNN_JUMP) {
        ((nnn >> 8) & 0xF) as usize
    } else {
        0
    };
    let r = m.registers_mut();
    r.pc = nnn.wrapping_add(r.v[reg] as u16);
}

/// Dxyn. XORs an 8-pixel-wide, n-row sprite from `memory[I..]` onto the
/// display at (VX, VY). The origin always wraps; the rest of the sprite
/// clips or wraps per `WRAP_SPRITES`. VF reports whether any lit pixel
/// was turned off.
fn draw(m: &mut Machine, x: usize, y: usize, n: u8) {
    if m.quirks().contains(Quirks::VBLANK) && !m.consume_vblank() {
        // Retry on a later step once the next tick refills the budget.
        return;
    }

    let width = m.config().screen_width as usize;
    let height = m.config().screen_height as usize;
    let wrap = m.quirks().contains(Quirks::WRAP_SPRITES);

    let (px0, py0, base) = {
        let r = m.registers();
        (
            r.v[x] as usize % width,
            r.v[y] as usize % height,
            r.i as usize,
        )
    };

    let rows = if wrap {
        n as usize
    } else {
        (n as usize).min(height - py0)
    };
    let cols = if wrap { 8 } else { 8.min(width - px0) };

    let sprite: Vec<u8> = (0..rows)
        .map(|row| m.memory().get(base + row).copied().unwrap_or(0))
        .collect();

    let mut collision = false;
    let display = m.display_mut();
    for (row, bits) in sprite.iter().enumerate() {
        let dy = (py0 + row) % height;
        for col in 0..cols {
            let bit = (bits >> (7 - col)) & 0x1;
            if bit == 0 {
                continue;
            }
            let dx = (px0 + col) % width;
            let pixel = &mut display[dy * width + dx];
            collision |= *pixel == 1;
            *pixel ^= 1;
        }
    }

    log(LogCategory::Display, LogLevel::Trace, || {
        format!(
            "sprite {}x{} from {:03X} at ({}, {}), collision={}",
            cols, rows, base, px0, py0, collision
        )
    });

    m.registers_mut().set_flag(collision);
    advance(m);
}

/// Fx0A. Stalls until a key is held, then stores the lowest one.
fn wait_key(m: &mut Machine, x: usize) {
    if let Some(key) = m.first_pressed_key() {
        m.registers_mut().v[x] = key;
        advance(m);
    }
}

/// Fx33. Digits that would land past the end of memory are dropped.
fn bcd(m: &mut Machine, x: usize) {
    let (value, i) = {
        let r = m.registers();
        (r.v[x], r.i as usize)
    };
    let digits = [value / 100, (value / 10) % 10, value % 10];
    for (slot, digit) in m.memory_mut().iter_mut().skip(i).zip(digits) {
        *slot = digit;
    }
    advance(m);
}

/// Number of registers Fx55/Fx65 transfer (`x + 1` unless truncated at
/// the end of memory), or `None` when I is already past the end.
fn transfer_len(m: &Machine, x: usize) -> Option<usize> {
    let i = m.registers().i as usize;
    let size = m.memory().len();
    if i >= size {
        return None;
    }
    Some((x + 1).min(size - i))
}

fn bump_index(m: &mut Machine, count: usize) {
    let quirks = m.quirks();
    if quirks.contains(Quirks::LOAD_STORE_NO_INC_I) {
        return;
    }
    let step = if quirks.contains(Quirks::LOAD_STORE_INC_I_BY_X) {
        count - 1
    } else {
        count
    };
    let r = m.registers_mut();
    r.i = r.i.wrapping_add(step as u16);
}

/// Fx55: V0..=VX to memory[I..].
fn store(m: &mut Machine, x: usize) {
    if let Some(count) = transfer_len(m, x) {
        let i = m.registers().i as usize;
        let regs = m.registers().v;
        m.memory_mut()[i..i + count].copy_from_slice(&regs[..count]);
        bump_index(m, count);
    } else {
        log(LogCategory::Memory, LogLevel::Warn, || {
            format!("store with I={:04X} past end of memory", m.registers().i)
        });
    }
    advance(m);
}

/// Fx65: memory[I..] to V0..=VX.
fn load(m: &mut Machine, x: usize) {
    if let Some(count) = transfer_len(m, x) {
        let i = m.registers().i as usize;
        let mut buf = [0u8; 16];
        buf[..count].copy_from_slice(&m.memory()[i..i + count]);
        m.registers_mut().v[..count].copy_from_slice(&buf[..count]);
        bump_index(m, count);
    } else {
        log(LogCategory::Memory, LogLevel::Warn, || {
            format!("load with I={:04X} past end of memory", m.registers().i)
        });
    }
    advance(m);
}
