//! Null-tolerant free functions over a machine handle.
//!
//! Hosts that keep the machine in an `Option` (a driver loop that may not
//! have created one yet, or has already torn it down) can call these
//! directly. Every function accepts `None` and degrades to a no-op or a
//! benign default instead of panicking.
//!
//! ```
//! use emu_chip8::{handle, MachineConfig};
//!
//! let mut h = handle::create(MachineConfig::default());
//! handle::load_rom(h.as_deref_mut(), &[0x60, 0x2A]);
//! handle::step(h.as_deref_mut());
//! assert_eq!(handle::get_registers(h.as_deref()).map(|r| r.v[0]), Some(0x2A));
//!
//! handle::destroy(h.take());
//! assert_eq!(handle::get_rng_seed(h.as_deref()), 0);
//! ```

use emu_core::logging::{log, LogCategory, LogLevel};

use crate::config::MachineConfig;
use crate::machine::Machine;
use crate::registers::Registers;

/// `None` when the configuration is rejected.
pub fn create(config: MachineConfig) -> Option<Box<Machine>> {
    match Machine::new(config) {
        Ok(machine) => Some(Box::new(machine)),
        Err(e) => {
            log(LogCategory::CPU, LogLevel::Error, || {
                format!("cannot create machine: {}", e)
            });
            None
        }
    }
}

pub fn destroy(machine: Option<Box<Machine>>) {
    drop(machine);
}

pub fn reset(machine: Option<&mut Machine>) {
    if let Some(m) = machine {
        m.reset();
    }
}

pub fn load_rom(machine: Option<&mut Machine>, rom: &[u8]) {
    if let Some(m) = machine {
        m.load_rom(rom);
    }
}

pub fn set_rng_seed(machine: Option<&mut Machine>, seed: u32) {
    if let Some(m) = machine {
        m.set_rng_seed(seed);
    }
}

pub fn get_rng_seed(machine: Option<&Machine>) -> u32 {
    machine.map_or(0, Machine::rng_seed)
}

pub fn get_registers(machine: Option<&Machine>) -> Option<&Registers> {
    machine.map(Machine::registers)
}

pub fn set_registers(machine: Option<&mut Machine>, registers: &Registers) {
    if let Some(m) = machine {
        m.set_registers(registers.clone());
    }
}

/// Empty when there is no machine.
pub fn get_display(machine: Option<&Machine>) -> &[u8] {
    machine.map(Machine::display).unwrap_or(&[])
}

pub fn set_display(machine: Option<&mut Machine>, pixels: &[u8]) {
    if let Some(m) = machine {
        m.set_display(pixels);
    }
}

pub fn get_memory(machine: Option<&Machine>) -> Option<&[u8]> {
    machine.map(Machine::memory)
}

pub fn get_config(machine: Option<&Machine>) -> Option<&MachineConfig> {
    machine.map(Machine::config)
}

pub fn update_timers(machine: Option<&mut Machine>, delta_ms: f32) {
    if let Some(m) = machine {
        m.update_timers(delta_ms);
    }
}

pub fn step(machine: Option<&mut Machine>) {
    if let Some(m) = machine {
        m.step();
    }
}

pub fn step_frame(machine: Option<&mut Machine>) {
    if let Some(m) = machine {
        m.step_frame();
    }
}

/// Keys above 0xF are ignored.
pub fn press_key(machine: Option<&mut Machine>, key: u8) {
    if let Some(m) = machine {
        m.press_key(key);
    }
}

pub fn release_key(machine: Option<&mut Machine>, key: u8) {
    if let Some(m) = machine {
        m.release_key(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_handle_is_harmless() {
        reset(None);
        load_rom(None, &[0x12, 0x00]);
        set_rng_seed(None, 7);
        set_registers(None, &Registers::default());
        set_display(None, &[1, 1, 1]);
        update_timers(None, 16.0);
        step(None);
        step_frame(None);
        press_key(None, 3);
        release_key(None, 3);
        destroy(None);

        assert_eq!(get_rng_seed(None), 0);
        assert!(get_registers(None).is_none());
        assert!(get_display(None).is_empty());
        assert!(get_memory(None).is_none());
        assert!(get_config(None).is_none());
    }

    #[test]
    fn create_rejects_bad_config() {
        let config = MachineConfig {
            memory_size: 16,
            ..MachineConfig::default()
        };
        assert!(create(config).is_none());
    }

    #[test]
    fn handle_round_trip() {
        let mut h = create(MachineConfig::default());
        assert!(h.is_some());

        set_rng_seed(h.as_deref_mut(), 0xDEAD_BEEF);
        assert_eq!(get_rng_seed(h.as_deref()), 0xDEAD_BEEF);

        // LD V3, 0x11 / JP 0x202
        load_rom(h.as_deref_mut(), &[0x63, 0x11, 0x12, 0x02]);
        step_frame(h.as_deref_mut());
        let regs = get_registers(h.as_deref()).cloned().expect("registers");
        assert_eq!(regs.v[3], 0x11);
        assert_eq!(regs.pc, 0x202);

        let mut edited = regs.clone();
        edited.v[3] = 0x22;
        set_registers(h.as_deref_mut(), &edited);
        assert_eq!(get_registers(h.as_deref()), Some(&edited));

        set_display(h.as_deref_mut(), &[5, 0, 9]);
        assert_eq!(&get_display(h.as_deref())[..3], &[1, 0, 1]);
        assert_eq!(get_display(h.as_deref()).len(), 64 * 32);

        assert_eq!(get_memory(h.as_deref()).map(<[u8]>::len), Some(4096));
        assert_eq!(get_config(h.as_deref()).map(|c| c.cycles_per_frame), Some(15));

        reset(h.as_deref_mut());
        assert_eq!(get_rng_seed(h.as_deref()), 0xDEAD_BEEF);
        assert_eq!(get_registers(h.as_deref()), Some(&Registers::default()));

        destroy(h.take());
        assert!(get_registers(h.as_deref()).is_none());
    }

    #[test]
    fn keys_through_handle() {
        let mut h = create(MachineConfig::default());
        press_key(h.as_deref_mut(), 0x4);
        press_key(h.as_deref_mut(), 0x40);
        let m = h.as_deref().expect("machine");
        assert!(m.is_key_pressed(0x4));
        release_key(h.as_deref_mut(), 0x4);
        assert!(!h.as_deref().expect("machine").is_key_pressed(0x4));
    }
}
