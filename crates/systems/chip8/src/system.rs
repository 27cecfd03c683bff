//! CHIP-8 main system implementation

use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::Frame;
use emu_core::{MountPointInfo, System};
use serde_json::{json, Value};

use crate::config::MachineConfig;
use crate::error::Chip8Error;
use crate::machine::{Machine, KEY_COUNT};
use crate::registers::PROGRAM_START;
use crate::timer::FRAME_MS;

const PROGRAM_MOUNT: &str = "Program";

const PIXEL_ON: u32 = 0xFFFF_FFFF;
const PIXEL_OFF: u32 = 0xFF00_0000;

/// A [`Machine`] driven one 60 Hz frame at a time.
pub struct Chip8System {
    machine: Machine,
    // Kept so `reset` can reload it into the cleared memory.
    program: Option<Vec<u8>>,
}

impl Chip8System {
    pub fn new(config: MachineConfig) -> Result<Self, Chip8Error> {
        Ok(Self {
            machine: Machine::new(config)?,
            program: None,
        })
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn load_program(&mut self, data: &[u8]) {
        self.program = Some(data.to_vec());
        self.reset();
    }

    /// Bit `k` of `mask` holds key `k` down.
    pub fn set_keypad(&mut self, mask: u16) {
        for key in 0..KEY_COUNT as u8 {
            if mask & (1 << key) != 0 {
                self.machine.press_key(key);
            } else {
                self.machine.release_key(key);
            }
        }
    }

    /// The buzzer sounds while the sound timer is non-zero.
    pub fn sound_active(&self) -> bool {
        self.machine.registers().st > 0
    }

    fn check_mount_point(mount_point_id: &str) -> Result<(), Chip8Error> {
        if mount_point_id == PROGRAM_MOUNT {
            Ok(())
        } else {
            Err(Chip8Error::InvalidMountPoint(mount_point_id.to_string()))
        }
    }
}

impl System for Chip8System {
    type Error = Chip8Error;

    fn reset(&mut self) {
        self.machine.reset();
        if let Some(program) = &self.program {
            self.machine.load_rom(program);
        }
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        self.machine.update_timers(FRAME_MS);
        self.machine.step_frame();

        let config = self.machine.config();
        Ok(Frame::from_mono(
            config.screen_width as u32,
            config.screen_height as u32,
            self.machine.display(),
            PIXEL_ON,
            PIXEL_OFF,
        ))
    }

    fn debug_state(&self) -> Value {
        let m = &self.machine;
        let config = m.config();
        json!({
            "registers": serde_json::to_value(m.registers()).unwrap_or(Value::Null),
            "call_stack": m.registers().call_stack(),
            "vblank_budget": m.vblank_budget(),
            "rng_seed": m.rng_seed(),
            "sound_active": self.sound_active(),
            "config": {
                "quirks": config.quirks.to_string(),
                "memory_size": config.memory_size,
                "cycles_per_frame": config.cycles_per_frame,
                "screen": [config.screen_width, config.screen_height],
                "handlers": config.handlers.names(),
            },
            "program_size": self.program.as_ref().map(Vec::len),
        })
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: PROGRAM_MOUNT.to_string(),
            name: "Program".to_string(),
            extensions: vec!["ch8".to_string(), "c8".to_string(), "bin".to_string()],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        Self::check_mount_point(mount_point_id)?;
        let capacity = self.machine.memory().len().saturating_sub(PROGRAM_START as usize);
        if data.len() > capacity {
            log(LogCategory::Memory, LogLevel::Warn, || {
                format!(
                    "program is {} bytes, only {} fit; truncating",
                    data.len(),
                    capacity
                )
            });
        }
        self.load_program(data);
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        Self::check_mount_point(mount_point_id)?;
        self.program = None;
        self.reset();
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == PROGRAM_MOUNT && self.program.is_some()
    }
}
