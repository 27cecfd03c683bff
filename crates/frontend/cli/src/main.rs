use anyhow::{Context, Result};
use clap::Parser;
use emu_chip8::{Chip8System, Machine, MachineConfig, Quirks};
use emu_core::logging::{LogCategory, LogConfig, LogLevel};
use emu_core::System;
use log::info;
use std::fs;
use std::path::PathBuf;

/// Blinks a random "C8" glyph, redrawn whenever the delay timer expires.
const DEMO_ROM: [u8; 31] = [
    0xA2, 0x18, // LD I, 0x218
    0x60, 0x12, // LD V0, 18
    0xF0, 0x18, // LD ST, V0
    0x60, 0xB4, // LD V0, 180
    0xF0, 0x15, // LD DT, V0
    0xC1, 0x3F, // RND V1, 63
    0xC2, 0x1F, // RND V2, 31
    0xD1, 0x25, // DRW V1, V2, 5
    0xF0, 0x07, // LD V0, DT
    0x50, 0x30, // SE V0, V3
    0x12, 0x10, // JP 0x210
    0xD1, 0x25, // DRW V1, V2, 5
    0x12, 0x06, // JP 0x206
    0xEE, 0x8A, 0x84, 0x8A, 0xEE,
];

#[derive(Parser)]
#[command(about = "Headless CHIP-8 runner")]
struct Args {
    /// Program image to run; the built-in demo when omitted
    rom: Option<PathBuf>,

    /// Machine configuration as JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated quirk or preset names (vip, schip, xochip, vf-reset, ...)
    #[arg(long)]
    quirks: Option<Quirks>,

    #[arg(long)]
    cycles_per_frame: Option<u32>,

    /// Random generator seed; 0 or unset picks one from the clock
    #[arg(long)]
    seed: Option<u32>,

    /// Number of 60 Hz frames to run
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Keypad mask held for the whole run, in hex (bit k = key k)
    #[arg(long, value_parser = parse_hex_mask, default_value = "0")]
    keys: u16,

    /// Print the debug snapshot after every frame
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Don't print the display
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Write the final debug snapshot to this file as JSON
    #[arg(long)]
    state_out: Option<PathBuf>,

    /// Level for every log category without its own setting
    #[arg(long, default_value = "off")]
    log_level: LogLevel,

    /// Level for instruction tracing and faults
    #[arg(long)]
    log_cpu: Option<LogLevel>,

    /// Send core logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn parse_hex_mask(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid key mask `{}`: {}", s, e))
}

fn configure_logging(args: &Args) -> Result<()> {
    let log_config = LogConfig::global();
    log_config.set_global_level(args.log_level);
    if let Some(level) = args.log_cpu {
        log_config.set_level(LogCategory::CPU, level);
    }
    if let Some(path) = &args.log_file {
        log_config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

fn machine_config(args: &Args) -> Result<MachineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => MachineConfig::default(),
    };

    if let Some(quirks) = args.quirks {
        config.quirks = quirks;
    }
    if let Some(cycles) = args.cycles_per_frame {
        config.cycles_per_frame = cycles;
    }
    config.validate()?;
    Ok(config)
}

fn render_display(machine: &Machine) -> String {
    let width = machine.config().screen_width as usize;
    let mut out = String::with_capacity(machine.display().len() + machine.display().len() / width);
    for row in machine.display().chunks(width) {
        out.extend(row.iter().map(|&p| if p != 0 { '#' } else { '.' }));
        out.push('\n');
    }
    out
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let config = machine_config(&args)?;
    let program = match &args.rom {
        Some(path) => {
            fs::read(path).with_context(|| format!("reading program {}", path.display()))?
        }
        None => DEMO_ROM.to_vec(),
    };

    let mut sys = Chip8System::new(config)?;
    if let Some(seed) = args.seed {
        sys.machine_mut().set_rng_seed(seed);
    }
    sys.mount("Program", &program)?;
    sys.set_keypad(args.keys);

    info!(
        "running {} frame(s) of a {}-byte program, quirks: {}, seed {:08X}",
        args.frames,
        program.len(),
        sys.machine().quirks(),
        sys.machine().rng_seed()
    );

    for fnum in 1..=args.frames {
        let frame = sys.step_frame()?;
        if args.debug && !args.quiet {
            println!(
                "DEBUG STATE (frame {}, {}x{}):\n{}",
                fnum,
                frame.width,
                frame.height,
                serde_json::to_string_pretty(&sys.debug_state())?
            );
        }
    }

    if !args.quiet {
        print!("{}", render_display(sys.machine()));
        let r = sys.machine().registers();
        println!(
            "pc={:03X} i={:03X} sp={} dt={} st={} v={:02X?}",
            r.pc, r.i, r.sp, r.dt, r.st, r.v
        );
    }

    if let Some(path) = &args.state_out {
        let state = serde_json::to_string_pretty(&sys.debug_state())?;
        fs::write(path, state).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote state to {}", path.display());
    }

    Ok(())
}
