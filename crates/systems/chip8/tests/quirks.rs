//! Quirk behavior across every flag combination.

use emu_chip8::{Machine, MachineConfig, Quirks, VF};

fn machine(quirks: Quirks, program: &[u8]) -> Machine {
    let mut m = Machine::new(MachineConfig::default().with_quirks(quirks)).expect("valid config");
    m.set_rng_seed(1);
    m.load_rom(program);
    m
}

fn all_quirk_sets() -> impl Iterator<Item = Quirks> {
    (0u8..0x80).map(Quirks::from_bits)
}

#[test]
fn test_bitwise_vf_reset_with_x_15() {
    let cases: [(u8, fn(u8, u8) -> u8); 3] = [
        (0x1, |a, b| a | b),
        (0x2, |a, b| a & b),
        (0x3, |a, b| a ^ b),
    ];
    for (op, f) in cases {
        for quirks in all_quirk_sets() {
            // OP VF, V1
            let mut m = machine(quirks, &[0x8F, 0x10 | op]);
            m.registers_mut().v[VF] = 0x3C;
            m.registers_mut().v[1] = 0x33;
            m.step();

            let expected = if quirks.contains(Quirks::VF_RESET) {
                0
            } else {
                f(0x3C, 0x33)
            };
            assert_eq!(m.registers().v[VF], expected, "op {:X} quirks {}", op, quirks);
        }
    }
}

#[test]
fn test_bitwise_vf_untouched_without_reset() {
    for quirks in all_quirk_sets() {
        let mut m = machine(quirks, &[0x81, 0x21]);
        m.registers_mut().v[VF] = 0x77;
        m.step();
        let expected = if quirks.contains(Quirks::VF_RESET) { 0 } else { 0x77 };
        assert_eq!(m.registers().v[VF], expected, "quirks {}", quirks);
    }
}

#[test]
fn test_shift_source_register() {
    for quirks in all_quirk_sets() {
        let shift_x = quirks.contains(Quirks::SHIFT);

        // SHR V1, V2
        let mut m = machine(quirks, &[0x81, 0x26]);
        m.registers_mut().v[1] = 0b1000_0010;
        m.registers_mut().v[2] = 0b0000_0011;
        m.step();
        if shift_x {
            assert_eq!(m.registers().v[1], 0b0100_0001);
            assert_eq!(m.registers().v[VF], 0);
        } else {
            assert_eq!(m.registers().v[1], 0b0000_0001);
            assert_eq!(m.registers().v[VF], 1);
        }

        // SHL V1, V2
        let mut m = machine(quirks, &[0x81, 0x2E]);
        m.registers_mut().v[1] = 0b1000_0001;
        m.registers_mut().v[2] = 0b0100_0000;
        m.step();
        if shift_x {
            assert_eq!(m.registers().v[1], 0b0000_0010);
            assert_eq!(m.registers().v[VF], 1);
        } else {
            assert_eq!(m.registers().v[1], 0b1000_0000);
            assert_eq!(m.registers().v[VF], 0);
        }
    }
}

#[test]
fn test_load_store_index_increment() {
    for quirks in all_quirk_sets() {
        // LD [I], V4 / LD V4, [I]
        let mut m = machine(quirks, &[0xF4, 0x55, 0xF4, 0x65]);
        m.registers_mut().i = 0x400;
        m.step();

        let expected = if quirks.contains(Quirks::LOAD_STORE_NO_INC_I) {
            0x400
        } else if quirks.contains(Quirks::LOAD_STORE_INC_I_BY_X) {
            0x404
        } else {
            0x405
        };
        assert_eq!(m.registers().i, expected, "store, quirks {}", quirks);

        m.registers_mut().i = 0x400;
        m.step();
        assert_eq!(m.registers().i, expected, "load, quirks {}", quirks);
    }
}

#[test]
fn test_load_store_truncates_at_end_of_memory() {
    let config = MachineConfig {
        memory_size: 0x300,
        ..MachineConfig::default()
    };
    let mut m = Machine::new(config).expect("valid config");
    m.load_rom(&[0xFF, 0x55]);
    m.registers_mut().v = [0xAB; 16];
    m.registers_mut().i = 0x2FE;
    m.step();
    assert_eq!(&m.memory()[0x2FE..], &[0xAB, 0xAB]);
    assert_eq!(m.memory().len(), 0x300);
}

#[test]
fn test_bxnn_jump() {
    for quirks in [Quirks::NONE, Quirks::BXNN_JUMP, Quirks::SCHIP] {
        let mut m = machine(quirks, &[0xB2, 0x20]);
        m.registers_mut().v[0] = 0x01;
        m.registers_mut().v[2] = 0x10;
        m.step();
        let expected = if quirks.contains(Quirks::BXNN_JUMP) {
            0x230
        } else {
            0x221
        };
        assert_eq!(m.registers().pc, expected, "quirks {}", quirks);
    }
}

#[test]
fn test_sprite_clip_and_wrap() {
    for quirks in [Quirks::NONE, Quirks::WRAP_SPRITES] {
        // DRW V0, V1, 3 with I at three full rows
        let mut m = machine(quirks, &[0xD0, 0x13]);
        m.write_memory(0x300, &[0xFF; 3]);
        m.registers_mut().i = 0x300;
        m.registers_mut().v[0] = 62;
        m.registers_mut().v[1] = 30;
        m.step();

        let lit = m.display().iter().filter(|&&p| p == 1).count();
        if quirks.contains(Quirks::WRAP_SPRITES) {
            assert_eq!(lit, 24);
            assert_eq!(m.display()[0], 1);
        } else {
            assert_eq!(lit, 4);
            assert_eq!(m.display()[0], 0);
        }
    }
}

#[test]
fn test_sprite_redraw_erases_and_reports_collision() {
    // LD I, glyph 8 / DRW V0, V0, 5 / DRW V0, V0, 5
    let mut m = machine(Quirks::NONE, &[0xA0, 0x78, 0xD0, 0x05, 0xD0, 0x05]);
    m.step();
    m.step();
    assert!(m.display().iter().any(|&p| p == 1));
    assert_eq!(m.registers().v[VF], 0);

    m.step();
    assert!(m.display().iter().all(|&p| p == 0));
    assert_eq!(m.registers().v[VF], 1);
}

#[test]
fn test_overlapping_sprites_collide() {
    // Two single-pixel rows, second shifted by 7 columns so one pixel overlaps
    let mut m = machine(Quirks::NONE, &[0xA3, 0x00, 0xD0, 0x01, 0xD1, 0x01]);
    m.write_memory(0x300, &[0xFF]);
    m.registers_mut().v[1] = 7;
    m.step();
    m.step();
    assert_eq!(m.registers().v[VF], 0);
    m.step();
    assert_eq!(m.registers().v[VF], 1);
    assert_eq!(m.display()[7], 0);
    assert_eq!(m.display()[8], 1);
}

#[test]
fn test_vblank_limits_draws_per_tick() {
    // DRW / JP 0x200
    let mut m = machine(Quirks::COSMAC_VIP, &[0xD0, 0x01, 0x12, 0x00]);
    m.registers_mut().i = 0x50;

    for _ in 0..10 {
        m.step();
    }
    assert!(m.display().iter().all(|&p| p == 0));
    assert_eq!(m.registers().pc, 0x200);

    m.update_timers(1000.0 / 60.0);
    for _ in 0..10 {
        m.step();
    }
    assert_eq!(m.display()[0], 1);
    assert_eq!(m.vblank_budget(), 0);
}

#[test]
fn test_preset_names() {
    assert_eq!("vip".parse::<Quirks>(), Ok(Quirks::COSMAC_VIP));
    assert_eq!("schip".parse::<Quirks>(), Ok(Quirks::SCHIP));
    assert_eq!("xochip".parse::<Quirks>(), Ok(Quirks::XO_CHIP));
    assert_eq!("none".parse::<Quirks>(), Ok(Quirks::NONE));
    assert!("turbo".parse::<Quirks>().is_err());
}
