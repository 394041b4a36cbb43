//! Full-machine lifecycle: start/stop, pacing, peripherals, and the
//! error surface. These run a real driver thread against a buffered
//! screen, so they sleep briefly while the machine executes.

use crate::progs::HELLO_WORLD;

use dcpu_core::{Error as CoreError, Word};
use emu_lib::clock_rate::DEFAULT_CLOCK_RATE;
use emu_lib::io::BufferScreen;
use emu_lib::machine::MachineError;
use emu_lib::{Error, Machine};

use std::thread::sleep;
use std::time::Duration;

fn machine_with(words: &[Word]) -> (Machine, BufferScreen) {
    let screen = BufferScreen::new();
    let mut machine = Machine::new(Box::new(screen.clone()));
    machine.load_program(words, 0).unwrap();
    (machine, screen)
}

#[test]
fn hello_world_reaches_the_screen() {
    let (mut machine, screen) = machine_with(HELLO_WORLD);
    machine.start(DEFAULT_CLOCK_RATE).unwrap();
    sleep(Duration::from_millis(300));
    machine.has_error().unwrap();
    machine.stop().unwrap();

    assert_eq!(screen.row_text(0), "Hello world!");
    assert!(screen.flushes() > 0);
    assert!(!screen.is_open());

    // the display window was mapped, so backing ram stayed clear
    let state = machine.state().unwrap();
    assert_eq!(state.memory.slice(0x8000, 0x8010), &[0; 0x10]);
    // and the effective rate roughly tracked the requested one
    let effective = machine.effective_clock_rate().hertz();
    assert!(effective > 0);
    assert!(effective <= DEFAULT_CLOCK_RATE.hertz() * 2);
}

#[test]
fn keyboard_keys_reach_the_program() {
    // set [0x1000], [0x9000]; set pc, 0 -- forever mirror the first ring
    // slot into plain ram
    let (mut machine, _screen) = machine_with(&[0x7bc1, 0x9000, 0x1000, 0x8781]);
    let keyboard = machine.start(DEFAULT_CLOCK_RATE).unwrap();
    keyboard.key_typed('z');
    sleep(Duration::from_millis(200));
    machine.stop().unwrap();

    let state = machine.state().unwrap();
    assert_eq!(state.memory.load(0x1000), 'z' as Word);
}

#[test]
fn machine_error_surfaces_with_pc() {
    // an empty image decodes as special opcode 0 at once
    let (mut machine, screen) = machine_with(&[]);
    machine.start(DEFAULT_CLOCK_RATE).unwrap();
    sleep(Duration::from_millis(100));

    let err = machine.stop().unwrap_err();
    let Error::Machine(err) = err else {
        panic!("expected a machine error, got {err}");
    };
    assert_eq!(
        err,
        MachineError { source: CoreError::InvalidOpcode(0x20), pc: 1 }
    );
    assert_eq!(
        err.to_string(),
        "machine error occurred; PC: 0x0001: invalid opcode 0x0020"
    );
    assert!(!screen.is_open());
}

#[test]
fn has_error_probes_without_blocking() {
    let (mut machine, _screen) = machine_with(HELLO_WORLD);
    machine.start(DEFAULT_CLOCK_RATE).unwrap();
    machine.has_error().unwrap();
    sleep(Duration::from_millis(50));
    machine.has_error().unwrap();
    machine.stop().unwrap();
    assert!(matches!(machine.has_error(), Err(Error::NotStarted)));
}

#[test]
fn stopped_machine_restarts() {
    let (mut machine, screen) = machine_with(HELLO_WORLD);
    for _ in 0..2 {
        machine.start(DEFAULT_CLOCK_RATE).unwrap();
        assert!(machine.is_running());
        sleep(Duration::from_millis(100));
        machine.stop().unwrap();
        assert!(!machine.is_running());
        assert_eq!(screen.row_text(0), "Hello world!");
    }
}

#[test]
fn double_start_is_rejected() {
    let (mut machine, _screen) = machine_with(HELLO_WORLD);
    machine.start(DEFAULT_CLOCK_RATE).unwrap();
    assert!(matches!(
        machine.start(DEFAULT_CLOCK_RATE),
        Err(Error::AlreadyRunning)
    ));
    machine.stop().unwrap();
    assert!(matches!(machine.stop(), Err(Error::NotStarted)));
}

#[test]
fn stats_line_updates_at_scan_rate() {
    let (mut machine, screen) = machine_with(HELLO_WORLD);
    machine.start(DEFAULT_CLOCK_RATE).unwrap();
    sleep(Duration::from_millis(300));
    machine.stop().unwrap();
    assert!(screen.status().contains("cycles"));
    assert!(screen.status().contains("PC:"));
}
