//! Whole-program walks, cycle by cycle, against the two classic DCPU-16
//! sample programs.

use dcpu_core::registers::Register;
use dcpu_core::state::State;
use dcpu_core::Word;

/// Notch's assembler test: writes "Hello world!" into the display window
/// and spins on `sub pc, 1`.
pub const HELLO_WORLD: &[Word] = &[
    //              set a, 0xbeef
    0x7c01, // 00
    0xbeef, // 01
    //              set [0x1000], a
    0x03c1, // 02
    0x1000, // 03
    //              ifn a, [0x1000]
    0x7813, // 04
    0x1000, // 05
    //                  set pc, end
    0x7f81, // 06
    0x001f, // 07
    //              set i, 0
    0x84c1, // 08
    // :nextchar    ife [data+i], 0
    0x86d2, // 09
    0x0012, // 0a
    //                  set pc, end
    0x7f81, // 0b
    0x001f, // 0c
    //              set [0x8000+i], [data+i]
    0x5ac1, // 0d
    0x0012, // 0e
    0x8000, // 0f
    //              add i, 1
    0x88c2, // 10
    //              set pc, nextchar
    0xab81, // 11
    // :data        dat "Hello world!", 0
    b'H' as Word,
    b'e' as Word,
    b'l' as Word,
    b'l' as Word,
    b'o' as Word,
    b' ' as Word,
    b'w' as Word,
    b'o' as Word,
    b'r' as Word,
    b'l' as Word,
    b'd' as Word,
    b'!' as Word,
    0, // 12-1e
    // :end         sub pc, 1
    0x8b83, // 1f
];

/// The spinning instruction HELLO_WORLD ends on.
pub const HELLO_WORLD_END: Word = 0x8b83;

/// The worked example from Notch's DCPU-16 specification.
const SPEC_EXAMPLE: &[Word] = &[
    0x7c01, 0x0030, 0x7fc1, 0x0020, 0x1000, 0x7803, 0x1000, 0xc413, //
    0x7f81, 0x0019, 0xacc1, 0x7c01, 0x2000, 0x22c1, 0x2000, 0x88c3, //
    0x84d3, 0xbb81, 0x9461, 0x7c20, 0x0017, 0x7f81, 0x0019, 0x946e, //
    0x6381, 0xeb81,
];

fn boot(words: &[Word]) -> State {
    let mut state = State::new();
    state.load_program(words, 0).unwrap();
    state
}

fn run(state: &mut State, cycles: usize) {
    for _ in 0..cycles {
        state.step_cycle().unwrap();
    }
}

/// Steps until the word under PC is `marker`, with a cycle ceiling.
fn run_until_marker(state: &mut State, marker: Word, ceiling: usize) {
    for _ in 0..ceiling {
        state.step_cycle().unwrap();
        if state.memory.load(state.registers.pc()) == marker {
            return;
        }
    }
    panic!("program exceeded {ceiling} cycles without reaching {marker:#06x}");
}

#[test]
fn load_program_copies_image() {
    let state = boot(HELLO_WORLD);
    for (offset, &word) in HELLO_WORLD.iter().enumerate() {
        assert_eq!(state.memory.load(offset as Word), word);
    }
}

#[test]
fn hello_world_reaches_fixed_point() {
    let mut state = boot(HELLO_WORLD);

    // An operand-word fetch must burn its own cycle: PC advances by one
    // word per cycle at the start, not two.
    state.step_cycle().unwrap();
    assert_eq!(state.registers.pc(), 0x1);
    state.step_cycle().unwrap();
    assert_eq!(state.registers.pc(), 0x2);

    run_until_marker(&mut state, HELLO_WORLD_END, 1000);

    let expected: Vec<Word> = "Hello world!".bytes().map(Word::from).collect();
    assert_eq!(state.memory.slice(0x8000, 0x800c), expected.as_slice());
    // everything past the text stays clear
    assert_eq!(state.memory.slice(0x800c, 0x8400), &[0; 0x8400 - 0x800c]);
}

#[test]
fn register_move_through_memory() {
    // set a, 0x30; set [0x1000], a -- four cycles flat
    let mut state = boot(&[0x7c01, 0x0030, 0x03c1, 0x1000]);
    run(&mut state, 4);
    assert_eq!(state.registers[Register::A], 0x30);
    assert_eq!(state.memory.load(0x1000), 0x30);
    assert_eq!(state.registers.pc(), 4);
}

#[test]
fn spec_example_is_cycle_exact() {
    let mut state = boot(SPEC_EXAMPLE);

    // First section: two sets, a sub, and a failed ifn.
    run(&mut state, 11);
    assert!(state.at_instruction_boundary());
    assert_eq!(state.registers[Register::A], 0x10);
    assert_eq!(state.registers.pc(), 10);

    // Twelve more instructions reach partway into the loop.
    run(&mut state, 21);
    assert!(state.at_instruction_boundary());
    assert_eq!(state.registers[Register::I], 7);
    assert_eq!(state.registers.pc(), 16);

    // The rest of the loop.
    run(&mut state, 52);
    assert!(state.at_instruction_boundary());
    assert_eq!(state.registers[Register::I], 0);
    assert_eq!(state.registers.pc(), 0x12);
    assert_eq!(state.registers.sp(), 0);

    // Two more instructions land inside the subroutine.
    run(&mut state, 5);
    assert!(state.at_instruction_boundary());
    assert_eq!(state.registers[Register::X], 4);
    assert_eq!(state.registers.pc(), 0x17);
    assert_eq!(state.registers.sp(), 0xffff);
    assert_eq!(state.memory.load(0xffff), 0x15);

    // Run the subroutine out; the program parks on `set pc, crash`.
    run_until_marker(&mut state, 0xeb81, 1000);
    assert_eq!(state.registers[Register::X], 0x40);
}
