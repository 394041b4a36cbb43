pub mod memory;
pub mod opcodes;
pub mod registers;
pub mod state;

pub use memory::{Memory, MmioHandler, Region};
pub use opcodes::Opcode;
pub use registers::{Register, Registers};
pub use state::{Address, State};

use thiserror::Error;

/// The machine's sole native datum.
pub type Word = u16;

/// Number of words in the address space.
pub const RAM_WORDS: usize = 0x10000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("protection violation at address {0:#06x}")]
    Protection(Word),

    #[error("invalid opcode {0:#06x}")]
    InvalidOpcode(Word),

    #[error("out of bounds")]
    OutOfBounds,

    #[error("halt and catch fire")]
    Halt,

    #[error("region conflicts with an existing mapped region")]
    RegionConflict,

    #[error("no mapped region matches")]
    NoRegionMatches,
}
