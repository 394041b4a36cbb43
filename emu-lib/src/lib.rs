pub mod clock_rate;
pub mod image;
pub mod io;
pub mod machine;

pub use clock_rate::ClockRate;
pub use machine::{Machine, MachineError};

use dcpu_core::Word;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] dcpu_core::Error),

    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("peripheral is already mapped at {0:#06x}")]
    AlreadyMapped(Word),

    #[error("peripheral is not mapped")]
    NotMapped,

    #[error("machine has not started")]
    NotStarted,

    #[error("machine is already running")]
    AlreadyRunning,
}
