mod keymap;

use emu_lib::clock_rate::{ClockRate, DEFAULT_CLOCK_RATE, DEFAULT_SCREEN_REFRESH_RATE};
use emu_lib::image::{self, Endian};
use emu_lib::io::TermScreen;
use emu_lib::Machine;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use log::debug;

/// DCPU-16 Emulator
#[derive(Parser)]
struct Args {
    /// Program image to execute
    program: PathBuf,

    /// Clock rate to run the machine at
    #[arg(long, default_value_t = DEFAULT_CLOCK_RATE)]
    rate: ClockRate,

    /// Clock rate to refresh the screen at (informational; the scan
    /// cadence is locked to the wall clock)
    #[arg(long = "screenRefreshRate", default_value_t = DEFAULT_SCREEN_REFRESH_RATE)]
    screen_refresh_rate: ClockRate,

    /// Print the effective clock rate at termination
    #[arg(long = "printRate")]
    print_rate: bool,

    /// Interpret the input file as little endian
    #[arg(long = "littleEndian")]
    little_endian: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    let print_rate = args.print_rate;
    match run(args) {
        Ok(effective) => {
            if print_rate {
                println!("Effective clock rate: {effective}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ClockRate, emu_lib::Error> {
    let endian = if args.little_endian {
        Endian::Little
    } else {
        Endian::Big
    };
    let bytes = std::fs::read(&args.program)?;
    let words = image::words_from_bytes(&bytes, endian);
    debug!(
        "loaded {} words from {}; screen refresh {}",
        words.len(),
        args.program.display(),
        args.screen_refresh_rate,
    );

    let mut machine = Machine::new(Box::new(TermScreen::new()));
    machine.load_program(&words, 0)?;
    let mut keyboard = machine.start(args.rate)?;

    // Relay terminal keys into the machine until ^C or a machine error.
    loop {
        if !event::poll(Duration::from_millis(100))? {
            machine.has_error()?;
            continue;
        }
        let evt = event::read()?;
        machine.has_error()?;
        let Event::Key(key) = evt else { continue };
        if key.kind == KeyEventKind::Press
            && key.code == KeyCode::Char('c')
            && key.modifiers.contains(KeyModifiers::CONTROL)
        {
            let effective = machine.effective_clock_rate();
            machine.stop()?;
            return Ok(effective);
        }
        keymap::apply(&mut keyboard, key);
    }
}
