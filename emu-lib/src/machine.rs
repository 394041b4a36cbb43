use crate::clock_rate::ClockRate;
use crate::io::keyboard::{self, Keyboard, KeyboardHandle};
use crate::io::screen::Screen;
use crate::io::video::{self, Video};
use crate::Error;

use dcpu_core::state::State;
use dcpu_core::Word;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::error;

/// The fixed wall-clock cadence at which the display flushes, however
/// fast the machine itself is clocked.
pub const SCAN_RATE: u32 = 60;

/// A fatal error from inside a cycle, stamped with the PC the driver
/// observed when it happened.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("machine error occurred; PC: {pc:#06x}: {source}")]
pub struct MachineError {
    #[source]
    pub source: dcpu_core::Error,
    pub pc: Word,
}

/// Interpreter state plus both peripherals and the driver that paces
/// them. Created idle; `start` hands the state to a driver thread,
/// `stop` takes it back, and the machine can then be started again.
pub struct Machine {
    state: Option<State>,
    video: Arc<Mutex<Video>>,
    keyboard: Arc<Mutex<Keyboard>>,
    cycles: Arc<AtomicU64>,
    started_at: Option<Instant>,
    driver: Option<Driver>,
}

struct Driver {
    thread: JoinHandle<State>,
    stop: SyncSender<()>,
    result: Receiver<Option<MachineError>>,
}

impl Machine {
    pub fn new(screen: Box<dyn Screen>) -> Machine {
        Machine {
            state: Some(State::new()),
            video: Arc::new(Mutex::new(Video::new(screen))),
            keyboard: Arc::new(Mutex::new(Keyboard::new())),
            cycles: Arc::new(AtomicU64::new(0)),
            started_at: None,
            driver: None,
        }
    }

    /// Loads a program image while the machine is idle.
    pub fn load_program(&mut self, words: &[Word], offset: Word) -> Result<(), Error> {
        let state = self.state.as_mut().ok_or(Error::AlreadyRunning)?;
        state.load_program(words, offset)?;
        Ok(())
    }

    /// The interpreter state; absent while the machine is running.
    pub fn state(&self) -> Option<&State> {
        self.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut State> {
        self.state.as_mut()
    }

    pub fn is_running(&self) -> bool {
        self.driver.is_some()
    }

    /// Boots the machine: opens the display, maps video at 0x8000 and
    /// the keyboard at 0x9000, and launches the driver at `rate`. The
    /// returned handle feeds keys in. On failure, everything already
    /// acquired is released again.
    pub fn start(&mut self, rate: ClockRate) -> Result<KeyboardHandle, Error> {
        if self.driver.is_some() {
            return Err(Error::AlreadyRunning);
        }
        let mut state = self.state.take().ok_or(Error::AlreadyRunning)?;

        if let Err(err) = self.video.lock().unwrap().open() {
            self.state = Some(state);
            return Err(err.into());
        }
        if let Err(err) = Video::map_to(&self.video, &mut state.memory, video::DEFAULT_BASE) {
            self.video.lock().unwrap().close();
            self.state = Some(state);
            return Err(err);
        }
        let handle = match Keyboard::map_to(&self.keyboard, &mut state.memory, keyboard::DEFAULT_BASE)
        {
            Ok(handle) => handle,
            Err(err) => {
                let _ = Video::unmap_from(&self.video, &mut state.memory);
                self.video.lock().unwrap().close();
                self.state = Some(state);
                return Err(err);
            }
        };

        self.cycles.store(0, Ordering::Relaxed);
        self.started_at = Some(Instant::now());
        let (stop_tx, stop_rx) = sync_channel(1);
        let (result_tx, result_rx) = sync_channel(1);
        let video = self.video.clone();
        let keyboard = self.keyboard.clone();
        let cycles = self.cycles.clone();
        let period = rate.period();
        let thread = thread::Builder::new()
            .name("dcpu-driver".into())
            .spawn(move || drive(state, video, keyboard, cycles, period, stop_rx, result_tx))
            .expect("failed to spawn driver thread");
        self.driver = Some(Driver {
            thread,
            stop: stop_tx,
            result: result_rx,
        });
        Ok(handle)
    }

    /// Shuts the machine down and returns any error it halted on. The
    /// machine may be started again afterwards.
    pub fn stop(&mut self) -> Result<(), Error> {
        let driver = self.driver.take().ok_or(Error::NotStarted)?;
        // The driver may already be gone if it halted on its own.
        let _ = driver.stop.try_send(());
        let result = driver.result.recv().ok().flatten();
        let state = driver.thread.join().unwrap();
        self.teardown(state);
        match result {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Non-blocking probe: if the driver has halted on an error, cleans
    /// up and returns it. Returns Ok while the machine keeps running.
    pub fn has_error(&mut self) -> Result<(), Error> {
        let driver = self.driver.as_ref().ok_or(Error::NotStarted)?;
        let result = match driver.result.try_recv() {
            Err(TryRecvError::Empty) => return Ok(()),
            Ok(result) => result,
            Err(TryRecvError::Disconnected) => None,
        };
        let Some(driver) = self.driver.take() else {
            return Ok(());
        };
        let state = driver.thread.join().unwrap();
        self.teardown(state);
        match result {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Cycles actually executed divided by wall time since `start`.
    pub fn effective_clock_rate(&self) -> ClockRate {
        let Some(started_at) = self.started_at else {
            return ClockRate::raw(0);
        };
        let seconds = started_at.elapsed().as_secs_f64();
        if seconds <= 0.0 {
            return ClockRate::raw(0);
        }
        ClockRate::raw((self.cycles.load(Ordering::Relaxed) as f64 / seconds) as i64)
    }

    fn teardown(&mut self, mut state: State) {
        let _ = Video::unmap_from(&self.video, &mut state.memory);
        let _ = Keyboard::unmap_from(&self.keyboard, &mut state.memory);
        self.video.lock().unwrap().close();
        self.state = Some(state);
    }
}

/// The driver loop. Owns the state for the lifetime of the run; the only
/// ways out are the stop signal and a machine error, and either way the
/// final verdict goes out on `result` before the state travels back
/// through the join handle.
fn drive(
    mut state: State,
    video: Arc<Mutex<Video>>,
    keyboard: Arc<Mutex<Keyboard>>,
    cycles: Arc<AtomicU64>,
    period: Duration,
    stop: Receiver<()>,
    result: SyncSender<Option<MachineError>>,
) -> State {
    let scan_period = Duration::from_secs(1) / SCAN_RATE;
    let period = period.max(Duration::from_nanos(1));
    // Catch-up after a host stall runs back-to-back, but never more than
    // one scan interval's worth, so the display stays live.
    let burst_cap = ((scan_period.as_nanos() / period.as_nanos()) as u64).max(1);

    let start = Instant::now();
    let mut executed: u64 = 0;
    let mut next_scan = start + scan_period;
    let mut verdict = None;

    'driver: loop {
        match stop.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        // Every cycle due by now, with the burst cap. No cycles are ever
        // dropped: the schedule is start + executed * period, so a stall
        // is made up over the following iterations.
        let due = (start.elapsed().as_nanos() / period.as_nanos()) as u64;
        let target = due.min(executed + burst_cap);
        while executed < target {
            if let Err(source) = state.step_cycle() {
                verdict = Some(MachineError {
                    pc: state.registers.pc(),
                    source,
                });
                break 'driver;
            }
            keyboard.lock().unwrap().poll();
            executed += 1;
            cycles.store(executed, Ordering::Relaxed);
        }

        let now = Instant::now();
        if now >= next_scan {
            let mut video = video.lock().unwrap();
            video.update_stats(executed, &state.registers);
            if let Err(err) = video.flush() {
                error!("video flush failed: {err}");
            }
            next_scan += scan_period;
            if next_scan < now {
                next_scan = now + scan_period;
            }
        }

        let next_cycle = start + Duration::from_nanos((period.as_nanos() as u64).saturating_mul(executed + 1));
        let wake = next_cycle.min(next_scan);
        let now = Instant::now();
        if wake > now {
            thread::sleep(wake - now);
        }
    }

    let _ = result.send(verdict);
    state
}
