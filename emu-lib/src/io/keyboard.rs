use crate::Error;

use dcpu_core::memory::{Memory, MmioHandler};
use dcpu_core::Word;

use std::collections::HashMap;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

use log::trace;

pub const DEFAULT_BASE: Word = 0x9000;

/// Size of the circular key buffer.
pub const KEYBOARD_WORDS: Word = 0x10;

/// Key-up events arrive as the key-down code with this bit set.
pub const KEY_UP: Word = 0x100;

/// Non-character keys, encoded past the ASCII range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp = 128,
    ArrowDown = 129,
    ArrowLeft = 130,
    ArrowRight = 131,
}

/// A 16-word circular buffer with a write cursor. The program consumes a
/// key by writing zero back over it; `poll` only fills the cursor's slot
/// while it reads zero, so a full ring drops incoming keys.
pub struct Keyboard {
    words: [Word; KEYBOARD_WORDS as usize],
    cursor: usize,
    input: Option<Receiver<Word>>,
    base: Option<Word>,
}

impl Default for Keyboard {
    fn default() -> Self {
        Keyboard {
            words: [0; KEYBOARD_WORDS as usize],
            cursor: 0,
            input: None,
            base: None,
        }
    }
}

impl Keyboard {
    pub fn new() -> Keyboard {
        Default::default()
    }

    /// Called once per emulated cycle: if the current slot is free,
    /// consume at most one pending event into it.
    pub fn poll(&mut self) {
        if self.words[self.cursor] != 0 {
            return;
        }
        let Some(input) = &self.input else { return };
        if let Ok(key) = input.try_recv() {
            self.words[self.cursor] = key;
            self.cursor = (self.cursor + 1) % self.words.len();
        }
    }

    /// Maps the ring at [base, base+0x10) and opens the event channel.
    /// The returned handle is the only way to feed keys in.
    pub fn map_to(
        this: &Arc<Mutex<Keyboard>>,
        memory: &mut Memory,
        base: Word,
    ) -> Result<KeyboardHandle, Error> {
        let mut keyboard = this.lock().unwrap();
        if let Some(mapped) = keyboard.base {
            return Err(Error::AlreadyMapped(mapped));
        }
        memory.map_region(base, KEYBOARD_WORDS, this.clone())?;
        let (sender, receiver) = sync_channel(1);
        keyboard.words = [0; KEYBOARD_WORDS as usize];
        keyboard.cursor = 0;
        keyboard.input = Some(receiver);
        keyboard.base = Some(base);
        Ok(KeyboardHandle {
            sender,
            keys_down: HashMap::new(),
        })
    }

    pub fn unmap_from(this: &Arc<Mutex<Keyboard>>, memory: &mut Memory) -> Result<(), Error> {
        let mut keyboard = this.lock().unwrap();
        let base = keyboard.base.ok_or(Error::NotMapped)?;
        memory.unmap_region(base, KEYBOARD_WORDS)?;
        keyboard.input = None;
        keyboard.base = None;
        Ok(())
    }
}

impl MmioHandler for Keyboard {
    fn load(&mut self, offset: Word) -> Word {
        self.words[offset as usize]
    }

    fn store(&mut self, offset: Word, value: Word) -> Result<(), dcpu_core::Error> {
        self.words[offset as usize] = value;
        Ok(())
    }
}

/// Feeder side of the keyboard's event channel, held by whatever reads
/// the real input source. The channel holds a single event; anything
/// beyond that is dropped rather than stalling the sender.
pub struct KeyboardHandle {
    sender: SyncSender<Word>,
    keys_down: HashMap<Key, bool>,
}

impl KeyboardHandle {
    pub fn key_typed(&self, character: char) {
        if self.sender.try_send(character as Word).is_err() {
            trace!("keyboard: dropped typed key {character:?}");
        }
    }

    pub fn key_pressed(&mut self, key: Key) {
        let accepted = self.sender.try_send(key as Word).is_ok();
        if !accepted {
            trace!("keyboard: dropped key down {key:?}");
        }
        self.keys_down.insert(key, accepted);
    }

    /// Sends the matching key-up, but only if the key-down made it in.
    /// This send blocks: a down without its up would wedge the program's
    /// idea of the key state.
    pub fn key_released(&mut self, key: Key) {
        if !self.keys_down.get(&key).copied().unwrap_or(false) {
            return;
        }
        let _ = self.sender.send(key as Word | KEY_UP);
        self.keys_down.insert(key, false);
    }
}
