pub mod keyboard;
pub mod screen;
pub mod video;

pub use keyboard::{Key, Keyboard, KeyboardHandle};
pub use screen::{BufferScreen, Cell, Screen, TermScreen};
pub use video::Video;
