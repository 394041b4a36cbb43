use emu_lib::io::keyboard::{Key, KeyboardHandle};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};

/// Feeds one terminal key event into the machine's keyboard, remapping
/// the codes that differ between terminals and the DCPU's idea of a key.
pub fn apply(keyboard: &mut KeyboardHandle, event: KeyEvent) {
    let arrow = match event.code {
        KeyCode::Up => Some(Key::ArrowUp),
        KeyCode::Down => Some(Key::ArrowDown),
        KeyCode::Left => Some(Key::ArrowLeft),
        KeyCode::Right => Some(Key::ArrowRight),
        _ => None,
    };
    if let Some(key) = arrow {
        // Arrows carry press/release state; releases only reach us on
        // terminals that report them, and the handle already refuses to
        // send an up whose down was dropped.
        match event.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => keyboard.key_pressed(key),
            KeyEventKind::Release => keyboard.key_released(key),
        }
        return;
    }

    if event.kind == KeyEventKind::Release {
        return;
    }
    match event.code {
        KeyCode::Char(ch) => keyboard.key_typed(remap(ch)),
        KeyCode::Enter => keyboard.key_typed('\n'),
        KeyCode::Backspace | KeyCode::Delete => keyboard.key_typed('\u{8}'),
        KeyCode::Tab => keyboard.key_typed('\t'),
        KeyCode::Esc => keyboard.key_typed('\u{1b}'),
        _ => {}
    }
}

// Delete and return arrive differently across platforms.
fn remap(ch: char) -> char {
    match ch {
        '\u{7f}' => '\u{8}',
        '\r' => '\n',
        _ => ch,
    }
}
