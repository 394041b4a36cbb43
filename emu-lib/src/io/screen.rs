use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crossterm::style::{Attribute, Color};
use crossterm::{cursor, queue, style, terminal};

/// Geometry of the text display: a 32x12 cell grid inside a one-cell
/// border, with a status line underneath.
pub const COLUMNS: u16 = 32;
pub const ROWS: u16 = 12;

/// One decoded character cell. Color nibbles assign bit 0 blue, bit 1
/// green, bit 2 red, bit 3 highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub character: char,
    pub foreground: u8,
    pub background: u8,
    pub blink: bool,
}

/// Where video output lands. The terminal implementation buffers cell
/// writes and only reaches the screen on `flush`, so per-write cost stays
/// off the emulation hot path.
pub trait Screen: Send {
    fn open(&mut self) -> io::Result<()>;
    fn close(&mut self);
    fn set_cell(&mut self, column: u16, row: u16, cell: Cell);
    fn set_border(&mut self, color: u8);
    fn set_status(&mut self, line: &str);
    fn flush(&mut self) -> io::Result<()>;
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Palette {
    /// 8-color ANSI, bold standing in for the highlight bit.
    Ansi,
    /// xterm-256 approximation of the 16-entry palette.
    Xterm256,
}

/// xterm-256 indices for the 16 palette entries, highlight in the top half.
const XTERM_PALETTE: [u8; 16] = [
    16, 19, 34, 37, 124, 127, 130, 145, // normal
    59, 63, 83, 87, 203, 207, 227, 231, // highlight
];

const ANSI_PALETTE: [Color; 8] = [
    Color::Black,
    Color::DarkBlue,
    Color::DarkGreen,
    Color::DarkCyan,
    Color::DarkRed,
    Color::DarkMagenta,
    Color::DarkYellow,
    Color::Grey,
];

pub struct TermScreen {
    out: io::Stdout,
    palette: Palette,
    open: bool,
}

impl Default for TermScreen {
    fn default() -> Self {
        TermScreen::new()
    }
}

impl TermScreen {
    pub fn new() -> TermScreen {
        let term = std::env::var("TERM").unwrap_or_default();
        let palette = if term.ends_with("-256color") {
            Palette::Xterm256
        } else {
            Palette::Ansi
        };
        TermScreen {
            out: io::stdout(),
            palette,
            open: false,
        }
    }

    fn color(&self, nibble: u8) -> (Color, bool) {
        let nibble = nibble & 0xf;
        match self.palette {
            Palette::Xterm256 => (Color::AnsiValue(XTERM_PALETTE[nibble as usize]), false),
            Palette::Ansi => (ANSI_PALETTE[(nibble & 0x7) as usize], nibble & 0x8 != 0),
        }
    }
}

impl Screen for TermScreen {
    fn open(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        queue!(
            self.out,
            terminal::EnterAlternateScreen,
            terminal::Clear(terminal::ClearType::All),
            cursor::Hide,
        )?;
        self.out.flush()?;
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        let _ = queue!(
            self.out,
            style::ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen,
        );
        let _ = self.out.flush();
        let _ = terminal::disable_raw_mode();
    }

    fn set_cell(&mut self, column: u16, row: u16, cell: Cell) {
        // Cells with no color information painted in the terminal's own
        // colors, so bare ASCII programs stay readable.
        let plain = cell.foreground == 0 && cell.background == 0;
        let _ = queue!(self.out, cursor::MoveTo(column + 1, row + 1), style::ResetColor);
        if !plain {
            let (fg, bold) = self.color(cell.foreground);
            let (bg, _) = self.color(cell.background);
            let _ = queue!(self.out, style::SetForegroundColor(fg), style::SetBackgroundColor(bg));
            if bold {
                let _ = queue!(self.out, style::SetAttribute(Attribute::Bold));
            }
        }
        if cell.blink {
            let _ = queue!(self.out, style::SetAttribute(Attribute::SlowBlink));
        }
        let _ = queue!(
            self.out,
            style::Print(cell.character),
            style::SetAttribute(Attribute::Reset),
        );
    }

    fn set_border(&mut self, color: u8) {
        let (bg, _) = self.color(color);
        let _ = queue!(self.out, style::ResetColor, style::SetBackgroundColor(bg));
        for column in 0..COLUMNS + 2 {
            let _ = queue!(self.out, cursor::MoveTo(column, 0), style::Print(' '));
            let _ = queue!(self.out, cursor::MoveTo(column, ROWS + 1), style::Print(' '));
        }
        for row in 1..ROWS + 1 {
            let _ = queue!(self.out, cursor::MoveTo(0, row), style::Print(' '));
            let _ = queue!(self.out, cursor::MoveTo(COLUMNS + 1, row), style::Print(' '));
        }
        let _ = queue!(self.out, style::ResetColor);
    }

    fn set_status(&mut self, line: &str) {
        let _ = queue!(
            self.out,
            cursor::MoveTo(0, ROWS + 2),
            style::ResetColor,
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::Print(line),
        );
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for TermScreen {
    fn drop(&mut self) {
        self.close();
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Default)]
struct BufferState {
    cells: HashMap<(u16, u16), Cell>,
    border: Option<u8>,
    status: String,
    open: bool,
    flushes: usize,
}

/// In-memory screen for tests: records everything, renders nothing.
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferScreen {
    state: Arc<Mutex<BufferState>>,
}

impl BufferScreen {
    pub fn new() -> BufferScreen {
        Default::default()
    }

    pub fn cell(&self, column: u16, row: u16) -> Option<Cell> {
        self.state.lock().unwrap().cells.get(&(column, row)).copied()
    }

    pub fn border(&self) -> Option<u8> {
        self.state.lock().unwrap().border
    }

    pub fn status(&self) -> String {
        self.state.lock().unwrap().status.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    pub fn flushes(&self) -> usize {
        self.state.lock().unwrap().flushes
    }

    /// The text of `row`, trailing spaces trimmed.
    pub fn row_text(&self, row: u16) -> String {
        let state = self.state.lock().unwrap();
        let mut text: String = (0..COLUMNS)
            .map(|column| {
                state
                    .cells
                    .get(&(column, row))
                    .map(|cell| cell.character)
                    .unwrap_or(' ')
            })
            .collect();
        text.truncate(text.trim_end().len());
        text
    }
}

impl Screen for BufferScreen {
    fn open(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().open = false;
    }

    fn set_cell(&mut self, column: u16, row: u16, cell: Cell) {
        self.state.lock().unwrap().cells.insert((column, row), cell);
    }

    fn set_border(&mut self, color: u8) {
        self.state.lock().unwrap().border = Some(color);
    }

    fn set_status(&mut self, line: &str) {
        self.state.lock().unwrap().status = line.to_string();
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.lock().unwrap().flushes += 1;
        Ok(())
    }
}
