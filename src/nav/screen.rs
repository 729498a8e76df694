//! Terminal control for the navigator: raw-mode keyboard input via
//! termios and ANSI escape output. Replaces the text-mode console BIOS
//! calls of old with what a modern terminal understands.

use std::io::{self, Read, Write};

use termios::{tcsetattr, Termios, ECHO, ICANON, TCSANOW, VMIN, VTIME};

/// Puts the terminal into raw keyboard mode for the lifetime of the
/// value; the saved state is restored on drop, including on panic.
pub struct RawMode {
    saved: Termios,
}

impl RawMode {
    pub fn enter() -> io::Result<RawMode> {
        let fd = libc::STDIN_FILENO;
        let saved = Termios::from_fd(fd)?;
        let mut raw = saved;
        raw.c_lflag &= !(ICANON | ECHO);
        // 0.1 s read timeout so escape sequences can be told apart from a
        // lone ESC press
        raw.c_cc[VMIN] = 0;
        raw.c_cc[VTIME] = 1;
        tcsetattr(fd, TCSANOW, &raw)?;
        Ok(RawMode { saved })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = tcsetattr(libc::STDIN_FILENO, TCSANOW, &self.saved);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    PageUp,
    PageDown,
    Enter,
    Tab,
    Escape,
    Backspace,
    F(u8),
    Char(u8),
}

fn read_byte_timeout() -> io::Result<Option<u8>> {
    // VMIN/VTIME make this return zero bytes on timeout
    let mut buf = [0u8; 1];
    match io::stdin().read(&mut buf)? {
        1 => Ok(Some(buf[0])),
        _ => Ok(None),
    }
}

/// Block until a byte arrives.
pub(crate) fn read_byte() -> io::Result<u8> {
    loop {
        if let Some(b) = read_byte_timeout()? {
            return Ok(b);
        }
    }
}

pub fn read_key() -> io::Result<Key> {
    let byte = read_byte()?;
    Ok(match byte {
        0x0D | 0x0A => Key::Enter,
        0x09 => Key::Tab,
        0x7F | 0x08 => Key::Backspace,
        0x1B => return read_escape_sequence(),
        c => Key::Char(c),
    })
}

fn read_escape_sequence() -> io::Result<Key> {
    let first = match read_byte_timeout()? {
        Some(b) => b,
        None => return Ok(Key::Escape),
    };
    match first {
        b'[' => {
            let second = match read_byte_timeout()? {
                Some(b) => b,
                None => return Ok(Key::Escape),
            };
            match second {
                b'A' => Ok(Key::Up),
                b'B' => Ok(Key::Down),
                b'0'..=b'9' => read_csi_number(second),
                _ => Ok(Key::Escape),
            }
        }
        b'O' => {
            // SS3-style function keys: ESC O P .. ESC O S
            let second = match read_byte_timeout()? {
                Some(b) => b,
                None => return Ok(Key::Escape),
            };
            Ok(match second {
                b'P' => Key::F(1),
                b'Q' => Key::F(2),
                b'R' => Key::F(3),
                b'S' => Key::F(4),
                _ => Key::Escape,
            })
        }
        _ => Ok(Key::Escape),
    }
}

fn read_csi_number(first: u8) -> io::Result<Key> {
    let mut code = (first - b'0') as u32;
    loop {
        match read_byte_timeout()? {
            Some(b'~') => break,
            Some(b) if b.is_ascii_digit() => code = code * 10 + (b - b'0') as u32,
            _ => return Ok(Key::Escape),
        }
    }
    Ok(decode_csi_code(code))
}

fn decode_csi_code(code: u32) -> Key {
    match code {
        5 => Key::PageUp,
        6 => Key::PageDown,
        11..=15 => Key::F((code - 10) as u8),
        17..=21 => Key::F((code - 11) as u8),
        23 | 24 => Key::F((code - 12) as u8),
        _ => Key::Escape,
    }
}

// -- ANSI output helpers ---------------------------------------------------

fn seq(s: &str) -> io::Result<()> {
    io::stdout().write_all(s.as_bytes())
}

pub fn enter_alt_screen() -> io::Result<()> {
    seq("\x1b[?1049h")
}

pub fn leave_alt_screen() -> io::Result<()> {
    seq("\x1b[?1049l")
}

pub fn clear_screen() -> io::Result<()> {
    seq("\x1b[2J\x1b[H")
}

pub fn clear_to_eol() -> io::Result<()> {
    seq("\x1b[K")
}

pub fn goto(col: u16, row: u16) -> io::Result<()> {
    write!(io::stdout(), "\x1b[{};{}H", row, col)
}

pub fn set_highlight() -> io::Result<()> {
    seq("\x1b[7m")
}

pub fn set_normal() -> io::Result<()> {
    seq("\x1b[0m")
}

pub fn hide_cursor() -> io::Result<()> {
    seq("\x1b[?25l")
}

pub fn show_cursor() -> io::Result<()> {
    seq("\x1b[?25h")
}

pub fn flush() -> io::Result<()> {
    io::stdout().flush()
}
