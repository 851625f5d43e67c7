//! Key decoding
//!
//! Turns the byte stream of a terminal in raw mode into logical keys.
//! Escape sequences are resolved with at most three bytes of lookahead
//! after the ESC, so a decode never allocates.

use std::io::{self, Read};

use tracing::debug;

/// Escape
pub const ESC: u8 = 0x1b;
/// DEL, sent by most terminals for the backspace key
pub const BACKSPACE: u8 = 0x7f;

/// Control code produced by Ctrl + `c`
pub const fn ctrl(c: u8) -> u8 {
    c & 0x1f
}

/// A logical key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A literal byte
    Char(u8),
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Delete,
    Backspace,
    Escape,
}

/// Outcome of one decode attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoded {
    Key(Key),
    /// A `ESC [ digit x` sequence nothing maps to
    Swallowed,
    /// Nothing arrived before the read timeout
    Idle,
}

/// Decoder over a raw byte source
///
/// Every read is expected to return after the terminal's read timeout, with
/// zero bytes when nothing was typed.
pub struct KeyDecoder<R> {
    input: R,
}

impl<R: Read> KeyDecoder<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    /// Next key, or `None` once the input goes quiet.
    ///
    /// Sequences with no mapping are skipped, so `None` always means the
    /// read timed out and the caller just asks again.
    pub fn poll_key(&mut self) -> io::Result<Option<Key>> {
        self.keys().next().transpose()
    }

    /// Keys decoded until the input goes quiet.
    ///
    /// The iterator ends at the first read timeout; calling `keys` again
    /// resumes where it stopped.
    pub fn keys(&mut self) -> Keys<'_, R> {
        Keys { decoder: self }
    }

    fn decode(&mut self) -> io::Result<Decoded> {
        let Some(byte) = self.read_byte()? else {
            return Ok(Decoded::Idle);
        };
        if byte != ESC {
            return Ok(Decoded::Key(literal(byte)));
        }

        let mut seq = [0u8; 2];
        if self.read_up_to(&mut seq)? < seq.len() {
            return Ok(Decoded::Key(Key::Escape));
        }

        let decoded = match seq {
            [b'[', digit @ b'1'..=b'9'] => match self.read_byte()? {
                None => Decoded::Key(Key::Escape),
                Some(b'~') => match tilde_key(digit) {
                    Some(key) => Decoded::Key(key),
                    None => {
                        debug!("Unmapped sequence ESC [ {} ~", digit as char);
                        Decoded::Swallowed
                    }
                },
                Some(other) => {
                    debug!("Unmapped sequence ESC [ {} {:#04x}", digit as char, other);
                    Decoded::Swallowed
                }
            },
            [b'[', letter] => Decoded::Key(csi_letter_key(letter).unwrap_or(Key::Escape)),
            [b'0', b'H'] => Decoded::Key(Key::Home),
            [b'0', b'F'] => Decoded::Key(Key::End),
            _ => Decoded::Key(Key::Escape),
        };
        Ok(decoded)
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok((self.read_up_to(&mut byte)? == 1).then_some(byte[0]))
    }

    /// Fill `buf` until it is full or a read times out
    fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.input.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

/// Iterator returned by [`KeyDecoder::keys`]
pub struct Keys<'a, R> {
    decoder: &'a mut KeyDecoder<R>,
}

impl<R: Read> Iterator for Keys<'_, R> {
    type Item = io::Result<Key>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.decoder.decode() {
                Ok(Decoded::Key(key)) => return Some(Ok(key)),
                Ok(Decoded::Swallowed) => continue,
                Ok(Decoded::Idle) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn literal(byte: u8) -> Key {
    match byte {
        BACKSPACE => Key::Backspace,
        _ => Key::Char(byte),
    }
}

/// `ESC [ digit ~`
fn tilde_key(digit: u8) -> Option<Key> {
    match digit {
        b'1' | b'7' => Some(Key::Home),
        b'3' => Some(Key::Delete),
        b'4' | b'8' => Some(Key::End),
        b'5' => Some(Key::PageUp),
        b'6' => Some(Key::PageDown),
        _ => None,
    }
}

/// `ESC [ letter`
fn csi_letter_key(letter: u8) -> Option<Key> {
    match letter {
        b'A' => Some(Key::ArrowUp),
        b'B' => Some(Key::ArrowDown),
        b'C' => Some(Key::ArrowRight),
        b'D' => Some(Key::ArrowLeft),
        b'H' => Some(Key::Home),
        b'F' => Some(Key::End),
        _ => None,
    }
}
