//! Raw mode controller
//!
//! Switches the controlling terminal between canonical and raw input and
//! keeps the original line-discipline settings so they can be put back on
//! every exit path.

use std::fmt;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use crossterm::cursor::{MoveDown, MoveRight};
use crossterm::queue;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Upper bound on a cursor position report before it is treated as garbage
const MAX_REPORT_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum TermError {
    #[error("Problem getting terminal attributes: {0}")]
    GetAttributes(#[source] io::Error),

    #[error("Problem setting terminal attributes: {0}")]
    SetAttributes(#[source] io::Error),

    #[error("Failed to talk to the terminal: {0}")]
    Io(#[source] io::Error),

    #[error("Failed to read rows;cols from tty: {0:?}")]
    CursorReport(String),
}

pub type Result<T> = std::result::Result<T, TermError>;

/// Snapshot of a terminal's line-discipline attributes
#[derive(Clone, Copy)]
pub struct TerminalSettings(libc::termios);

impl TerminalSettings {
    /// Derive the raw-mode variant of these settings.
    ///
    /// Input: no break signal, no CR to NL, no parity check, no 8th bit strip,
    /// no XON/XOFF. Output: no post-processing. Local: no echo, no canonical
    /// mode, no extended input, no signal keys. Reads return after
    /// `read_timeout` tenths of a second even when nothing arrived.
    pub fn raw(&self, read_timeout: u8) -> Self {
        let mut raw = self.0;
        raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
        raw.c_oflag &= !libc::OPOST;
        raw.c_cflag |= libc::CS8;
        raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = read_timeout;
        Self(raw)
    }

    fn input_speed(&self) -> libc::speed_t {
        unsafe { libc::cfgetispeed(&self.0) }
    }

    fn output_speed(&self) -> libc::speed_t {
        unsafe { libc::cfgetospeed(&self.0) }
    }
}

impl PartialEq for TerminalSettings {
    fn eq(&self, other: &Self) -> bool {
        self.0.c_iflag == other.0.c_iflag
            && self.0.c_oflag == other.0.c_oflag
            && self.0.c_cflag == other.0.c_cflag
            && self.0.c_lflag == other.0.c_lflag
            && self.0.c_cc == other.0.c_cc
            && self.input_speed() == other.input_speed()
            && self.output_speed() == other.output_speed()
    }
}

impl Eq for TerminalSettings {}

impl fmt::Debug for TerminalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalSettings")
            .field("iflag", &format_args!("{:#x}", self.0.c_iflag))
            .field("oflag", &format_args!("{:#x}", self.0.c_oflag))
            .field("cflag", &format_args!("{:#x}", self.0.c_cflag))
            .field("lflag", &format_args!("{:#x}", self.0.c_lflag))
            .field("vmin", &self.0.c_cc[libc::VMIN])
            .field("vtime", &self.0.c_cc[libc::VTIME])
            .finish()
    }
}

/// Access to a terminal's line-discipline attributes
pub trait Attributes {
    fn get(&self) -> io::Result<TerminalSettings>;
    fn set(&mut self, settings: &TerminalSettings) -> io::Result<()>;
}

/// A real terminal file descriptor
pub struct Tty {
    fd: RawFd,
}

impl Tty {
    pub fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    /// The terminal behind standard input
    pub fn stdin() -> Self {
        Self::new(io::stdin().as_raw_fd())
    }
}

/// Unbuffered reads straight from the descriptor, so bytes past the current
/// key stay in the terminal for whatever runs next
impl Read for Tty {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

impl Attributes for Tty {
    fn get(&self) -> io::Result<TerminalSettings> {
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(self.fd, &mut termios) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(TerminalSettings(termios))
    }

    fn set(&mut self, settings: &TerminalSettings) -> io::Result<()> {
        if unsafe { libc::tcsetattr(self.fd, libc::TCSAFLUSH, &settings.0) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Terminal size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: u16,
    pub cols: u16,
}

impl Geometry {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows: rows.max(1),
            cols: cols.max(1),
        }
    }

    /// Cut `text` so it fits on one row without wrapping
    pub fn truncate<'a>(&self, text: &'a str) -> &'a str {
        let mut end = text.len().min(self.cols as usize);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}

/// Raw mode controller
///
/// The first successful [`enter`](Self::enter) captures the original
/// settings; later entries (after a child process ran) reuse that snapshot.
/// Dropping the controller while raw mode is active restores the terminal.
pub struct RawMode<A: Attributes> {
    attrs: A,
    original: Option<TerminalSettings>,
    active: bool,
    read_timeout: u8,
}

impl<A: Attributes> RawMode<A> {
    pub fn new(attrs: A, read_timeout: u8) -> Self {
        Self {
            attrs,
            original: None,
            active: false,
            read_timeout: read_timeout.max(1),
        }
    }

    /// Switch the terminal into raw mode
    pub fn enter(&mut self) -> Result<()> {
        let original = match self.original {
            Some(original) => original,
            None => {
                let captured = self.attrs.get().map_err(TermError::GetAttributes)?;
                debug!("Captured original terminal settings: {:?}", captured);
                self.original = Some(captured);
                captured
            }
        };

        let raw = original.raw(self.read_timeout);
        self.attrs.set(&raw).map_err(TermError::SetAttributes)?;
        self.active = true;
        debug!("Raw mode enabled (read timeout {}ds)", self.read_timeout);
        Ok(())
    }

    /// Put the original settings back
    pub fn exit(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        if let Some(original) = self.original {
            self.attrs.set(&original).map_err(TermError::SetAttributes)?;
        }
        self.active = false;
        debug!("Raw mode disabled");
        Ok(())
    }

    #[allow(dead_code)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The settings captured by the first `enter`
    pub fn original(&self) -> Option<TerminalSettings> {
        self.original
    }

    /// Query the terminal size.
    ///
    /// Asks the terminal directly first. When that is unsupported the cursor
    /// is pushed to the bottom-right corner and its reported position read
    /// back from `input`, which requires raw mode to be active.
    pub fn geometry<R: Read, W: Write>(&self, input: &mut R, output: &mut W) -> Result<Geometry> {
        match crossterm::terminal::size() {
            Ok((cols, rows)) if cols > 0 && rows > 0 => return Ok(Geometry::new(rows, cols)),
            Ok(_) => info!("Terminal reported an empty size, asking for the cursor position"),
            Err(e) => info!("Size query failed ({}), asking for the cursor position", e),
        }
        query_cursor_geometry(input, output)
    }
}

impl<A: Attributes> Drop for RawMode<A> {
    fn drop(&mut self) {
        if let Err(e) = self.exit() {
            warn!("Failed to restore terminal on drop: {}", e);
        }
    }
}

/// Find the size by moving the cursor as far as it goes and asking where it ended up
pub fn query_cursor_geometry<R: Read, W: Write>(input: &mut R, output: &mut W) -> Result<Geometry> {
    queue!(output, MoveRight(999), MoveDown(999)).map_err(TermError::Io)?;
    output.write_all(b"\x1b[6n").map_err(TermError::Io)?;
    output.flush().map_err(TermError::Io)?;

    let mut report = Vec::with_capacity(MAX_REPORT_LEN);
    let mut byte = [0u8; 1];
    while report.len() < MAX_REPORT_LEN {
        match input.read(&mut byte) {
            Ok(1) if byte[0] == b'R' => break,
            Ok(1) => report.push(byte[0]),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TermError::Io(e)),
        }
    }
    parse_cursor_report(&report)
}

/// Parse the body of a `ESC [ rows ; cols R` report, without the trailing `R`
pub fn parse_cursor_report(report: &[u8]) -> Result<Geometry> {
    let malformed = || TermError::CursorReport(String::from_utf8_lossy(report).into_owned());

    let body = report.strip_prefix(b"\x1b[").ok_or_else(malformed)?;
    let body = std::str::from_utf8(body).map_err(|_| malformed())?;
    let (rows, cols) = body.split_once(';').ok_or_else(malformed)?;
    let rows: u16 = rows.parse().map_err(|_| malformed())?;
    let cols: u16 = cols.parse().map_err(|_| malformed())?;
    if rows == 0 || cols == 0 {
        return Err(malformed());
    }
    Ok(Geometry::new(rows, cols))
}

/// In-memory attribute store for exercising the controller without a tty
#[cfg(test)]
#[derive(Clone)]
pub(crate) struct MemoryTty {
    current: std::rc::Rc<std::cell::RefCell<TerminalSettings>>,
    fail_set: bool,
}

#[cfg(test)]
impl MemoryTty {
    /// A store holding typical cooked-mode settings
    pub(crate) fn cooked() -> Self {
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        termios.c_iflag = libc::BRKINT | libc::ICRNL | libc::IXON | libc::IMAXBEL;
        termios.c_oflag = libc::OPOST | libc::ONLCR;
        termios.c_cflag = libc::CREAD | libc::CS7 | libc::HUPCL;
        termios.c_lflag = libc::ECHO | libc::ECHOE | libc::ICANON | libc::ISIG | libc::IEXTEN;
        termios.c_cc[libc::VINTR] = 3;
        termios.c_cc[libc::VMIN] = 1;
        termios.c_cc[libc::VTIME] = 0;
        unsafe {
            libc::cfsetispeed(&mut termios, libc::B38400);
            libc::cfsetospeed(&mut termios, libc::B38400);
        }
        Self {
            current: std::rc::Rc::new(std::cell::RefCell::new(TerminalSettings(termios))),
            fail_set: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_set: true,
            ..Self::cooked()
        }
    }

    pub(crate) fn current(&self) -> TerminalSettings {
        *self.current.borrow()
    }
}

#[cfg(test)]
impl Attributes for MemoryTty {
    fn get(&self) -> io::Result<TerminalSettings> {
        Ok(self.current())
    }

    fn set(&mut self, settings: &TerminalSettings) -> io::Result<()> {
        if self.fail_set {
            return Err(io::Error::new(io::ErrorKind::Other, "tcsetattr refused"));
        }
        *self.current.borrow_mut() = *settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pipe whose read end is wrapped in a `Tty`; the write end is returned raw
    fn pipe_tty() -> (Tty, RawFd) {
        let mut fds = [0 as RawFd; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (Tty::new(fds[0]), fds[1])
    }

    fn close(fd: RawFd) {
        unsafe { libc::close(fd) };
    }

    #[test]
    fn test_tty_reads_leave_rest_unread() {
        let (mut tty, writer) = pipe_tty();
        let sent = b"ls\rpasted";
        let written = unsafe { libc::write(writer, sent.as_ptr() as *const libc::c_void, sent.len()) };
        assert_eq!(written, sent.len() as isize);
        close(writer);

        let mut decoder = crate::core::keys::KeyDecoder::new(&mut tty);
        for expected in b"ls\r" {
            assert_eq!(
                decoder.poll_key().unwrap(),
                Some(crate::core::keys::Key::Char(*expected))
            );
        }

        let mut rest = Vec::new();
        tty.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"pasted");
        close(tty.fd);
    }

    #[test]
    fn test_raw_flags() {
        let cooked = MemoryTty::cooked().current();
        let raw = cooked.raw(1);
        let t = &raw.0;

        assert_eq!(t.c_iflag & (libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON), 0);
        assert_eq!(t.c_oflag & libc::OPOST, 0);
        assert_eq!(t.c_lflag & (libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG), 0);
        assert_eq!(t.c_cflag & libc::CSIZE, libc::CS8);
        assert_eq!(t.c_cc[libc::VMIN], 0);
        assert_eq!(t.c_cc[libc::VTIME], 1);

        // Unrelated bits survive
        assert_ne!(t.c_iflag & libc::IMAXBEL, 0);
        assert_ne!(t.c_lflag & libc::ECHOE, 0);
        assert_eq!(t.c_cc[libc::VINTR], 3);
    }

    #[test]
    fn test_enter_then_exit_restores_original() {
        let tty = MemoryTty::cooked();
        let before = tty.current();
        let mut raw = RawMode::new(tty.clone(), 1);

        raw.enter().unwrap();
        assert!(raw.is_active());
        assert_ne!(tty.current(), before);

        raw.exit().unwrap();
        assert!(!raw.is_active());
        assert_eq!(tty.current(), before);
    }

    #[test]
    fn test_reenter_keeps_first_snapshot() {
        let tty = MemoryTty::cooked();
        let before = tty.current();
        let mut raw = RawMode::new(tty.clone(), 1);

        raw.enter().unwrap();
        raw.exit().unwrap();
        raw.enter().unwrap();
        assert_eq!(raw.original(), Some(before));

        raw.exit().unwrap();
        assert_eq!(tty.current(), before);
    }

    #[test]
    fn test_drop_restores() {
        let tty = MemoryTty::cooked();
        let before = tty.current();
        {
            let mut raw = RawMode::new(tty.clone(), 1);
            raw.enter().unwrap();
        }
        assert_eq!(tty.current(), before);
    }

    #[test]
    fn test_exit_without_enter_is_noop() {
        let tty = MemoryTty::cooked();
        let before = tty.current();
        let mut raw = RawMode::new(tty.clone(), 1);
        raw.exit().unwrap();
        assert_eq!(tty.current(), before);
        assert_eq!(raw.original(), None);
    }

    #[test]
    fn test_enter_fails_when_set_fails() {
        let mut raw = RawMode::new(MemoryTty::failing(), 1);
        assert!(matches!(raw.enter(), Err(TermError::SetAttributes(_))));
        assert!(!raw.is_active());
    }

    #[test]
    fn test_parse_cursor_report() {
        assert_eq!(parse_cursor_report(b"\x1b[24;80").unwrap(), Geometry::new(24, 80));
        assert_eq!(parse_cursor_report(b"\x1b[1;1").unwrap(), Geometry::new(1, 1));
    }

    #[test]
    fn test_parse_cursor_report_malformed() {
        assert!(parse_cursor_report(b"").is_err());
        assert!(parse_cursor_report(b"[24;80").is_err());
        assert!(parse_cursor_report(b"\x1bO24;80").is_err());
        assert!(parse_cursor_report(b"\x1b[24").is_err());
        assert!(parse_cursor_report(b"\x1b[24;x").is_err());
        assert!(parse_cursor_report(b"\x1b[0;80").is_err());
    }

    #[test]
    fn test_query_cursor_geometry() {
        let mut input: &[u8] = b"\x1b[50;132Rleftover";
        let mut output = Vec::new();

        let geometry = query_cursor_geometry(&mut input, &mut output).unwrap();
        assert_eq!(geometry, Geometry::new(50, 132));
        assert_eq!(output, b"\x1b[999C\x1b[999B\x1b[6n");
        assert_eq!(input, b"leftover");
    }

    #[test]
    fn test_query_cursor_geometry_no_answer() {
        let mut input: &[u8] = b"";
        let mut output = Vec::new();
        assert!(matches!(
            query_cursor_geometry(&mut input, &mut output),
            Err(TermError::CursorReport(_))
        ));
    }

    #[test]
    fn test_geometry_truncate() {
        let geometry = Geometry::new(24, 5);
        assert_eq!(geometry.truncate("INSERT| 80x24"), "INSER");
        assert_eq!(geometry.truncate("ab"), "ab");
        assert_eq!(Geometry::new(0, 0), Geometry::new(1, 1));
    }
}
