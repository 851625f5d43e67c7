//! Line editor
//!
//! Holds the line being typed as two buffers: the display buffer echoed to
//! the screen (which may carry cursor directives) and the command buffer
//! that is eventually executed.

use super::keys::{ctrl, Key};

/// Display directive appended by Home: cursor to origin, clear line
const HOME_DIRECTIVE: &[u8] = b"\x1b[H\x1b[K";
/// Display directive appended by the arrow keys: cursor up
const CURSOR_UP_DIRECTIVE: &[u8] = b"\x1b[A";

/// Editor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorState {
    #[default]
    Editing,
    /// Quit was requested; nothing else is accepted
    Terminating,
}

/// What the dispatcher has to do after a key was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Continue,
    /// The line is complete; carries the command buffer as typed
    Submit(Vec<u8>),
    Quit,
}

#[derive(Debug, Default)]
pub struct LineEditor {
    display: Vec<u8>,
    command: Vec<u8>,
    state: EditorState,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display(&self) -> &[u8] {
        &self.display
    }

    #[allow(dead_code)]
    pub fn command(&self) -> &[u8] {
        &self.command
    }

    #[allow(dead_code)]
    pub fn state(&self) -> EditorState {
        self.state
    }

    /// Apply one key to the buffers
    pub fn apply(&mut self, key: Key) -> Action {
        if self.state == EditorState::Terminating {
            return Action::Quit;
        }

        match key {
            Key::Char(b'\r') => {
                let line = std::mem::take(&mut self.command);
                self.reset();
                return Action::Submit(line);
            }
            Key::Escape => return self.quit(),
            Key::Char(c) if c == ctrl(b'q') => return self.quit(),
            Key::Home => self.display.extend_from_slice(HOME_DIRECTIVE),
            Key::End => {}
            Key::Backspace | Key::Delete => self.erase(),
            Key::Char(c) if c == ctrl(b'h') => self.erase(),
            Key::ArrowUp | Key::ArrowDown | Key::ArrowLeft | Key::ArrowRight => {
                self.display.extend_from_slice(CURSOR_UP_DIRECTIVE);
            }
            // Reserved for a full redraw
            Key::Char(c) if c == ctrl(b'l') => {}
            Key::PageUp | Key::PageDown => {}
            Key::Char(c) => {
                self.display.push(c);
                self.command.push(c);
            }
        }
        Action::Continue
    }

    /// Empty both buffers
    pub fn reset(&mut self) {
        self.display.clear();
        self.command.clear();
    }

    fn quit(&mut self) -> Action {
        self.state = EditorState::Terminating;
        Action::Quit
    }

    fn erase(&mut self) {
        if self.command.pop().is_some() {
            self.display.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(editor: &mut LineEditor, text: &str) {
        for byte in text.bytes() {
            assert_eq!(editor.apply(Key::Char(byte)), Action::Continue);
        }
    }

    #[test]
    fn test_literal_chars_fill_both_buffers() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, "ls -l");
        assert_eq!(editor.command(), b"ls -l");
        assert_eq!(editor.display(), b"ls -l");
    }

    #[test]
    fn test_erase_on_empty_is_noop() {
        let mut editor = LineEditor::new();
        for key in [Key::Backspace, Key::Delete, Key::Char(ctrl(b'h'))] {
            assert_eq!(editor.apply(key), Action::Continue);
            assert!(editor.command().is_empty());
            assert!(editor.display().is_empty());
        }
    }

    #[test]
    fn test_erase_drops_last_char() {
        for n in 1..=6 {
            let text = &"abcdef"[..n];
            let mut editor = LineEditor::new();
            type_str(&mut editor, text);
            editor.apply(Key::Backspace);
            assert_eq!(editor.command(), &text.as_bytes()[..n - 1]);
            assert_eq!(editor.display(), &text.as_bytes()[..n - 1]);
        }
    }

    #[test]
    fn test_all_erase_keys() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, "abc");
        editor.apply(Key::Char(ctrl(b'h')));
        editor.apply(Key::Delete);
        assert_eq!(editor.command(), b"a");
        editor.apply(Key::Backspace);
        assert!(editor.command().is_empty());
    }

    #[test]
    fn test_submit_returns_command_and_resets() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, "hi");
        editor.apply(Key::ArrowLeft);
        editor.apply(Key::Home);

        assert_eq!(editor.apply(Key::Char(b'\r')), Action::Submit(b"hi".to_vec()));
        assert!(editor.command().is_empty());
        assert!(editor.display().is_empty());
        assert_eq!(editor.state(), EditorState::Editing);
    }

    #[test]
    fn test_submit_empty_line() {
        let mut editor = LineEditor::new();
        assert_eq!(editor.apply(Key::Char(b'\r')), Action::Submit(Vec::new()));
    }

    #[test]
    fn test_arrows_touch_display_only() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, "x");
        for key in [Key::ArrowUp, Key::ArrowDown, Key::ArrowLeft, Key::ArrowRight] {
            editor.apply(key);
        }
        assert_eq!(editor.command(), b"x");
        assert_eq!(editor.display(), b"x\x1b[A\x1b[A\x1b[A\x1b[A");
    }

    #[test]
    fn test_home_touches_display_only() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, "ab");
        editor.apply(Key::Home);
        assert_eq!(editor.command(), b"ab");
        assert_eq!(editor.display(), b"ab\x1b[H\x1b[K");
    }

    #[test]
    fn test_noop_keys() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, "ab");
        for key in [Key::End, Key::PageUp, Key::PageDown, Key::Char(ctrl(b'l'))] {
            assert_eq!(editor.apply(key), Action::Continue);
        }
        assert_eq!(editor.command(), b"ab");
        assert_eq!(editor.display(), b"ab");
    }

    #[test]
    fn test_quit_is_absorbing() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, "ab");
        assert_eq!(editor.apply(Key::Char(ctrl(b'q'))), Action::Quit);
        assert_eq!(editor.state(), EditorState::Terminating);

        assert_eq!(editor.apply(Key::Char(b'c')), Action::Quit);
        assert_eq!(editor.apply(Key::Char(b'\r')), Action::Quit);
        assert_eq!(editor.command(), b"ab");
    }

    #[test]
    fn test_escape_quits() {
        let mut editor = LineEditor::new();
        assert_eq!(editor.apply(Key::Escape), Action::Quit);
        assert_eq!(editor.state(), EditorState::Terminating);
    }

    #[test]
    fn test_reset() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, "abc");
        editor.reset();
        assert!(editor.command().is_empty());
        assert!(editor.display().is_empty());
    }
}
