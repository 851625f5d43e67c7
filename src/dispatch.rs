//! Main loop
//!
//! render → decode one key → apply it → repeat. A submitted line is run with
//! the terminal back in cooked mode; raw mode is re-entered afterwards.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::core::exec::{CommandLine, Launcher};
use crate::core::keys::{Key, KeyDecoder};
use crate::core::line::{Action, LineEditor};
use crate::core::raw::{Attributes, RawMode};
use crate::ui::Renderer;

/// Owns the session and drives it
pub struct Dispatcher<R, W, A: Attributes, L> {
    keys: KeyDecoder<R>,
    out: W,
    raw: RawMode<A>,
    editor: LineEditor,
    renderer: Renderer,
    launcher: L,
    shutdown: Arc<AtomicBool>,
    clear_before_exec: bool,
}

impl<R, W, A, L> Dispatcher<R, W, A, L>
where
    R: Read,
    W: Write,
    A: Attributes,
    L: Launcher,
{
    /// `raw` is expected to be in raw mode already
    pub fn new(keys: KeyDecoder<R>, out: W, raw: RawMode<A>, renderer: Renderer, launcher: L) -> Self {
        Self {
            keys,
            out,
            raw,
            editor: LineEditor::new(),
            renderer,
            launcher,
            shutdown: Arc::new(AtomicBool::new(false)),
            clear_before_exec: true,
        }
    }

    /// Flag checked between reads; once set the loop quits
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_clear_before_exec(mut self, clear: bool) -> Self {
        self.clear_before_exec = clear;
        self
    }

    /// Run until quit. Raw mode is left on the way out.
    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            self.renderer
                .render(&mut self.out, self.editor.display())
                .context("Failed to draw prompt")?;

            let Some(key) = self.next_key()? else {
                info!("Termination signal received");
                break;
            };
            debug!("Key: {:?}", key);

            match self.editor.apply(key) {
                Action::Continue => {}
                Action::Submit(line) => self.submit(&line)?,
                Action::Quit => {
                    info!("Quit requested");
                    break;
                }
            }
        }

        self.raw.exit().context("Problem disabling raw mode")?;
        Ok(())
    }

    #[allow(dead_code)]
    pub fn editor(&self) -> &LineEditor {
        &self.editor
    }

    #[allow(dead_code)]
    pub fn raw_mode(&self) -> &RawMode<A> {
        &self.raw
    }

    #[allow(dead_code)]
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    #[allow(dead_code)]
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Wait for the next key; `None` once a shutdown was requested
    fn next_key(&mut self) -> anyhow::Result<Option<Key>> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(None);
            }
            if let Some(key) = self.keys.poll_key().context("Failed to read from terminal")? {
                return Ok(Some(key));
            }
        }
    }

    /// Hand a line to the launcher with the terminal in cooked mode
    fn submit(&mut self, line: &[u8]) -> anyhow::Result<()> {
        if self.clear_before_exec {
            Renderer::clear_screen(&mut self.out).context("Failed to clear screen")?;
        }
        // Child output starts below the prompt row, which the next paint clears
        self.out.write_all(b"\r\n").context("Failed to write to terminal")?;
        self.out.flush().context("Failed to write to terminal")?;

        self.raw.exit().context("Problem disabling raw mode")?;

        let text = String::from_utf8_lossy(line);
        let result = CommandLine::parse(&text).and_then(|command| self.launcher.launch(&command));
        if let Err(e) = result {
            warn!("Command {:?} failed: {}", text, e);
            writeln!(self.out, "{}", e).context("Failed to write to terminal")?;
            self.out.flush().context("Failed to write to terminal")?;
        }

        self.raw.enter().context("Problem enabling raw mode")?;
        Ok(())
    }
}
