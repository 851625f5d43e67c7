//! Prompt renderer
//!
//! Repaints the prompt line from scratch on every iteration. There is no
//! diffing: cursor to the top-left, clear the line, prompt, display buffer.

use std::io::{self, Write};

use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use crate::config::PromptConfig;
use crate::core::raw::Geometry;

/// The decorative prompt, rendered as `[label]-$ `
#[derive(Debug, Clone)]
pub struct Prompt {
    label: String,
    color: Color,
}

impl Prompt {
    pub fn new(label: impl Into<String>, color: Color) -> Self {
        Self {
            label: label.into(),
            color,
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(config.label.clone(), config.color())
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::new("sweet", Color::Cyan)
    }
}

/// Prompt line renderer
pub struct Renderer {
    prompt: Prompt,
    geometry: Geometry,
    status_bar: bool,
}

impl Renderer {
    pub fn new(prompt: Prompt, geometry: Geometry) -> Self {
        Self {
            prompt,
            geometry,
            status_bar: false,
        }
    }

    pub fn with_status_bar(mut self, visible: bool) -> Self {
        self.status_bar = visible;
        self
    }

    /// Paint the prompt followed by the display buffer
    pub fn render<W: Write>(&self, out: &mut W, display: &[u8]) -> io::Result<()> {
        if self.status_bar {
            self.draw_status(out)?;
        }
        queue!(out, MoveTo(0, 0), Clear(ClearType::CurrentLine))?;
        self.draw_prompt(out)?;
        out.write_all(display)?;
        out.flush()
    }

    /// Clear the whole screen and home the cursor
    pub fn clear_screen<W: Write>(out: &mut W) -> io::Result<()> {
        queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
        out.flush()
    }

    /// Status text, cut to the screen width
    pub fn status_text(&self) -> String {
        let status = format!("INSERT| {}x{}", self.geometry.cols, self.geometry.rows);
        self.geometry.truncate(&status).to_string()
    }

    fn draw_prompt<W: Write>(&self, out: &mut W) -> io::Result<()> {
        queue!(
            out,
            Print("["),
            SetForegroundColor(self.prompt.color),
            Print(&self.prompt.label),
            ResetColor,
            Print("]-$ ")
        )
    }

    fn draw_status<W: Write>(&self, out: &mut W) -> io::Result<()> {
        queue!(
            out,
            MoveTo(0, self.geometry.rows - 1),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Reverse),
            Print(self.status_text()),
            SetAttribute(Attribute::Reset)
        )
    }
}
