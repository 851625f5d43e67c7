//! User interface rendering.
//!
//! - **renderer**: prompt line and optional status bar

pub mod renderer;

pub use renderer::*;
