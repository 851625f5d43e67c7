//! Core input components.
//!
//! This module contains the terminal input state machine:
//!
//! - **raw**: raw mode controller and terminal geometry
//! - **keys**: byte stream to logical key decoding
//! - **line**: line editor holding the display and command buffers
//! - **exec**: running a submitted line as an external process
//!
//! # Data Flow
//!
//! ```text
//! stdin bytes
//! └── KeyDecoder ── Key
//!     └── LineEditor ── Action
//!         ├── Continue → Renderer repaints display buffer
//!         ├── Submit   → RawMode::exit, Launcher::launch, RawMode::enter
//!         └── Quit     → RawMode::exit
//! ```

pub mod exec;
pub mod keys;
pub mod line;
pub mod raw;
