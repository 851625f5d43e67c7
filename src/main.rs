//! sweet - a raw-mode command line front-end
//!
//! sweet puts the terminal into raw mode, reads keystrokes one byte at a
//! time, decodes escape sequences into keys and edits a single command line.
//! Pressing Enter hands the line to the system as `program arg arg ...`.
//!
//! # Keys
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Run the line |
//! | Backspace, Ctrl+H, Delete | Erase the last character |
//! | Home | Move the cursor to the origin and clear the line |
//! | Ctrl+Q, Esc | Quit |
//!
//! Logs go to `~/.sweet/sweet.log`; the filter comes from `SWEET_LOG` or the
//! `log_level` config key.

#[cfg(unix)]
mod core;
#[cfg(unix)]
mod dispatch;
#[cfg(unix)]
mod ui;
mod config;

use std::env;
use std::path::PathBuf;
use std::process;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line options
#[derive(Debug, Default)]
struct Options {
    /// Explicit config file
    config: Option<PathBuf>,
    /// Prompt label override
    prompt: Option<String>,
    /// Force the status bar on
    status: bool,
}

fn print_help() {
    eprintln!("sweet {} - a raw-mode command line front-end", VERSION);
    eprintln!();
    eprintln!("Usage: sweet [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config <PATH>   Read configuration from PATH");
    eprintln!("  -p, --prompt <LABEL>  Prompt label (default: sweet)");
    eprintln!("  -s, --status          Show the status bar");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Enter                 Run the line");
    eprintln!("  Backspace, Delete     Erase the last character");
    eprintln!("  Ctrl+Q, Esc           Quit");
    eprintln!();
    eprintln!("Configuration: ~/.sweet/config.toml");
    eprintln!("Log file:      ~/.sweet/sweet.log (filter via SWEET_LOG)");
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                process::exit(0);
            }
            "-v" | "--version" => {
                eprintln!("sweet {}", VERSION);
                process::exit(0);
            }
            "-c" | "--config" => {
                let path = args.next().ok_or("Missing config path")?;
                options.config = Some(PathBuf::from(path));
            }
            "-p" | "--prompt" => {
                options.prompt = Some(args.next().ok_or("Missing prompt label")?);
            }
            "-s" | "--status" => {
                options.status = true;
            }
            other => {
                return Err(format!("Unknown argument: {}. Use -h for help.", other));
            }
        }
    }

    Ok(options)
}

/// Merge the config file with command line overrides
fn load_config(options: &Options) -> Config {
    let mut config = match &options.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    if let Some(label) = &options.prompt {
        config.prompt.label = label.clone();
    }
    if options.status {
        config.status_bar.visible = true;
    }
    config
}

/// Log to a file; stdout belongs to the editor
fn init_logging(config: &Config) {
    let log_path = Config::dir()
        .map(|dir| dir.join("sweet.log"))
        .unwrap_or_else(|| PathBuf::from("sweet.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("SWEET_LOG")
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() {
    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    };

    let config = load_config(&options);
    init_logging(&config);
    info!("sweet {} starting...", VERSION);

    #[cfg(not(unix))]
    {
        error!("Unsupported platform");
        eprintln!("sweet needs a Unix terminal with termios support.");
        process::exit(1);
    }

    #[cfg(unix)]
    {
        if let Err(e) = run(&config) {
            error!("Fatal: {:#}", e);
            // The controller has already been dropped, restoring the terminal
            let mut stdout = std::io::stdout();
            let _ = ui::Renderer::clear_screen(&mut stdout);
            eprintln!("sweet: {:#}", e);
            process::exit(1);
        }
        info!("sweet exiting");
    }
}

/// Enter raw mode, run the session, and leave raw mode again
#[cfg(unix)]
fn run(config: &Config) -> anyhow::Result<()> {
    use std::io;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    use anyhow::Context;
    use signal_hook::consts::{SIGHUP, SIGTERM};

    use crate::core::exec::SystemLauncher;
    use crate::core::keys::KeyDecoder;
    use crate::core::raw::{RawMode, Tty};
    use crate::dispatch::Dispatcher;
    use crate::ui::{Prompt, Renderer};

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))?;
    signal_hook::flag::register(SIGHUP, Arc::clone(&shutdown))?;

    let mut raw = RawMode::new(Tty::stdin(), config.read_timeout());
    raw.enter().context("Problem enabling raw mode")?;
    install_panic_hook(&raw);

    let mut input = Tty::stdin();
    let mut stdout = io::stdout();

    let geometry = raw
        .geometry(&mut input, &mut stdout)
        .context("Couldn't get screen size")?;
    info!("Terminal size: {}x{}", geometry.cols, geometry.rows);

    let renderer = Renderer::new(Prompt::from_config(&config.prompt), geometry)
        .with_status_bar(config.status_bar.visible);
    Renderer::clear_screen(&mut stdout)?;

    let mut dispatcher = Dispatcher::new(KeyDecoder::new(input), stdout, raw, renderer, SystemLauncher)
        .with_shutdown(shutdown)
        .with_clear_before_exec(config.clear_before_exec);
    dispatcher.run()
}

/// Put the original terminal settings back before a panic message is printed
#[cfg(unix)]
fn install_panic_hook<A: crate::core::raw::Attributes>(raw: &crate::core::raw::RawMode<A>) {
    use crate::core::raw::{Attributes, Tty};

    let Some(original) = raw.original() else {
        return;
    };
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = Tty::stdin().set(&original);
        default_hook(info);
    }));
}
