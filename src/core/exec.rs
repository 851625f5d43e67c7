//! Command execution
//!
//! Splits a submitted line into a program and its arguments and runs it
//! attached to the terminal's own standard streams.

use std::io;
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("no command given")]
    Empty,

    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program}: {status}")]
    Failed { program: String, status: ExitStatus },
}

/// A program name and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Split on every single space. Consecutive spaces yield empty arguments.
    pub fn parse(line: &str) -> Result<Self, ExecError> {
        let mut parts = line.split(' ').map(str::to_string);
        let program = parts.next().unwrap_or_default();
        if program.is_empty() {
            return Err(ExecError::Empty);
        }
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Runs a command to completion
pub trait Launcher {
    fn launch(&mut self, command: &CommandLine) -> Result<(), ExecError>;
}

/// Launches real processes that inherit stdin, stdout and stderr
#[derive(Debug, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&mut self, command: &CommandLine) -> Result<(), ExecError> {
        info!("Running {} {:?}", command.program, command.args);

        let status = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| ExecError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        info!("{} finished: {}", command.program, status);
        if !status.success() {
            return Err(ExecError::Failed {
                program: command.program.clone(),
                status,
            });
        }
        Ok(())
    }
}
