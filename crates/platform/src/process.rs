//! Process execution used by command-backed collaborators

use async_trait::async_trait;
use sideload_errors::Error;
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::process::Command;

/// Command builder passed to [`ProcessOperations`]
#[derive(Debug, Clone)]
pub struct PlatformCommand {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl PlatformCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    pub fn current_dir<P: Into<PathBuf>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Program and arguments joined for diagnostics
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output from command execution
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

#[async_trait]
pub trait ProcessOperations: Send + Sync {
    /// Run the command to completion and capture its output
    async fn execute_command(&self, cmd: &PlatformCommand) -> Result<CommandOutput, Error>;
}

/// [`ProcessOperations`] backed by `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcess;

#[async_trait]
impl ProcessOperations for TokioProcess {
    async fn execute_command(&self, cmd: &PlatformCommand) -> Result<CommandOutput, Error> {
        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args).kill_on_drop(true);
        if let Some(dir) = &cmd.current_dir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .map_err(|e| Error::io_with_path(&e, &cmd.program))?;

        Ok(CommandOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
