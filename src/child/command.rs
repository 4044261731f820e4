//! Child process command line and spawn errors.

use std::path::{Path, PathBuf};

/// Argument that starts the client in tunnel mode.
pub const TUNNEL_ARG: &str = "tunnel";

/// Error type for child spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Child binary not found: {0}")]
    NotFound(PathBuf),
    /// Permission denied when spawning.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    /// The pseudo-terminal could not be set up.
    #[error("Pseudo-terminal error: {0}")]
    Pty(String),
    /// A standard stream of the child was not captured.
    #[error("Child {0} not available")]
    MissingStream(&'static str),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    pub(crate) fn from_io(err: std::io::Error, program: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}

/// Program and arguments of the child process.
#[derive(Debug, Clone)]
pub struct ChildCommand {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl ChildCommand {
    /// A command running `program` without arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// The tunnel client started in tunnel mode: `<program> tunnel`.
    #[must_use]
    pub fn tunnel(program: impl Into<PathBuf>) -> Self {
        Self::new(program).arg(TUNNEL_ARG)
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory of the child.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn get_working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

impl std::fmt::Display for ChildCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
