//! Restart trigger — replace the running process with a fresh copy of itself.
//!
//! The invocation (executable, argv, environment, working directory) is
//! captured once when the reloader is built, so later changes the host makes
//! to its own environment or working directory do not leak into the restart.

use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use tracing::info;

use crate::config::ReloadMode;
use crate::error::{ReloadError, Result};

/// The parameters the program was launched with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub executable: PathBuf,
    /// Full argument vector, including argv[0].
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
    pub working_dir: PathBuf,
}

impl Invocation {
    /// Capture the current process's invocation.
    pub fn capture() -> Result<Self> {
        Ok(Self {
            executable: env::current_exe()?,
            args: env::args_os().collect(),
            env: env::vars_os().collect(),
            working_dir: env::current_dir()?,
        })
    }

    /// Build the command that relaunches this invocation verbatim.
    ///
    /// The environment is cleared and replaced by the captured one.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if let Some(arg0) = self.args.first() {
                cmd.arg0(arg0);
            }
        }

        cmd.args(self.args.iter().skip(1))
            .env_clear()
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&self.working_dir);
        cmd
    }
}

/// Performs the one-time process replacement.
///
/// On success an implementation normally does not return: the process image
/// is replaced or the process exits. Returning `Ok` means the current process
/// is about to end by other means.
pub trait Restarter: Send + Sync {
    fn restart(&self, invocation: &Invocation) -> Result<()>;
}

impl<F> Restarter for F
where
    F: Fn(&Invocation) -> Result<()> + Send + Sync,
{
    fn restart(&self, invocation: &Invocation) -> Result<()> {
        self(invocation)
    }
}

/// Restarts the real OS process according to a [`ReloadMode`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessRestarter {
    mode: ReloadMode,
    force_exit: bool,
}

impl ProcessRestarter {
    pub fn new(mode: ReloadMode, force_exit: bool) -> Self {
        Self { mode, force_exit }
    }
}

impl Restarter for ProcessRestarter {
    fn restart(&self, invocation: &Invocation) -> Result<()> {
        info!(
            executable = %invocation.executable.display(),
            mode = ?self.mode,
            "restarting process"
        );

        match self.mode {
            ReloadMode::Exec => exec_replace(invocation),
            ReloadMode::SpawnExit => spawn_exit(invocation, self.force_exit),
        }
    }
}

#[cfg(unix)]
fn exec_replace(invocation: &Invocation) -> Result<()> {
    use std::os::unix::process::CommandExt;

    // `exec` only returns on failure.
    let source = invocation.command().exec();
    Err(ReloadError::ProcessReplacement {
        executable: invocation.executable.clone(),
        source,
    })
}

#[cfg(not(unix))]
fn exec_replace(invocation: &Invocation) -> Result<()> {
    Err(ReloadError::ProcessReplacement {
        executable: invocation.executable.clone(),
        source: io::Error::new(io::ErrorKind::Unsupported, "exec is only available on Unix"),
    })
}

fn spawn_exit(invocation: &Invocation, force_exit: bool) -> Result<()> {
    let child = invocation
        .command()
        .spawn()
        .map_err(|source| ReloadError::ProcessReplacement {
            executable: invocation.executable.clone(),
            source,
        })?;

    info!(pid = child.id(), "spawned replacement process");

    if force_exit {
        std::process::exit(0);
    }

    interrupt_host().map_err(|source| ReloadError::ProcessReplacement {
        executable: invocation.executable.clone(),
        source,
    })
}

/// Ask the host to shut down the way Ctrl-C would.
#[cfg(unix)]
fn interrupt_host() -> io::Result<()> {
    // SAFETY: signalling our own pid has no memory-safety preconditions.
    let rc = unsafe { libc::kill(libc::getpid(), libc::SIGINT) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn interrupt_host() -> io::Result<()> {
    std::process::exit(0)
}
