//! Spawning a fresh process image with a prepared environment
//!
//! - Environment: inherited snapshot, overrides, then the bootstrap record
//! - Descriptors: everything the executor creates is close-on-exec; a descriptor
//!   meant for the child is re-installed at a reserved number by a spawn file
//!   action, which clears close-on-exec in the child only
//! - Arguments: only `argv[0]`, no positional arguments

use log::debug;
use nix::unistd::Pid;
use reexec_core::{BOOTSTRAP_VAR, ExecError, Result, this_process};
use std::ffi::{CString, OsStr, OsString};
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Image to spawn; `None` spawns the running executable
    pub program: Option<PathBuf>,
    /// Environment overrides applied on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Whether the child starts from a copy of the current environment
    pub inherit_env: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: None,
            env: Vec::new(),
            inherit_env: true,
        }
    }
}

impl ExecutorConfig {
    /// Path of the image the child will run
    pub fn resolve_program(&self) -> Result<PathBuf> {
        match &self.program {
            Some(program) => Ok(program.clone()),
            None => Ok(this_process::filename()?.to_path_buf()),
        }
    }

    /// Environment for a child whose bootstrap record is `record`
    pub fn prepare_environment(&self, record: &str) -> Vec<(OsString, OsString)> {
        let mut env = if self.inherit_env {
            this_process::environment()
        } else {
            Vec::new()
        };

        for (key, value) in &self.env {
            set_variable(&mut env, key, value);
        }
        set_variable(&mut env, BOOTSTRAP_VAR, record);

        env
    }
}

/// Replace `key` in place if present, append it otherwise
pub fn set_variable(
    env: &mut Vec<(OsString, OsString)>,
    key: impl AsRef<OsStr>,
    value: impl AsRef<OsStr>,
) {
    let key = key.as_ref();
    let value = value.as_ref().to_os_string();

    if let Some((_, existing)) = env.iter_mut().find(|(k, _)| k.as_os_str() == key) {
        *existing = value;
    } else {
        env.push((key.to_os_string(), value));
    }
}

/// A descriptor that crosses into exactly one spawned child
///
/// Holds the close-on-exec source and a close-on-exec duplicate whose number is
/// reserved for the child. Dropping it closes both in this process.
#[derive(Debug)]
pub struct InheritedFd {
    source: OwnedFd,
    reserved: OwnedFd,
}

impl InheritedFd {
    pub fn new(source: OwnedFd) -> Result<Self> {
        // try_clone duplicates with F_DUPFD_CLOEXEC
        let reserved = source
            .try_clone()
            .map_err(|e| ExecError::Spawn(format!("cannot reserve descriptor: {}", e)))?;

        Ok(Self { source, reserved })
    }

    /// Descriptor number the child will find this descriptor at
    pub fn target(&self) -> RawFd {
        self.reserved.as_raw_fd()
    }

    fn source(&self) -> RawFd {
        self.source.as_raw_fd()
    }
}

struct FileActions {
    raw: libc::posix_spawn_file_actions_t,
}

impl FileActions {
    fn new() -> Result<Self> {
        let mut raw = MaybeUninit::<libc::posix_spawn_file_actions_t>::uninit();

        // SAFETY: init fully initializes the object on success
        let rc = unsafe { libc::posix_spawn_file_actions_init(raw.as_mut_ptr()) };
        if rc != 0 {
            return Err(os_error("posix_spawn_file_actions_init", rc));
        }

        // SAFETY: initialized by the successful call above
        Ok(Self {
            raw: unsafe { raw.assume_init() },
        })
    }

    fn add_dup2(&mut self, fd: RawFd, target: RawFd) -> Result<()> {
        // SAFETY: raw was initialized in new() and is destroyed only in drop()
        let rc = unsafe { libc::posix_spawn_file_actions_adddup2(&mut self.raw, fd, target) };
        if rc != 0 {
            return Err(os_error("posix_spawn_file_actions_adddup2", rc));
        }
        Ok(())
    }
}

impl Drop for FileActions {
    fn drop(&mut self) {
        // SAFETY: raw was initialized in new()
        unsafe {
            libc::posix_spawn_file_actions_destroy(&mut self.raw);
        }
    }
}

fn os_error(call: &str, rc: i32) -> ExecError {
    ExecError::Spawn(format!(
        "{} failed: {}",
        call,
        std::io::Error::from_raw_os_error(rc)
    ))
}

fn env_entry(key: &OsStr, value: &OsStr) -> Result<CString> {
    let mut entry = Vec::with_capacity(key.len() + value.len() + 1);
    entry.extend_from_slice(key.as_bytes());
    entry.push(b'=');
    entry.extend_from_slice(value.as_bytes());

    CString::new(entry).map_err(|_| {
        ExecError::Spawn(format!(
            "environment variable {} contains a nul byte",
            key.to_string_lossy()
        ))
    })
}

/// Spawn `program` with exactly `env` and the given inherited descriptors
pub fn spawn_image(
    program: &Path,
    env: &[(OsString, OsString)],
    inherited: &[&InheritedFd],
) -> Result<Pid> {
    let program_cstring = CString::new(program.as_os_str().as_bytes())
        .map_err(|_| ExecError::Spawn("program path contains nul byte".to_string()))?;

    let env_cstrings = env
        .iter()
        .map(|(key, value)| env_entry(key, value))
        .collect::<Result<Vec<_>>>()?;

    let argv: [*mut libc::c_char; 2] = [program_cstring.as_ptr() as *mut _, ptr::null_mut()];
    let mut envp: Vec<*mut libc::c_char> = env_cstrings
        .iter()
        .map(|entry| entry.as_ptr() as *mut _)
        .collect();
    envp.push(ptr::null_mut());

    let mut actions = FileActions::new()?;
    for fd in inherited {
        actions.add_dup2(fd.source(), fd.target())?;
    }

    let mut child: libc::pid_t = 0;

    // SAFETY: every pointer refers to a nul-terminated buffer that outlives the
    // call, and both pointer arrays end with a null entry.
    let rc = unsafe {
        libc::posix_spawn(
            &mut child,
            program_cstring.as_ptr(),
            &actions.raw,
            ptr::null(),
            argv.as_ptr(),
            envp.as_ptr(),
        )
    };

    if rc != 0 {
        return Err(ExecError::Spawn(format!(
            "posix_spawn {} failed: {}",
            program.display(),
            std::io::Error::from_raw_os_error(rc)
        )));
    }

    debug!(
        "posix_spawn {} -> pid {} ({} env vars, {} inherited fds)",
        program.display(),
        child,
        env_cstrings.len(),
        inherited.len()
    );

    Ok(Pid::from_raw(child))
}
