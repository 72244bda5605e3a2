use anyhow::{bail, Context, Result};
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Lock file that keeps a second supervisor off the same directory
pub const LOCK_FILENAME: &str = ".headliner.lock";

/// How often the child and the shutdown flag are checked
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct RestartPolicy {
    /// Pause before starting the child again
    pub interval: Duration,
    /// Give up after this many restarts; `None` restarts forever
    pub max_restarts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy {
            interval: Duration::from_secs(30),
            max_restarts: None,
        }
    }
}

/// Keeps one child run alive for a target directory until it exits cleanly
pub struct Supervisor {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub directory: PathBuf,
    pub policy: RestartPolicy,
    pub log_file: PathBuf,
    /// Set from a signal handler; the child is killed and the lock released
    pub shutdown: Arc<AtomicBool>,
}

/// Removes the lock file when the supervisor finishes
struct DirectoryLock {
    path: PathBuf,
}

impl DirectoryLock {
    fn acquire(directory: &Path) -> Result<Self> {
        let path = directory.join(LOCK_FILENAME);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_context(|| {
                format!(
                    "Another supervisor appears to be running for {} (remove {} if stale)",
                    directory.display(),
                    path.display()
                )
            })?;
        writeln!(file, "{}", std::process::id())
            .with_context(|| format!("Failed to write lock file {}", path.display()))?;
        Ok(DirectoryLock { path })
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

impl Supervisor {
    /// Run the child, restarting it after each unsuccessful exit.
    ///
    /// Returns the number of restarts once the child exits successfully.
    pub fn run(&self) -> Result<u32> {
        let _lock = DirectoryLock::acquire(&self.directory)?;
        let mut restarts = 0;

        loop {
            let status = match self.spawn_and_wait()? {
                Some(status) => status,
                None => bail!("Interrupted; stopped child for {}", self.directory.display()),
            };
            if status.success() {
                info!("{} finished after {} restarts", self.directory.display(), restarts);
                return Ok(restarts);
            }

            if self.policy.max_restarts.is_some_and(|max| restarts >= max) {
                bail!(
                    "Giving up on {} after {} restarts (last exit: {})",
                    self.directory.display(),
                    restarts,
                    status
                );
            }

            restarts += 1;
            self.log_restart(restarts, &status)?;
            warn!("Child exited with {}, restarting in {:?}", status, self.policy.interval);
            if !self.pause(self.policy.interval) {
                bail!("Interrupted while waiting to restart {}", self.directory.display());
            }
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`; false if shutdown was requested meanwhile
    fn pause(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if self.is_shutting_down() {
                return false;
            }
            thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
        }
        !self.is_shutting_down()
    }

    /// Run the child once; `None` when it was killed because of shutdown
    fn spawn_and_wait(&self) -> Result<Option<ExitStatus>> {
        if self.is_shutting_down() {
            return Ok(None);
        }

        info!("Starting {} for {}", self.program.display(), self.directory.display());
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;

        loop {
            let finished = child
                .try_wait()
                .with_context(|| format!("Failed to wait for {}", self.program.display()))?;
            if let Some(status) = finished {
                return Ok(Some(status));
            }
            if self.is_shutting_down() {
                self.stop_child(&mut child);
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn stop_child(&self, child: &mut Child) {
        info!("Stopping child {} for {}", child.id(), self.directory.display());
        if let Err(e) = child.kill() {
            warn!("Failed to kill child {}: {}", child.id(), e);
        }
        if let Err(e) = child.wait() {
            warn!("Failed to reap child {}: {}", child.id(), e);
        }
    }

    fn log_restart(&self, restart: u32, status: &ExitStatus) -> Result<()> {
        let mut file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open restart log {}", self.log_file.display()))?;

        writeln!(
            file,
            "{} restart #{} for {} (previous exit: {})",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            restart,
            self.directory.display(),
            status
        )
        .with_context(|| format!("Failed to write restart log {}", self.log_file.display()))
    }
}
