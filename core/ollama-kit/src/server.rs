//! Supervision of one spawned `ollama serve` process.
//!
//! An [`OllamaServer`] is a cheap clonable handle. The child itself is owned
//! by a monitor task, which either observes the child exiting on its own or
//! terminates it when [`OllamaServer::stop`] asks it to. Termination sends
//! `SIGTERM` on unix and escalates to a kill once the stop timeout runs out.
//! Output lines are forwarded to an optional [`ServerLogCallback`] and to
//! `tracing` at debug level.
//!
//! ## States
//!
//! ```text
//! NotStarted --start--> Starting --mark_running--> Running
//!      |                   |                          |
//!      +-------------------+----------stop------------+--> Stopped
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Lifecycle of a server handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    /// Created, nothing spawned yet.
    NotStarted,
    /// Spawned, readiness not yet confirmed.
    Starting,
    /// Spawned and answered a health probe.
    Running,
    /// Stopped. Terminal.
    Stopped,
}

impl ServerState {
    /// Returns the lowercase state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which output stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl LogStream {
    /// Returns `"stdout"` or `"stderr"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// One line of server output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLog {
    /// Originating stream.
    pub stream: LogStream,
    /// The line, without its terminator.
    pub line: String,
}

/// Callback receiving server output lines.
pub type ServerLogCallback = Arc<dyn Fn(ServerLog) + Send + Sync>;

/// Default grace period between `SIGTERM` and a forced kill.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct TrackedProcess {
    pid: Option<u32>,
    kill: oneshot::Sender<()>,
    monitor: JoinHandle<()>,
}

type ProcessSlot = Arc<Mutex<Option<TrackedProcess>>>;

struct Inner {
    bin_path: PathBuf,
    log: Option<ServerLogCallback>,
    stop_timeout: Duration,
    state: Mutex<ServerState>,
    process: ProcessSlot,
}

/// Handle to one `ollama serve` child process.
#[derive(Clone)]
pub struct OllamaServer {
    inner: Arc<Inner>,
}

impl fmt::Debug for OllamaServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaServer")
            .field("bin_path", &self.inner.bin_path)
            .field("state", &self.state())
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

impl OllamaServer {
    /// Creates a handle for the install directory `bin_path`. Nothing is spawned.
    #[must_use]
    pub fn new(bin_path: impl Into<PathBuf>, log: Option<ServerLogCallback>) -> Self {
        Self::with_stop_timeout(bin_path, log, DEFAULT_STOP_TIMEOUT)
    }

    /// Like [`OllamaServer::new`] with a custom stop timeout.
    #[must_use]
    pub fn with_stop_timeout(
        bin_path: impl Into<PathBuf>,
        log: Option<ServerLogCallback>,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                bin_path: bin_path.into(),
                log,
                stop_timeout,
                state: Mutex::new(ServerState::NotStarted),
                process: Arc::new(Mutex::new(None)),
            }),
        }
    }

    /// Returns the install directory the server runs from.
    #[must_use]
    pub fn bin_path(&self) -> &Path {
        &self.inner.bin_path
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.lock_state()
    }

    /// Returns the OS process id while a child is tracked.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.lock_process().as_ref().and_then(|p| p.pid)
    }

    /// Returns whether a child is currently tracked.
    ///
    /// Becomes `false` after [`stop`](Self::stop) or once the child exits on
    /// its own.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.lock_process().is_some()
    }

    /// Spawns `<bin_path>/<executable> serve` with `bin_path` as working directory.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidServerState`] unless the handle is `NotStarted`
    /// - [`Error::Spawn`] if the executable cannot be launched
    pub fn start(&self, executable: &str) -> Result<()> {
        let mut state = self.lock_state();
        if *state != ServerState::NotStarted {
            return Err(Error::InvalidServerState {
                state: state.as_str(),
                action: "start",
            });
        }

        let exe = self.inner.bin_path.join(executable);
        let mut child = Command::new(&exe)
            .arg("serve")
            .current_dir(&self.inner.bin_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                path: exe.clone(),
                source,
            })?;

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, LogStream::Stdout, self.inner.log.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, LogStream::Stderr, self.inner.log.clone());
        }

        let (kill, kill_rx) = oneshot::channel();
        {
            let mut slot = self.lock_process();
            let monitor = tokio::spawn(monitor(
                child,
                kill_rx,
                Arc::clone(&self.inner.process),
                pid,
                self.inner.stop_timeout,
            ));
            *slot = Some(TrackedProcess { pid, kill, monitor });
        }

        *state = ServerState::Starting;
        tracing::info!(?pid, exe = %exe.display(), "spawned Ollama server");
        Ok(())
    }

    /// Stops the tracked child, if any, and moves to `Stopped`.
    ///
    /// The child gets `SIGTERM` and the stop timeout to exit before it is
    /// killed. Returns once the child has been reaped. Calling `stop` again is
    /// a no-op.
    pub async fn stop(&self) {
        let tracked = self.lock_process().take();

        if let Some(TrackedProcess { pid, kill, monitor }) = tracked {
            // The monitor is gone if the child already exited.
            let _ = kill.send(());
            match monitor.await {
                Ok(()) => tracing::info!(?pid, "stopped Ollama server"),
                Err(e) => tracing::warn!(?pid, error = %e, "server monitor task failed"),
            }
        }

        *self.lock_state() = ServerState::Stopped;
    }

    /// Records a successful readiness probe.
    pub(crate) fn mark_running(&self) {
        let mut state = self.lock_state();
        if *state == ServerState::Starting {
            *state = ServerState::Running;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ServerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_process(&self) -> MutexGuard<'_, Option<TrackedProcess>> {
        self.inner
            .process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

async fn monitor(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    slot: ProcessSlot,
    pid: Option<u32>,
    grace: Duration,
) {
    tokio::select! {
        status = child.wait() => {
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            match status {
                Ok(status) => tracing::warn!(?pid, %status, "Ollama server exited"),
                Err(e) => tracing::warn!(?pid, error = %e, "failed to wait for Ollama server"),
            }
        }
        _ = kill_rx => {
            if let Err(e) = terminate(&mut child) {
                tracing::warn!(?pid, error = %e, "failed to signal Ollama server");
            }
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(?pid, %status, "Ollama server exited"),
                Ok(Err(e)) => tracing::warn!(?pid, error = %e, "failed to wait for Ollama server"),
                Err(_) => {
                    tracing::warn!(?pid, ?grace, "Ollama server did not exit in time, killing");
                    if let Err(e) = child.kill().await {
                        tracing::warn!(?pid, error = %e, "failed to kill Ollama server");
                    }
                }
            }
        }
    }
}

/// Asks the child to shut down.
#[cfg(unix)]
fn terminate(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = libc::pid_t::try_from(pid).map_err(io::Error::other)?;
    // SAFETY: `pid` is a child of this process that has not been reaped yet.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

fn forward_lines<R>(reader: R, stream: LogStream, log: Option<ServerLogCallback>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(stream = stream.as_str(), "{line}");
            if let Some(log) = &log {
                log(ServerLog { stream, line });
            }
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;

    fn fake_ollama(script: &str) -> TempDir {
        let temp = TempDir::new().unwrap();
        let exe = temp.path().join("ollama");
        std::fs::write(&exe, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        temp
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn start_then_stop() {
        let temp = fake_ollama("exec sleep 30");
        let server = OllamaServer::new(temp.path(), None);
        assert_eq!(server.state(), ServerState::NotStarted);

        server.start("ollama").unwrap();
        assert_eq!(server.state(), ServerState::Starting);
        assert!(server.pid().is_some());
        assert!(server.is_tracking());

        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(!server.is_tracking());
        assert_eq!(server.pid(), None);

        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let temp = fake_ollama("exec sleep 30");
        let server = OllamaServer::new(temp.path(), None);
        server.start("ollama").unwrap();

        let err = server.start("ollama").unwrap_err();
        assert_eq!(err.to_string(), "server is starting, cannot start");

        server.stop().await;
        assert!(matches!(
            server.start("ollama"),
            Err(Error::InvalidServerState { state: "stopped", .. })
        ));
    }

    #[tokio::test]
    async fn mark_running_only_from_starting() {
        let temp = fake_ollama("exec sleep 30");
        let server = OllamaServer::new(temp.path(), None);
        server.mark_running();
        assert_eq!(server.state(), ServerState::NotStarted);

        server.start("ollama").unwrap();
        server.mark_running();
        assert_eq!(server.state(), ServerState::Running);

        server.stop().await;
        server.mark_running();
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn output_lines_reach_callback() {
        let temp = fake_ollama(concat!(
            "echo \"listening on 127.0.0.1:11434\"\n",
            "echo \"gpu not found\" >&2\n",
            "exec sleep 30",
        ));
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let log: ServerLogCallback = Arc::new(move |entry| sink.lock().unwrap().push(entry));
        let server = OllamaServer::new(temp.path(), Some(log));

        server.start("ollama").unwrap();
        assert!(wait_until(|| lines.lock().unwrap().len() >= 2).await);
        server.stop().await;

        let lines = lines.lock().unwrap();
        assert!(lines.contains(&ServerLog {
            stream: LogStream::Stdout,
            line: "listening on 127.0.0.1:11434".to_string(),
        }));
        assert!(lines.contains(&ServerLog {
            stream: LogStream::Stderr,
            line: "gpu not found".to_string(),
        }));
    }

    #[tokio::test]
    async fn unexpected_exit_clears_tracking() {
        let temp = fake_ollama("exit 3");
        let server = OllamaServer::new(temp.path(), None);
        server.start("ollama").unwrap();

        assert!(wait_until(|| !server.is_tracking()).await);
        assert_eq!(server.state(), ServerState::Starting);

        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn runs_in_bin_directory() {
        let temp = fake_ollama("pwd > cwd.txt\nexec sleep 30");
        let server = OllamaServer::new(temp.path(), None);
        server.start("ollama").unwrap();

        let marker = temp.path().join("cwd.txt");
        let written = || std::fs::read_to_string(&marker).is_ok_and(|s| !s.is_empty());
        assert!(wait_until(written).await);
        server.stop().await;

        let cwd = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(
            std::fs::canonicalize(cwd.trim()).unwrap(),
            std::fs::canonicalize(temp.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn missing_executable_is_spawn_error() {
        let temp = TempDir::new().unwrap();
        let server = OllamaServer::new(temp.path(), None);

        let err = server.start("bin/ollama").unwrap_err();

        assert!(matches!(err, Error::Spawn { path, .. } if path == temp.path().join("bin/ollama")));
        assert_eq!(server.state(), ServerState::NotStarted);
        assert!(!server.is_tracking());
    }

    #[tokio::test]
    async fn stop_sends_sigterm_before_killing() {
        let temp = fake_ollama(concat!(
            "trap 'echo term > term.txt; exit 0' TERM\n",
            "echo ready\n",
            "while true; do sleep 0.05; done",
        ));
        let ready = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ready);
        let log: ServerLogCallback = Arc::new(move |_| *flag.lock().unwrap() = true);
        let grace = Duration::from_secs(5);
        let server = OllamaServer::with_stop_timeout(temp.path(), Some(log), grace);

        server.start("ollama").unwrap();
        assert!(wait_until(|| *ready.lock().unwrap()).await);
        server.stop().await;

        let marker = std::fs::read_to_string(temp.path().join("term.txt")).unwrap();
        assert_eq!(marker.trim(), "term");
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn stop_kills_after_grace_period() {
        let temp = fake_ollama(concat!(
            "trap '' TERM\n",
            "echo ready\n",
            "while true; do sleep 0.05; done",
        ));
        let ready = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ready);
        let log: ServerLogCallback = Arc::new(move |_| *flag.lock().unwrap() = true);
        let grace = Duration::from_millis(300);
        let server = OllamaServer::with_stop_timeout(temp.path(), Some(log), grace);

        server.start("ollama").unwrap();
        assert!(wait_until(|| *ready.lock().unwrap()).await);
        let pid = libc::pid_t::try_from(server.pid().unwrap()).unwrap();

        let started = Instant::now();
        server.stop().await;
        let elapsed = started.elapsed();

        assert!(elapsed >= grace);
        assert!(elapsed < Duration::from_secs(5));
        assert!(!server.is_tracking());
        // The child has been reaped, so the pid no longer exists.
        assert_ne!(unsafe { libc::kill(pid, 0) }, 0);
    }

    #[tokio::test]
    async fn clones_share_one_process() {
        let temp = fake_ollama("exec sleep 30");
        let server = OllamaServer::new(temp.path(), None);
        let other = server.clone();
        server.start("ollama").unwrap();
        assert_eq!(other.pid(), server.pid());

        other.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
    }
}
