//! nios2-gdb-server launch support
//!
//! Builds the server command line, supplies the GDB/MI command templates for
//! each session event, and supervises a running server process.
//!
//! The server prints `Listening on port 50003 for connection from GDB: ` once
//! it is ready and appends `accepted` when a debugger attaches.

use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, UblastError};

/// Executable names searched on PATH, in order
pub const EXECUTABLE_NAMES: &[&str] = &["nios2-gdb-server"];

/// Executable name used on Windows, where PATH is not searched
pub const WINDOWS_EXECUTABLE: &str = "nios2-gdb-server.exe";

/// Named ports each server session reserves
pub const PORTS_NEEDED: [&str; 3] = ["gdbPort", "swoPort", "consolePort"];

/// Captured server output is trimmed from the front beyond this size
const OUTPUT_LIMIT: usize = 64 * 1024;

/// Name of the GDB port for a processor; processor 0 uses the bare name
pub fn port_name(processor: u32) -> String {
    if processor == 0 {
        "gdbPort".to_string()
    } else {
        format!("gdbPort{}", processor)
    }
}

/// Ports reserved for one server session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerPorts {
    /// Processor the gdb port is registered for
    pub processor: u32,
    pub gdb: u16,
    /// Reserved, unused: the hardware has no SWO
    pub swo: u16,
    pub console: u16,
}

impl ServerPorts {
    /// Port registered under `name`; the gdb port answers to the name for
    /// its own processor only
    pub fn get(&self, name: &str) -> Option<u16> {
        match name {
            "swoPort" => Some(self.swo),
            "consolePort" => Some(self.console),
            _ if name == port_name(self.processor) => Some(self.gdb),
            _ => None,
        }
    }

    /// GDB port for `processor`, if this session serves it
    pub fn gdb_for(&self, processor: u32) -> Option<u16> {
        self.get(&port_name(processor))
    }
}

/// Port allocator: each session gets 3 consecutive ports (gdb, swo, console)
/// within `base..=WRAP_LIMIT`
#[derive(Debug)]
pub struct PortAllocator {
    base: u16,
    next_base: u16,
}

impl PortAllocator {
    pub const DEFAULT_BASE: u16 = 50000;
    const WRAP_LIMIT: u16 = 60000;
    /// Highest base leaving room for two sessions before wrapping
    pub const MAX_BASE: u16 = Self::WRAP_LIMIT - 2 * PORTS_NEEDED.len() as u16 + 1;

    pub fn new(base: u16) -> Result<Self> {
        if base == 0 || base > Self::MAX_BASE {
            return Err(UblastError::InvalidConfig(format!(
                "Base port {} out of range (1-{})",
                base,
                Self::MAX_BASE
            )));
        }
        Ok(Self { base, next_base: base })
    }

    pub fn allocate(&mut self, processor: u32) -> ServerPorts {
        let gdb = self.next_base;
        let span = PORTS_NEEDED.len() as u32;
        let next = gdb as u32 + span;
        self.next_base = if next + span - 1 > Self::WRAP_LIMIT as u32 {
            self.base
        } else {
            next as u16
        };
        ServerPorts {
            processor,
            gdb,
            swo: gdb + 1,
            console: gdb + 2,
        }
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self { base: Self::DEFAULT_BASE, next_base: Self::DEFAULT_BASE }
    }
}

/// Command line for nios2-gdb-server.
///
/// The server resets and halts the target on load and keeps listening after
/// a debugger disconnects. `-c` is only passed when a cable was resolved.
pub fn server_arguments(gdb_port: u16, cable: Option<&str>, extra_args: &[String]) -> Vec<String> {
    let mut args = vec![
        "--tcpport".to_string(),
        gdb_port.to_string(),
        "-r".to_string(),
        "--tcppersist".to_string(),
    ];
    if let Some(cable) = cable {
        args.push("-c".to_string());
        args.push(cable.to_string());
    }
    args.extend(extra_args.iter().cloned());
    args
}

/// Debugger session events that need front-end commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Init,
    Launch,
    Attach,
    Restart,
    Swo,
}

impl SessionEvent {
    /// GDB/MI commands to issue for this event
    pub fn commands(self, gdb_port: u16) -> Vec<String> {
        let target_select = format!("target-select extended-remote localhost:{}", gdb_port);
        match self {
            SessionEvent::Init => vec![target_select],
            SessionEvent::Launch => vec![r#"interpreter-exec console "load""#.to_string()],
            SessionEvent::Attach => Vec::new(),
            SessionEvent::Restart => vec![
                r#"interpreter-exec console "disconnect""#.to_string(),
                target_select,
            ],
            SessionEvent::Swo => Vec::new(),
        }
    }
}

impl FromStr for SessionEvent {
    type Err = UblastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "init" | "live-init" => Ok(SessionEvent::Init),
            "launch" => Ok(SessionEvent::Launch),
            "attach" => Ok(SessionEvent::Attach),
            "restart" => Ok(SessionEvent::Restart),
            "swo" | "rtt" => Ok(SessionEvent::Swo),
            other => Err(UblastError::InvalidConfig(format!(
                "Unknown session event '{}' (expected init, launch, attach, restart or swo)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Launch => write!(f, "launch"),
            Self::Attach => write!(f, "attach"),
            Self::Restart => write!(f, "restart"),
            Self::Swo => write!(f, "swo"),
        }
    }
}

fn ready_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Listening on port \d+ for connection from GDB: ").expect("valid banner regex")
    })
}

/// Whether the server output contains the listening banner
pub fn is_ready(output: &str) -> bool {
    ready_regex().is_match(output)
}

/// Whether a debugger has connected to the server
pub fn connection_accepted(output: &str) -> bool {
    output.contains("for connection from GDB: accepted")
}

/// Append to a capture buffer, dropping whole lines from the front past the limit
fn append_capped(buffer: &mut String, chunk: &str) {
    buffer.push_str(chunk);
    if buffer.len() <= OUTPUT_LIMIT {
        return;
    }
    let mut excess = buffer.len() - OUTPUT_LIMIT;
    while !buffer.is_char_boundary(excess) {
        excess += 1;
    }
    let cut = buffer[excess..].find('\n').map_or(excess, |pos| excess + pos + 1);
    buffer.drain(..cut);
}

fn spawn_reader<R>(mut reader: R, output: Arc<Mutex<String>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&buf[..n]);
                    debug!("nios2-gdb-server: {}", text.trim_end());
                    append_capped(&mut *output.lock().await, &text);
                }
                Err(e) => {
                    warn!("GDB server output read failed: {}", e);
                    break;
                }
            }
        }
    });
}

/// A running nios2-gdb-server process (killed on drop)
pub struct GdbServer {
    process: Child,
    output: Arc<Mutex<String>>,
}

impl GdbServer {
    /// Spawn the server and wait until it reports it is listening.
    pub async fn start(program: &Path, args: &[String], timeout: Duration) -> Result<Self> {
        info!("Starting GDB server: {} {}", program.display(), args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(|e| {
            UblastError::LaunchFailed(format!("Failed to spawn {}: {}", program.display(), e))
        })?;

        let output = Arc::new(Mutex::new(String::new()));
        if let Some(stdout) = process.stdout.take() {
            spawn_reader(stdout, output.clone());
        }
        if let Some(stderr) = process.stderr.take() {
            spawn_reader(stderr, output.clone());
        }

        let mut server = Self { process, output };
        server.wait_until_ready(timeout).await?;
        info!("GDB server listening");
        Ok(server)
    }

    /// Poll captured output for the banner, retrying with backoff
    async fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        let start = tokio::time::Instant::now();
        let mut delay = Duration::from_millis(50);

        loop {
            if is_ready(&self.output.lock().await) {
                return Ok(());
            }

            if let Some(status) = self.process.try_wait()? {
                let output = self.output().await;
                return Err(UblastError::LaunchFailed(format!(
                    "GDB server exited with {} before listening: {}",
                    status,
                    output.trim()
                )));
            }

            if start.elapsed() >= timeout {
                if let Err(e) = self.process.kill().await {
                    warn!("Kill after startup timeout: {}", e);
                }
                return Err(UblastError::ServerTimeout(timeout.as_secs()));
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_millis(500));
        }
    }

    /// Everything the server has printed so far (bounded)
    pub async fn output(&self) -> String {
        self.output.lock().await.clone()
    }

    /// Check if the server process is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }

    /// Stop the server
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down GDB server");
        if self.is_running() {
            self.process.kill().await?;
        }
        Ok(())
    }
}
