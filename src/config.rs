//! Configuration for the ublast-debug MCP server

use std::path::PathBuf;
use clap::Parser;

use crate::gdb_server::{PortAllocator, EXECUTABLE_NAMES, WINDOWS_EXECUTABLE};
use crate::jtag::JTAGCONFIG_NAME;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "ublast-debug")]
#[command(about = "MCP server for Nios II debugging via USB-Blaster and nios2-gdb-server")]
#[command(version)]
pub struct Args {
    /// Path to jtagconfig binary (defaults to searching PATH)
    #[arg(long)]
    pub jtagconfig_path: Option<PathBuf>,

    /// Path to nios2-gdb-server binary (defaults to searching PATH)
    #[arg(long)]
    pub server_path: Option<PathBuf>,

    /// Default device name pattern (regex), e.g. "10CX220Y"
    #[arg(long)]
    pub device: Option<String>,

    /// Default index among cables carrying a matching device
    #[arg(long)]
    pub target_id: Option<String>,

    /// Extra argument passed to nios2-gdb-server (repeatable)
    #[arg(long = "server-arg", allow_hyphen_values = true)]
    pub server_args: Vec<String>,

    /// First port handed out to GDB server sessions (1-59995)
    #[arg(long, default_value_t = PortAllocator::DEFAULT_BASE)]
    pub base_port: u16,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log file path (defaults to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to jtagconfig binary
    pub jtagconfig_path: Option<PathBuf>,
    /// Path to nios2-gdb-server binary
    pub server_path: Option<PathBuf>,
    /// Device pattern used when a tool call does not name one
    pub default_device: Option<String>,
    /// Preferred cable index used when a tool call does not name one
    pub default_target_id: Option<String>,
    /// Appended to every server command line
    pub server_args: Vec<String>,
    pub base_port: u16,
}

impl Config {
    /// Build the runtime config, rejecting a base port that leaves no room
    /// for distinct sessions
    pub fn from_args(args: &Args) -> crate::error::Result<Self> {
        PortAllocator::new(args.base_port)?;
        Ok(Self {
            jtagconfig_path: args.jtagconfig_path.clone(),
            server_path: args.server_path.clone(),
            default_device: args.device.clone(),
            default_target_id: args.target_id.clone(),
            server_args: args.server_args.clone(),
            base_port: args.base_port,
        })
    }

    /// jtagconfig binary: config, then PATH, then the bare name
    pub fn jtagconfig_program(&self) -> PathBuf {
        if let Some(path) = &self.jtagconfig_path {
            return path.clone();
        }
        which(JTAGCONFIG_NAME).unwrap_or_else(|_| PathBuf::from(JTAGCONFIG_NAME))
    }

    /// nios2-gdb-server binary: config, then the Windows name or the first
    /// known name on PATH, then the bare name
    pub fn server_executable(&self) -> PathBuf {
        if let Some(path) = &self.server_path {
            return path.clone();
        }
        if cfg!(windows) {
            return PathBuf::from(WINDOWS_EXECUTABLE);
        }
        EXECUTABLE_NAMES
            .iter()
            .find_map(|name| which(name).ok())
            .unwrap_or_else(|| PathBuf::from(EXECUTABLE_NAMES[0]))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jtagconfig_path: None,
            server_path: None,
            default_device: None,
            default_target_id: None,
            server_args: Vec::new(),
            base_port: PortAllocator::DEFAULT_BASE,
        }
    }
}

/// Find an executable on PATH (simple which implementation)
fn which(name: &str) -> Result<PathBuf, ()> {
    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_which_finds_sh() {
        assert!(which("sh").is_ok());
    }

    #[test]
    fn test_which_nonexistent() {
        assert!(which("nonexistent_binary_12345").is_err());
    }

    #[test]
    fn test_configured_server_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let server = dir.path().join("nios2-gdb-server");
        std::fs::write(&server, "").unwrap();

        let config = Config {
            server_path: Some(server.clone()),
            ..Config::default()
        };
        assert_eq!(config.server_executable(), server);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_server_executable_falls_back_to_name() {
        let config = Config::default();
        let exe = config.server_executable();
        assert_eq!(exe.file_name().unwrap(), "nios2-gdb-server");
    }

    #[test]
    fn test_from_args_rejects_base_port_near_limit() {
        for base in ["0", "59998", "65535"] {
            let args = Args::parse_from(["ublast-debug", "--base-port", base]);
            assert!(matches!(
                Config::from_args(&args),
                Err(crate::error::UblastError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_jtagconfig_program() {
        let config = Config {
            jtagconfig_path: Some(PathBuf::from("/opt/intelFPGA/quartus/bin/jtagconfig")),
            ..Config::default()
        };
        assert_eq!(config.jtagconfig_program(), PathBuf::from("/opt/intelFPGA/quartus/bin/jtagconfig"));

        let default = Config::default().jtagconfig_program();
        assert_eq!(default.file_name().unwrap(), JTAGCONFIG_NAME);
    }
}
