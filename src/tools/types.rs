//! Type definitions for ublast-debug MCP tools

use serde::Deserialize;
use schemars::JsonSchema;

// ============================================================================
// list_cables
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListCablesArgs {
    /// Output format: "text" (default), "json"
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String { "text".to_string() }

// ============================================================================
// select_cable
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectCableArgs {
    /// Device name pattern (regex, e.g. "10CX220Y"). Uses default from config if omitted.
    #[serde(default)]
    pub device: Option<String>,
    /// Index among cables carrying a matching device (e.g. "1"). Uses default from config if omitted.
    #[serde(default)]
    pub target_id: Option<String>,
    /// Match the device name verbatim instead of as a regex
    #[serde(default)]
    pub literal: bool,
}

// ============================================================================
// server_command
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ServerCommandArgs {
    /// Device name pattern (regex). Uses default from config if omitted.
    #[serde(default)]
    pub device: Option<String>,
    /// Index among cables carrying a matching device
    #[serde(default)]
    pub target_id: Option<String>,
    /// GDB port for --tcpport (default: configured base port)
    #[serde(default)]
    pub gdb_port: Option<u16>,
    /// Extra nios2-gdb-server arguments
    #[serde(default)]
    pub extra_args: Option<Vec<String>>,
}

// ============================================================================
// start_server
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StartServerArgs {
    /// Device name pattern (regex). Uses default from config if omitted.
    #[serde(default)]
    pub device: Option<String>,
    /// Index among cables carrying a matching device
    #[serde(default)]
    pub target_id: Option<String>,
    /// Extra nios2-gdb-server arguments
    #[serde(default)]
    pub extra_args: Option<Vec<String>>,
    /// Processor the GDB port serves; 0 (default) registers "gdbPort", n registers "gdbPort<n>"
    #[serde(default)]
    pub target_processor: Option<u32>,
    /// Seconds to wait for the server to start listening (default: 10)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 { 10 }

// ============================================================================
// stop_server
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StopServerArgs {
    /// Session ID to stop
    pub session_id: String,
}

// ============================================================================
// server_status
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ServerStatusArgs {
    /// Session ID
    pub session_id: String,
}

// ============================================================================
// gdb_commands
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GdbCommandsArgs {
    /// Session event: "init", "launch", "attach", "restart" or "swo"
    pub event: String,
    /// Session whose GDB port the commands target
    #[serde(default)]
    pub session_id: Option<String>,
    /// GDB port to use when no session is given
    #[serde(default)]
    pub gdb_port: Option<u16>,
    /// Processor whose GDB port to use (default: the one the session was started for)
    #[serde(default)]
    pub target_processor: Option<u32>,
}
