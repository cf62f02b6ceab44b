//! ublast-debug MCP tools module
//!
//! This module provides a unified tool handler for USB-Blaster cable discovery
//! and nios2-gdb-server sessions using the RMCP 0.3.2 API patterns.

pub mod types;
pub mod ublast_tools;

pub use types::*;
pub use ublast_tools::*;
