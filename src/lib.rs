//! USB-Blaster Debug MCP Server
//!
//! A Model Context Protocol server for Nios II debugging through Intel FPGA
//! download cables. Finds the cable wired to the target by parsing `jtagconfig`
//! output, then launches `nios2-gdb-server` on that cable.

pub mod config;
pub mod error;
pub mod gdb_server;
pub mod jtag;
pub mod tools;

pub use config::{Args, Config};
pub use error::{Result, UblastError};
pub use tools::UblastDebugToolHandler;
