//! RMCP 0.3.2 implementation for ublast-debug MCP tools
//!
//! Provides 7 tools: cable discovery via jtagconfig, nios2-gdb-server
//! session management and GDB front-end command templates.

use rmcp::{
    tool, tool_router, tool_handler, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::*,
    ErrorData as McpError,
};
use serde::Serialize;
use tracing::{info, warn};
use std::future::Future;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::types::*;
use crate::config::Config;
use crate::error::UblastError;
use crate::gdb_server::{
    connection_accepted, port_name, server_arguments, GdbServer, PortAllocator, ServerPorts,
    SessionEvent,
};
use crate::jtag::{
    detect_cable, parse_chains, resolve_cable, CableSelector, ChainEnumerator, ChainRecord,
    Jtagconfig,
};

/// Running nios2-gdb-server session
struct ServerSession {
    #[allow(dead_code)]
    session_id: String,
    cable: Option<String>,
    ports: ServerPorts,
    server: GdbServer,
}

/// JSON view of one cable in `list_cables`
#[derive(Serialize)]
struct CableListing<'a> {
    #[serde(flatten)]
    record: &'a ChainRecord,
    valid: bool,
}

/// USB-Blaster debug tool handler
#[derive(Clone)]
pub struct UblastDebugToolHandler {
    #[allow(dead_code)]
    tool_router: ToolRouter<UblastDebugToolHandler>,
    config: Config,
    enumerator: Arc<dyn ChainEnumerator + Send + Sync>,
    sessions: Arc<RwLock<HashMap<String, Arc<tokio::sync::Mutex<ServerSession>>>>>,
    port_allocator: Arc<tokio::sync::Mutex<PortAllocator>>,
}

impl UblastDebugToolHandler {
    pub fn new(config: Config) -> Self {
        let jtagconfig = Jtagconfig::new(config.jtagconfig_program());
        Self::with_enumerator(config, jtagconfig)
    }

    /// Build a handler that reads chain listings from `enumerator`
    pub fn with_enumerator<E>(config: Config, enumerator: E) -> Self
    where
        E: ChainEnumerator + Send + Sync + 'static,
    {
        let port_allocator = PortAllocator::new(config.base_port).unwrap_or_else(|e| {
            warn!("{}, using default base port {}", e, PortAllocator::DEFAULT_BASE);
            PortAllocator::default()
        });
        Self {
            tool_router: Self::tool_router(),
            port_allocator: Arc::new(tokio::sync::Mutex::new(port_allocator)),
            config,
            enumerator: Arc::new(enumerator),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get a session by ID, returning an MCP error if not found
    async fn get_session(&self, session_id: &str) -> Result<Arc<tokio::sync::Mutex<ServerSession>>, McpError> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned().ok_or_else(|| {
            McpError::invalid_params(UblastError::SessionNotFound(session_id.to_string()).to_string(), None)
        })
    }

    /// Run blocking enumeration work off the async runtime
    async fn with_enumerator_blocking<T, F>(&self, f: F) -> Result<T, McpError>
    where
        F: FnOnce(&dyn ChainEnumerator) -> T + Send + 'static,
        T: Send + 'static,
    {
        let enumerator = self.enumerator.clone();
        tokio::task::spawn_blocking(move || f(enumerator.as_ref()))
            .await
            .map_err(|e| make_error(format!("Enumeration task failed: {}", e)))
    }

    /// Selector from tool arguments, falling back to configured defaults
    fn selector(
        &self,
        device: Option<String>,
        target_id: Option<String>,
        literal: bool,
    ) -> Result<Option<CableSelector>, McpError> {
        let Some(device) = device.or_else(|| self.config.default_device.clone()) else {
            return Ok(None);
        };
        let target_id = target_id.or_else(|| self.config.default_target_id.clone());

        let selector = if literal {
            CableSelector::literal(&device, target_id.as_deref())
        } else {
            CableSelector::from_config(&device, target_id.as_deref())
        };
        selector
            .map(Some)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))
    }

    /// Cable for a server launch. Never fails: problems only drop `-c`.
    async fn launch_cable(&self, selector: Option<CableSelector>) -> Result<Option<String>, McpError> {
        match selector {
            Some(selector) => {
                self.with_enumerator_blocking(move |enumerator| resolve_cable(enumerator, &selector))
                    .await
            }
            None => {
                warn!("No device pattern configured, starting without cable selection");
                Ok(None)
            }
        }
    }

    fn extra_args(&self, extra: Option<Vec<String>>) -> Vec<String> {
        let mut args = self.config.server_args.clone();
        args.extend(extra.unwrap_or_default());
        args
    }
}

impl Default for UblastDebugToolHandler {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn make_error(msg: impl Into<String>) -> McpError {
    McpError::internal_error(msg.into(), None)
}

/// Render a command line for display, quoting arguments with spaces
fn format_command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push_str(&format!("\"{}\"", arg));
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[tool_router]
impl UblastDebugToolHandler {
    // =========================================================================
    // Cable Discovery (2 tools)
    // =========================================================================

    #[tool(description = "List attached JTAG cables and the devices on each chain (runs jtagconfig)")]
    async fn list_cables(&self, Parameters(args): Parameters<ListCablesArgs>) -> Result<CallToolResult, McpError> {
        let raw = self
            .with_enumerator_blocking(|enumerator| enumerator.enumerate())
            .await?
            .map_err(|e| make_error(e.to_string()))?;

        let records = parse_chains(&raw);
        info!("jtagconfig reported {} cables", records.len());

        match args.format.as_str() {
            "json" => {
                let cables: Vec<CableListing> = records
                    .iter()
                    .map(|record| CableListing { record, valid: record.is_valid() })
                    .collect();
                let text = serde_json::to_string_pretty(&cables)
                    .map_err(|e| make_error(UblastError::from(e).to_string()))?;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            _ => {
                if records.is_empty() {
                    return Ok(CallToolResult::success(vec![Content::text(
                        "No JTAG cables found".to_string(),
                    )]));
                }
                let listing: Vec<String> = records.iter().map(|r| r.to_string()).collect();
                Ok(CallToolResult::success(vec![Content::text(format!(
                    "{} JTAG cables:\n\n{}",
                    records.len(),
                    listing.join("\n\n")
                ))]))
            }
        }
    }

    #[tool(description = "Find the JTAG cable whose chain carries the target device")]
    async fn select_cable(&self, Parameters(args): Parameters<SelectCableArgs>) -> Result<CallToolResult, McpError> {
        let selector = self
            .selector(args.device, args.target_id, args.literal)?
            .ok_or_else(|| McpError::invalid_params(
                "No device pattern specified and no default configured. Pass device parameter or use --device CLI flag.".to_string(),
                None,
            ))?;
        let pattern = selector.pattern().to_string();

        let cable = self
            .with_enumerator_blocking(move |enumerator| detect_cable(enumerator, &selector))
            .await?
            .map_err(|e| make_error(e.to_string()))?;

        let message = match cable {
            Some(cable) => format!("Selected cable: {}\nDevice pattern: {}", cable, pattern),
            None => format!(
                "No cable carries a device matching /{}/. The GDB server would start without -c.",
                pattern
            ),
        };
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    // =========================================================================
    // GDB Server (4 tools)
    // =========================================================================

    #[tool(description = "Preview the nios2-gdb-server command line, including the auto-detected cable")]
    async fn server_command(&self, Parameters(args): Parameters<ServerCommandArgs>) -> Result<CallToolResult, McpError> {
        let selector = self.selector(args.device, args.target_id, false)?;
        let cable = self.launch_cable(selector).await?;

        let gdb_port = args.gdb_port.unwrap_or(self.config.base_port);
        let extra_args = self.extra_args(args.extra_args);
        let server_args = server_arguments(gdb_port, cable.as_deref(), &extra_args);
        let program = self.config.server_executable();

        let message = format!(
            "{}\n\nCable: {}",
            format_command_line(&program.display().to_string(), &server_args),
            cable.as_deref().unwrap_or("(not detected, -c omitted)"),
        );
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    #[tool(description = "Start nios2-gdb-server on the auto-detected cable. Returns session_id for use with other tools.")]
    async fn start_server(&self, Parameters(args): Parameters<StartServerArgs>) -> Result<CallToolResult, McpError> {
        let selector = self.selector(args.device, args.target_id, false)?;
        let cable = self.launch_cable(selector).await?;

        let ports = {
            let mut allocator = self.port_allocator.lock().await;
            allocator.allocate(args.target_processor.unwrap_or(0))
        };

        let extra_args = self.extra_args(args.extra_args);
        let server_args = server_arguments(ports.gdb, cable.as_deref(), &extra_args);
        let program = self.config.server_executable();

        let server = GdbServer::start(&program, &server_args, Duration::from_secs(args.timeout_seconds))
            .await
            .map_err(|e| make_error(format!("GDB server start failed: {}", e)))?;

        let session_id = uuid::Uuid::new_v4().to_string();

        let session = ServerSession {
            session_id: session_id.clone(),
            cable: cable.clone(),
            ports,
            server,
        };

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(session_id.clone(), Arc::new(tokio::sync::Mutex::new(session)));
        }

        let message = format!(
            "GDB server listening\n\
             Session ID: {}\n\
             Cable: {}\n\
             GDB port ({}): {}\n\
             Init commands:\n  {}",
            session_id,
            cable.as_deref().unwrap_or("(not detected)"),
            port_name(ports.processor),
            ports.gdb,
            SessionEvent::Init.commands(ports.gdb).join("\n  "),
        );

        info!("Session {} created", session_id);
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    #[tool(description = "Stop nios2-gdb-server and release session")]
    async fn stop_server(&self, Parameters(args): Parameters<StopServerArgs>) -> Result<CallToolResult, McpError> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions.remove(&args.session_id)
        };

        match session {
            Some(session) => {
                let mut session = session.lock().await;
                if let Err(e) = session.server.shutdown().await {
                    warn!("Shutdown error (non-fatal): {}", e);
                }
                info!("Session {} stopped", args.session_id);
                Ok(CallToolResult::success(vec![Content::text(format!(
                    "Session {} stopped", args.session_id
                ))]))
            }
            None => Err(McpError::invalid_params(
                UblastError::SessionNotFound(args.session_id).to_string(),
                None,
            )),
        }
    }

    #[tool(description = "Get status and captured output of a GDB server session")]
    async fn server_status(&self, Parameters(args): Parameters<ServerStatusArgs>) -> Result<CallToolResult, McpError> {
        let session = self.get_session(&args.session_id).await?;
        let mut session = session.lock().await;

        let running = session.server.is_running();
        let output = session.server.output().await;

        let message = format!(
            "Session {}\n\
             Running: {}\n\
             Debugger connected: {}\n\
             Cable: {}\n\
             Ports: {}={} swoPort={} consolePort={}\n\n\
             Output:\n{}",
            args.session_id,
            running,
            connection_accepted(&output),
            session.cable.as_deref().unwrap_or("(not detected)"),
            port_name(session.ports.processor),
            session.ports.gdb,
            session.ports.swo,
            session.ports.console,
            output.trim(),
        );
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    // =========================================================================
    // Debugger Front-End (1 tool)
    // =========================================================================

    #[tool(description = "GDB/MI commands for a session event: init, launch, attach, restart or swo")]
    async fn gdb_commands(&self, Parameters(args): Parameters<GdbCommandsArgs>) -> Result<CallToolResult, McpError> {
        let event: SessionEvent = args
            .event
            .parse()
            .map_err(|e: UblastError| McpError::invalid_params(e.to_string(), None))?;

        let gdb_port = match (&args.session_id, args.gdb_port) {
            (Some(session_id), _) => {
                let ports = self.get_session(session_id).await?.lock().await.ports;
                let processor = args.target_processor.unwrap_or(ports.processor);
                ports.gdb_for(processor).ok_or_else(|| {
                    McpError::invalid_params(
                        format!("Session {} has no {} port", session_id, port_name(processor)),
                        None,
                    )
                })?
            }
            (None, Some(port)) => port,
            (None, None) => {
                return Err(McpError::invalid_params(
                    "Pass session_id or gdb_port".to_string(),
                    None,
                ));
            }
        };

        let commands = event.commands(gdb_port);
        let message = if commands.is_empty() {
            format!("No commands for {}", event)
        } else {
            commands.join("\n")
        };
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }
}

const TOOL_COUNT: usize = 7;

#[tool_handler]
impl ServerHandler for UblastDebugToolHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "USB-Blaster Debug MCP Server - jtagconfig cable discovery and nios2-gdb-server sessions. \
                 {} tools available: list_cables, select_cable, server_command, start_server, \
                 stop_server, server_status, gdb_commands.",
                TOOL_COUNT,
            )),
        }
    }
}
