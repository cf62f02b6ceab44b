//! Parser for `jtagconfig` chain listings
//!
//! `jtagconfig` prints one block per attached cable, separated by blank lines:
//!
//! ```text
//! 1) USB-BlasterII [1-6.2]
//!   02E120DD   10CX220Y
//!
//! 2) USB-BlasterII [1-6.3]
//!   Unable to read device chain - JTAG chain broken
//! ```
//!
//! The first line of a block names the cable, each following line is either a
//! device on the chain (IDCODE and device name) or an error explaining why the
//! chain could not be read. Anything else is decoration and is skipped.

use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use regex::Regex;

/// `<index>) <cable name>`
fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d+)\)\s+(.*)$").expect("valid header regex"))
}

/// Indented IDCODE followed by a device name, which may contain spaces. The
/// name ends at the first parenthesis, so a variant suffix such as `(A|C)` is
/// not part of it.
fn node_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s+([0-9A-Za-z]+)\s+([^()]*[^()\s])").expect("valid node regex")
    })
}

/// Separator of `<error> - <reason>` lines; such a line is never a node
const ERROR_SEPARATOR: &str = " - ";

/// `<error> - <reason>`, split at the last separator
fn error_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*) - (.*)$").expect("valid error regex"))
}

/// One device detected on a cable's JTAG chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainNode {
    /// JTAG IDCODE as printed, e.g. `02E120DD`
    pub identifier: String,
    /// Device name, e.g. `10CX220Y`
    pub descriptor: String,
}

/// Why a cable's chain could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainFault {
    pub error: String,
    pub reason: String,
}

/// Everything `jtagconfig` reported about a single cable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainRecord {
    /// 1-based cable position; `None` if the header line was not recognised
    pub index: Option<u32>,
    /// Cable display name; `None` if the header line was not recognised
    pub cable_name: Option<String>,
    /// Devices in reported order, nearest to the programmer first
    pub nodes: Vec<ChainNode>,
    /// Set when the tool reported an error for this chain
    pub fault: Option<ChainFault>,
}

impl ChainRecord {
    /// Parse one cable block. Never fails: unrecognised lines are ignored.
    pub fn parse(block: &str) -> Self {
        let mut record = ChainRecord::default();
        let mut lines = block.lines();

        if let Some(caps) = lines.next().and_then(|header| header_regex().captures(header)) {
            record.index = caps[1].parse().ok();
            record.cable_name = Some(caps[2].trim().to_string());
        }

        for line in lines {
            let node = if line.contains(ERROR_SEPARATOR) {
                None
            } else {
                node_regex().captures(line)
            };
            if let Some(caps) = node {
                record.nodes.push(ChainNode {
                    identifier: caps[1].to_string(),
                    descriptor: caps[2].to_string(),
                });
            } else if let Some(caps) = error_regex().captures(line) {
                record.fault = Some(ChainFault {
                    error: caps[1].trim().to_string(),
                    reason: caps[2].trim().to_string(),
                });
            }
        }

        record
    }

    /// A record is valid unless the tool reported a chain error for it
    pub fn is_valid(&self) -> bool {
        self.fault.is_none()
    }
}

impl fmt::Display for ChainRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.index, &self.cable_name) {
            (Some(index), Some(name)) => write!(f, "{}) {}", index, name)?,
            (None, Some(name)) => write!(f, "?) {}", name)?,
            _ => write!(f, "?) <unrecognised cable>")?,
        }
        for node in &self.nodes {
            write!(f, "\n  {}   {}", node.identifier, node.descriptor)?;
        }
        if let Some(fault) = &self.fault {
            write!(f, "\n  {} - {}", fault.error, fault.reason)?;
        }
        Ok(())
    }
}

/// Split full `jtagconfig` output into cable blocks and parse each one.
///
/// Blocks are separated by blank lines; blank blocks are dropped.
pub fn parse_chains(raw: &str) -> Vec<ChainRecord> {
    raw.replace("\r\n", "\n")
        .split("\n\n")
        .map(|block| block.trim_start_matches('\n'))
        .filter(|block| !block.trim().is_empty())
        .map(ChainRecord::parse)
        .collect()
}
