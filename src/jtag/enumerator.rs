//! Source of raw `jtagconfig` output
//!
//! Enumeration is a plain blocking process call. It sits behind a trait so
//! parsing and selection can be exercised without hardware or Quartus tools.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, UblastError};
use super::chain::parse_chains;
use super::selector::CableSelector;

/// Platform name of the chain enumeration tool
#[cfg(windows)]
pub const JTAGCONFIG_NAME: &str = "jtagconfig.exe";
#[cfg(not(windows))]
pub const JTAGCONFIG_NAME: &str = "jtagconfig";

/// Produces the raw text listing of every attached cable and its chain
pub trait ChainEnumerator {
    fn enumerate(&self) -> Result<String>;
}

impl<F> ChainEnumerator for F
where
    F: Fn() -> Result<String>,
{
    fn enumerate(&self) -> Result<String> {
        self()
    }
}

/// Runs `jtagconfig` with no arguments and captures stdout
#[derive(Debug, Clone)]
pub struct Jtagconfig {
    program: PathBuf,
}

impl Jtagconfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for Jtagconfig {
    fn default() -> Self {
        Self::new(JTAGCONFIG_NAME)
    }
}

impl ChainEnumerator for Jtagconfig {
    fn enumerate(&self) -> Result<String> {
        debug!("Running {}", self.program.display());

        let output = Command::new(&self.program).output().map_err(|e| {
            UblastError::EnumerationFailed(format!("Failed to run {}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UblastError::EnumerationFailed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Enumerate chains and pick the cable for the selector's device.
///
/// Enumeration failures are returned to the caller; use [`resolve_cable`]
/// where a missing cable should not stop the session.
pub fn detect_cable(enumerator: &dyn ChainEnumerator, selector: &CableSelector) -> Result<Option<String>> {
    let raw = enumerator.enumerate()?;
    let records = parse_chains(&raw);
    debug!("Parsed {} cable blocks", records.len());

    let cable = selector.select(&records);
    match &cable {
        Some(name) => info!("Device /{}/ found on cable {}", selector.pattern(), name),
        None => info!("No cable carries a device matching /{}/", selector.pattern()),
    }
    Ok(cable)
}

/// Like [`detect_cable`], but an enumeration failure only logs a warning and
/// yields no cable, so the server starts without `-c`.
pub fn resolve_cable(enumerator: &dyn ChainEnumerator, selector: &CableSelector) -> Option<String> {
    match detect_cable(enumerator, selector) {
        Ok(cable) => cable,
        Err(e) => {
            warn!("Cable auto-detection failed, continuing without -c: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "1) USB-BlasterII [1-6.2]\n  02E120DD   10CX220Y\n\n2) USB-BlasterII [1-6.3]\n  031830DD   10M16S(A|C)\n\n";

    #[test]
    fn test_closure_enumerator() {
        let enumerator = || -> Result<String> { Ok(OUTPUT.to_string()) };
        let selector = CableSelector::literal("10M16S", None).unwrap();
        let cable = detect_cable(&enumerator, &selector).unwrap();
        assert_eq!(cable.as_deref(), Some("USB-BlasterII [1-6.3]"));
    }

    #[test]
    fn test_detect_cable_propagates_failure() {
        let enumerator = || -> Result<String> {
            Err(UblastError::EnumerationFailed("no jtagd".to_string()))
        };
        let selector = CableSelector::literal("10CX220Y", None).unwrap();
        assert!(detect_cable(&enumerator, &selector).is_err());
    }

    #[test]
    fn test_resolve_cable_never_fatal() {
        let enumerator = || -> Result<String> {
            Err(UblastError::EnumerationFailed("no jtagd".to_string()))
        };
        let selector = CableSelector::literal("10CX220Y", None).unwrap();
        assert!(resolve_cable(&enumerator, &selector).is_none());
    }

    #[test]
    fn test_jtagconfig_missing_program() {
        let jtagconfig = Jtagconfig::new("/nonexistent/jtagconfig_12345");
        let err = jtagconfig.enumerate().unwrap_err();
        assert!(err.to_string().contains("Failed to run"));
    }

    #[cfg(unix)]
    #[test]
    fn test_jtagconfig_nonzero_exit() {
        let err = Jtagconfig::new("false").enumerate().unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[cfg(unix)]
    #[test]
    fn test_jtagconfig_success_empty_output() {
        let raw = Jtagconfig::new("true").enumerate().unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn test_default_program_name() {
        assert_eq!(Jtagconfig::default().program(), Path::new(JTAGCONFIG_NAME));
    }
}
