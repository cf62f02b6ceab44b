//! Integration tests for ublast-debug
//!
//! Drive cable discovery end to end through an in-memory jtagconfig listing.
//! Tool invocation tests live in src/tools/ublast_tools.rs (they need access
//! to private methods).

use ublast_debug::gdb_server::server_arguments;
use ublast_debug::jtag::{detect_cable, parse_chains, resolve_cable, CableSelector};
use ublast_debug::{Config, Result, UblastDebugToolHandler, UblastError};

const TWO_BLASTERS: &str = "\
1) USB-BlasterII [1-6.2]
  02E120DD   10CX220Y

2) USB-BlasterII [1-6.3]
  031830DD   10M16S(A|C)

";

const BROKEN_CHAINS: &str = "\
1) USB-BlasterII [1-6.2]
  Unable to read device chain - JTAG chain broken

2) USB-BlasterII [1-6.3]
  Unable to read device chain - JTAG chain broken

";

fn listing(text: &'static str) -> impl Fn() -> Result<String> {
    move || Ok(text.to_string())
}

#[test]
fn test_end_to_end_selects_first_cable() {
    let selector = CableSelector::literal("10CX220Y", None).unwrap();
    let cable = detect_cable(&listing(TWO_BLASTERS), &selector).unwrap();
    assert_eq!(cable.as_deref(), Some("USB-BlasterII [1-6.2]"));

    let args = server_arguments(50003, cable.as_deref(), &[]);
    assert_eq!(args[4..], ["-c".to_string(), "USB-BlasterII [1-6.2]".to_string()]);
}

#[test]
fn test_end_to_end_no_match_omits_cable_flag() {
    let selector = CableSelector::literal("EP4CE22", None).unwrap();
    let cable = detect_cable(&listing(TWO_BLASTERS), &selector).unwrap();
    assert!(cable.is_none());

    let args = server_arguments(50003, cable.as_deref(), &[]);
    assert!(!args.iter().any(|a| a == "-c"));
}

#[test]
fn test_broken_chains_never_match() {
    let records = parse_chains(BROKEN_CHAINS);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.is_valid()));

    let selector = CableSelector::from_config(".*", None).unwrap();
    assert!(selector.select(&records).is_none());
}

#[test]
fn test_preferred_index_boundary() {
    let raw = "1) A\n  02E120DD   10CX220Y\n\n2) B\n  02E120DD   10CX220Y\n\n";
    let records = parse_chains(raw);

    let second = CableSelector::from_config("10CX220Y", Some("1")).unwrap();
    assert_eq!(second.select(&records).as_deref(), Some("B"));

    // One past the end falls back to the first match
    let past_end = CableSelector::from_config("10CX220Y", Some("2")).unwrap();
    assert_eq!(past_end.select(&records).as_deref(), Some("A"));
}

#[test]
fn test_enumeration_failure_is_not_fatal() {
    let failing = || -> Result<String> {
        Err(UblastError::EnumerationFailed("jtagconfig exited with 1".to_string()))
    };
    let selector = CableSelector::literal("10CX220Y", None).unwrap();
    assert!(detect_cable(&failing, &selector).is_err());
    assert!(resolve_cable(&failing, &selector).is_none());
}

#[test]
fn test_handler_creation() {
    let _handler = UblastDebugToolHandler::new(Config::default());
    let _handler = UblastDebugToolHandler::default();
    let _handler = UblastDebugToolHandler::with_enumerator(Config::default(), listing(TWO_BLASTERS));
}

#[test]
fn test_config_from_args() {
    use clap::Parser;
    use ublast_debug::config::Args;

    let args = Args::parse_from([
        "ublast-debug",
        "--device", "10CX220Y",
        "--target-id", "0",
        "--base-port", "52000",
    ]);
    let config = Config::from_args(&args).unwrap();
    assert_eq!(config.default_device.as_deref(), Some("10CX220Y"));
    assert_eq!(config.default_target_id.as_deref(), Some("0"));
    assert_eq!(config.base_port, 52000);
}
