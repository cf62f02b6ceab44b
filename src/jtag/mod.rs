//! JTAG cable discovery
//!
//! Parses `jtagconfig` listings and decides which USB-Blaster is wired to the
//! target device.

pub mod chain;
pub mod enumerator;
pub mod selector;

pub use chain::{parse_chains, ChainFault, ChainNode, ChainRecord};
pub use enumerator::{detect_cable, resolve_cable, ChainEnumerator, Jtagconfig, JTAGCONFIG_NAME};
pub use selector::CableSelector;
