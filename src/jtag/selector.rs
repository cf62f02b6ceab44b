//! Cable selection by device pattern
//!
//! Several USB-Blasters may be plugged in at once. The selector scans every
//! readable chain for a device whose name matches the configured pattern and
//! picks one cable, optionally by position among the matches.

use regex::Regex;
use tracing::{debug, warn};

use crate::error::Result;
use super::chain::ChainRecord;

/// Picks the cable wired to the target device
#[derive(Debug, Clone)]
pub struct CableSelector {
    pattern: Regex,
    target_index: Option<usize>,
}

impl CableSelector {
    pub fn new(pattern: Regex, target_index: Option<usize>) -> Self {
        Self { pattern, target_index }
    }

    /// Build a selector from configuration text.
    ///
    /// `device` is a regular expression over device names. `target_id` is the
    /// preferred position among matching cables; blank means none.
    pub fn from_config(device: &str, target_id: Option<&str>) -> Result<Self> {
        let pattern = Regex::new(device)?;
        Ok(Self::new(pattern, target_id.and_then(parse_target_id)))
    }

    /// Build a selector that matches `device` verbatim
    pub fn literal(device: &str, target_id: Option<&str>) -> Result<Self> {
        Self::from_config(&regex::escape(device), target_id)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn target_index(&self) -> Option<usize> {
        self.target_index
    }

    /// Names of cables carrying a matching device, one entry per matching
    /// device. A cable with two matching devices appears twice.
    pub fn matched_cables<'a>(&self, records: &'a [ChainRecord]) -> Vec<&'a str> {
        let mut matched = Vec::new();
        for record in records.iter().filter(|r| r.is_valid()) {
            let Some(name) = record.cable_name.as_deref() else {
                debug!("Skipping cable block without a recognised header");
                continue;
            };
            for node in &record.nodes {
                if self.pattern.is_match(&node.descriptor) {
                    debug!("Device {} ({}) matched on {}", node.descriptor, node.identifier, name);
                    matched.push(name);
                }
            }
        }
        matched
    }

    /// Resolve the cable to hand to the GDB server, if any matched.
    ///
    /// A preferred index inside the match list selects that entry; any other
    /// index falls back to the first match.
    pub fn select(&self, records: &[ChainRecord]) -> Option<String> {
        let matched = self.matched_cables(records);

        let chosen = match self.target_index {
            Some(index) if index < matched.len() => matched.get(index),
            Some(index) => {
                if !matched.is_empty() {
                    warn!(
                        "Target index {} out of range ({} matching cables), using first match",
                        index,
                        matched.len()
                    );
                }
                matched.first()
            }
            None => matched.first(),
        };

        chosen.map(|name| name.to_string())
    }
}

/// Parse the preferred cable index from configuration text
fn parse_target_id(text: &str) -> Option<usize> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.parse::<usize>() {
        Ok(index) => Some(index),
        Err(e) => {
            warn!("Ignoring target id '{}': {}", text, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jtag::chain::{parse_chains, ChainFault, ChainNode};

    fn record(name: &str, descriptors: &[&str]) -> ChainRecord {
        ChainRecord {
            index: Some(1),
            cable_name: Some(name.to_string()),
            nodes: descriptors
                .iter()
                .map(|d| ChainNode { identifier: "02E120DD".to_string(), descriptor: d.to_string() })
                .collect(),
            fault: None,
        }
    }

    fn two_matches() -> Vec<ChainRecord> {
        vec![record("A", &["10CX220Y"]), record("B", &["10CX220Y"])]
    }

    #[test]
    fn test_select_first_match_by_default() {
        let selector = CableSelector::from_config("10CX220Y", None).unwrap();
        assert_eq!(selector.select(&two_matches()).as_deref(), Some("A"));
    }

    #[test]
    fn test_select_by_target_index() {
        let selector = CableSelector::from_config("10CX220Y", Some("1")).unwrap();
        assert_eq!(selector.select(&two_matches()).as_deref(), Some("B"));
    }

    #[test]
    fn test_select_index_equal_to_len_falls_back() {
        let selector = CableSelector::from_config("10CX220Y", Some("2")).unwrap();
        assert_eq!(selector.select(&two_matches()).as_deref(), Some("A"));
    }

    #[test]
    fn test_select_invalid_target_id_falls_back() {
        for text in ["-1", "abc", "  "] {
            let selector = CableSelector::from_config("10CX220Y", Some(text)).unwrap();
            assert!(selector.target_index().is_none());
            assert_eq!(selector.select(&two_matches()).as_deref(), Some("A"));
        }
    }

    #[test]
    fn test_select_no_match() {
        let selector = CableSelector::from_config("EP4CE22", None).unwrap();
        assert!(selector.select(&two_matches()).is_none());

        let selector = CableSelector::from_config("EP4CE22", Some("0")).unwrap();
        assert!(selector.select(&two_matches()).is_none());
    }

    #[test]
    fn test_invalid_records_excluded() {
        let mut broken = record("Broken", &["10CX220Y"]);
        broken.fault = Some(ChainFault {
            error: "Unable to read device chain".to_string(),
            reason: "JTAG chain broken".to_string(),
        });
        let records = vec![broken, record("Good", &["10CX220Y"])];

        let selector = CableSelector::from_config("10CX220Y", None).unwrap();
        assert_eq!(selector.matched_cables(&records), vec!["Good"]);
    }

    #[test]
    fn test_duplicates_kept() {
        let records = vec![record("A", &["10CX220Y", "10CX220Y"]), record("B", &["10CX220Y"])];
        let selector = CableSelector::from_config("10CX220Y", Some("1")).unwrap();
        assert_eq!(selector.matched_cables(&records), vec!["A", "A", "B"]);
        assert_eq!(selector.select(&records).as_deref(), Some("A"));
    }

    #[test]
    fn test_unnamed_records_skipped() {
        let mut unnamed = record("X", &["10CX220Y"]);
        unnamed.index = None;
        unnamed.cable_name = None;
        let records = vec![unnamed, record("Named", &["10CX220Y"])];

        let selector = CableSelector::from_config("10CX220Y", None).unwrap();
        assert_eq!(selector.select(&records).as_deref(), Some("Named"));
    }

    #[test]
    fn test_identifier_not_matched() {
        let selector = CableSelector::from_config("02E120DD", None).unwrap();
        assert!(selector.select(&two_matches()).is_none());
    }

    #[test]
    fn test_regex_pattern() {
        let records = parse_chains("1) USB-Blaster [1-1]\n  031830DD   10M16S(A|C)\n\n2) USB-Blaster [1-2]\n  02E120DD   10CX220Y\n\n");
        let selector = CableSelector::from_config("^10(CX|M16)", Some("1")).unwrap();
        assert_eq!(selector.select(&records).as_deref(), Some("USB-Blaster [1-2]"));
    }

    #[test]
    fn test_literal_escapes_pattern() {
        let records = vec![record("A", &["10CX220Y"]), record("B", &["10.X220Y"])];
        let selector = CableSelector::literal("10.X220Y", None).unwrap();
        assert_eq!(selector.pattern(), r"10\.X220Y");
        assert_eq!(selector.select(&records).as_deref(), Some("B"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(CableSelector::from_config("10CX(", None).is_err());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let records = two_matches();
        let selector = CableSelector::from_config("10CX", Some("1")).unwrap();
        let first = selector.select(&records);
        for _ in 0..5 {
            assert_eq!(selector.select(&records), first);
        }
    }
}
