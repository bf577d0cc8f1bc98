use std::path::Path;

use crate::config::table::{MappingRule, MappingTable};
use crate::error::{FlexError, Result};

/// Separates the logical key from its candidate list.
pub const KEY_DELIMITER: char = '>';

/// Separates candidates from each other.
pub const CANDIDATE_DELIMITER: char = '|';

/// Parse mapping text of the form `KEY > V1 | V2 | ...`, one rule per line.
///
/// Blank lines and `#` comments are skipped. Any malformed line aborts the
/// whole parse with the offending line number.
pub fn parse_mapping(text: &str) -> Result<MappingTable> {
    let mut rules: Vec<MappingRule> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (key, values) = trimmed.split_once(KEY_DELIMITER).ok_or_else(|| {
            FlexError::config(
                line_no,
                format!("missing '{}' between logical path and candidates", KEY_DELIMITER),
            )
        })?;

        if values.contains(KEY_DELIMITER) {
            return Err(FlexError::config(
                line_no,
                format!("'{}' may appear only once per line", KEY_DELIMITER),
            ));
        }
        if key.trim().is_empty() {
            return Err(FlexError::config(line_no, "empty logical path"));
        }
        if values.trim().is_empty() {
            return Err(FlexError::config(line_no, "no physical candidates"));
        }

        let candidates: Vec<&str> = values.split(CANDIDATE_DELIMITER).collect();
        let rule = MappingRule::new(key, &candidates)
            .ok_or_else(|| FlexError::config(line_no, "empty physical candidate"))?;

        if rules.iter().any(|r| r.logical_path() == rule.logical_path()) {
            return Err(FlexError::config(
                line_no,
                format!("duplicate logical path '{}'", rule.logical_path()),
            ));
        }

        tracing::debug!(
            "mapping rule {} -> {:?}",
            rule.logical_path(),
            rule.candidates()
        );
        rules.push(rule);
    }

    if rules.is_empty() {
        return Err(FlexError::config(0, "no mapping rules defined"));
    }

    MappingTable::from_rules(rules)
        .map_err(|key| FlexError::config(0, format!("duplicate logical path '{}'", key)))
}

/// Read and parse a mapping file.
pub fn load_mapping(path: &Path) -> Result<MappingTable> {
    let text = std::fs::read_to_string(path).map_err(|e| FlexError::ConfigIo {
        path: path.to_path_buf(),
        source: e,
    })?;
    let table = parse_mapping(&text)?;
    tracing::info!(
        "Loaded {} mapping rule(s) from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}
