use std::path::MAIN_SEPARATOR;

/// Separator used by logical paths inside the mounted volume.
pub const SEPARATOR: char = '\\';

/// The logical root path.
pub const ROOT: &str = "\\";

/// Name shown for the root key when it has to be displayed as an entry.
pub const ROOT_DISPLAY_NAME: &str = "root";

/// One `KEY > V1 | V2` line of the mapping file, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    logical_path: String,
    /// `logical_path` with a trailing separator, used for descendant matching.
    prefix: String,
    candidates: Vec<String>,
}

impl MappingRule {
    /// Build a rule from raw key and candidate strings, normalizing both.
    ///
    /// Returns `None` when the key or any candidate is empty, or when there
    /// are no candidates at all.
    pub fn new<I, S>(logical_path: &str, candidates: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let logical_path = normalize_logical_key(logical_path)?;
        let candidates = candidates
            .into_iter()
            .map(|c| normalize_candidate(c.as_ref()))
            .collect::<Option<Vec<_>>>()?;
        if candidates.is_empty() {
            return None;
        }

        let prefix = if logical_path == ROOT {
            logical_path.clone()
        } else {
            format!("{}{}", logical_path, SEPARATOR)
        };

        Some(MappingRule {
            logical_path,
            prefix,
            candidates,
        })
    }

    pub fn logical_path(&self) -> &str {
        &self.logical_path
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn is_root(&self) -> bool {
        self.logical_path == ROOT
    }

    /// If `logical` is this rule's path or lies beneath it, return the part of
    /// `logical` below the rule (empty for an exact match).
    pub fn relative_to<'a>(&self, logical: &'a str) -> Option<&'a str> {
        if logical == self.logical_path {
            return Some("");
        }
        logical.strip_prefix(self.prefix.as_str())
    }

    /// Final path component of the key, or the root sentinel name.
    pub fn display_name(&self) -> &str {
        if self.is_root() {
            return ROOT_DISPLAY_NAME;
        }
        self.logical_path
            .rsplit(SEPARATOR)
            .next()
            .unwrap_or(&self.logical_path)
    }
}

/// Ordered, immutable set of mapping rules.
///
/// Rule order is significant: the first matching rule wins during
/// resolution, so this is a plain vector scanned linearly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
}

impl MappingTable {
    /// Build a table from rules, dropping nothing. Returns the duplicated key
    /// on failure.
    pub fn from_rules(rules: Vec<MappingRule>) -> std::result::Result<Self, String> {
        for (idx, rule) in rules.iter().enumerate() {
            if rules[..idx]
                .iter()
                .any(|r| r.logical_path == rule.logical_path)
            {
                return Err(rule.logical_path.clone());
            }
        }
        Ok(MappingTable { rules })
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule (in table order) covering `logical`, with the relative tail.
    pub fn find_rule<'a>(&self, logical: &'a str) -> Option<(&MappingRule, &'a str)> {
        self.rules
            .iter()
            .find_map(|rule| rule.relative_to(logical).map(|rel| (rule, rel)))
    }

    /// Every candidate directory of every rule, in table order.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .flat_map(|r| r.candidates.iter().map(String::as_str))
    }

    /// True for logical ancestors of configured keys that no rule maps,
    /// such as the root when the table has no root rule.
    pub fn is_virtual_directory(&self, logical: &str) -> bool {
        if self.find_rule(logical).is_some() {
            return false;
        }
        if logical == ROOT {
            return !self.rules.is_empty();
        }
        let prefix = format!("{}{}", logical, SEPARATOR);
        self.rules
            .iter()
            .any(|r| r.logical_path.starts_with(prefix.as_str()))
    }
}

/// Number of logical separators in `path`.
pub fn separator_count(path: &str) -> usize {
    path.chars().filter(|c| *c == SEPARATOR).count()
}

/// Normalize a logical key: trimmed, `/` accepted as a separator, leading
/// separator added, trailing separators stripped. The root stays `\`.
pub fn normalize_logical_key(raw: &str) -> Option<String> {
    let key = raw.trim().replace('/', "\\");
    if key.is_empty() {
        return None;
    }
    let key = key.trim_end_matches(SEPARATOR);
    if key.is_empty() {
        return Some(ROOT.to_string());
    }
    if key.starts_with(SEPARATOR) {
        Some(key.to_string())
    } else {
        Some(format!("{}{}", SEPARATOR, key))
    }
}

/// Normalize a physical candidate: trimmed and ending with a separator.
pub fn normalize_candidate(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if value.ends_with('/') || value.ends_with('\\') {
        Some(value.to_string())
    } else {
        Some(format!("{}{}", value, MAIN_SEPARATOR))
    }
}
