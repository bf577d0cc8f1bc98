use std::path::{PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

use crate::config::{MappingTable, SEPARATOR};
use crate::operations::{OpResult, Status};

/// Resolves logical paths against the mapping table.
///
/// Nothing is cached: every call re-probes the underlying storage, since the
/// physical trees can change underneath the mount at any time.
#[derive(Debug, Clone)]
pub struct PathResolver {
    table: Arc<MappingTable>,
}

impl PathResolver {
    pub fn new(table: Arc<MappingTable>) -> Self {
        PathResolver { table }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// Resolve a logical path to a single physical path.
    ///
    /// The candidates of the first matching rule are probed in order and the
    /// first existing one wins. When the path exists under none of them the
    /// first candidate is returned, so that creations land there.
    pub fn resolve_one(&self, logical: &str) -> OpResult<PathBuf> {
        let Some((rule, relative)) = self.table.find_rule(logical) else {
            return Err(self.unmapped(logical));
        };

        let candidates = rule.candidates();
        if relative.is_empty() {
            return Ok(PathBuf::from(&candidates[0]));
        }

        for candidate in candidates {
            let path = join_candidate(candidate, relative);
            if path.exists() {
                tracing::trace!("resolve_one: {} -> {}", logical, path.display());
                return Ok(path);
            }
        }

        let fallback = join_candidate(&candidates[0], relative);
        tracing::trace!(
            "resolve_one: {} not found anywhere, using {}",
            logical,
            fallback.display()
        );
        Ok(fallback)
    }

    /// Resolve a logical path to every candidate location, in priority order,
    /// without checking which of them exist.
    pub fn resolve_all(&self, logical: &str) -> OpResult<Vec<PathBuf>> {
        let Some((rule, relative)) = self.table.find_rule(logical) else {
            return Err(self.unmapped(logical));
        };

        Ok(rule
            .candidates()
            .iter()
            .map(|candidate| join_candidate(candidate, relative))
            .collect())
    }

    pub fn is_virtual_directory(&self, logical: &str) -> bool {
        self.table.is_virtual_directory(logical)
    }

    fn unmapped(&self, logical: &str) -> crate::operations::OpError {
        tracing::error!(
            "Path not mapped by any rule: {} (check the configuration)",
            logical
        );
        Status::PathNotMapped.into()
    }
}

/// Append a `\`-separated logical tail to a candidate directory, converting
/// separators to the platform form.
pub fn join_candidate(candidate: &str, relative: &str) -> PathBuf {
    let mut joined = String::with_capacity(candidate.len() + relative.len());
    joined.push_str(candidate);
    joined.extend(relative.chars().map(|c| {
        if c == SEPARATOR {
            MAIN_SEPARATOR
        } else {
            c
        }
    }));
    PathBuf::from(joined)
}
