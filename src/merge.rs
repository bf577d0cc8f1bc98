use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::{separator_count, MappingRule, ROOT, SEPARATOR};
use crate::operations::{FileInformation, OpResult};
use crate::resolver::PathResolver;
use crate::wildcard::is_name_in_expression;

/// Builds merged directory listings across every candidate of a logical
/// directory, plus synthetic entries for configured keys beneath it.
#[derive(Debug, Clone)]
pub struct DirectoryMerger {
    resolver: PathResolver,
}

impl DirectoryMerger {
    pub fn new(resolver: PathResolver) -> Self {
        DirectoryMerger { resolver }
    }

    /// List the children of `logical` whose names match `pattern`.
    ///
    /// Names are unique in the result. Synthetic entries come first, then
    /// physical entries in candidate order; the first occurrence of a name
    /// wins.
    pub fn list_entries(&self, logical: &str, pattern: &str) -> OpResult<Vec<FileInformation>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut entries = self.synthetic_entries(logical, pattern, &mut seen);

        let physical_dirs = match self.resolver.resolve_all(logical) {
            Ok(dirs) => dirs,
            Err(_) if self.resolver.is_virtual_directory(logical) => Vec::new(),
            Err(e) => return Err(e),
        };

        for dir in physical_dirs {
            scan_candidate(&dir, pattern, &mut seen, &mut entries);
        }

        tracing::debug!(
            "list_entries: {} ({}) -> {} entries",
            logical,
            pattern,
            entries.len()
        );
        Ok(entries)
    }

    fn synthetic_entries(
        &self,
        logical: &str,
        pattern: &str,
        seen: &mut HashSet<String>,
    ) -> Vec<FileInformation> {
        let parent = logical.trim_end_matches(SEPARATOR);
        let child_depth = separator_count(parent) + 1;
        let prefix = format!("{}{}", parent, SEPARATOR);

        let mut entries = Vec::new();
        for rule in self.resolver.table().rules() {
            let Some(name) = self.synthetic_child(rule, &prefix, child_depth) else {
                continue;
            };
            if seen.contains(name) || !is_name_in_expression(pattern, name) {
                continue;
            }
            seen.insert(name.to_string());
            entries.push(FileInformation::synthetic_directory(name));
        }
        entries
    }

    /// Name `rule` contributes to a listing of the directory at `prefix`.
    ///
    /// Keys one level down appear under their own name. Deeper keys surface
    /// through their ancestor at this level when no rule maps that ancestor.
    fn synthetic_child<'a>(
        &self,
        rule: &'a MappingRule,
        prefix: &str,
        child_depth: usize,
    ) -> Option<&'a str> {
        let key = rule.logical_path();
        if key == ROOT || !key.starts_with(prefix) {
            return None;
        }
        if separator_count(key) == child_depth {
            return Some(rule.display_name());
        }

        let component = key[prefix.len()..].split(SEPARATOR).next()?;
        let ancestor = &key[..prefix.len() + component.len()];
        self.resolver
            .is_virtual_directory(ancestor)
            .then_some(component)
    }
}

fn scan_candidate(
    dir: &Path,
    pattern: &str,
    seen: &mut HashSet<String>,
    entries: &mut Vec<FileInformation>,
) {
    if !dir.is_dir() {
        return;
    }

    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) => {
            tracing::warn!("list_entries: cannot read {}: {}", dir.display(), e);
            return;
        }
    };

    let mut dir_entries: Vec<fs::DirEntry> = read_dir.flatten().collect();
    dir_entries.sort_by_key(|entry| entry.file_name());

    for entry in dir_entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if seen.contains(&name) || !is_name_in_expression(pattern, &name) {
            continue;
        }

        // Follow links so entries describe what they point at
        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!("list_entries: skipping {:?}: {}", entry.path(), e);
                continue;
            }
        };

        entries.push(FileInformation::from_metadata(name.as_str(), &meta));
        seen.insert(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_mapping, MappingTable};
    use crate::operations::Status;
    use std::path::MAIN_SEPARATOR;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn merger(table: MappingTable) -> DirectoryMerger {
        DirectoryMerger::new(PathResolver::new(Arc::new(table)))
    }

    fn names(entries: &[FileInformation]) -> Vec<&str> {
        entries.iter().map(|e| e.file_name.as_str()).collect()
    }

    fn cand(path: &Path) -> String {
        format!("{}{}", path.display(), MAIN_SEPARATOR)
    }

    #[test]
    fn test_synthetic_children_at_root() {
        let table = parse_mapping(
            "\\docs > /nonexistent/d\n\\music > /nonexistent/m\n\\shared\\public > /nonexistent/p",
        )
        .unwrap();
        let entries = merger(table).list_entries(ROOT, "*").unwrap();

        assert_eq!(names(&entries), vec!["docs", "music", "shared"]);
        assert!(entries.iter().all(|e| e.is_directory()));
    }

    #[test]
    fn test_mapped_ancestor_is_not_synthesized() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir_all(&root).unwrap();

        // \shared resolves through the root rule, so only disk decides
        let table = parse_mapping(&format!(
            "\\shared\\public > /nonexistent/p\n\\ > {}",
            cand(&root)
        ))
        .unwrap();
        let entries = merger(table).list_entries(ROOT, "*").unwrap();

        assert!(entries.is_empty());
    }

    #[test]
    fn test_nested_synthetic_children_use_path_prefix() {
        let table = parse_mapping(
            "\\shared\\public > /nonexistent/p\n\\sharedx\\other > /nonexistent/o",
        )
        .unwrap();
        let entries = merger(table).list_entries("\\shared", "*").unwrap();

        assert_eq!(names(&entries), vec!["public"]);
    }

    #[test]
    fn test_root_key_not_listed_as_own_child() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("top.txt"), "x").unwrap();

        let table =
            parse_mapping(&format!("\\ > {}\n\\docs > /nonexistent/d", cand(&root))).unwrap();
        let entries = merger(table).list_entries(ROOT, "*").unwrap();

        assert_eq!(names(&entries), vec!["docs", "top.txt"]);
    }

    #[test]
    fn test_pattern_filters_synthetic_and_physical() {
        let temp_dir = tempdir().unwrap();
        let a = temp_dir.path().join("a");
        fs::create_dir_all(&a).unwrap();
        fs::write(a.join("keep.txt"), "x").unwrap();
        fs::write(a.join("drop.md"), "x").unwrap();

        let table = parse_mapping(&format!(
            "\\data > {}\n\\data\\extra.txt > /nonexistent/e\n\\data\\other > /nonexistent/o",
            cand(&a)
        ))
        .unwrap();
        let entries = merger(table).list_entries("\\data", "*.TXT").unwrap();

        assert_eq!(names(&entries), vec!["extra.txt", "keep.txt"]);
    }

    #[test]
    fn test_unmapped_listing_fails() {
        let table = parse_mapping("\\docs > /nonexistent/d").unwrap();
        let err = merger(table).list_entries("\\music", "*").unwrap_err();
        assert_eq!(err.status(), Status::PathNotMapped);
    }
}
