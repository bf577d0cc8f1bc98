use std::io;
use std::path::{Path, PathBuf};

use crate::config::MappingTable;
use crate::operations::DiskSpace;

/// Queries free and total space for one volume root.
pub trait SpaceProbe: Send + Sync {
    fn query(&self, root: &Path) -> io::Result<DiskSpace>;
}

/// Default probe backed by `fs2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fs2Probe;

impl SpaceProbe for Fs2Probe {
    fn query(&self, root: &Path) -> io::Result<DiskSpace> {
        Ok(DiskSpace {
            free_bytes_available: fs2::available_space(root)?,
            total_bytes: fs2::total_space(root)?,
            total_free_bytes: fs2::free_space(root)?,
        })
    }
}

/// Sums space across the distinct volumes that back the mapping table.
///
/// Two root strings naming the same volume (a drive letter and a share
/// pointing at it, say) are counted twice.
pub struct DiskSpaceAggregator {
    probe: Box<dyn SpaceProbe>,
}

impl DiskSpaceAggregator {
    pub fn new() -> Self {
        Self::with_probe(Box::new(Fs2Probe))
    }

    pub fn with_probe(probe: Box<dyn SpaceProbe>) -> Self {
        DiskSpaceAggregator { probe }
    }

    pub fn aggregate(&self, table: &MappingTable) -> DiskSpace {
        volume_roots(table)
            .iter()
            .fold(DiskSpace::default(), |total, root| {
                match self.probe.query(root) {
                    Ok(space) => total.saturating_add(space),
                    Err(e) => {
                        tracing::warn!("Skipping volume {} in space totals: {}", root.display(), e);
                        total
                    }
                }
            })
    }
}

impl Default for DiskSpaceAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DiskSpaceAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskSpaceAggregator").finish_non_exhaustive()
    }
}

/// Distinct volume roots of every candidate, in first-seen order.
pub fn volume_roots(table: &MappingTable) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    for candidate in table.candidates() {
        let Some(root) = volume_root(candidate) else {
            tracing::debug!("No volume root for candidate {}", candidate);
            continue;
        };
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    roots
}

/// Root of the volume holding `candidate`.
///
/// Drive paths yield `X:\`, shares yield `\\server\share\`. Anything else is
/// resolved to the mount point containing it.
pub fn volume_root(candidate: &str) -> Option<PathBuf> {
    if let Some(root) = drive_root(candidate) {
        return Some(PathBuf::from(root));
    }
    if let Some(root) = share_root(candidate) {
        return Some(PathBuf::from(root));
    }
    mount_root(Path::new(candidate))
}

fn drive_root(candidate: &str) -> Option<String> {
    let mut chars = candidate.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => Some(format!("{}:\\", letter)),
        _ => None,
    }
}

fn share_root(candidate: &str) -> Option<String> {
    if !candidate.starts_with("\\\\") {
        return None;
    }
    // \\server\share\ ends at the fourth separator
    match candidate.match_indices('\\').nth(3) {
        Some((idx, _)) => Some(candidate[..=idx].to_string()),
        None => Some(format!("{}\\", candidate)),
    }
}

#[cfg(unix)]
fn mount_root(path: &Path) -> Option<PathBuf> {
    use std::os::unix::fs::MetadataExt;

    let path = std::path::absolute(path).ok()?;
    let existing = path.ancestors().find(|p| p.exists())?;
    let Ok(meta) = std::fs::metadata(existing) else {
        return Some(PathBuf::from("/"));
    };
    let device = meta.dev();

    let mut root = existing;
    while let Some(parent) = root.parent() {
        match std::fs::metadata(parent) {
            Ok(parent_meta) if parent_meta.dev() == device => root = parent,
            _ => break,
        }
    }
    Some(root.to_path_buf())
}

#[cfg(not(unix))]
fn mount_root(path: &Path) -> Option<PathBuf> {
    let path = std::path::absolute(path).ok()?;
    path.ancestors().last().map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_mapping;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FixedProbe {
        calls: Arc<Mutex<Vec<PathBuf>>>,
        failing: Option<PathBuf>,
    }

    impl SpaceProbe for FixedProbe {
        fn query(&self, root: &Path) -> io::Result<DiskSpace> {
            self.calls.lock().push(root.to_path_buf());
            if self.failing.as_deref() == Some(root) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
            }
            Ok(DiskSpace {
                free_bytes_available: 10,
                total_bytes: 100,
                total_free_bytes: 20,
            })
        }
    }

    #[test]
    fn test_drive_and_share_roots() {
        assert_eq!(volume_root("C:\\data\\"), Some(PathBuf::from("C:\\")));
        assert_eq!(volume_root("d:/backup/"), Some(PathBuf::from("d:\\")));
        assert_eq!(
            volume_root("\\\\nas\\media\\films\\"),
            Some(PathBuf::from("\\\\nas\\media\\"))
        );
        assert_eq!(
            volume_root("\\\\nas\\media"),
            Some(PathBuf::from("\\\\nas\\media\\"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_mount_root_is_an_ancestor() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = volume_root(&format!("{}/", temp_dir.path().display())).unwrap();
        assert!(temp_dir.path().starts_with(&root));
    }

    #[test]
    fn test_each_distinct_root_queried_once() {
        let table =
            parse_mapping("\\a > C:\\one | C:\\two\n\\b > D:\\three | \\\\nas\\share\\x").unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let aggregator = DiskSpaceAggregator::with_probe(Box::new(FixedProbe {
            calls: calls.clone(),
            failing: None,
        }));

        let total = aggregator.aggregate(&table);

        assert_eq!(calls.lock().len(), 3);
        assert_eq!(
            total,
            DiskSpace {
                free_bytes_available: 30,
                total_bytes: 300,
                total_free_bytes: 60,
            }
        );
    }

    #[test]
    fn test_failing_root_is_skipped() {
        let table = parse_mapping("\\a > C:\\one\n\\b > D:\\two").unwrap();
        let aggregator = DiskSpaceAggregator::with_probe(Box::new(FixedProbe {
            calls: Arc::new(Mutex::new(Vec::new())),
            failing: Some(PathBuf::from("D:\\")),
        }));

        let total = aggregator.aggregate(&table);
        assert_eq!(total.total_bytes, 100);
    }
}
