use fuser::FUSE_ROOT_ID;
use fxhash::hash64;
use lru::LruCache;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::num::NonZeroUsize;
use std::os::unix::ffi::OsStrExt;

use crate::config::{ROOT, SEPARATOR};

const DEFAULT_INODE_CACHE_CAPACITY: usize = 100_000;

#[derive(Debug, Clone)]
pub(crate) struct InodeData {
    pub inode: u64,
    pub parent: u64,
    pub name: OsString,
    /// Logical path inside the volume.
    pub logical: String,
}

/// Inode number to logical path mapping.
///
/// The root is pinned; every other inode lives in an LRU cache and is
/// re-created on the next lookup after eviction.
#[derive(Debug)]
pub(crate) struct InodeTable {
    root: InodeData,
    inodes: LruCache<u64, InodeData>,
    children: HashMap<u64, HashMap<u64, u64>>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INODE_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        InodeTable {
            root: InodeData {
                inode: FUSE_ROOT_ID,
                parent: FUSE_ROOT_ID,
                name: OsString::new(),
                logical: ROOT.to_string(),
            },
            inodes: LruCache::new(capacity),
            children: HashMap::new(),
        }
    }

    pub fn insert(&mut self, inode: InodeData) {
        if inode.inode == FUSE_ROOT_ID {
            return;
        }
        let name_hash = hash64(inode.name.as_bytes());
        self.children
            .entry(inode.parent)
            .or_default()
            .insert(name_hash, inode.inode);
        if let Some((_, evicted)) = self.inodes.push(inode.inode, inode) {
            if let Some(map) = self.children.get_mut(&evicted.parent) {
                let evicted_hash = hash64(evicted.name.as_bytes());
                if map.get(&evicted_hash) == Some(&evicted.inode) {
                    map.remove(&evicted_hash);
                }
            }
        }
    }

    pub fn peek(&self, ino: u64) -> Option<&InodeData> {
        if ino == FUSE_ROOT_ID {
            return Some(&self.root);
        }
        self.inodes.peek(&ino)
    }

    /// Logical path of `ino`, touching it in the LRU order.
    pub fn logical_path(&mut self, ino: u64) -> Option<String> {
        if ino == FUSE_ROOT_ID {
            return Some(self.root.logical.clone());
        }
        self.inodes.get(&ino).map(|inode| inode.logical.clone())
    }

    /// Look up a child inode by name within a parent directory.
    pub fn lookup_child(&self, parent: u64, name: &OsStr) -> Option<u64> {
        let name_hash = hash64(name.as_bytes());
        self.children
            .get(&parent)
            .and_then(|map| map.get(&name_hash).copied())
            .filter(|ino| self.peek(*ino).is_some())
    }

    pub fn remove_child(&mut self, parent: u64, name: &OsStr) {
        let name_hash = hash64(name.as_bytes());
        let removed = self
            .children
            .get_mut(&parent)
            .and_then(|map| map.remove(&name_hash));
        if let Some(ino) = removed {
            self.inodes.pop(&ino);
            self.children.remove(&ino);
        }
    }

    /// Re-home `ino` under `new_parent` and rewrite the logical paths of
    /// every cached descendant.
    pub fn rename(&mut self, ino: u64, new_parent: u64, new_name: &OsStr, new_logical: String) {
        // Whatever was at the destination is gone now
        if self.lookup_child(new_parent, new_name) != Some(ino) {
            self.remove_child(new_parent, new_name);
        }

        let Some(inode) = self.inodes.get_mut(&ino) else {
            return;
        };
        let old_parent = inode.parent;
        let old_name_hash = hash64(inode.name.as_bytes());
        let old_logical = std::mem::replace(&mut inode.logical, new_logical.clone());
        inode.parent = new_parent;
        inode.name = new_name.to_os_string();

        if let Some(map) = self.children.get_mut(&old_parent) {
            map.remove(&old_name_hash);
        }
        self.children
            .entry(new_parent)
            .or_default()
            .insert(hash64(new_name.as_bytes()), ino);

        let old_prefix = format!("{}{}", old_logical, SEPARATOR);
        for (_, data) in self.inodes.iter_mut() {
            if let Some(rest) = data.logical.strip_prefix(old_prefix.as_str()) {
                data.logical = format!("{}{}{}", new_logical, SEPARATOR, rest);
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inodes.len()
    }
}

/// Logical path of `name` inside the directory at `parent`.
pub(crate) fn child_logical(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("{}{}", ROOT, name)
    } else {
        format!("{}{}{}", parent, SEPARATOR, name)
    }
}
