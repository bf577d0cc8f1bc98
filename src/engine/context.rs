use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::File;
use std::sync::Arc;

/// A live stream bound to one open.
///
/// The mutex is held for a single seek-plus-transfer so that concurrent
/// reads and writes on the same open never interleave their positioning.
#[derive(Debug, Clone)]
pub struct OpenHandle {
    file: Arc<Mutex<File>>,
    writable: bool,
}

impl OpenHandle {
    pub fn new(file: File, writable: bool) -> Self {
        OpenHandle {
            file: Arc::new(Mutex::new(file)),
            writable,
        }
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    /// Run `f` with exclusive access to the stream.
    pub fn with_file<R>(&self, f: impl FnOnce(&mut File) -> R) -> R {
        let mut file = self.file.lock();
        f(&mut file)
    }
}

/// Per-open state carried between operations on the same open.
#[derive(Debug, Default)]
pub struct RequestContext {
    is_directory: bool,
    delete_on_close: bool,
    handle: Option<OpenHandle>,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext::default()
    }

    /// Context for an open the host already knows targets a directory.
    pub fn for_directory() -> Self {
        RequestContext {
            is_directory: true,
            ..Default::default()
        }
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn set_directory(&mut self, is_directory: bool) {
        self.is_directory = is_directory;
    }

    pub fn delete_on_close(&self) -> bool {
        self.delete_on_close
    }

    pub fn set_delete_on_close(&mut self, delete_on_close: bool) {
        self.delete_on_close = delete_on_close;
    }

    pub fn handle(&self) -> Option<&OpenHandle> {
        self.handle.as_ref()
    }

    pub fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn bind(&mut self, handle: OpenHandle) {
        self.handle = Some(handle);
    }

    /// Drop the bound stream, if any. Returns whether one was bound.
    pub fn release(&mut self) -> bool {
        self.handle.take().is_some()
    }
}

/// Numbered slots of request contexts, one per in-flight open.
///
/// Host adapters keep the slot number as their file handle and look the
/// context up on every call. The arena lock is only held long enough to
/// clone the slot's `Arc`.
#[derive(Debug)]
pub struct ContextArena {
    slots: RwLock<HashMap<u64, Arc<RwLock<RequestContext>>>>,
    next_id: Mutex<u64>,
}

impl ContextArena {
    pub fn new() -> Self {
        ContextArena {
            slots: RwLock::new(HashMap::new()),
            // 0 is never handed out so hosts can use it as "no handle"
            next_id: Mutex::new(1),
        }
    }

    pub fn insert(&self, ctx: RequestContext) -> u64 {
        let id = self.alloc_id();
        self.slots.write().insert(id, Arc::new(RwLock::new(ctx)));
        id
    }

    pub fn get(&self, id: u64) -> Option<Arc<RwLock<RequestContext>>> {
        self.slots.read().get(&id).cloned()
    }

    pub fn remove(&self, id: u64) -> Option<Arc<RwLock<RequestContext>>> {
        self.slots.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    fn alloc_id(&self) -> u64 {
        let mut next = self.next_id.lock();
        let id = *next;
        *next = match next.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        id
    }
}

impl Default for ContextArena {
    fn default() -> Self {
        Self::new()
    }
}
