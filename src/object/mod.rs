//! Heap objects and the registry that owns them.
//!
//! Every object is owned by a [`Heap`]; values only ever hold an [`ObjRef`]
//! handle. Objects are threaded into a singly linked list (newest at the
//! head) and all of them are released together by [`Heap::free_all`].
//! Handles carry the heap epoch they were issued in, so a handle that
//! outlives a teardown resolves to `None` instead of aliasing a new object.

/// Handle to an object owned by a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    index: u32,
    epoch: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjKind {
    String(String),
}

#[derive(Debug)]
pub struct Obj {
    pub kind: ObjKind,
    next: Option<ObjRef>,
}

impl Obj {
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ObjKind::String(s) => Some(s),
        }
    }
}

impl std::fmt::Display for Obj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ObjKind::String(s) => write!(f, "{}", s),
        }
    }
}

/// Allocation bookkeeping. `freed` only moves during teardown or rollback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub allocated: usize,
    pub freed: usize,
}

/// Opaque position in the allocation sequence, see [`Heap::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapMark(usize);

#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Obj>,
    head: Option<ObjRef>,
    epoch: u32,
    stats: HeapStats,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    /// Registers a new string object and returns its handle.
    pub fn alloc_string(&mut self, s: impl Into<String>) -> ObjRef {
        self.alloc(ObjKind::String(s.into()))
    }

    fn alloc(&mut self, kind: ObjKind) -> ObjRef {
        let handle = ObjRef { index: self.objects.len() as u32, epoch: self.epoch };
        self.objects.push(Obj { kind, next: self.head });
        self.head = Some(handle);
        self.stats.allocated += 1;
        handle
    }

    pub fn get(&self, handle: ObjRef) -> Option<&Obj> {
        if handle.epoch != self.epoch {
            return None;
        }
        self.objects.get(handle.index as usize)
    }

    pub fn as_str(&self, handle: ObjRef) -> Option<&str> {
        self.get(handle).and_then(Obj::as_str)
    }

    /// Number of live objects reachable from the list head.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn head(&self) -> Option<ObjRef> {
        self.head
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Walks the object list from the head, newest object first.
    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, &Obj)> + '_ {
        std::iter::successors(self.head, move |h| self.get(*h).and_then(|o| o.next))
            .filter_map(move |h| self.get(h).map(|o| (h, o)))
    }

    pub fn mark(&self) -> HeapMark {
        HeapMark(self.objects.len())
    }

    /// Frees every object allocated after `mark`, newest first.
    pub fn release_since(&mut self, mark: HeapMark) {
        while self.objects.len() > mark.0 {
            let Some(obj) = self.objects.pop() else { break };
            self.head = obj.next;
            self.stats.freed += 1;
        }
    }

    /// Frees every object exactly once and invalidates outstanding handles.
    pub fn free_all(&mut self) {
        if self.objects.is_empty() {
            return;
        }
        let count = self.objects.len();
        let mut cursor = self.head.take();
        while let Some(handle) = cursor {
            // read `next` before the node goes away
            cursor = self.objects[handle.index as usize].next;
            self.objects.truncate(handle.index as usize);
            self.stats.freed += 1;
        }
        self.objects.clear();
        self.epoch = self.epoch.wrapping_add(1);
        tracing::debug!(freed = count, "released heap objects");
    }
}
