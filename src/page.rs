use crate::page_id::PageId;
use crate::transaction_id::TransactionId;

pub const PAGE_SIZE: usize = 4096;

/// Fixed-size mutable byte image of a page (spec.md §3). The core treats
/// the body as opaque bytes; schema-interpreted tuple slots are owned by
/// the external heap layer (spec.md §6).
#[derive(Clone)]
pub struct Page {
    id: PageId,
    data: [u8; PAGE_SIZE],
    /// `Some(tid)` iff this in-memory image has mutations from `tid`
    /// not yet flushed to `PageStore`.
    dirty: Option<TransactionId>,
}

impl Page {
    pub fn new(id: PageId, data: [u8; PAGE_SIZE]) -> Self {
        Self {
            id,
            data,
            dirty: None,
        }
    }

    pub fn zeroed(id: PageId) -> Self {
        Self::new(id, [0u8; PAGE_SIZE])
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirty
    }

    /// Mark this page dirty with the given transaction (spec.md §4.5.2,
    /// §4.5.3: "Mark every page returned dirty with `tid`").
    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirty = Some(tid);
    }

    pub fn mark_clean(&mut self) {
        self.dirty = None;
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("dirty", &self.dirty)
            .finish()
    }
}
