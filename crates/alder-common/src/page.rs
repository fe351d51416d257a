//! Page and record identifiers for AlderDB storage.

use serde::{Deserialize, Serialize};

/// Page size in bytes (4 KB).
pub const PAGE_SIZE: usize = 4 * 1024;

/// Identity of a buffered page, packed into one word.
///
/// The buffer layer keys frames and page tables on a single integer, so a
/// PageId is stored packed: the owning store handle in the upper 32 bits,
/// the page number within that store in the lower 32. Page numbers start
/// at 1; 0 is never a valid page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(u64);

impl PageId {
    /// Builds a PageId from a store handle id and a page number.
    pub fn new(file_id: u32, page_num: u32) -> Self {
        Self(((file_id as u64) << 32) | page_num as u64)
    }

    /// Identifier of the owning store handle.
    pub fn file_id(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Page number within the store.
    pub fn page_num(&self) -> u32 {
        self.0 as u32
    }

    /// The packed word, used directly as a frame and page-table key.
    pub fn as_key(&self) -> u64 {
        self.0
    }

    /// Rebuilds a PageId from its packed word.
    pub fn from_key(key: u64) -> Self {
        Self(key)
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.file_id(), self.page_num())
    }
}

/// Identifier of a record in a base relation.
///
/// Heap pages are numbered from 1, so `page_number == 0` is reserved as
/// the sentinel for "empty slot" in index leaf pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    /// Heap page holding the record.
    pub page_number: u32,
    /// Slot within the page.
    pub slot_number: u16,
}

impl RecordId {
    /// The empty-slot sentinel.
    pub const NULL: RecordId = RecordId {
        page_number: 0,
        slot_number: 0,
    };

    /// Creates a new RecordId.
    pub fn new(page_number: u32, slot_number: u16) -> Self {
        Self {
            page_number,
            slot_number,
        }
    }

    /// Returns true if this is the empty-slot sentinel.
    pub fn is_null(&self) -> bool {
        self.page_number == 0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.page_number, self.slot_number)
    }
}
