//! Page table mapping buffered page IDs to frame IDs.

use crate::frame::FrameId;
use alder_common::page::PageId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Map from PageId to the frame currently holding that page.
///
/// Keyed on the page ID's packed word. The engine contract is
/// single-threaded cooperative, so a mutex-guarded map is sufficient.
pub struct PageTable {
    inner: Mutex<HashMap<u64, FrameId>>,
}

impl PageTable {
    /// Creates a page table sized for the given number of frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Looks up a page ID and returns its frame ID if present.
    pub fn get(&self, page_id: PageId) -> Option<FrameId> {
        self.inner.lock().get(&page_id.as_key()).copied()
    }

    /// Returns true if the page is present.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.lock().contains_key(&page_id.as_key())
    }

    /// Inserts a page ID to frame ID mapping.
    pub fn insert(&self, page_id: PageId, frame_id: FrameId) {
        self.inner.lock().insert(page_id.as_key(), frame_id);
    }

    /// Removes a mapping, returning the frame it pointed to.
    pub fn remove(&self, page_id: PageId) -> Option<FrameId> {
        self.inner.lock().remove(&page_id.as_key())
    }

    /// Returns the number of buffered pages.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if no pages are buffered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Visits every mapping. The callback returns false to stop early.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(PageId, FrameId) -> bool,
    {
        let inner = self.inner.lock();
        for (&key, &frame_id) in inner.iter() {
            if !f(PageId::from_key(key), frame_id) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_table_insert_get() {
        let table = PageTable::new(16);
        let page_id = PageId::new(1, 7);

        assert!(table.get(page_id).is_none());
        table.insert(page_id, FrameId(3));
        assert_eq!(table.get(page_id), Some(FrameId(3)));
        assert!(table.contains(page_id));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_page_table_remove() {
        let table = PageTable::new(16);
        let page_id = PageId::new(1, 7);

        table.insert(page_id, FrameId(3));
        assert_eq!(table.remove(page_id), Some(FrameId(3)));
        assert!(table.get(page_id).is_none());
        assert_eq!(table.remove(page_id), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_page_table_overwrite() {
        let table = PageTable::new(16);
        let page_id = PageId::new(1, 7);

        table.insert(page_id, FrameId(3));
        table.insert(page_id, FrameId(9));
        assert_eq!(table.get(page_id), Some(FrameId(9)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_page_table_distinguishes_files() {
        let table = PageTable::new(16);

        table.insert(PageId::new(1, 7), FrameId(1));
        table.insert(PageId::new(2, 7), FrameId(2));

        assert_eq!(table.get(PageId::new(1, 7)), Some(FrameId(1)));
        assert_eq!(table.get(PageId::new(2, 7)), Some(FrameId(2)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_page_table_for_each() {
        let table = PageTable::new(16);
        for i in 0..5 {
            table.insert(PageId::new(1, i), FrameId(i));
        }

        let mut seen = 0;
        table.for_each(|_, _| {
            seen += 1;
            true
        });
        assert_eq!(seen, 5);

        let mut visited = 0;
        table.for_each(|_, _| {
            visited += 1;
            visited < 2
        });
        assert_eq!(visited, 2);
    }
}
