//! Buffer manager.

use crate::frame::{BufferFrame, FrameId};
use crate::page_table::PageTable;
use crate::replacer::{ClockReplacer, Replacer};
use crate::store::PageStore;
use alder_common::page::{PageId, PAGE_SIZE};
use alder_common::{AlderError, Result, StorageConfig};
use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::Arc;
use sysinfo::System;

/// Configuration for the buffer manager.
#[derive(Debug, Clone)]
pub struct BufferManagerConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
}

impl Default for BufferManagerConfig {
    fn default() -> Self {
        Self { num_frames: 1024 }
    }
}

/// Buffer manager.
///
/// Manages a fixed pool of page frames with:
/// - Page ID to frame ID mapping
/// - Free frame list for newly cached pages
/// - Clock replacement; only frames with pin count zero are evicted
/// - Write-back of dirty victims through the owning page store
///
/// The handle is cheap to clone; clones share one pool. `read_page` and
/// `alloc_page` return [`PinnedPage`] guards that release their pin on
/// every exit path, carrying the dirty flag.
#[derive(Clone)]
pub struct BufferManager {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: BufferManagerConfig,
    frames: Vec<BufferFrame>,
    page_table: PageTable,
    free_list: Mutex<Vec<FrameId>>,
    replacer: ClockReplacer,
}

impl BufferManager {
    /// Creates a new buffer manager.
    pub fn new(config: BufferManagerConfig) -> Self {
        let num_frames = config.num_frames;

        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        // All frames start in the free list
        let free_list: Vec<_> = (0..num_frames).map(|i| FrameId(i as u32)).collect();

        Self {
            inner: Arc::new(PoolInner {
                frames,
                page_table: PageTable::new(num_frames),
                free_list: Mutex::new(free_list),
                replacer: ClockReplacer::new(num_frames),
                config,
            }),
        }
    }

    /// Creates a buffer manager sized from the storage configuration.
    pub fn with_config(config: &StorageConfig) -> Self {
        Self::new(BufferManagerConfig {
            num_frames: config.buffer_pool_pages,
        })
    }

    /// Creates a buffer manager sized to 25% of available system RAM,
    /// with a floor of 1,000 frames on low-memory systems.
    pub fn auto_sized() -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let num_frames = (target_bytes / PAGE_SIZE).max(1_000);

        Self::new(BufferManagerConfig { num_frames })
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.inner.config.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.inner.free_list.lock().len()
    }

    /// Returns the number of pages currently buffered.
    pub fn page_count(&self) -> usize {
        self.inner.page_table.len()
    }

    /// Checks if a page is currently buffered.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.page_table.contains(page_id)
    }

    /// Reads a page through the pool, pinning it.
    ///
    /// A cached page is pinned in place; otherwise a frame is claimed
    /// (evicting an unpinned victim if necessary, writing it back if
    /// dirty) and the page is read from the store.
    pub fn read_page(&self, store: Arc<dyn PageStore>, page_num: u32) -> Result<PinnedPage> {
        let page_id = PageId::new(store.store_id(), page_num);

        if let Some(frame_id) = self.inner.page_table.get(page_id) {
            let frame = &self.inner.frames[frame_id.0 as usize];
            frame.pin();
            self.inner.replacer.record_access(frame_id);
            return Ok(PinnedPage::new(self.clone(), page_id, frame_id));
        }

        let frame_id = self.claim_frame()?;
        let frame = &self.inner.frames[frame_id.0 as usize];
        frame.reset();

        {
            let mut data = frame.write_data();
            if let Err(e) = store.read_page(page_num, &mut data) {
                drop(data);
                frame.reset();
                self.inner.free_list.lock().push(frame_id);
                return Err(e);
            }
        }

        self.install_frame(frame_id, page_id, store);
        Ok(PinnedPage::new(self.clone(), page_id, frame_id))
    }

    /// Allocates a fresh page in the store and pins it.
    ///
    /// The returned page bytes are zeroed. Returns the new page number
    /// along with the pinned guard.
    pub fn alloc_page(&self, store: Arc<dyn PageStore>) -> Result<(u32, PinnedPage)> {
        let page_num = store.allocate_page()?;
        let page_id = PageId::new(store.store_id(), page_num);

        let frame_id = self.claim_frame()?;
        let frame = &self.inner.frames[frame_id.0 as usize];
        frame.reset();

        self.install_frame(frame_id, page_id, store);
        Ok((page_num, PinnedPage::new(self.clone(), page_id, frame_id)))
    }

    /// Unpins a page, optionally marking it dirty.
    ///
    /// Fails with `PageNotFound` if the page is not buffered and with
    /// `PageNotPinned` if its pin count is already zero.
    pub fn unpin_page(&self, page_id: PageId, dirty: bool) -> Result<()> {
        let frame_id = self
            .inner
            .page_table
            .get(page_id)
            .ok_or(AlderError::PageNotFound { page: page_id })?;
        let frame = &self.inner.frames[frame_id.0 as usize];

        if frame.pin_count() == 0 {
            return Err(AlderError::PageNotPinned { page: page_id });
        }

        if dirty {
            frame.set_dirty(true);
        }
        frame.unpin();
        Ok(())
    }

    /// Flushes every dirty page of one store, failing with `PagePinned`
    /// if any page of that store is still pinned.
    pub fn flush_store(&self, store_id: u32) -> Result<()> {
        let mut pages = Vec::new();
        self.inner.page_table.for_each(|page_id, frame_id| {
            if page_id.file_id() == store_id {
                pages.push((page_id, frame_id));
            }
            true
        });

        for (page_id, frame_id) in &pages {
            if self.inner.frames[frame_id.0 as usize].is_pinned() {
                return Err(AlderError::PagePinned { page: *page_id });
            }
        }

        for (page_id, frame_id) in pages {
            let frame = &self.inner.frames[frame_id.0 as usize];
            if frame.is_dirty() {
                if let Some(store) = frame.store() {
                    let data = frame.read_data();
                    store.write_page(page_id.page_num(), &data)?;
                }
                frame.set_dirty(false);
            }
        }
        Ok(())
    }

    /// Returns statistics about the pool.
    pub fn stats(&self) -> BufferManagerStats {
        let mut pinned_frames = 0;
        let mut dirty_frames = 0;

        self.inner.page_table.for_each(|_, frame_id| {
            let frame = &self.inner.frames[frame_id.0 as usize];
            if frame.is_pinned() {
                pinned_frames += 1;
            }
            if frame.is_dirty() {
                dirty_frames += 1;
            }
            true
        });

        BufferManagerStats {
            total_frames: self.inner.config.num_frames,
            free_frames: self.free_count(),
            used_frames: self.inner.page_table.len(),
            pinned_frames,
            dirty_frames,
        }
    }

    /// Claims a frame from the free list, or evicts an unpinned victim.
    fn claim_frame(&self) -> Result<FrameId> {
        {
            let mut free_list = self.inner.free_list.lock();
            if let Some(frame_id) = free_list.pop() {
                return Ok(frame_id);
            }
        }

        let victim = self
            .inner
            .replacer
            .evict(&|fid| self.inner.frames[fid.0 as usize].pin_count() == 0);

        let Some(victim) = victim else {
            return Err(AlderError::BufferPoolFull);
        };

        let frame = &self.inner.frames[victim.0 as usize];

        // Write the victim back before reuse if it is dirty
        if frame.is_dirty() {
            if let (Some(page_id), Some(store)) = (frame.page_id(), frame.store()) {
                let data = frame.read_data();
                if let Err(e) = store.write_page(page_id.page_num(), &data) {
                    drop(data);
                    // Keep the victim cached; the write may succeed later
                    self.inner.replacer.insert(victim);
                    return Err(e);
                }
            }
            frame.set_dirty(false);
        }

        if let Some(old_page_id) = frame.page_id() {
            self.inner.page_table.remove(old_page_id);
        }

        Ok(victim)
    }

    /// Wires a claimed frame to a page: pins it and registers it with the
    /// page table and the replacer.
    fn install_frame(&self, frame_id: FrameId, page_id: PageId, store: Arc<dyn PageStore>) {
        let frame = &self.inner.frames[frame_id.0 as usize];
        frame.set_page_id(Some(page_id));
        frame.set_store(Some(store));
        frame.pin();
        self.inner.page_table.insert(page_id, frame_id);
        self.inner.replacer.insert(frame_id);
        self.inner.replacer.record_access(frame_id);
    }

    fn frame(&self, frame_id: FrameId) -> &BufferFrame {
        &self.inner.frames[frame_id.0 as usize]
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferManagerStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames holding pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// RAII guard for a pinned page.
///
/// The pin is released exactly once when the guard drops, on every
/// control-flow exit. Mutable access through [`PinnedPage::with_bytes_mut`]
/// marks the page dirty, so an unpin after mutation always writes back.
pub struct PinnedPage {
    mgr: BufferManager,
    page_id: PageId,
    frame_id: FrameId,
    dirty: Cell<bool>,
}

impl PinnedPage {
    fn new(mgr: BufferManager, page_id: PageId, frame_id: FrameId) -> Self {
        Self {
            mgr,
            page_id,
            frame_id,
            dirty: Cell::new(false),
        }
    }

    /// Returns the buffered page's ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page number within its store.
    pub fn page_num(&self) -> u32 {
        self.page_id.page_num()
    }

    /// Marks the page dirty without touching its bytes.
    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    /// Grants shared access to the page bytes.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8; PAGE_SIZE]) -> R) -> R {
        let frame = self.mgr.frame(self.frame_id);
        let data = frame.read_data();
        f(&data)
    }

    /// Grants exclusive access to the page bytes and marks the page dirty.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8; PAGE_SIZE]) -> R) -> R {
        self.dirty.set(true);
        let frame = self.mgr.frame(self.frame_id);
        let mut data = frame.write_data();
        f(&mut data)
    }
}

impl Drop for PinnedPage {
    fn drop(&mut self) {
        let _ = self.mgr.unpin_page(self.page_id, self.dirty.get());
    }
}

impl std::fmt::Debug for PinnedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedPage")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .field("dirty", &self.dirty.get())
            .finish()
    }
}
