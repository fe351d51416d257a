//! Heap files: slotted record storage for base relations.
//!
//! A heap file is the record stream an index is built from. Pages are
//! cached by the buffer manager; records are opaque byte strings addressed
//! by [`RecordId`]. The scan visits records in page/slot order, pinning one
//! page at a time.

use crate::file::PagedFile;
use alder_buffer::{BufferManager, PageStore};
use alder_common::page::{RecordId, PAGE_SIZE};
use alder_common::{AlderError, Result, StorageConfig};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Slotted heap page accessors.
///
/// Layout:
/// - `num_slots: u16` at offset 0
/// - `data_end: u16` at offset 2 (record bytes grow backward from PAGE_SIZE)
/// - slot directory from offset 4, one `(offset: u16, len: u16)` per record
pub struct HeapPage;

impl HeapPage {
    /// Offset of the slot directory.
    const SLOT_ARRAY_START: usize = 4;

    /// Size of each slot directory entry.
    const SLOT_SIZE: usize = 4;

    /// Initializes an empty heap page.
    pub fn init(data: &mut [u8]) {
        data[0..2].copy_from_slice(&0u16.to_le_bytes());
        data[2..4].copy_from_slice(&(PAGE_SIZE as u16).to_le_bytes());
    }

    /// Returns the number of records on the page.
    pub fn num_slots(data: &[u8]) -> u16 {
        u16::from_le_bytes([data[0], data[1]])
    }

    fn data_end(data: &[u8]) -> usize {
        let raw = u16::from_le_bytes([data[2], data[3]]) as usize;
        // A zeroed page has data_end == 0, meaning it was never initialized
        if raw == 0 || raw > PAGE_SIZE {
            PAGE_SIZE
        } else {
            raw
        }
    }

    /// Returns the free space available for one more record plus its slot.
    pub fn free_space(data: &[u8]) -> usize {
        let slot_array_end =
            Self::SLOT_ARRAY_START + Self::num_slots(data) as usize * Self::SLOT_SIZE;
        Self::data_end(data).saturating_sub(slot_array_end)
    }

    /// Appends a record, returning its slot number.
    pub fn insert_record(data: &mut [u8], record: &[u8]) -> Result<u16> {
        let num_slots = Self::num_slots(data) as usize;
        let data_end = Self::data_end(data);

        if Self::free_space(data) < record.len() + Self::SLOT_SIZE {
            return Err(AlderError::PageFull);
        }

        let new_data_end = data_end - record.len();
        data[new_data_end..data_end].copy_from_slice(record);

        let slot_offset = Self::SLOT_ARRAY_START + num_slots * Self::SLOT_SIZE;
        data[slot_offset..slot_offset + 2].copy_from_slice(&(new_data_end as u16).to_le_bytes());
        data[slot_offset + 2..slot_offset + 4]
            .copy_from_slice(&(record.len() as u16).to_le_bytes());

        data[0..2].copy_from_slice(&((num_slots + 1) as u16).to_le_bytes());
        data[2..4].copy_from_slice(&(new_data_end as u16).to_le_bytes());

        Ok(num_slots as u16)
    }

    /// Returns the record in the given slot, or None if the slot is unused.
    pub fn record(data: &[u8], slot: u16) -> Option<&[u8]> {
        if slot >= Self::num_slots(data) {
            return None;
        }
        let slot_offset = Self::SLOT_ARRAY_START + slot as usize * Self::SLOT_SIZE;
        let offset = u16::from_le_bytes([data[slot_offset], data[slot_offset + 1]]) as usize;
        let len = u16::from_le_bytes([data[slot_offset + 2], data[slot_offset + 3]]) as usize;
        Some(&data[offset..offset + len])
    }
}

/// A heap relation backed by a paged file cached in the buffer pool.
pub struct HeapFile {
    name: String,
    dir: PathBuf,
    file: Arc<PagedFile>,
    buf: BufferManager,
}

impl HeapFile {
    /// Creates a new heap relation file `<data_dir>/<name>`.
    pub fn create(buf: BufferManager, config: &StorageConfig, name: &str) -> Result<Self> {
        let file = Arc::new(PagedFile::create(
            &config.data_dir.join(name),
            config.fsync_enabled,
        )?);
        Ok(Self {
            name: name.to_string(),
            dir: config.data_dir.clone(),
            file,
            buf,
        })
    }

    /// Opens an existing heap relation file `<data_dir>/<name>`.
    pub fn open(buf: BufferManager, config: &StorageConfig, name: &str) -> Result<Self> {
        let file = Arc::new(PagedFile::open(
            &config.data_dir.join(name),
            config.fsync_enabled,
        )?);
        Ok(Self {
            name: name.to_string(),
            dir: config.data_dir.clone(),
            file,
            buf,
        })
    }

    /// Returns the relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the directory the relation lives in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the backing paged file.
    pub fn file(&self) -> &Arc<PagedFile> {
        &self.file
    }

    /// Returns the buffer manager caching this relation's pages.
    pub fn buffer(&self) -> &BufferManager {
        &self.buf
    }

    /// Appends a record, returning its RecordId.
    ///
    /// Heap pages are numbered from 1, so the returned RID never collides
    /// with the empty-slot sentinel.
    pub fn insert_record(&self, record: &[u8]) -> Result<RecordId> {
        if record.len() + 8 > PAGE_SIZE {
            return Err(AlderError::PageFull);
        }

        let last = self.file.num_pages();
        if last >= PagedFile::FIRST_PAGE_NO {
            let page = self.buf.read_page(self.file.clone(), last)?;
            let fits = page.with_bytes(|d| HeapPage::free_space(d) >= record.len() + 4);
            if fits {
                let slot = page.with_bytes_mut(|d| HeapPage::insert_record(d, record))?;
                return Ok(RecordId::new(last, slot));
            }
        }

        let (page_num, page) = self.buf.alloc_page(self.file.clone())?;
        let slot = page.with_bytes_mut(|d| {
            HeapPage::init(d);
            HeapPage::insert_record(d, record)
        })?;
        Ok(RecordId::new(page_num, slot))
    }

    /// Fetches a record by its RecordId.
    pub fn record(&self, rid: RecordId) -> Result<Option<Bytes>> {
        if rid.is_null() || rid.page_number > self.file.num_pages() {
            return Ok(None);
        }
        let page = self.buf.read_page(self.file.clone(), rid.page_number)?;
        Ok(page.with_bytes(|d| HeapPage::record(d, rid.slot_number).map(Bytes::copy_from_slice)))
    }

    /// Returns a scan over every record in page/slot order.
    pub fn scan(&self) -> RecordScan<'_> {
        RecordScan {
            heap: self,
            page_num: PagedFile::FIRST_PAGE_NO,
            slot: 0,
        }
    }

    /// Flushes all dirty pages of this relation.
    pub fn flush(&self) -> Result<()> {
        self.buf.flush_store(self.file.store_id())
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        let _ = self.buf.flush_store(self.file.store_id());
    }
}

/// Iterator over the records of a heap file.
///
/// Each step pins the current page only for the duration of the read.
pub struct RecordScan<'a> {
    heap: &'a HeapFile,
    page_num: u32,
    slot: u16,
}

impl Iterator for RecordScan<'_> {
    type Item = Result<(RecordId, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.page_num > self.heap.file.num_pages() {
                return None;
            }

            let page = match self
                .heap
                .buf
                .read_page(self.heap.file.clone(), self.page_num)
            {
                Ok(page) => page,
                Err(e) => return Some(Err(e)),
            };

            let record =
                page.with_bytes(|d| HeapPage::record(d, self.slot).map(Bytes::copy_from_slice));

            match record {
                Some(data) => {
                    let rid = RecordId::new(self.page_num, self.slot);
                    self.slot += 1;
                    return Some(Ok((rid, data)));
                }
                None => {
                    self.page_num += 1;
                    self.slot = 0;
                }
            }
        }
    }
}
