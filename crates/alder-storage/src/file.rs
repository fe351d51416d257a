//! Paged files: named files of fixed-size pages.

use alder_buffer::PageStore;
use alder_common::page::{PageId, PAGE_SIZE};
use alder_common::{AlderError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// Source of process-unique store identifiers for open file handles.
static NEXT_FILE_ID: AtomicU32 = AtomicU32::new(1);

/// A named file exposing fixed-size pages identified by small integers.
///
/// Pages are numbered from [`PagedFile::FIRST_PAGE_NO`]; page `p` lives at
/// byte offset `(p - 1) * PAGE_SIZE`. Every open handle carries a
/// process-unique `file_id` used to key buffer frames, so a file must not
/// be opened through two live handles at once.
pub struct PagedFile {
    path: PathBuf,
    file_id: u32,
    fsync_enabled: bool,
    inner: Mutex<PagedFileInner>,
}

struct PagedFileInner {
    file: File,
    num_pages: u32,
}

impl PagedFile {
    /// The well-known first page of every paged file.
    pub const FIRST_PAGE_NO: u32 = 1;

    /// Creates a new paged file. Fails if the file already exists.
    pub fn create(path: &Path, fsync_enabled: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file_id: NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed),
            fsync_enabled,
            inner: Mutex::new(PagedFileInner { file, num_pages: 0 }),
        })
    }

    /// Opens an existing paged file. Fails if the file does not exist.
    pub fn open(path: &Path, fsync_enabled: bool) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            path: path.to_path_buf(),
            file_id: NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed),
            fsync_enabled,
            inner: Mutex::new(PagedFileInner { file, num_pages }),
        })
    }

    /// Returns true if a file exists at the given path.
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Deletes the file at the given path.
    pub fn remove(path: &Path) -> Result<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Returns the path of this file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of pages in the file.
    pub fn num_pages(&self) -> u32 {
        self.inner.lock().num_pages
    }

    /// Returns whether fsync is enabled for this file.
    pub fn fsync_enabled(&self) -> bool {
        self.fsync_enabled
    }

    /// Syncs all buffered writes to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    fn page_offset(page_num: u32) -> u64 {
        (page_num as u64 - 1) * PAGE_SIZE as u64
    }
}

impl PageStore for PagedFile {
    fn store_id(&self) -> u32 {
        self.file_id
    }

    fn read_page(&self, page_num: u32, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        if page_num < Self::FIRST_PAGE_NO || page_num > inner.num_pages {
            return Err(AlderError::PageNotFound {
                page: PageId::new(self.file_id, page_num),
            });
        }

        inner.file.seek(SeekFrom::Start(Self::page_offset(page_num)))?;
        inner.file.read_exact(buf)?;
        Ok(())
    }

    fn write_page(&self, page_num: u32, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        let mut inner = self.inner.lock();

        if page_num < Self::FIRST_PAGE_NO || page_num > inner.num_pages {
            return Err(AlderError::PageNotFound {
                page: PageId::new(self.file_id, page_num),
            });
        }

        inner.file.seek(SeekFrom::Start(Self::page_offset(page_num)))?;
        inner.file.write_all(buf)?;

        if self.fsync_enabled {
            inner.file.sync_all()?;
        }
        Ok(())
    }

    fn allocate_page(&self) -> Result<u32> {
        let mut inner = self.inner.lock();

        let page_num = inner.num_pages + 1;
        inner.file.seek(SeekFrom::Start(Self::page_offset(page_num)))?;
        inner.file.write_all(&[0u8; PAGE_SIZE])?;

        if self.fsync_enabled {
            inner.file.sync_all()?;
        }

        inner.num_pages = page_num;
        Ok(page_num)
    }
}

impl Drop for PagedFile {
    fn drop(&mut self) {
        let _ = self.inner.lock().file.sync_all();
    }
}
