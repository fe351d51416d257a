//! The B+ tree engine, monomorphized per key kind.

use super::key::{IndexKey, PageKeyPair};
use super::meta::IndexMeta;
use super::node::{InnerNode, LeafNode};
use super::scan::{Operator, ScanState};
use crate::file::PagedFile;
use crate::heap::HeapFile;
use alder_buffer::{BufferManager, PageStore, PinnedPage};
use alder_common::page::RecordId;
use alder_common::{AlderError, Result};
use std::cmp::Ordering;
use std::sync::Arc;

/// A disk-resident B+ tree index over one fixed-type attribute.
///
/// The index file holds the header on the file's first page and the
/// initial leaf root on page 2; the root page number in the header is the
/// only authoritative root pointer, so the root is a leaf exactly while it
/// is still page 2. All page access goes through the buffer manager; every
/// pin is scoped, and the only pin held between public calls is the
/// current leaf of an active scan.
pub(crate) struct BTree<K: IndexKey> {
    index_name: String,
    file: Arc<PagedFile>,
    buf: BufferManager,
    header_page_no: u32,
    root_page_no: u32,
    attr_offset: usize,
    scan: ScanState<K>,
}

impl<K: IndexKey> BTree<K> {
    /// The page the root leaf is created on; the root is a leaf while it
    /// still lives here.
    const LEAF_ROOT_PAGE_NO: u32 = 2;

    /// Opens the index for `relation`'s attribute at `attr_offset`,
    /// creating and bulk-building it if the index file does not exist.
    ///
    /// The index file is named `"<relation>.<offset>"` in the relation's
    /// directory. Opening an existing file validates the persisted
    /// attribute offset and kind against the caller's and fails with
    /// `BadIndexInfo` on mismatch.
    pub fn open_or_create(
        buf: BufferManager,
        relation: &HeapFile,
        attr_offset: usize,
    ) -> Result<Self> {
        let index_name = format!("{}.{}", relation.name(), attr_offset);
        let path = relation.dir().join(&index_name);
        let fsync_enabled = relation.file().fsync_enabled();

        if PagedFile::exists(&path) {
            let file = Arc::new(PagedFile::open(&path, fsync_enabled)?);
            let header = buf.read_page(file.clone(), PagedFile::FIRST_PAGE_NO)?;
            let meta = header.with_bytes(|d| IndexMeta::read(d));
            drop(header);

            if meta.attr_offset != attr_offset as i32 || meta.attr_kind != K::KIND.as_i32() {
                return Err(AlderError::BadIndexInfo(format!(
                    "{} holds (offset {}, kind {}); requested (offset {}, kind {})",
                    index_name,
                    meta.attr_offset,
                    meta.attr_kind,
                    attr_offset,
                    K::KIND.as_i32(),
                )));
            }

            Ok(Self {
                index_name,
                file,
                buf,
                header_page_no: PagedFile::FIRST_PAGE_NO,
                root_page_no: meta.root_page_no,
                attr_offset,
                scan: ScanState::Idle,
            })
        } else {
            let file = Arc::new(PagedFile::create(&path, fsync_enabled)?);

            let (header_page_no, header) = buf.alloc_page(file.clone())?;
            let (root_page_no, root) = buf.alloc_page(file.clone())?;
            debug_assert_eq!(header_page_no, PagedFile::FIRST_PAGE_NO);
            debug_assert_eq!(root_page_no, Self::LEAF_ROOT_PAGE_NO);

            let meta = IndexMeta {
                relation_name: relation.name().to_string(),
                attr_offset: attr_offset as i32,
                attr_kind: K::KIND.as_i32(),
                root_page_no,
            };
            header.with_bytes_mut(|d| meta.write(d));
            root.with_bytes_mut(|d| LeafNode::<K>::init(d));
            drop(header);
            drop(root);

            let mut tree = Self {
                index_name,
                file,
                buf,
                header_page_no,
                root_page_no,
                attr_offset,
                scan: ScanState::Idle,
            };

            for entry in relation.scan() {
                let (rid, record) = entry?;
                let key = K::from_record(&record, attr_offset)?;
                tree.insert(key, rid)?;
            }
            tree.buf.flush_store(tree.file.store_id())?;

            Ok(tree)
        }
    }

    /// Returns the index file name, `"<relation>.<offset>"`.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Returns the byte offset of the indexed attribute.
    pub fn attr_offset(&self) -> usize {
        self.attr_offset
    }

    /// Returns the current root page number.
    pub fn root_page_no(&self) -> u32 {
        self.root_page_no
    }

    fn root_is_leaf(&self) -> bool {
        self.root_page_no == Self::LEAF_ROOT_PAGE_NO
    }

    // -------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------

    /// Inserts a key/RID entry.
    pub fn insert(&mut self, key: K, rid: RecordId) -> Result<()> {
        if self.root_is_leaf() {
            return self.insert_root_leaf(key, rid);
        }

        if let Some(separator) = self.insert_descend(self.root_page_no, key, rid)? {
            // The root overflowed somewhere below us and handed back a live
            // separator; grow a new root over the two halves.
            self.grow_root(separator, 0)?;
        }
        Ok(())
    }

    /// Inserts a key extracted from a raw record buffer.
    pub fn insert_from_record(&mut self, record: &[u8], rid: RecordId) -> Result<()> {
        let key = K::from_record(record, self.attr_offset)?;
        self.insert(key, rid)
    }

    /// Insert while the tree is a single leaf, growing the first non-leaf
    /// root when that leaf overflows.
    fn insert_root_leaf(&mut self, key: K, rid: RecordId) -> Result<()> {
        let root = self.buf.read_page(self.file.clone(), self.root_page_no)?;

        if !root.with_bytes(|d| LeafNode::<K>::is_full(d)) {
            root.with_bytes_mut(|d| LeafNode::<K>::insert(d, &key, rid));
            return Ok(());
        }

        let separator = self.split_leaf(&root, key, rid)?;
        drop(root);
        self.grow_root(separator, 1)
    }

    /// Recursive descent below a non-leaf. Returns the separator promoted
    /// out of `page_no` if it split, for the caller to absorb.
    fn insert_descend(
        &mut self,
        page_no: u32,
        key: K,
        rid: RecordId,
    ) -> Result<Option<PageKeyPair<K>>> {
        let node = self.buf.read_page(self.file.clone(), page_no)?;
        let (level, child_no) = node.with_bytes(|d| {
            let slot = InnerNode::<K>::find_child(d, &key);
            (InnerNode::<K>::level(d), InnerNode::<K>::child_at(d, slot))
        });

        if level == 1 {
            let leaf = self.buf.read_page(self.file.clone(), child_no)?;
            if !leaf.with_bytes(|d| LeafNode::<K>::is_full(d)) {
                leaf.with_bytes_mut(|d| LeafNode::<K>::insert(d, &key, rid));
                return Ok(None);
            }
            let separator = self.split_leaf(&leaf, key, rid)?;
            drop(leaf);
            self.place_separator(&node, separator)
        } else {
            match self.insert_descend(child_no, key, rid)? {
                Some(separator) => self.place_separator(&node, separator),
                None => Ok(None),
            }
        }
    }

    /// Absorbs a separator promoted from a split child: inserted in place
    /// when the node has room, otherwise the node splits and its own
    /// separator propagates to the caller.
    fn place_separator(
        &mut self,
        node: &PinnedPage,
        separator: PageKeyPair<K>,
    ) -> Result<Option<PageKeyPair<K>>> {
        if node.with_bytes(|d| InnerNode::<K>::is_full(d)) {
            Ok(Some(self.split_inner(node, separator)?))
        } else {
            node.with_bytes_mut(|d| InnerNode::<K>::insert(d, &separator));
            Ok(None)
        }
    }

    /// Splits a full leaf and places the incoming entry into the correct
    /// half. Returns the separator to promote.
    fn split_leaf(&mut self, left: &PinnedPage, key: K, rid: RecordId) -> Result<PageKeyPair<K>> {
        let (right_page_no, right) = self.buf.alloc_page(self.file.clone())?;

        let separator_key = left.with_bytes_mut(|left_data| {
            right.with_bytes_mut(|right_data| {
                LeafNode::<K>::split(left_data, right_data, right_page_no);
                let first_right = LeafNode::<K>::key_at(right_data, 0);

                if key.compare(&first_right) == Ordering::Less {
                    LeafNode::<K>::insert(left_data, &key, rid);
                } else {
                    LeafNode::<K>::insert(right_data, &key, rid);
                }
                first_right
            })
        });

        Ok(PageKeyPair {
            page_no: right_page_no,
            key: separator_key,
        })
    }

    /// Splits a full non-leaf and places the incoming separator into the
    /// correct half. Returns the separator to promote.
    fn split_inner(
        &mut self,
        left: &PinnedPage,
        separator: PageKeyPair<K>,
    ) -> Result<PageKeyPair<K>> {
        let (right_page_no, right) = self.buf.alloc_page(self.file.clone())?;

        let promoted_key = left.with_bytes_mut(|left_data| {
            right.with_bytes_mut(|right_data| {
                InnerNode::<K>::split(left_data, right_data);
                let first_right = InnerNode::<K>::key_at(right_data, 0);

                if separator.key.compare(&first_right) == Ordering::Less {
                    InnerNode::<K>::insert(left_data, &separator);
                } else {
                    InnerNode::<K>::insert(right_data, &separator);
                }
                first_right
            })
        });

        Ok(PageKeyPair {
            page_no: right_page_no,
            key: promoted_key,
        })
    }

    /// Grows a new non-leaf root over the old root and a promoted sibling,
    /// then rewrites the header's root pointer.
    fn grow_root(&mut self, separator: PageKeyPair<K>, level: u32) -> Result<()> {
        let old_root = self.root_page_no;

        let (new_root_no, new_root) = self.buf.alloc_page(self.file.clone())?;
        new_root.with_bytes_mut(|d| {
            InnerNode::<K>::init_root(d, level, old_root, separator.page_no, &separator.key)
        });
        drop(new_root);

        self.root_page_no = new_root_no;

        let header = self.buf.read_page(self.file.clone(), self.header_page_no)?;
        header.with_bytes_mut(|d| IndexMeta::set_root_page_no(d, new_root_no));
        Ok(())
    }

    // -------------------------------------------------------------------
    // Range scans
    // -------------------------------------------------------------------

    /// Begins a range scan over `(low, low_op) .. (high, high_op)`.
    ///
    /// An already-active scan is ended first. Fails with `BadOpcodes` for
    /// operators outside GT/GTE and LT/LTE, `BadScanRange` when
    /// `low > high`, and `IndexScanCompleted` when no entry satisfies the
    /// lower bound anywhere in the leaf chain.
    pub fn start_scan(
        &mut self,
        low: K,
        low_op: Operator,
        high: K,
        high_op: Operator,
    ) -> Result<()> {
        if !low_op.is_lower_bound() || !high_op.is_upper_bound() {
            return Err(AlderError::BadOpcodes);
        }

        if self.scan.is_active() {
            self.scan = ScanState::Idle;
        }

        if low.compare(&high) == Ordering::Greater {
            return Err(AlderError::BadScanRange);
        }

        let strict_low = low_op == Operator::Gt;
        let high_inclusive = high_op == Operator::Lte;

        // Descend to the leaf whose key range holds the low bound.
        let mut page_no = self.root_page_no;
        if !self.root_is_leaf() {
            loop {
                let node = self.buf.read_page(self.file.clone(), page_no)?;
                let (level, child_no) = node.with_bytes(|d| {
                    let slot = InnerNode::<K>::find_child(d, &low);
                    (InnerNode::<K>::level(d), InnerNode::<K>::child_at(d, slot))
                });
                page_no = child_no;
                if level == 1 {
                    break;
                }
            }
        }

        // Walk the leaf chain to the first entry satisfying the low bound.
        let mut leaf = self.buf.read_page(self.file.clone(), page_no)?;
        loop {
            let found = leaf.with_bytes(|d| LeafNode::<K>::first_match(d, &low, strict_low));
            if let Some(slot) = found {
                self.scan = ScanState::Positioned {
                    leaf,
                    slot,
                    high,
                    high_inclusive,
                };
                return Ok(());
            }

            let sibling = leaf.with_bytes(|d| LeafNode::<K>::right_sibling(d));
            if sibling == 0 {
                self.scan = ScanState::Exhausted;
                return Err(AlderError::IndexScanCompleted);
            }
            leaf = self.buf.read_page(self.file.clone(), sibling)?;
        }
    }

    /// Emits the next RID of the active scan.
    ///
    /// Fails with `ScanNotInitialized` when no scan is active and with
    /// `IndexScanCompleted` once the upper bound is passed or the leaf
    /// chain is exhausted.
    pub fn scan_next(&mut self) -> Result<RecordId> {
        match std::mem::replace(&mut self.scan, ScanState::Idle) {
            ScanState::Idle => Err(AlderError::ScanNotInitialized),
            ScanState::Exhausted => {
                self.scan = ScanState::Exhausted;
                Err(AlderError::IndexScanCompleted)
            }
            ScanState::Positioned {
                leaf,
                mut slot,
                high,
                high_inclusive,
            } => {
                let (key, rid) = leaf.with_bytes(|d| {
                    (LeafNode::<K>::key_at(d, slot), LeafNode::<K>::rid_at(d, slot))
                });

                let past_high = match key.compare(&high) {
                    Ordering::Greater => true,
                    Ordering::Equal => !high_inclusive,
                    Ordering::Less => false,
                };
                if past_high {
                    // Stay positioned; the scan is over but not ended.
                    self.scan = ScanState::Positioned {
                        leaf,
                        slot,
                        high,
                        high_inclusive,
                    };
                    return Err(AlderError::IndexScanCompleted);
                }

                slot += 1;
                let at_end = slot == LeafNode::<K>::CAPACITY
                    || leaf.with_bytes(|d| LeafNode::<K>::rid_at(d, slot).is_null());

                if at_end {
                    let sibling = leaf.with_bytes(|d| LeafNode::<K>::right_sibling(d));
                    drop(leaf);
                    if sibling == 0 {
                        self.scan = ScanState::Exhausted;
                    } else {
                        let next_leaf = self.buf.read_page(self.file.clone(), sibling)?;
                        self.scan = ScanState::Positioned {
                            leaf: next_leaf,
                            slot: 0,
                            high,
                            high_inclusive,
                        };
                    }
                } else {
                    self.scan = ScanState::Positioned {
                        leaf,
                        slot,
                        high,
                        high_inclusive,
                    };
                }

                Ok(rid)
            }
        }
    }

    /// Ends the active scan, releasing the pinned leaf.
    pub fn end_scan(&mut self) -> Result<()> {
        if !self.scan.is_active() {
            return Err(AlderError::ScanNotInitialized);
        }
        self.scan = ScanState::Idle;
        Ok(())
    }

    /// Ends any scan and flushes all dirty index pages.
    pub fn close(&mut self) -> Result<()> {
        self.scan = ScanState::Idle;
        self.buf.flush_store(self.file.store_id())
    }
}

impl<K: IndexKey> Drop for BTree<K> {
    fn drop(&mut self) {
        self.scan = ScanState::Idle;
        let _ = self.buf.flush_store(self.file.store_id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alder_common::StorageConfig;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> StorageConfig {
        StorageConfig {
            data_dir: dir.to_path_buf(),
            buffer_pool_pages: 256,
            fsync_enabled: false,
        }
    }

    fn empty_relation(buf: &BufferManager, config: &StorageConfig) -> HeapFile {
        HeapFile::create(buf.clone(), config, "rel").unwrap()
    }

    fn collect_scan(tree: &mut BTree<i32>, low: i32, high: i32) -> Vec<RecordId> {
        let mut rids = Vec::new();
        if tree
            .start_scan(low, Operator::Gte, high, Operator::Lte)
            .is_err()
        {
            return rids;
        }
        loop {
            match tree.scan_next() {
                Ok(rid) => rids.push(rid),
                Err(AlderError::IndexScanCompleted) => break,
                Err(e) => panic!("unexpected scan error: {e}"),
            }
        }
        tree.end_scan().unwrap();
        rids
    }

    #[test]
    fn test_create_names_index_after_relation_and_offset() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let buf = BufferManager::with_config(&config);
        let relation = empty_relation(&buf, &config);

        let tree = BTree::<i32>::open_or_create(buf, &relation, 8).unwrap();
        assert_eq!(tree.index_name(), "rel.8");
        assert!(PagedFile::exists(&dir.path().join("rel.8")));
        assert_eq!(tree.root_page_no(), 2);
    }

    #[test]
    fn test_bulk_build_from_relation() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let buf = BufferManager::with_config(&config);
        let relation = empty_relation(&buf, &config);

        let mut expected = Vec::new();
        for key in [42i32, 7, 19, 3, 88] {
            let rid = relation.insert_record(&key.to_le_bytes()).unwrap();
            expected.push((key, rid));
        }
        expected.sort_by_key(|(key, _)| *key);

        let mut tree = BTree::<i32>::open_or_create(buf, &relation, 0).unwrap();

        let rids = collect_scan(&mut tree, i32::MIN, i32::MAX);
        let expected_rids: Vec<_> = expected.iter().map(|(_, rid)| *rid).collect();
        assert_eq!(rids, expected_rids);
    }

    #[test]
    fn test_reopen_validates_header() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let buf = BufferManager::with_config(&config);
        let relation = empty_relation(&buf, &config);
        relation.insert_record(&[0u8; 16]).unwrap();

        {
            BTree::<i32>::open_or_create(buf.clone(), &relation, 4).unwrap();
        }

        // Same file, same offset, wrong kind
        let result = BTree::<f64>::open_or_create(buf.clone(), &relation, 4);
        assert!(matches!(result, Err(AlderError::BadIndexInfo(_))));

        // Matching kind reopens cleanly
        let tree = BTree::<i32>::open_or_create(buf, &relation, 4).unwrap();
        assert_eq!(tree.attr_offset(), 4);
    }

    #[test]
    fn test_reopen_preserves_entries() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let buf = BufferManager::with_config(&config);
        let relation = empty_relation(&buf, &config);

        let rids: Vec<_> = (0..100i32)
            .map(|key| relation.insert_record(&key.to_le_bytes()).unwrap())
            .collect();

        {
            BTree::<i32>::open_or_create(buf.clone(), &relation, 0).unwrap();
        }

        let mut tree = BTree::<i32>::open_or_create(buf, &relation, 0).unwrap();
        assert_eq!(collect_scan(&mut tree, 0, 99), rids);
    }

    #[test]
    fn test_root_grows_once_leaf_overflows() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let buf = BufferManager::with_config(&config);
        let relation = empty_relation(&buf, &config);
        let mut tree = BTree::<i32>::open_or_create(buf, &relation, 0).unwrap();

        let capacity = LeafNode::<i32>::CAPACITY as i32;
        for key in 0..capacity {
            tree.insert(key, RecordId::new(1, key as u16)).unwrap();
        }
        assert_eq!(tree.root_page_no(), 2);

        tree.insert(capacity, RecordId::new(2, 0)).unwrap();
        assert_ne!(tree.root_page_no(), 2);

        let rids = collect_scan(&mut tree, 0, capacity);
        assert_eq!(rids.len(), capacity as usize + 1);
    }

    #[test]
    fn test_insert_from_record_uses_attr_offset() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let buf = BufferManager::with_config(&config);
        let relation = empty_relation(&buf, &config);
        let mut tree = BTree::<i32>::open_or_create(buf, &relation, 4).unwrap();

        let mut record = [0u8; 12];
        record[4..8].copy_from_slice(&77i32.to_le_bytes());
        tree.insert_from_record(&record, RecordId::new(3, 1)).unwrap();

        assert_eq!(collect_scan(&mut tree, 77, 77), vec![RecordId::new(3, 1)]);

        let short = [0u8; 6];
        let result = tree.insert_from_record(&short, RecordId::new(3, 2));
        assert!(matches!(result, Err(AlderError::RecordTooShort { .. })));
    }

    #[test]
    fn test_no_pins_held_between_calls() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let buf = BufferManager::with_config(&config);
        let relation = empty_relation(&buf, &config);
        let mut tree = BTree::<i32>::open_or_create(buf.clone(), &relation, 0).unwrap();

        for key in 0..2000i32 {
            tree.insert(key, RecordId::new(1, (key % 100) as u16)).unwrap();
            assert_eq!(buf.stats().pinned_frames, 0);
        }

        tree.start_scan(100, Operator::Gte, 200, Operator::Lte)
            .unwrap();
        assert_eq!(buf.stats().pinned_frames, 1);
        tree.end_scan().unwrap();
        assert_eq!(buf.stats().pinned_frames, 0);
    }
}
