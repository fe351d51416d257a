//! The public index surface: kind dispatch over the monomorphized trees.

use super::key::{KeyValue, StrKey};
use super::scan::Operator;
use super::tree::BTree;
use crate::heap::HeapFile;
use alder_buffer::BufferManager;
use alder_common::page::RecordId;
use alder_common::types::KeyKind;
use alder_common::{AlderError, Result};

/// A B+ tree index over one fixed-type attribute of a relation.
///
/// The key kind is chosen at creation, persisted in the index header, and
/// dispatched here onto one of three monomorphized engines. Keys cross
/// this surface as [`KeyValue`]s; a value of the wrong kind fails with
/// `TypeMismatch`.
pub struct BTreeIndex {
    inner: IndexInner,
}

enum IndexInner {
    Int(BTree<i32>),
    Double(BTree<f64>),
    Str(BTree<StrKey>),
}

fn kind_of(inner: &IndexInner) -> KeyKind {
    match inner {
        IndexInner::Int(_) => KeyKind::Int,
        IndexInner::Double(_) => KeyKind::Double,
        IndexInner::Str(_) => KeyKind::Str,
    }
}

fn mismatch(expected: KeyKind, actual: KeyKind) -> AlderError {
    AlderError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

impl BTreeIndex {
    /// Opens the index on `relation`'s attribute at `attr_offset`, creating
    /// and bulk-building it from the relation's records if the index file
    /// does not exist yet.
    ///
    /// Fails with `BadIndexInfo` when an existing index file disagrees
    /// about the attribute offset or key kind.
    pub fn open_or_create(
        buf: &BufferManager,
        relation: &HeapFile,
        attr_offset: usize,
        kind: KeyKind,
    ) -> Result<Self> {
        let inner = match kind {
            KeyKind::Int => {
                IndexInner::Int(BTree::open_or_create(buf.clone(), relation, attr_offset)?)
            }
            KeyKind::Double => {
                IndexInner::Double(BTree::open_or_create(buf.clone(), relation, attr_offset)?)
            }
            KeyKind::Str => {
                IndexInner::Str(BTree::open_or_create(buf.clone(), relation, attr_offset)?)
            }
        };
        Ok(Self { inner })
    }

    /// Returns the index file name, `"<relation>.<offset>"`.
    pub fn index_name(&self) -> &str {
        match &self.inner {
            IndexInner::Int(tree) => tree.index_name(),
            IndexInner::Double(tree) => tree.index_name(),
            IndexInner::Str(tree) => tree.index_name(),
        }
    }

    /// Returns the key kind this index is built over.
    pub fn key_kind(&self) -> KeyKind {
        kind_of(&self.inner)
    }

    /// Returns the byte offset of the indexed attribute.
    pub fn attr_offset(&self) -> usize {
        match &self.inner {
            IndexInner::Int(tree) => tree.attr_offset(),
            IndexInner::Double(tree) => tree.attr_offset(),
            IndexInner::Str(tree) => tree.attr_offset(),
        }
    }

    /// Returns the current root page number (page 2 while the root is
    /// still a leaf).
    pub fn root_page_no(&self) -> u32 {
        match &self.inner {
            IndexInner::Int(tree) => tree.root_page_no(),
            IndexInner::Double(tree) => tree.root_page_no(),
            IndexInner::Str(tree) => tree.root_page_no(),
        }
    }

    /// Inserts a key/RID entry.
    pub fn insert(&mut self, key: &KeyValue, rid: RecordId) -> Result<()> {
        match (&mut self.inner, key) {
            (IndexInner::Int(tree), KeyValue::Int(k)) => tree.insert(*k, rid),
            (IndexInner::Double(tree), KeyValue::Double(k)) => tree.insert(*k, rid),
            (IndexInner::Str(tree), KeyValue::Str(k)) => tree.insert(*k, rid),
            (inner, key) => Err(mismatch(kind_of(inner), key.kind())),
        }
    }

    /// Inserts the key extracted from a raw record buffer at the persisted
    /// attribute offset.
    pub fn insert_from_record(&mut self, record: &[u8], rid: RecordId) -> Result<()> {
        match &mut self.inner {
            IndexInner::Int(tree) => tree.insert_from_record(record, rid),
            IndexInner::Double(tree) => tree.insert_from_record(record, rid),
            IndexInner::Str(tree) => tree.insert_from_record(record, rid),
        }
    }

    /// Begins a range scan; see the scan operators for the accepted bound
    /// combinations.
    pub fn start_scan(
        &mut self,
        low: &KeyValue,
        low_op: Operator,
        high: &KeyValue,
        high_op: Operator,
    ) -> Result<()> {
        match (&mut self.inner, low, high) {
            (IndexInner::Int(tree), KeyValue::Int(lo), KeyValue::Int(hi)) => {
                tree.start_scan(*lo, low_op, *hi, high_op)
            }
            (IndexInner::Double(tree), KeyValue::Double(lo), KeyValue::Double(hi)) => {
                tree.start_scan(*lo, low_op, *hi, high_op)
            }
            (IndexInner::Str(tree), KeyValue::Str(lo), KeyValue::Str(hi)) => {
                tree.start_scan(*lo, low_op, *hi, high_op)
            }
            (inner, low, high) => {
                let expected = kind_of(inner);
                let actual = if low.kind() == expected {
                    high.kind()
                } else {
                    low.kind()
                };
                Err(mismatch(expected, actual))
            }
        }
    }

    /// Emits the next RID of the active scan.
    pub fn scan_next(&mut self) -> Result<RecordId> {
        match &mut self.inner {
            IndexInner::Int(tree) => tree.scan_next(),
            IndexInner::Double(tree) => tree.scan_next(),
            IndexInner::Str(tree) => tree.scan_next(),
        }
    }

    /// Ends the active scan.
    pub fn end_scan(&mut self) -> Result<()> {
        match &mut self.inner {
            IndexInner::Int(tree) => tree.end_scan(),
            IndexInner::Double(tree) => tree.end_scan(),
            IndexInner::Str(tree) => tree.end_scan(),
        }
    }

    /// Closes the index, ending any scan and flushing dirty pages.
    ///
    /// Dropping the index flushes as well; `close` surfaces the result.
    pub fn close(mut self) -> Result<()> {
        match &mut self.inner {
            IndexInner::Int(tree) => tree.close(),
            IndexInner::Double(tree) => tree.close(),
            IndexInner::Str(tree) => tree.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alder_common::StorageConfig;
    use tempfile::tempdir;

    fn setup() -> (BufferManager, HeapFile, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            data_dir: dir.path().to_path_buf(),
            buffer_pool_pages: 256,
            fsync_enabled: false,
        };
        let buf = BufferManager::with_config(&config);
        let relation = HeapFile::create(buf.clone(), &config, "rel").unwrap();
        (buf, relation, dir)
    }

    #[test]
    fn test_open_or_create_each_kind() {
        let (buf, relation, _dir) = setup();

        for (offset, kind) in [(0, KeyKind::Int), (4, KeyKind::Double), (12, KeyKind::Str)] {
            let index = BTreeIndex::open_or_create(&buf, &relation, offset, kind).unwrap();
            assert_eq!(index.key_kind(), kind);
            assert_eq!(index.attr_offset(), offset);
            assert_eq!(index.index_name(), format!("rel.{offset}"));
        }
    }

    #[test]
    fn test_insert_rejects_wrong_kind() {
        let (buf, relation, _dir) = setup();
        let mut index = BTreeIndex::open_or_create(&buf, &relation, 0, KeyKind::Int).unwrap();

        let result = index.insert(&KeyValue::Double(1.0), RecordId::new(1, 0));
        assert!(matches!(result, Err(AlderError::TypeMismatch { .. })));

        index.insert(&KeyValue::Int(1), RecordId::new(1, 0)).unwrap();
    }

    #[test]
    fn test_start_scan_rejects_wrong_kind() {
        let (buf, relation, _dir) = setup();
        let mut index = BTreeIndex::open_or_create(&buf, &relation, 0, KeyKind::Int).unwrap();
        index.insert(&KeyValue::Int(5), RecordId::new(1, 0)).unwrap();

        let result = index.start_scan(
            &KeyValue::Int(0),
            Operator::Gte,
            &KeyValue::str(b"oops"),
            Operator::Lte,
        );
        assert!(matches!(result, Err(AlderError::TypeMismatch { .. })));
    }

    #[test]
    fn test_close_flushes() {
        let (buf, relation, dir) = setup();
        let mut index = BTreeIndex::open_or_create(&buf, &relation, 0, KeyKind::Int).unwrap();
        index.insert(&KeyValue::Int(9), RecordId::new(1, 0)).unwrap();
        index.close().unwrap();

        assert!(crate::file::PagedFile::exists(&dir.path().join("rel.0")));
        assert_eq!(buf.stats().dirty_frames, 0);
    }
}
