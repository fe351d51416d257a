//! Storage engine for AlderDB.
//!
//! This crate provides:
//! - Paged files: named files of fixed-size pages backing relations and indexes
//! - Heap files for record storage and the record scan that feeds index builds
//! - The B+ tree index engine (keys, node layouts, insertion, range scans)

mod btree;
mod file;
mod heap;

pub use btree::{
    inner_capacity, leaf_capacity, BTreeIndex, IndexKey, KeyValue, Operator, PageKeyPair, StrKey,
    DOUBLE_INNER_CAPACITY, DOUBLE_LEAF_CAPACITY, INT_INNER_CAPACITY, INT_LEAF_CAPACITY,
    STRING_INNER_CAPACITY, STRING_LEAF_CAPACITY,
};
pub use file::PagedFile;
pub use heap::{HeapFile, HeapPage, RecordScan};
