//! B+ tree index over a single fixed-type attribute of a record stream.
//!
//! The engine maps integer, double, or fixed-length string keys to the
//! RIDs of the records containing them, supports equality and range
//! lookup, and persists itself in a paged file cached by the buffer
//! manager. One algorithmic skeleton is shared by all key kinds through
//! the [`IndexKey`] trait; [`BTreeIndex`] selects the monomorphization at
//! open time.

mod constants;
mod index;
mod key;
mod meta;
mod node;
mod scan;
mod tree;

pub use constants::{
    inner_capacity, leaf_capacity, DOUBLE_INNER_CAPACITY, DOUBLE_LEAF_CAPACITY,
    INT_INNER_CAPACITY, INT_LEAF_CAPACITY, STRING_INNER_CAPACITY, STRING_LEAF_CAPACITY,
};
pub use index::BTreeIndex;
pub use key::{IndexKey, KeyValue, PageKeyPair, StrKey};
pub use scan::Operator;
