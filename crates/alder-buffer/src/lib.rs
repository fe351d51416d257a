//! Buffer management for AlderDB.
//!
//! This crate provides in-memory page caching with:
//! - Fixed-size frame pool with configurable frame count
//! - Clock eviction policy that never evicts pinned pages
//! - Pin counting with RAII pinned-page guards carrying the dirty flag
//! - Write-back of dirty pages through the owning page store

mod frame;
mod page_table;
mod pool;
mod replacer;
mod store;

pub use frame::{BufferFrame, FrameId};
pub use page_table::PageTable;
pub use pool::{BufferManager, BufferManagerConfig, BufferManagerStats, PinnedPage};
pub use replacer::{ClockReplacer, Replacer};
pub use store::PageStore;
