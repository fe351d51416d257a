//! The persisted index header.
//!
//! The header occupies the file's first page:
//! - `relation_name: [u8; 20]` at offset 0 (truncated, NUL-padded)
//! - `attr_offset: i32` at offset 20
//! - `attr_kind: i32` at offset 24
//! - `root_page_no: u32` at offset 28
//!
//! `root_page_no` is the sole authoritative root pointer; whether the root
//! is a leaf is derived from it, never stored.

/// Maximum stored length of the relation name.
pub(crate) const RELATION_NAME_LEN: usize = 20;

const ATTR_OFFSET_POS: usize = RELATION_NAME_LEN;
const ATTR_KIND_POS: usize = RELATION_NAME_LEN + 4;
const ROOT_PAGE_POS: usize = RELATION_NAME_LEN + 8;

/// Decoded contents of the index header page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IndexMeta {
    /// Name of the indexed relation.
    pub relation_name: String,
    /// Byte offset of the indexed attribute within a record.
    pub attr_offset: i32,
    /// Persisted key kind tag.
    pub attr_kind: i32,
    /// Page number of the current root.
    pub root_page_no: u32,
}

impl IndexMeta {
    /// Decodes the header from page bytes.
    pub fn read(data: &[u8]) -> Self {
        let name_bytes = &data[..RELATION_NAME_LEN];
        let name_len = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(RELATION_NAME_LEN);
        let relation_name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

        Self {
            relation_name,
            attr_offset: i32::from_le_bytes([
                data[ATTR_OFFSET_POS],
                data[ATTR_OFFSET_POS + 1],
                data[ATTR_OFFSET_POS + 2],
                data[ATTR_OFFSET_POS + 3],
            ]),
            attr_kind: i32::from_le_bytes([
                data[ATTR_KIND_POS],
                data[ATTR_KIND_POS + 1],
                data[ATTR_KIND_POS + 2],
                data[ATTR_KIND_POS + 3],
            ]),
            root_page_no: u32::from_le_bytes([
                data[ROOT_PAGE_POS],
                data[ROOT_PAGE_POS + 1],
                data[ROOT_PAGE_POS + 2],
                data[ROOT_PAGE_POS + 3],
            ]),
        }
    }

    /// Encodes the header into page bytes.
    pub fn write(&self, data: &mut [u8]) {
        let name = self.relation_name.as_bytes();
        let name_len = name.len().min(RELATION_NAME_LEN);
        data[..RELATION_NAME_LEN].fill(0);
        data[..name_len].copy_from_slice(&name[..name_len]);

        data[ATTR_OFFSET_POS..ATTR_OFFSET_POS + 4]
            .copy_from_slice(&self.attr_offset.to_le_bytes());
        data[ATTR_KIND_POS..ATTR_KIND_POS + 4].copy_from_slice(&self.attr_kind.to_le_bytes());
        data[ROOT_PAGE_POS..ROOT_PAGE_POS + 4].copy_from_slice(&self.root_page_no.to_le_bytes());
    }

    /// Rewrites only the root page number within an existing header.
    pub fn set_root_page_no(data: &mut [u8], root_page_no: u32) {
        data[ROOT_PAGE_POS..ROOT_PAGE_POS + 4].copy_from_slice(&root_page_no.to_le_bytes());
    }
}
